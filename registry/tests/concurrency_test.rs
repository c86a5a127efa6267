//! Concurrency tests for the registry lock.
//!
//! Several threads register, notify, consume and deregister at once. The
//! registry must never panic or deadlock, handles must stay unique, and
//! every consume must see a consistent registration or a clean NotFound.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use shellnotify_registry::{
    ChangeMessage, ChangeNotifyRegistry, EventMask, Item, ItemIdList, NotifyTarget, PayloadKind,
    QueueSink, RegistryError, WatchItem, WindowId,
};

const THREADS: usize = 8;
const ROUNDS: usize = 200;

fn watch_docs() -> Vec<WatchItem> {
    vec![WatchItem::new(
        ItemIdList::from_path_str("/docs").expect("path should resolve"),
        true,
    )]
}

fn counting_target(window: u64, counter: &Arc<AtomicUsize>) -> NotifyTarget {
    let counter = Arc::clone(counter);
    NotifyTarget::new(
        WindowId(window),
        0x0401,
        Arc::new(move |_: &ChangeMessage| {
            counter.fetch_add(1, Ordering::Relaxed);
        }),
    )
}

#[test]
fn concurrent_deregister_consume_and_notify_do_not_crash() {
    let registry = Arc::new(ChangeNotifyRegistry::default());
    let delivered = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    let workers: Vec<_> = (0..THREADS)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            let delivered = Arc::clone(&delivered);
            let barrier = Arc::clone(&barrier);

            thread::spawn(move || {
                barrier.wait();
                for round in 0..ROUNDS {
                    let window = (worker * ROUNDS + round) as u64;
                    let handle = registry
                        .register(
                            counting_target(window, &delivered),
                            0,
                            EventMask::CREATE,
                            &watch_docs(),
                        )
                        .expect("registration should succeed");

                    let path = format!("/docs/{worker}/{round}");
                    registry
                        .notify(
                            EventMask::CREATE,
                            PayloadKind::NarrowPath,
                            Some(Item::from(path.as_str())),
                            None,
                        )
                        .expect("notification should be valid");

                    match registry.lock_consume(handle) {
                        Ok(lock) => {
                            assert_eq!(lock.paths().len(), 1);
                            assert!(registry.unlock_consume(lock));
                        }
                        Err(RegistryError::NotFound(h)) => assert_eq!(h, handle),
                        Err(other) => panic!("unexpected error: {other}"),
                    }

                    assert!(registry.deregister(handle));
                    assert!(matches!(
                        registry.lock_consume(handle),
                        Err(RegistryError::NotFound(_))
                    ));
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker thread panicked");
    }

    assert!(registry.is_empty());
    // Each notify reaches at least the registration its own thread just made.
    assert!(delivered.load(Ordering::Relaxed) >= THREADS * ROUNDS);
}

#[test]
fn consume_races_with_deregister_of_same_handle() {
    let registry = Arc::new(ChangeNotifyRegistry::default());
    let delivered = Arc::new(AtomicUsize::new(0));

    for round in 0..ROUNDS {
        let handle = registry
            .register(
                counting_target(round as u64, &delivered),
                0,
                EventMask::ALLEVENTS,
                &[WatchItem::everything()],
            )
            .expect("registration should succeed");

        let consumer = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || match registry.lock_consume(handle) {
                Ok(lock) => registry.unlock_consume(lock),
                Err(RegistryError::NotFound(_)) => false,
                Err(other) => panic!("unexpected error: {other}"),
            })
        };
        let remover = {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.deregister(handle))
        };

        consumer.join().expect("consumer panicked");
        assert!(remover.join().expect("remover panicked"));
    }

    assert!(registry.is_empty());
}

#[test]
fn handles_stay_unique_across_threads() {
    let registry = Arc::new(ChangeNotifyRegistry::default());
    let delivered = Arc::new(AtomicUsize::new(0));

    let workers: Vec<_> = (0..THREADS)
        .map(|worker| {
            let registry = Arc::clone(&registry);
            let delivered = Arc::clone(&delivered);
            thread::spawn(move || {
                (0..ROUNDS)
                    .map(|round| {
                        registry
                            .register(
                                counting_target((worker * ROUNDS + round) as u64, &delivered),
                                0,
                                EventMask::DELETE,
                                &[],
                            )
                            .expect("registration should succeed")
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut handles: Vec<_> = workers
        .into_iter()
        .flat_map(|worker| worker.join().expect("worker panicked"))
        .collect();
    let total = handles.len();
    handles.sort();
    handles.dedup();

    assert_eq!(handles.len(), total);
    assert_eq!(registry.len(), total);
    assert_eq!(registry.handles().len(), total);
}

#[tokio::test]
async fn queue_sink_receives_messages_in_notify_order() {
    let registry = ChangeNotifyRegistry::default();
    let (sink, mut rx) = QueueSink::channel();
    let handle = registry
        .register(
            NotifyTarget::new(WindowId(7), 0x0402, Arc::new(sink)),
            0,
            EventMask::CREATE | EventMask::DELETE,
            &watch_docs(),
        )
        .expect("registration should succeed");

    for (event, path) in [
        (EventMask::CREATE, "/docs/a"),
        (EventMask::DELETE, "/docs/a"),
        (EventMask::CREATE, "/docs/b"),
    ] {
        registry
            .notify(event, PayloadKind::NarrowPath, Some(Item::from(path)), None)
            .expect("notification should be valid");
    }

    for _ in 0..3 {
        let message = rx.recv().await.expect("message should be queued");
        assert_eq!(message.handle, handle);
        assert_eq!(message.window, WindowId(7));
    }

    let lock = registry.lock_consume(handle).expect("handle should be live");
    assert_eq!(lock.events(), EventMask::CREATE | EventMask::DELETE);
    assert_eq!(
        lock.paths(),
        &[Some(ItemIdList::from_path_str("/docs/b").expect("path should resolve"))]
    );
}
