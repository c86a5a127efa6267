//! Delivery of change notifications to registered clients.
//!
//! When a change is relevant to a registration, the dispatcher hands a
//! [`ChangeMessage`] to the registration's [`Deliver`] sink. This happens
//! synchronously while the registry lock is held, so every delivery for a
//! registration is ordered by the order its notifications took the lock.
//!
//! # Sinks
//!
//! - Any `Fn(&ChangeMessage) + Send + Sync` closure
//! - [`QueueSink`] - pushes messages onto a tokio channel for asynchronous
//!   consumption, relaxing the serialization of slow clients
//! - [`RecordingSink`] - collects messages in memory
//!
//! Sinks must not block. A sink running on the notifying thread may call
//! back into the registry (for example to consume the notification), since
//! the registry lock is reentrant.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use shellnotify_registry::delivery::{NotifyTarget, QueueSink, WindowId};
//!
//! let (sink, mut rx) = QueueSink::channel();
//! let target = NotifyTarget::new(WindowId(0x1234), 0x0401, Arc::new(sink));
//! assert_eq!(target.message(), 0x0401);
//! assert!(rx.try_recv().is_err());
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use crate::store::Handle;

/// Opaque identity of the recipient window or queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// A delivered notification, as posted to the recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeMessage {
    /// Recipient identity.
    pub window: WindowId,
    /// Message tag the client registered with.
    pub message: u32,
    /// Registration to consume with
    /// [`lock_consume`](crate::registry::ChangeNotifyRegistry::lock_consume).
    pub handle: Handle,
    /// Identity of the process that raised the change.
    pub origin_process: u32,
}

/// A capability to deliver [`ChangeMessage`]s.
pub trait Deliver: Send + Sync {
    /// Delivers one message; must return promptly.
    fn deliver(&self, message: &ChangeMessage);
}

impl<F> Deliver for F
where
    F: Fn(&ChangeMessage) + Send + Sync,
{
    fn deliver(&self, message: &ChangeMessage) {
        self(message);
    }
}

/// Where and how a registration is notified.
#[derive(Clone)]
pub struct NotifyTarget {
    window: WindowId,
    message: u32,
    sink: Arc<dyn Deliver>,
}

impl NotifyTarget {
    #[must_use]
    pub fn new(window: WindowId, message: u32, sink: Arc<dyn Deliver>) -> Self {
        Self {
            window,
            message,
            sink,
        }
    }

    #[must_use]
    pub fn window(&self) -> WindowId {
        self.window
    }

    #[must_use]
    pub fn message(&self) -> u32 {
        self.message
    }

    pub(crate) fn deliver(&self, handle: Handle, origin_process: u32) {
        let message = ChangeMessage {
            window: self.window,
            message: self.message,
            handle,
            origin_process,
        };
        trace!(window = %self.window, handle = %handle, "Delivering change message");
        self.sink.deliver(&message);
    }
}

impl fmt::Debug for NotifyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifyTarget")
            .field("window", &self.window)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

/// Asynchronous delivery through an unbounded tokio channel.
///
/// Sending never blocks. Messages for a receiver that has been dropped are
/// discarded with a warning.
#[derive(Debug, Clone)]
pub struct QueueSink {
    tx: mpsc::UnboundedSender<ChangeMessage>,
}

impl QueueSink {
    /// Creates a sink and the receiver its messages arrive on.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ChangeMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Deliver for QueueSink {
    fn deliver(&self, message: &ChangeMessage) {
        if self.tx.send(message.clone()).is_err() {
            warn!(
                window = %message.window,
                handle = %message.handle,
                "Change message receiver closed, dropping message"
            );
        }
    }
}

/// Collects delivered messages in memory.
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<ChangeMessage>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Messages delivered so far, oldest first.
    #[must_use]
    pub fn messages(&self) -> Vec<ChangeMessage> {
        self.messages.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.lock().is_empty()
    }

    /// Removes and returns the delivered messages.
    pub fn take(&self) -> Vec<ChangeMessage> {
        std::mem::take(&mut *self.messages.lock())
    }
}

impl Deliver for RecordingSink {
    fn deliver(&self, message: &ChangeMessage) {
        self.messages.lock().push(message.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn handle() -> Handle {
        Handle::from_raw(0x1_0000_0000)
    }

    #[test]
    fn target_builds_message_from_registration() {
        let sink = Arc::new(RecordingSink::new());
        let target = NotifyTarget::new(WindowId(9), 0x401, sink.clone());

        target.deliver(handle(), 42);

        assert_eq!(
            sink.messages(),
            vec![ChangeMessage {
                window: WindowId(9),
                message: 0x401,
                handle: handle(),
                origin_process: 42,
            }]
        );
    }

    #[test]
    fn closures_are_sinks() {
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let target = NotifyTarget::new(
            WindowId(1),
            1,
            Arc::new(move |_: &ChangeMessage| {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );

        target.deliver(handle(), 1);
        target.deliver(handle(), 1);

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn recording_sink_take_clears() {
        let sink = RecordingSink::new();
        let target = NotifyTarget::new(WindowId(1), 1, Arc::new(RecordingSink::new()));
        sink.deliver(&ChangeMessage {
            window: target.window(),
            message: target.message(),
            handle: handle(),
            origin_process: 0,
        });

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn queue_sink_forwards_messages() {
        let (sink, mut rx) = QueueSink::channel();
        let target = NotifyTarget::new(WindowId(5), 0x402, Arc::new(sink));

        target.deliver(handle(), 7);

        let message = rx.recv().await.unwrap();
        assert_eq!(message.window, WindowId(5));
        assert_eq!(message.origin_process, 7);
    }

    #[test]
    fn queue_sink_tolerates_closed_receiver() {
        let (sink, rx) = QueueSink::channel();
        drop(rx);
        let target = NotifyTarget::new(WindowId(5), 0x402, Arc::new(sink));

        target.deliver(handle(), 7);
    }

    #[test]
    fn debug_omits_sink() {
        let target = NotifyTarget::new(WindowId(3), 4, Arc::new(RecordingSink::new()));
        let rendered = format!("{target:?}");
        assert!(rendered.contains("window"));
        assert!(rendered.contains(".."));
    }
}
