//! ShellNotify Monitor - filesystem watcher feeding shell change notifications.
//!
//! This binary registers one change-notification client per watched
//! directory, raises filesystem changes on the registry, and prints every
//! notification its clients consume as a JSON line on stdout. Logs go to
//! stderr.
//!
//! # Commands
//!
//! - `shellnotify-monitor run`: Watch directories and report notifications
//! - `shellnotify-monitor events`: List the shell change event vocabulary
//!
//! # Environment Variables
//!
//! See the [`config`](shellnotify_monitor::config) module for available
//! configuration options.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::signal;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use shellnotify_monitor::config::{Config, WatchSpec};
use shellnotify_monitor::output::{event_table, format_event_table, ConsumedRecord};
use shellnotify_monitor::watcher::{watch_item, FsBridge};
use shellnotify_registry::{
    ChangeMessage, ChangeNotifyRegistry, Deliver, EventMask, NotifyTarget, QueueSink, WindowId,
};

/// Message tag the monitor's clients register with (`WM_USER + 1`).
const CONSUME_MESSAGE: u32 = 0x0401;

/// ShellNotify Monitor - filesystem watcher feeding shell change notifications.
///
/// Watches directories, dispatches their changes to registered clients,
/// and prints each consumed notification as JSON.
#[derive(Parser, Debug)]
#[command(name = "shellnotify-monitor")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "\
ENVIRONMENT VARIABLES:
    SHELLNOTIFY_WATCH_DIR           Directory to watch without --watch (default: home)
    SHELLNOTIFY_EVENT_MASK          Event mask without --mask (default: 0x7FFFFFFF)
    SHELLNOTIFY_SUBTREE             Watch subtree of the default directory (default: true)
    SHELLNOTIFY_BUFFER_SIZE         Watcher channel capacity (default: 1000)
    SHELLNOTIFY_TWO_ITEM_MATCHING   'first' or 'either' (default: first)
    SHELLNOTIFY_ORIGIN_PID          Origin identity on deliveries (default: own pid)
    RUST_LOG                        Log filter (default: info)

EXAMPLES:
    # Watch a project tree and one flat directory
    shellnotify-monitor run --watch ~/src/project --watch /tmp:flat

    # Only report creations and deletions
    shellnotify-monitor run --watch ~/Documents --mask 'CREATE|DELETE'

    # List event names and bit values
    shellnotify-monitor events
")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Watch directories and print consumed notifications.
    Run {
        /// Directory to watch; may be repeated. With ':flat' only the
        /// directory itself is reported, and changes to its direct
        /// children arrive as UPDATEDIR on it.
        #[arg(short, long = "watch", value_name = "PATH[:flat]")]
        watch: Vec<WatchSpec>,

        /// Events to register for, as hex, decimal or names joined by '|'.
        #[arg(short, long, value_name = "BITS")]
        mask: Option<EventMask>,

        /// Emit logs as JSON.
        #[arg(long)]
        log_json: bool,
    },

    /// List the event vocabulary with bit values and families.
    Events {
        /// Print as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Events { json } => run_events(json),
        Command::Run {
            watch,
            mask,
            log_json,
        } => {
            init_logging(log_json);

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to create tokio runtime")?;

            runtime.block_on(run_monitor(watch, mask))
        }
    }
}

/// Prints the event vocabulary.
fn run_events(json: bool) -> Result<()> {
    let rows = event_table();
    let mut stdout = io::stdout().lock();

    if json {
        serde_json::to_writer_pretty(&mut stdout, &rows)?;
        writeln!(stdout)?;
    } else {
        stdout.write_all(format_event_table(&rows).as_bytes())?;
    }
    Ok(())
}

/// Runs the monitor until a shutdown signal arrives.
async fn run_monitor(watches: Vec<WatchSpec>, mask: Option<EventMask>) -> Result<()> {
    info!("Starting ShellNotify Monitor");

    let config = Config::from_env().context("Failed to load configuration")?;
    let watches = if watches.is_empty() {
        vec![config.default_watch()]
    } else {
        watches
    };
    let mask = mask.unwrap_or(config.event_mask);

    info!(
        roots = watches.len(),
        events = %mask,
        two_item_matching = ?config.registry.two_item_matching,
        "Configuration loaded"
    );

    let registry = Arc::new(ChangeNotifyRegistry::new(config.registry.clone()));
    let (sink, mut messages) = QueueSink::channel();
    let sink: Arc<dyn Deliver> = Arc::new(sink);

    for (index, spec) in watches.iter().enumerate() {
        let item = watch_item(spec)
            .with_context(|| format!("Failed to watch {}", spec.path.display()))?;
        let window = WindowId(index as u64 + 1);
        let target = NotifyTarget::new(window, CONSUME_MESSAGE, Arc::clone(&sink));
        let handle = registry
            .register(target, 0, mask, &[item])
            .context("Failed to register watch")?;

        info!(
            handle = %handle,
            window = %window,
            path = %spec.path.display(),
            subtree = spec.subtree,
            "Registered watch"
        );
    }

    let bridge = FsBridge::new(Arc::clone(&registry), &watches, config.buffer_size)
        .context("Failed to initialize filesystem watcher")?;

    info!("Monitor running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = wait_for_shutdown() => {
                info!("Shutdown signal received");
                break;
            }

            Some(message) = messages.recv() => {
                let mut stdout = io::stdout().lock();
                if let Err(e) = report(&registry, &message, &mut stdout) {
                    warn!(handle = %message.handle, error = %e, "Failed to report notification");
                }
            }
        }
    }

    info!("Shutting down...");
    drop(bridge);
    let released = registry.shutdown();

    info!(released, "Monitor stopped");
    Ok(())
}

/// Consumes the notification a message announces and prints it.
///
/// Several messages for one registration may arrive before the first is
/// handled; the first consume collects all their events and the rest find
/// nothing pending.
fn report<W: Write>(
    registry: &ChangeNotifyRegistry,
    message: &ChangeMessage,
    out: &mut W,
) -> shellnotify_monitor::Result<()> {
    let lock = registry.lock_consume(message.handle)?;

    if lock.events().is_empty() {
        debug!(handle = %message.handle, "Notification already consumed");
        registry.unlock_consume(lock);
        return Ok(());
    }

    let record = ConsumedRecord::new(message.window, &lock, Utc::now());
    registry.unlock_consume(lock);

    record.write_line(out)?;
    out.flush()?;
    Ok(())
}

/// Initializes the tracing subscriber, writing to stderr.
fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .with_writer(io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
