//! Change notification and reporting boundaries.
//!
//! The core never touches a UI thread. Mutations publish [`LibraryEvent`]s
//! on a channel-based bus; the presentation layer subscribes and marshals
//! them onto whatever thread it likes. Long-running tasks report through
//! [`ProgressSink`] and [`ErrorSink`] implementations injected at startup.

use parking_lot::Mutex;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Events published by the library collections and background tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryEvent {
    TracksAdded(Vec<u32>),
    TracksRemoved(Vec<u32>),
    TrackModified(u32),
    /// The "currently showing" projection was reprojected.
    ShowingChanged,
    /// The sorted artist name list gained or lost a name.
    ArtistsChanged,
    /// Playlist structure or membership changed (covers are stale).
    PlaylistsChanged,
    WaveformReady(u32),
    ImportStage(ImportStage),
}

/// States of an import task, in the order they are entered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStage {
    Scanning,
    AwaitingConfirmation,
    Parsing,
    Merging,
    Persisting,
    Succeeded,
    Cancelled,
}

/// Fan-out bus for [`LibraryEvent`]s.
///
/// Subscribers that drop their receiver are pruned on the next publish.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<LibraryEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<LibraryEvent> {
        let (tx, rx) = channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn publish(&self, event: LibraryEvent) {
        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Receives progress of a long-running task as a fraction plus a message.
pub trait ProgressSink: Send + Sync {
    fn progress(&self, fraction: f64, message: &str);
}

/// Receives user-visible error reports, optionally with long-form detail
/// and a collection of itemized failures.
pub trait ErrorSink: Send + Sync {
    fn report(&self, message: &str, detail: Option<&str>, items: &[String]);
}

/// Progress sink that forwards to the log, used by the CLI.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn progress(&self, fraction: f64, message: &str) {
        log::info!("[{:>5.1}%] {}", fraction * 100.0, message);
    }
}

/// Error sink that forwards to the log, used by the CLI.
pub struct LogErrors;

impl ErrorSink for LogErrors {
    fn report(&self, message: &str, detail: Option<&str>, items: &[String]) {
        match detail {
            Some(detail) => log::error!("{message}: {detail}"),
            None => log::error!("{message}"),
        }
        for item in items {
            log::warn!("  {item}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::new();
        let rx1 = bus.subscribe();
        let rx2 = bus.subscribe();

        bus.publish(LibraryEvent::ShowingChanged);

        assert_eq!(rx1.recv().unwrap(), LibraryEvent::ShowingChanged);
        assert_eq!(rx2.recv().unwrap(), LibraryEvent::ShowingChanged);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        drop(rx);

        bus.publish(LibraryEvent::ArtistsChanged);
        assert!(bus.subscribers.lock().is_empty());
    }
}
