use tokio::sync::mpsc;
use tracing::debug;

use super::session::SessionKey;
use crate::sources::Track;

/// Why a session went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    QueueDrained,
    Stopped,
    /// Too many consecutive tracks failed to start.
    StartFailures,
}

/// User-visible playback events, rendered by the command surface.
#[derive(Debug, Clone, PartialEq)]
pub enum PlaybackEvent {
    Started(Track),
    Queued { track: Track, position: usize },
    Advanced(Track),
    Ended { reason: EndReason },
    StartFailed { track: Track, reason: String },
    /// The query never became a track; nothing was queued.
    ResolveFailed { query: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub key: SessionKey,
    pub event: PlaybackEvent,
}

/// Sending half of the notification channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn emit(&self, key: SessionKey, event: PlaybackEvent) {
        if self.tx.send(Notification { key, event }).is_err() {
            debug!("📭 Notification receiver gone, dropping event for {}", key);
        }
    }
}
