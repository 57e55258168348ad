use async_trait::async_trait;

use super::session::{PlaybackId, SessionKey};
use crate::error::TransportError;
use crate::sources::Track;

/// The voice-call side of playback: joins rooms and streams media into them.
///
/// Implementations report the end of every started playback instance by
/// sending a [`TransportEvent`] carrying the `PlaybackId` given to
/// [`Transport::start`]: `StreamEnded` when it finished or was interrupted,
/// `StreamFailed` when the media could not be played at all. A transport
/// that opens media lazily reports a dead locator through the latter.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Joins the room if needed and starts streaming `track`.
    async fn start(
        &self,
        key: SessionKey,
        playback: PlaybackId,
        track: &Track,
    ) -> Result<(), TransportError>;

    async fn pause(&self, key: SessionKey) -> Result<(), TransportError>;

    async fn resume(&self, key: SessionKey) -> Result<(), TransportError>;

    /// Stops streaming and leaves the room. Must tolerate not being in one.
    async fn leave(&self, key: SessionKey) -> Result<(), TransportError>;
}

/// Asynchronous signals coming back from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    StreamEnded {
        key: SessionKey,
        playback: PlaybackId,
    },
    StreamFailed {
        key: SessionKey,
        playback: PlaybackId,
        reason: String,
    },
}
