//! Typed failures of the playback core.
//!
//! Commands that are meaningless in the current session state and
//! superseded stream-ended signals are *not* errors; they come back as
//! [`crate::audio::player::ControlOutcome::Ignored`].

use std::time::Duration;
use thiserror::Error;

use crate::audio::session::SessionKey;

/// Turning a free-text query into a playable [`crate::sources::Track`] failed.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("empty search query")]
    EmptyQuery,

    #[error("no results for \"{0}\"")]
    NoResults(String),

    #[error("resolver process failed: {0}")]
    Process(String),

    #[error("could not launch resolver: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed resolver output: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The voice transport refused or failed an instruction.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no voice channel selected for session {0}")]
    NoTarget(SessionKey),

    #[error("not connected to voice in session {0}")]
    NotConnected(SessionKey),

    #[error("could not join voice: {0}")]
    Join(String),

    #[error("playback failed: {0}")]
    Playback(String),
}

/// Errors surfaced by the playback controller to the command surface.
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("track lookup failed: {0}")]
    Resolution(#[from] ResolveError),

    #[error("track lookup timed out after {0:?}")]
    ResolveTimeout(Duration),

    #[error("queue is full (max {max} tracks)")]
    QueueFull { max: usize },

    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl PlayerError {
    /// True for failures that happened before any session state was touched.
    pub fn is_resolution_failure(&self) -> bool {
        matches!(self, Self::Resolution(_) | Self::ResolveTimeout(_))
    }
}

/// Membership lookup could not be completed.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("membership lookup failed: {0}")]
    Lookup(String),
}
