use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use crate::sources::Track;

/// Identity of one voice room. For Discord this is the guild id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey(pub u64);

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<serenity::model::id::GuildId> for SessionKey {
    fn from(guild_id: serenity::model::id::GuildId) -> Self {
        Self(guild_id.get())
    }
}

/// Identifies one transport binding (one track started in one session).
/// Stream-ended signals carry it so stale or repeated signals can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackId(pub u64);

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionState {
    #[default]
    Idle,
    Playing,
    Paused,
    /// Transport teardown in flight.
    Ending,
}

/// The track currently bound to the transport.
#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub track: Track,
    pub playback: PlaybackId,
    pub started_at: DateTime<Utc>,
}

impl NowPlaying {
    /// Time since the track was bound, zero if `at` is earlier.
    pub fn elapsed(&self, at: DateTime<Utc>) -> Duration {
        (at - self.started_at).to_std().unwrap_or_default()
    }
}

/// Playback state of one voice room.
///
/// `current` is set exactly when the state is `Playing` or `Paused`, and
/// `queue` only ever holds tracks that have not started yet.
#[derive(Debug, Clone, Default)]
pub struct Session {
    state: SessionState,
    queue: VecDeque<Track>,
    current: Option<NowPlaying>,
    /// Consecutive tracks that failed to play, reset when one ends normally.
    failed_starts: u32,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current(&self) -> Option<&NowPlaying> {
        self.current.as_ref()
    }

    pub fn queue(&self) -> &VecDeque<Track> {
        &self.queue
    }

    pub fn failed_starts(&self) -> u32 {
        self.failed_starts
    }

    /// True while a track is bound (playing or paused).
    pub fn is_active(&self) -> bool {
        matches!(self.state, SessionState::Playing | SessionState::Paused)
    }

    /// Titles of the tracks waiting behind `current`, in play order.
    pub fn queued_titles(&self) -> Vec<String> {
        self.queue.iter().map(|t| t.title().to_string()).collect()
    }

    /// Appends to the tail and returns the 1-based queue position.
    pub(crate) fn push(&mut self, track: Track) -> usize {
        self.queue.push_back(track);
        self.queue.len()
    }

    pub(crate) fn pop_next(&mut self) -> Option<Track> {
        self.queue.pop_front()
    }

    pub(crate) fn bind(&mut self, track: Track, playback: PlaybackId) {
        self.current = Some(NowPlaying {
            track,
            playback,
            started_at: Utc::now(),
        });
        self.state = SessionState::Playing;
    }

    pub(crate) fn set_failed_starts(&mut self, failures: u32) {
        self.failed_starts = failures;
    }

    pub(crate) fn set_paused(&mut self, paused: bool) {
        if self.is_active() {
            self.state = if paused {
                SessionState::Paused
            } else {
                SessionState::Playing
            };
        }
    }

    /// Drops the binding and everything queued; the session is on its way out.
    pub(crate) fn begin_ending(&mut self) -> usize {
        let discarded = self.queue.len();
        self.queue.clear();
        self.current = None;
        self.state = SessionState::Ending;
        discarded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_is_idle_and_empty() {
        let session = Session::new();
        assert_eq!(session.state(), SessionState::Idle);
        assert!(session.current().is_none());
        assert!(session.queue().is_empty());
        assert!(!session.is_active());
        assert_eq!(session.failed_starts(), 0);
    }

    #[test]
    fn test_elapsed_never_negative() {
        let mut session = Session::new();
        session.bind(Track::new("A", "a"), PlaybackId(1));
        let now = session.current().unwrap().clone();

        let later = now.started_at + chrono::Duration::seconds(65);
        assert_eq!(now.elapsed(later), Duration::from_secs(65));

        let earlier = now.started_at - chrono::Duration::seconds(5);
        assert_eq!(now.elapsed(earlier), Duration::ZERO);
    }

    #[test]
    fn test_queue_is_fifo_and_allows_duplicates() {
        let mut session = Session::new();
        assert_eq!(session.push(Track::new("A", "a")), 1);
        assert_eq!(session.push(Track::new("B", "b")), 2);
        assert_eq!(session.push(Track::new("A", "a")), 3);
        assert_eq!(session.queued_titles(), vec!["A", "B", "A"]);
        assert_eq!(session.pop_next().map(|t| t.title().to_string()), Some("A".into()));
        assert_eq!(session.queued_titles(), vec!["B", "A"]);
    }

    #[test]
    fn test_pause_only_applies_to_bound_session() {
        let mut session = Session::new();
        session.set_paused(true);
        assert_eq!(session.state(), SessionState::Idle);

        session.bind(Track::new("A", "a"), PlaybackId(1));
        session.set_paused(true);
        assert_eq!(session.state(), SessionState::Paused);
        session.set_paused(false);
        assert_eq!(session.state(), SessionState::Playing);
    }

    #[test]
    fn test_begin_ending_clears_binding_and_queue() {
        let mut session = Session::new();
        session.bind(Track::new("A", "a"), PlaybackId(1));
        session.push(Track::new("B", "b"));
        session.push(Track::new("C", "c"));

        assert_eq!(session.begin_ending(), 2);
        assert_eq!(session.state(), SessionState::Ending);
        assert!(session.current().is_none());
        assert!(session.queue().is_empty());
    }
}
