pub mod ytdlp;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::ResolveError;

pub use ytdlp::YtDlpResolver;

/// Turns free text (search terms or a URL) into something playable.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<Track, ResolveError>;
}

/// A playable track. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    locator: String,
    duration: Option<Duration>,
}

impl Track {
    pub fn new(title: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            locator: locator.into(),
            duration: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Media URL or resource handle handed to the transport.
    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.duration {
            Some(d) => write!(
                f,
                "{} ({})",
                self.title,
                humantime::format_duration(Duration::from_secs(d.as_secs()))
            ),
            None => f.write_str(&self.title),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_display() {
        let plain = Track::new("Song", "https://media/song");
        assert_eq!(plain.to_string(), "Song");

        let timed = Track::new("Song", "https://media/song")
            .with_duration(Duration::from_millis(205_400));
        assert_eq!(timed.to_string(), "Song (3m 25s)");
    }
}
