use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{Track, TrackResolver};
use crate::error::ResolveError;

/// Resolver backed by the `yt-dlp` binary: searches YouTube for free text,
/// or extracts the audio stream of a direct URL.
pub struct YtDlpResolver {
    binary: String,
}

/// Subset of the `-j` JSON that we care about.
#[derive(Debug, Deserialize)]
struct VideoInfo {
    title: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// URLs go to yt-dlp untouched, anything else becomes a single-result search.
    fn target(query: &str) -> String {
        match url::Url::parse(query) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => query.to_string(),
            _ => format!("ytsearch1:{}", query),
        }
    }

    fn parse_output(stdout: &str, query: &str) -> Result<Track, ResolveError> {
        let line = stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .ok_or_else(|| ResolveError::NoResults(query.to_string()))?;

        let info: VideoInfo = serde_json::from_str(line)?;

        let locator = info
            .url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ResolveError::NoResults(query.to_string()))?;
        let title = info
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| query.to_string());

        let mut track = Track::new(title, locator);
        if let Some(secs) = info.duration.filter(|d| d.is_finite() && *d > 0.0) {
            track = track.with_duration(Duration::from_secs_f64(secs));
        }
        Ok(track)
    }
}

#[async_trait]
impl TrackResolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<Track, ResolveError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ResolveError::EmptyQuery);
        }

        let target = Self::target(query);
        debug!("🔍 yt-dlp resolving {}", target);

        let output = tokio::process::Command::new(&self.binary)
            .args([
                "-f",
                "bestaudio",
                "-j",
                "--no-playlist",
                "--no-warnings",
                "--socket-timeout",
                "15",
            ])
            .arg(&target)
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("❌ yt-dlp failed for {}: {}", target, stderr.trim());
            return Err(ResolveError::Process(stderr.trim().to_string()));
        }

        let track = Self::parse_output(&String::from_utf8_lossy(&output.stdout), query)?;
        info!("🎵 Resolved \"{}\" -> {}", query, track.title());
        Ok(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_search_target() {
        assert_eq!(YtDlpResolver::target("never gonna"), "ytsearch1:never gonna");
        assert_eq!(
            YtDlpResolver::target("https://youtu.be/dQw4w9WgXcQ"),
            "https://youtu.be/dQw4w9WgXcQ"
        );
        assert_eq!(YtDlpResolver::target("ftp://host/song"), "ytsearch1:ftp://host/song");
    }

    #[test]
    fn test_parse_first_entry() {
        let out = "\n{\"title\":\"Song A\",\"url\":\"https://cdn/a.webm\",\"duration\":212.0}\n";
        let track = YtDlpResolver::parse_output(out, "song a").unwrap();
        assert_eq!(track.title(), "Song A");
        assert_eq!(track.locator(), "https://cdn/a.webm");
        assert_eq!(track.duration(), Some(Duration::from_secs(212)));
    }

    #[test]
    fn test_parse_missing_title_falls_back_to_query() {
        let out = r#"{"url":"https://cdn/a.webm","duration":null}"#;
        let track = YtDlpResolver::parse_output(out, "song a").unwrap();
        assert_eq!(track.title(), "song a");
        assert_eq!(track.duration(), None);
    }

    #[test]
    fn test_parse_failures() {
        assert!(matches!(
            YtDlpResolver::parse_output("   \n", "q"),
            Err(ResolveError::NoResults(_))
        ));
        assert!(matches!(
            YtDlpResolver::parse_output(r#"{"title":"x"}"#, "q"),
            Err(ResolveError::NoResults(_))
        ));
        assert!(matches!(
            YtDlpResolver::parse_output("not json", "q"),
            Err(ResolveError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_query_rejected_without_spawning() {
        let resolver = YtDlpResolver::new("/nonexistent/yt-dlp");
        assert!(matches!(
            resolver.resolve("   ").await,
            Err(ResolveError::EmptyQuery)
        ));
    }
}
