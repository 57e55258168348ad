use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::{
    audio::{
        notify::{EndReason, PlaybackEvent},
        player::{ControlOutcome, EnqueueOutcome},
        session::NowPlaying,
    },
    error::PlayerError,
};

pub fn welcome_text(prefix: &str) -> String {
    format!(
        "🎵 **Music Bot**\n\
         I play music in your voice channel.\n\n\
         📌 Use `{prefix}play [song title]` to start!"
    )
}

pub fn help_text(prefix: &str) -> String {
    format!(
        "**🎵 Music Bot Commands 🎵**\n\n\
         **🎶 Player:**\n\
         - `{prefix}play [title]` → Play music from YouTube\n\
         - `{prefix}pause` → Pause the current track\n\
         - `{prefix}resume` → Resume a paused track\n\
         - `{prefix}stop` → Stop playback and clear the queue\n\
         - `{prefix}queue` → Show queued tracks\n\n\
         **🔍 Info:**\n\
         - Use the buttons below to see your user ID or this server's ID."
    )
}

pub fn play_usage(prefix: &str) -> String {
    format!("Usage: **{prefix}play [song title]**")
}

pub const JOIN_REQUIRED: &str = "🔹 **Please join our server to use this bot!**";
pub const MEMBERSHIP_UNAVAILABLE: &str = "⚠️ Couldn't verify your membership right now, please try again.";
pub const GUILD_ONLY: &str = "❌ Music commands only work inside a server.";
pub const NOT_IN_VOICE: &str = "❌ You need to be in a voice channel first.";

pub fn render_enqueue(outcome: &EnqueueOutcome) -> Option<String> {
    match outcome {
        EnqueueOutcome::Started { track, .. } => Some(format!("🎶 **Now playing:** {}", track)),
        EnqueueOutcome::Queued { track, position } => {
            Some(format!("🎶 **Added to queue (#{}):** {}", position, track))
        }
        // the start failure is announced through the notification channel
        EnqueueOutcome::Failed { .. } => None,
        EnqueueOutcome::Discarded { track } => Some(format!(
            "⏹ Playback was stopped before **{}** could start.",
            track.title()
        )),
    }
}

pub fn render_error(err: &PlayerError) -> String {
    match err {
        PlayerError::Resolution(e) => format!("❌ Couldn't find that track: {}", e),
        PlayerError::ResolveTimeout(_) => "⏰ Searching took too long, please try again.".to_string(),
        PlayerError::QueueFull { max } => format!("🚫 The queue is full ({} tracks max).", max),
        PlayerError::Transport(e) => format!("❌ Voice error: {}", e),
    }
}

pub fn render_pause(outcome: ControlOutcome) -> Option<String> {
    (outcome == ControlOutcome::Applied).then(|| "⏸ **Music paused.**".to_string())
}

pub fn render_resume(outcome: ControlOutcome) -> Option<String> {
    (outcome == ControlOutcome::Applied).then(|| "▶️ **Music resumed.**".to_string())
}

pub const STOPPED: &str = "⏹ **Music stopped.**";

/// Queue listing; the current track shows how long it has been playing at `at`.
pub fn render_queue(now: Option<&NowPlaying>, titles: &[String], at: DateTime<Utc>) -> String {
    let header = now.map(|now| {
        let elapsed = Duration::from_secs(now.elapsed(at).as_secs());
        format!(
            "🎶 **Now playing:** {} ⏱ {}",
            now.track,
            humantime::format_duration(elapsed)
        )
    });

    if titles.is_empty() {
        return match header {
            Some(header) => format!("{}\n📭 **Queue is empty.**", header),
            None => "📭 **Queue is empty.**".to_string(),
        };
    }

    let list = titles
        .iter()
        .enumerate()
        .map(|(i, title)| format!("🎵 {}. {}", i + 1, title))
        .collect::<Vec<_>>()
        .join("\n");

    match header {
        Some(header) => format!("{}\n📜 **Queue:**\n{}", header, list),
        None => format!("📜 **Queue:**\n{}", list),
    }
}

/// Text for events that arrive without a command to reply to.
pub fn render_event(event: &PlaybackEvent) -> Option<String> {
    match event {
        PlaybackEvent::Advanced(track) => Some(format!("🎶 **Playing next:** {}", track)),
        PlaybackEvent::StartFailed { track, reason } => Some(format!(
            "⚠️ Couldn't play **{}**: {}",
            track.title(),
            reason
        )),
        PlaybackEvent::Ended {
            reason: EndReason::QueueDrained,
        } => Some("📭 Queue finished, leaving the voice channel.".to_string()),
        PlaybackEvent::Ended {
            reason: EndReason::StartFailures,
        } => Some("⚠️ Too many tracks failed to play, leaving the voice channel.".to_string()),
        // covered by the command's own reply
        PlaybackEvent::Started(_)
        | PlaybackEvent::Queued { .. }
        | PlaybackEvent::ResolveFailed { .. }
        | PlaybackEvent::Ended {
            reason: EndReason::Stopped,
        } => None,
    }
}
