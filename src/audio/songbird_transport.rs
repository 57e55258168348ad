use async_trait::async_trait;
use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{
    session::{PlaybackId, SessionKey},
    transport::{Transport, TransportEvent},
};
use crate::error::TransportError;
use crate::sources::Track;

/// Transport over Discord voice via songbird.
///
/// The command surface tells it which voice channel a session should use
/// ([`set_target`](Self::set_target)); `start` joins lazily and streams the
/// track's locator over HTTP.
pub struct SongbirdTransport {
    songbird: Arc<Songbird>,
    http: reqwest::Client,
    events: mpsc::UnboundedSender<TransportEvent>,
    /// Where to join next; consumed by a successful join.
    targets: DashMap<SessionKey, ChannelId>,
    tracks: DashMap<SessionKey, TrackHandle>,
    departures: Departures,
    volume: f32,
}

impl SongbirdTransport {
    pub fn new(
        songbird: Arc<Songbird>,
        events: mpsc::UnboundedSender<TransportEvent>,
        volume: f32,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            songbird,
            http,
            events,
            targets: DashMap::new(),
            tracks: DashMap::new(),
            departures: Departures::new(Duration::from_secs(30)),
            volume: volume.clamp(0.0, 2.0),
        })
    }

    /// Voice channel to join the next time this session starts a track.
    pub fn set_target(&self, key: SessionKey, channel_id: ChannelId) {
        self.targets.insert(key, channel_id);
    }

    /// Forget everything about a session whose call went away underneath us.
    pub fn forget(&self, key: SessionKey) {
        self.tracks.remove(&key);
    }

    /// True once for each voice disconnect caused by our own `leave`, so the
    /// gateway echo of it is not mistaken for the bot being kicked.
    pub fn acknowledge_disconnect(&self, key: SessionKey) -> bool {
        self.departures.take(key)
    }

    fn guild(key: SessionKey) -> GuildId {
        GuildId::new(key.0)
    }
}

#[async_trait]
impl Transport for SongbirdTransport {
    async fn start(&self, key: SessionKey, playback: PlaybackId, track: &Track) -> Result<(), TransportError> {
        let guild_id = Self::guild(key);

        let call = match self.songbird.get(guild_id) {
            Some(call) => call,
            None => {
                let channel_id = self
                    .targets
                    .get(&key)
                    .map(|c| *c)
                    .ok_or(TransportError::NoTarget(key))?;
                info!("🔗 Joining voice channel {} in guild {}", channel_id, guild_id);
                let call = self
                    .songbird
                    .join(guild_id, channel_id)
                    .await
                    .map_err(|e| TransportError::Join(e.to_string()))?;
                self.targets.remove(&key);
                call
            }
        };

        let input = Input::from(HttpRequest::new(
            self.http.clone(),
            track.locator().to_string(),
        ));

        let handle = {
            let mut call = call.lock().await;
            call.play_only_input(input)
        };
        let _ = handle.set_volume(self.volume);

        // the HTTP input opens lazily, so a dead locator only shows up as Error
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    StreamHook {
                        key,
                        playback,
                        events: self.events.clone(),
                    },
                )
                .map_err(|e| TransportError::Playback(e.to_string()))?;
        }

        self.tracks.insert(key, handle);
        debug!("▶️ Streaming {} in guild {}", playback, guild_id);
        Ok(())
    }

    async fn pause(&self, key: SessionKey) -> Result<(), TransportError> {
        let handle = self
            .tracks
            .get(&key)
            .ok_or(TransportError::NotConnected(key))?;
        handle
            .pause()
            .map_err(|e| TransportError::Playback(e.to_string()))
    }

    async fn resume(&self, key: SessionKey) -> Result<(), TransportError> {
        let handle = self
            .tracks
            .get(&key)
            .ok_or(TransportError::NotConnected(key))?;
        handle
            .play()
            .map_err(|e| TransportError::Playback(e.to_string()))
    }

    async fn leave(&self, key: SessionKey) -> Result<(), TransportError> {
        if let Some((_, handle)) = self.tracks.remove(&key) {
            let _ = handle.stop();
        }

        let guild_id = Self::guild(key);
        if self.songbird.get(guild_id).is_none() {
            debug!("Leave for guild {}: not in a call", guild_id);
            return Ok(());
        }

        self.departures.record(key);
        self.songbird
            .remove(guild_id)
            .await
            .map_err(|e| TransportError::Join(e.to_string()))?;
        info!("👋 Left voice in guild {}", guild_id);
        Ok(())
    }
}

/// Reports the end or failure of one track to the controller.
struct StreamHook {
    key: SessionKey,
    playback: PlaybackId,
    events: mpsc::UnboundedSender<TransportEvent>,
}

impl StreamHook {
    fn event_for(&self, modes: &[&PlayMode]) -> TransportEvent {
        let failure = modes.iter().find_map(|mode| match mode {
            PlayMode::Errored(e) => Some(e.to_string()),
            _ => None,
        });

        match failure {
            Some(reason) => TransportEvent::StreamFailed {
                key: self.key,
                playback: self.playback,
                reason,
            },
            None => TransportEvent::StreamEnded {
                key: self.key,
                playback: self.playback,
            },
        }
    }
}

#[async_trait]
impl VoiceEventHandler for StreamHook {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        let modes: Vec<&PlayMode> = match ctx {
            EventContext::Track(states) => states.iter().map(|(state, _)| &state.playing).collect(),
            _ => Vec::new(),
        };
        debug!("🎵 Track {} in {} now {:?}", self.playback, self.key, modes);

        if self.events.send(self.event_for(&modes)).is_err() {
            warn!("Transport event loop gone, stream signal for {} lost", self.key);
        }

        None
    }
}

/// Voice disconnects we caused ourselves, remembered for a while.
#[derive(Debug)]
struct Departures {
    left: DashMap<SessionKey, Instant>,
    window: Duration,
}

impl Departures {
    fn new(window: Duration) -> Self {
        Self {
            left: DashMap::new(),
            window,
        }
    }

    fn record(&self, key: SessionKey) {
        self.left.insert(key, Instant::now());
    }

    fn take(&self, key: SessionKey) -> bool {
        self.left
            .remove(&key)
            .is_some_and(|(_, at)| at.elapsed() <= self.window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ROOM: SessionKey = SessionKey(3);

    fn hook() -> (StreamHook, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (
            StreamHook {
                key: ROOM,
                playback: PlaybackId(9),
                events,
            },
            rx,
        )
    }

    #[test]
    fn test_finished_track_reports_stream_end() {
        let (hook, _rx) = hook();
        assert_eq!(
            hook.event_for(&[&PlayMode::End]),
            TransportEvent::StreamEnded {
                key: ROOM,
                playback: PlaybackId(9)
            }
        );
        assert_eq!(
            hook.event_for(&[&PlayMode::Stop]),
            TransportEvent::StreamEnded {
                key: ROOM,
                playback: PlaybackId(9)
            }
        );
    }

    #[test]
    fn test_departures_are_acknowledged_once() {
        let departures = Departures::new(Duration::from_secs(30));
        assert!(!departures.take(ROOM));

        departures.record(ROOM);
        assert!(departures.take(ROOM));
        assert!(!departures.take(ROOM));
    }

    #[test]
    fn test_stale_departures_are_ignored() {
        let departures = Departures::new(Duration::ZERO);
        departures.record(ROOM);
        std::thread::sleep(Duration::from_millis(2));
        assert!(!departures.take(ROOM));
    }

    #[tokio::test]
    async fn test_leave_when_not_in_call_is_quiet() {
        let (events, _rx) = mpsc::unbounded_channel();
        let transport = SongbirdTransport::new(Songbird::serenity(), events, 0.5).unwrap();
        transport.set_target(ROOM, ChannelId::new(77));

        assert!(transport.leave(ROOM).await.is_ok());
        // nothing left, so no disconnect echo is expected
        assert!(!transport.acknowledge_disconnect(ROOM));
        assert!(transport.targets.contains_key(&ROOM));
    }
}
