use dashmap::DashMap;
use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{
    notify::{EndReason, Notifier, PlaybackEvent},
    session::{NowPlaying, PlaybackId, Session, SessionKey, SessionState},
    store::SessionStore,
    transport::{Transport, TransportEvent},
};
use crate::{
    config::Config,
    error::PlayerError,
    sources::{Track, TrackResolver},
};

/// Limits applied by the controller.
#[derive(Debug, Clone)]
pub struct PlaybackSettings {
    pub max_queue_size: usize,
    /// Consecutive start failures tolerated before a session is torn down.
    pub max_start_attempts: u32,
    pub resolve_timeout: Duration,
    pub start_timeout: Duration,
    pub leave_timeout: Duration,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            max_queue_size: 100,
            max_start_attempts: 3,
            resolve_timeout: Duration::from_secs(30),
            start_timeout: Duration::from_secs(20),
            leave_timeout: Duration::from_secs(10),
        }
    }
}

impl From<&Config> for PlaybackSettings {
    fn from(config: &Config) -> Self {
        Self {
            max_queue_size: config.max_queue_size,
            max_start_attempts: config.max_start_attempts,
            resolve_timeout: Duration::from_secs(config.resolve_timeout_secs),
            start_timeout: Duration::from_secs(config.start_timeout_secs),
            leave_timeout: Duration::from_secs(config.leave_timeout_secs),
        }
    }
}

/// What an enqueue request ended up doing.
#[derive(Debug, Clone, PartialEq)]
pub enum EnqueueOutcome {
    /// The session was idle; the track is now streaming.
    Started { track: Track, playback: PlaybackId },
    /// Appended behind the current track (1-based position).
    Queued { track: Track, position: usize },
    /// The session was idle but the track could not be started. The failure
    /// went out on the notification channel.
    Failed { track: Track },
    /// A stop for this session arrived while the query was being resolved.
    Discarded { track: Track },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NoSession,
    /// e.g. pause while already paused.
    InvalidState,
    /// Stream signal for a playback instance that is no longer current.
    DuplicateSignal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOutcome {
    Applied,
    Ignored(IgnoreReason),
}

/// Per-key serialization point. The gate is FIFO, so operations on one
/// session apply in arrival order; different sessions never contend.
#[derive(Debug, Default)]
struct Lane {
    gate: Arc<Mutex<()>>,
    stop_epoch: AtomicU64,
    /// Live handles. Only changed under the map's shard lock.
    holders: AtomicUsize,
}

type Lanes = Arc<DashMap<SessionKey, Arc<Lane>>>;

/// Reference to a lane. The lane is pruned from the map once the last
/// handle goes away.
struct LaneHandle {
    key: SessionKey,
    lanes: Lanes,
    lane: Arc<Lane>,
}

impl LaneHandle {
    fn stop_epoch(&self) -> u64 {
        self.lane.stop_epoch.load(Ordering::Acquire)
    }

    async fn lock(self) -> LaneGuard {
        let permit = self.lane.gate.clone().lock_owned().await;
        LaneGuard {
            _permit: permit,
            handle: self,
        }
    }
}

impl Drop for LaneHandle {
    fn drop(&mut self) {
        // the predicate runs under the shard write lock, same as the increment
        self.lanes.remove_if(&self.key, |_, lane| {
            lane.holders.fetch_sub(1, Ordering::AcqRel) == 1
        });
    }
}

struct LaneGuard {
    _permit: OwnedMutexGuard<()>,
    handle: LaneHandle,
}

impl LaneGuard {
    fn stop_epoch(&self) -> u64 {
        self.handle.stop_epoch()
    }

    fn bump_stop_epoch(&self) {
        self.handle.lane.stop_epoch.fetch_add(1, Ordering::AcqRel);
    }
}

struct ChainOutcome {
    started: Option<PlaybackId>,
    failures: u32,
}

/// Playback Session Controller.
///
/// Owns the per-session state machine: enqueue-or-play, pause, resume,
/// stop, and automatic advance when the transport reports the end of a
/// stream. The store lock is only ever taken for synchronous updates;
/// transport and resolver calls happen outside it.
#[derive(Clone)]
pub struct PlaybackController {
    store: Arc<SessionStore>,
    lanes: Lanes,
    transport: Arc<dyn Transport>,
    resolver: Arc<dyn TrackResolver>,
    notifier: Notifier,
    settings: PlaybackSettings,
    playback_ids: Arc<AtomicU64>,
}

impl PlaybackController {
    pub fn new(
        transport: Arc<dyn Transport>,
        resolver: Arc<dyn TrackResolver>,
        notifier: Notifier,
        settings: PlaybackSettings,
    ) -> Self {
        Self {
            store: Arc::new(SessionStore::new()),
            lanes: Arc::new(DashMap::new()),
            transport,
            resolver,
            notifier,
            settings,
            playback_ids: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Resolves `query` and plays it right away if the session is idle,
    /// otherwise appends it to the queue.
    pub async fn enqueue(&self, key: SessionKey, query: &str) -> Result<EnqueueOutcome, PlayerError> {
        let lane = self.lane(key);
        let epoch = lane.stop_epoch();

        // resolution can be slow; nothing is locked while it runs
        let track = self.resolve(key, query).await?;

        let guard = lane.lock().await;
        if guard.stop_epoch() != epoch {
            info!(
                "🚫 Session {} was stopped while resolving \"{}\", discarding",
                key,
                track.title()
            );
            return Ok(EnqueueOutcome::Discarded { track });
        }

        self.enqueue_locked(key, track).await
    }

    pub async fn pause(&self, key: SessionKey) -> Result<ControlOutcome, PlayerError> {
        let _guard = self.lane(key).lock().await;

        match self.store.snapshot(key).map(|s| s.state()) {
            None => Ok(ControlOutcome::Ignored(IgnoreReason::NoSession)),
            Some(SessionState::Playing) => {
                self.transport.pause(key).await?;
                self.store.update(key, |s| s.set_paused(true));
                info!("⏸️ Session {} paused", key);
                Ok(ControlOutcome::Applied)
            }
            Some(state) => {
                debug!("Pause ignored for {} in state {:?}", key, state);
                Ok(ControlOutcome::Ignored(IgnoreReason::InvalidState))
            }
        }
    }

    pub async fn resume(&self, key: SessionKey) -> Result<ControlOutcome, PlayerError> {
        let _guard = self.lane(key).lock().await;

        match self.store.snapshot(key).map(|s| s.state()) {
            None => Ok(ControlOutcome::Ignored(IgnoreReason::NoSession)),
            Some(SessionState::Paused) => {
                self.transport.resume(key).await?;
                self.store.update(key, |s| s.set_paused(false));
                info!("▶️ Session {} resumed", key);
                Ok(ControlOutcome::Applied)
            }
            Some(state) => {
                debug!("Resume ignored for {} in state {:?}", key, state);
                Ok(ControlOutcome::Ignored(IgnoreReason::InvalidState))
            }
        }
    }

    /// Leaves the voice room and drops the session with its queue.
    /// Any enqueue still resolving for this key is discarded.
    pub async fn stop(&self, key: SessionKey) -> ControlOutcome {
        let guard = self.lane(key).lock().await;
        guard.bump_stop_epoch();

        if !self.store.contains(key) {
            debug!("Stop ignored for {}: no session", key);
            return ControlOutcome::Ignored(IgnoreReason::NoSession);
        }

        self.teardown(key, EndReason::Stopped).await;
        ControlOutcome::Applied
    }

    /// Reaction to the transport's end-of-stream signal: play the next
    /// queued track or end the session.
    pub async fn handle_stream_ended(&self, key: SessionKey, playback: PlaybackId) -> ControlOutcome {
        let _guard = self.lane(key).lock().await;

        let now = match self.current_binding(key, playback) {
            Ok(now) => now,
            Err(reason) => return ControlOutcome::Ignored(reason),
        };
        debug!("🎵 Finished in {}: {}", key, now.track.title());

        // a track that played through breaks any failure streak
        self.store.update(key, |s| s.set_failed_starts(0));

        match self.store.update(key, |s| s.pop_next()).flatten() {
            Some(next) => {
                self.start_chain(key, next, PlaybackEvent::Advanced, 0).await;
            }
            None => self.teardown(key, EndReason::QueueDrained).await,
        }

        ControlOutcome::Applied
    }

    /// Reaction to a started stream whose media turned out to be unplayable.
    /// Counts as a start failure: reported, then the next track is tried
    /// unless the failure budget is spent.
    pub async fn handle_stream_failed(&self, key: SessionKey, playback: PlaybackId, reason: String) -> ControlOutcome {
        let _guard = self.lane(key).lock().await;

        let (now, streak) = match self.current_binding(key, playback) {
            Ok(now) => {
                let streak = self.store.snapshot(key).map_or(0, |s| s.failed_starts());
                (now, streak)
            }
            Err(ignored) => return ControlOutcome::Ignored(ignored),
        };

        let failures = streak + 1;
        warn!(
            "❌ {} failed to play in {} ({} in a row): {}",
            now.track.title(),
            key,
            failures,
            reason
        );
        self.notifier.emit(
            key,
            PlaybackEvent::StartFailed {
                track: now.track,
                reason,
            },
        );

        if failures >= self.settings.max_start_attempts {
            error!("🛑 {} consecutive start failures in {}, giving up", failures, key);
            self.teardown(key, EndReason::StartFailures).await;
            return ControlOutcome::Applied;
        }

        match self.store.update(key, |s| s.pop_next()).flatten() {
            Some(next) => {
                self.start_chain(key, next, PlaybackEvent::Advanced, failures).await;
            }
            None => self.teardown(key, EndReason::QueueDrained).await,
        }

        ControlOutcome::Applied
    }

    /// Titles waiting behind the current track. Empty when there is no session.
    pub fn list_queue(&self, key: SessionKey) -> Vec<String> {
        self.store
            .snapshot(key)
            .map(|s| s.queued_titles())
            .unwrap_or_default()
    }

    pub fn now_playing(&self, key: SessionKey) -> Option<NowPlaying> {
        self.store.snapshot(key).and_then(|s| s.current().cloned())
    }

    pub fn snapshot(&self, key: SessionKey) -> Option<Session> {
        self.store.snapshot(key)
    }

    pub fn active_sessions(&self) -> usize {
        self.store.len()
    }

    /// Consumes transport events until `shutdown` fires or the channel closes.
    /// Each event is handled on its own task so one slow room never holds up
    /// another.
    pub fn spawn_event_loop(
        &self,
        mut events: mpsc::UnboundedReceiver<TransportEvent>,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let controller = self.clone();

        tokio::spawn(async move {
            info!("🎧 Transport event loop started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("⚠️ Transport event loop shutting down");
                        break;
                    }
                    event = events.recv() => match event {
                        Some(event) => {
                            let controller = controller.clone();
                            tokio::spawn(async move {
                                controller.handle_transport_event(event).await;
                            });
                        }
                        None => {
                            info!("Transport event channel closed");
                            break;
                        }
                    }
                }
            }
        })
    }

    async fn handle_transport_event(&self, event: TransportEvent) -> ControlOutcome {
        match event {
            TransportEvent::StreamEnded { key, playback } => self.handle_stream_ended(key, playback).await,
            TransportEvent::StreamFailed { key, playback, reason } => {
                self.handle_stream_failed(key, playback, reason).await
            }
        }
    }

    // Internals, all called with the session's lane held.

    /// The current binding of `key` if it is `playback`.
    fn current_binding(&self, key: SessionKey, playback: PlaybackId) -> Result<NowPlaying, IgnoreReason> {
        let Some(session) = self.store.snapshot(key) else {
            debug!("Stream signal {} for {} ignored: no session", playback, key);
            return Err(IgnoreReason::NoSession);
        };

        match session.current() {
            Some(now) if now.playback == playback => Ok(now.clone()),
            _ => {
                debug!("Stream signal {} for {} ignored: superseded", playback, key);
                Err(IgnoreReason::DuplicateSignal)
            }
        }
    }

    async fn enqueue_locked(&self, key: SessionKey, track: Track) -> Result<EnqueueOutcome, PlayerError> {
        let session = self.store.get_or_create(key);

        if session.is_active() {
            let max = self.settings.max_queue_size;
            if session.queue().len() >= max {
                warn!("🚫 Queue full in {} ({} tracks)", key, max);
                return Err(PlayerError::QueueFull { max });
            }

            let position = self
                .store
                .update(key, |s| s.push(track.clone()))
                .unwrap_or(1);
            info!("➕ Queued in {} at #{}: {}", key, position, track.title());
            self.notifier.emit(
                key,
                PlaybackEvent::Queued {
                    track: track.clone(),
                    position,
                },
            );
            return Ok(EnqueueOutcome::Queued { track, position });
        }

        let chain = self
            .start_chain(key, track.clone(), PlaybackEvent::Started, 0)
            .await;

        match chain.started {
            Some(playback) if chain.failures == 0 => Ok(EnqueueOutcome::Started { track, playback }),
            _ => Ok(EnqueueOutcome::Failed { track }),
        }
    }

    /// Binds `first` and starts it. A failed start is reported and the next
    /// queued track is tried, until `max_start_attempts` failures in a row
    /// (counting the `failures` already behind us). Ends the session when
    /// nothing could be started.
    async fn start_chain(
        &self,
        key: SessionKey,
        first: Track,
        mut announce: fn(Track) -> PlaybackEvent,
        mut failures: u32,
    ) -> ChainOutcome {
        let mut next = Some(first);

        while let Some(track) = next.take() {
            let playback = self.next_playback_id();
            if self
                .store
                .update(key, |s| s.bind(track.clone(), playback))
                .is_none()
            {
                error!("Session {} vanished while starting {}", key, track.title());
                return ChainOutcome {
                    started: None,
                    failures,
                };
            }

            match self.start_transport(key, playback, &track).await {
                Ok(()) => {
                    info!("🎵 Playing in {} ({}): {}", key, playback, track.title());
                    // the streak only resets once this track plays through
                    self.store.update(key, |s| s.set_failed_starts(failures));
                    self.notifier.emit(key, announce(track));
                    return ChainOutcome {
                        started: Some(playback),
                        failures,
                    };
                }
                Err(reason) => {
                    failures += 1;
                    warn!(
                        "❌ Could not start {} in {} (attempt {}): {}",
                        track.title(),
                        key,
                        failures,
                        reason
                    );
                    self.notifier
                        .emit(key, PlaybackEvent::StartFailed { track, reason });

                    if failures >= self.settings.max_start_attempts {
                        error!("🛑 {} consecutive start failures in {}, giving up", failures, key);
                        self.teardown(key, EndReason::StartFailures).await;
                        return ChainOutcome {
                            started: None,
                            failures,
                        };
                    }

                    announce = PlaybackEvent::Advanced;
                    next = self.store.update(key, |s| s.pop_next()).flatten();
                }
            }
        }

        self.teardown(key, EndReason::QueueDrained).await;
        ChainOutcome {
            started: None,
            failures,
        }
    }

    async fn start_transport(&self, key: SessionKey, playback: PlaybackId, track: &Track) -> Result<(), String> {
        let limit = self.settings.start_timeout;
        match tokio::time::timeout(limit, self.transport.start(key, playback, track)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("start timed out after {:?}", limit)),
        }
    }

    async fn teardown(&self, key: SessionKey, reason: EndReason) {
        let discarded = self
            .store
            .update(key, |s| s.begin_ending())
            .unwrap_or(0);

        match tokio::time::timeout(self.settings.leave_timeout, self.transport.leave(key)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("⚠️ Leave failed for {}: {}", key, e),
            Err(_) => warn!("⚠️ Leave timed out for {}", key),
        }

        self.store.remove(key);
        info!(
            "⏹️ Session {} ended ({:?}), {} queued tracks dropped",
            key, reason, discarded
        );
        self.notifier.emit(key, PlaybackEvent::Ended { reason });
    }

    async fn resolve(&self, key: SessionKey, query: &str) -> Result<Track, PlayerError> {
        let limit = self.settings.resolve_timeout;
        let err = match tokio::time::timeout(limit, self.resolver.resolve(query)).await {
            Ok(Ok(track)) => return Ok(track),
            Ok(Err(e)) => {
                warn!("🔍 Could not resolve \"{}\": {}", query, e);
                PlayerError::from(e)
            }
            Err(_) => {
                warn!("⏰ Resolving \"{}\" timed out", query);
                PlayerError::ResolveTimeout(limit)
            }
        };

        self.notifier.emit(
            key,
            PlaybackEvent::ResolveFailed {
                query: query.to_string(),
                reason: err.to_string(),
            },
        );
        Err(err)
    }

    fn lane(&self, key: SessionKey) -> LaneHandle {
        let lane = {
            let entry = self.lanes.entry(key).or_default();
            entry.holders.fetch_add(1, Ordering::AcqRel);
            entry.clone()
        };
        LaneHandle {
            key,
            lanes: self.lanes.clone(),
            lane,
        }
    }

    fn next_playback_id(&self) -> PlaybackId {
        PlaybackId(self.playback_ids.fetch_add(1, Ordering::Relaxed) + 1)
    }
}
