use dashmap::DashMap;
use serenity::{http::Http, model::id::ChannelId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        notify::{Notification, PlaybackEvent},
        session::SessionKey,
    },
    ui::messages,
};

/// Text channel of the latest `play` per session, written by the message
/// handler and picked up by the forwarder once the controller reacts to it.
pub type Announcements = Arc<DashMap<SessionKey, ChannelId>>;

/// Which text channel each live session reports to.
pub struct NoticeRoutes {
    requested: Announcements,
    active: HashMap<SessionKey, ChannelId>,
}

impl NoticeRoutes {
    pub fn new(requested: Announcements) -> Self {
        Self {
            requested,
            active: HashMap::new(),
        }
    }

    /// Channel for `notification`. Routes are taken over from pending
    /// requests as a session reacts to them and dropped when it ends.
    pub fn route(&mut self, notification: &Notification) -> Option<ChannelId> {
        let key = notification.key;

        match notification.event {
            PlaybackEvent::ResolveFailed { .. } => {
                self.requested.remove(&key);
                None
            }
            // a request made after this session ended belongs to the next one
            PlaybackEvent::Ended { .. } => self
                .active
                .remove(&key)
                .or_else(|| self.requested.get(&key).map(|c| *c)),
            _ => {
                if let Some((_, channel)) = self.requested.remove(&key) {
                    self.active.insert(key, channel);
                }
                self.active.get(&key).copied()
            }
        }
    }
}

/// Posts playback notifications that don't answer a command, e.g. the next
/// track starting or the queue running dry.
pub async fn forward_notifications(
    http: Arc<Http>,
    announcements: Announcements,
    mut notifications: mpsc::UnboundedReceiver<Notification>,
    shutdown: CancellationToken,
) {
    info!("📣 Notification forwarder started");
    let mut routes = NoticeRoutes::new(announcements);

    loop {
        let notification = tokio::select! {
            _ = shutdown.cancelled() => break,
            next = notifications.recv() => match next {
                Some(n) => n,
                None => break,
            },
        };

        debug!("📨 {} {:?}", notification.key, notification.event);

        let channel_id = routes.route(&notification);
        let Some(text) = messages::render_event(&notification.event) else {
            continue;
        };
        let Some(channel_id) = channel_id else {
            warn!("No text channel known for {}, dropping notice", notification.key);
            continue;
        };

        if let Err(e) = channel_id.say(&http, text).await {
            error!("Error posting notice to {}: {:?}", channel_id, e);
        }
    }

    info!("📣 Notification forwarder stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::notify::EndReason;
    use crate::sources::Track;
    use pretty_assertions::assert_eq;

    const ROOM: SessionKey = SessionKey(11);

    fn note(event: PlaybackEvent) -> Notification {
        Notification { key: ROOM, event }
    }

    fn ended() -> Notification {
        note(PlaybackEvent::Ended {
            reason: EndReason::QueueDrained,
        })
    }

    #[test]
    fn test_routes_follow_session_lifetime() {
        let requested: Announcements = Arc::new(DashMap::new());
        let mut routes = NoticeRoutes::new(requested.clone());
        let track = Track::new("A", "a");

        requested.insert(ROOM, ChannelId::new(1));
        assert_eq!(
            routes.route(&note(PlaybackEvent::Started(track.clone()))),
            Some(ChannelId::new(1))
        );
        assert!(requested.is_empty());
        assert_eq!(
            routes.route(&note(PlaybackEvent::Advanced(track))),
            Some(ChannelId::new(1))
        );

        assert_eq!(routes.route(&ended()), Some(ChannelId::new(1)));
        assert!(routes.active.is_empty());
        assert!(requested.is_empty());
    }

    #[test]
    fn test_request_for_next_session_survives_previous_end() {
        let requested: Announcements = Arc::new(DashMap::new());
        let mut routes = NoticeRoutes::new(requested.clone());
        let track = Track::new("A", "a");

        requested.insert(ROOM, ChannelId::new(1));
        routes.route(&note(PlaybackEvent::Started(track.clone())));

        // new play arrives while the old session is draining
        requested.insert(ROOM, ChannelId::new(2));
        routes.route(&ended());

        assert_eq!(
            routes.route(&note(PlaybackEvent::Started(track))),
            Some(ChannelId::new(2))
        );
    }

    #[test]
    fn test_failed_lookups_leave_nothing_behind() {
        let requested: Announcements = Arc::new(DashMap::new());
        let mut routes = NoticeRoutes::new(requested.clone());

        requested.insert(ROOM, ChannelId::new(1));
        assert_eq!(
            routes.route(&note(PlaybackEvent::ResolveFailed {
                query: "zzz".into(),
                reason: "no results".into()
            })),
            None
        );
        assert!(requested.is_empty());
        assert!(routes.active.is_empty());
    }

    #[test]
    fn test_failed_first_start_is_still_announced() {
        let requested: Announcements = Arc::new(DashMap::new());
        let mut routes = NoticeRoutes::new(requested.clone());

        requested.insert(ROOM, ChannelId::new(4));
        assert_eq!(
            routes.route(&note(PlaybackEvent::StartFailed {
                track: Track::new("A", "a"),
                reason: "gone".into()
            })),
            Some(ChannelId::new(4))
        );
        assert_eq!(routes.route(&ended()), Some(ChannelId::new(4)));
        assert!(routes.active.is_empty());
        assert!(requested.is_empty());
    }
}
