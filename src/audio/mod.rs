//! # Audio Module
//!
//! Per-session playback for voice rooms.
//!
//! ## Architecture
//!
//! ### [`store`] - Session Queue Store
//! - One [`session::Session`] per voice room, created lazily
//! - Atomic per-key reads and updates
//!
//! ### [`player`] - Playback Session Controller
//! - Enqueue-or-play, pause, resume, stop
//! - Advances the queue when the transport reports a finished stream
//! - Serializes operations per room; rooms run in parallel
//!
//! ### [`transport`] - Transport seam
//! - [`transport::Transport`] is what the controller drives
//! - [`songbird_transport`] implements it for Discord voice
//!
//! ### [`notify`] - Notification channel
//! - Playback events for the command surface to render
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use vc_music::audio::{notify::Notifier, player::{PlaybackController, PlaybackSettings}, session::SessionKey};
//!
//! # async fn example(
//! #     transport: Arc<dyn vc_music::audio::transport::Transport>,
//! #     resolver: Arc<dyn vc_music::sources::TrackResolver>,
//! # ) -> anyhow::Result<()> {
//! let (notifier, _events) = Notifier::channel();
//! let player = PlaybackController::new(transport, resolver, notifier, PlaybackSettings::default());
//! let room = SessionKey(123456789);
//!
//! player.enqueue(room, "daft punk around the world").await?;
//! player.pause(room).await?;
//! player.resume(room).await?;
//! player.stop(room).await;
//! # Ok(())
//! # }
//! ```

pub mod notify;
pub mod player;
pub mod session;
pub mod songbird_transport;
pub mod store;
pub mod transport;
