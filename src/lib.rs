//! Voice chat music bot: per-room playback queues driven by chat commands.

pub mod audio;
pub mod bot;
pub mod config;
pub mod error;
pub mod sources;
pub mod storage;
pub mod ui;
