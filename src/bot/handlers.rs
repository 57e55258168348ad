use chrono::Utc;
use tracing::{info, warn};

use super::{
    commands::Command,
    membership::{Membership, MembershipGate},
};
use crate::{
    audio::{player::PlaybackController, session::SessionKey},
    ui::messages,
};

/// What the chat layer should send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Welcome,
    Help,
    /// Nothing to say (e.g. pause with nothing playing).
    Silent,
}

impl From<Option<String>> for Reply {
    fn from(text: Option<String>) -> Self {
        text.map(Reply::Text).unwrap_or(Reply::Silent)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Granted,
    JoinRequired,
    /// The membership lookup itself failed.
    Unavailable,
}

/// The owner always gets in; everybody else goes through the gate.
pub async fn check_access(gate: &dyn MembershipGate, owner_id: Option<u64>, user_id: u64) -> Access {
    if owner_id == Some(user_id) {
        return Access::Granted;
    }

    match gate.membership(user_id).await {
        Ok(Membership::Member) => Access::Granted,
        Ok(Membership::NotMember) => Access::JoinRequired,
        Err(e) => {
            warn!("⚠️ Membership check for {} failed: {}", user_id, e);
            Access::Unavailable
        }
    }
}

/// Runs one command against the session `key` and turns the result into a reply.
pub async fn execute(player: &PlaybackController, prefix: &str, key: SessionKey, command: Command) -> Reply {
    match command {
        Command::Start => Reply::Welcome,
        Command::Help => Reply::Help,
        Command::Play(query) if query.trim().is_empty() => Reply::Text(messages::play_usage(prefix)),
        Command::Play(query) => match player.enqueue(key, &query).await {
            Ok(outcome) => messages::render_enqueue(&outcome).into(),
            Err(e) => Reply::Text(messages::render_error(&e)),
        },
        Command::Pause => match player.pause(key).await {
            Ok(outcome) => messages::render_pause(outcome).into(),
            Err(e) => Reply::Text(messages::render_error(&e)),
        },
        Command::Resume => match player.resume(key).await {
            Ok(outcome) => messages::render_resume(outcome).into(),
            Err(e) => Reply::Text(messages::render_error(&e)),
        },
        Command::Stop => {
            player.stop(key).await;
            info!("⏹️ Stop requested in {}", key);
            Reply::Text(messages::STOPPED.to_string())
        }
        Command::Queue => Reply::Text(messages::render_queue(
            player.now_playing(key).as_ref(),
            &player.list_queue(key),
            Utc::now(),
        )),
    }
}
