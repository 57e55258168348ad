use async_trait::async_trait;
use serenity::{
    http::{Http, HttpError},
    model::id::{GuildId, UserId},
};
use std::sync::Arc;
use tracing::debug;

use crate::error::GateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Member,
    NotMember,
}

/// Decides whether a user may use the bot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MembershipGate: Send + Sync {
    async fn membership(&self, user_id: u64) -> Result<Membership, GateError>;
}

/// No requirement configured: everyone is let in.
pub struct OpenGate;

#[async_trait]
impl MembershipGate for OpenGate {
    async fn membership(&self, _user_id: u64) -> Result<Membership, GateError> {
        Ok(Membership::Member)
    }
}

/// Requires membership in one Discord server.
pub struct GuildMembershipGate {
    http: Arc<Http>,
    guild_id: GuildId,
}

impl GuildMembershipGate {
    pub fn new(http: Arc<Http>, guild_id: u64) -> Self {
        Self {
            http,
            guild_id: GuildId::new(guild_id),
        }
    }
}

#[async_trait]
impl MembershipGate for GuildMembershipGate {
    async fn membership(&self, user_id: u64) -> Result<Membership, GateError> {
        match self.guild_id.member(self.http.as_ref(), UserId::new(user_id)).await {
            Ok(_) => Ok(Membership::Member),
            Err(serenity::Error::Http(HttpError::UnsuccessfulRequest(resp)))
                if resp.status_code.as_u16() == 404 =>
            {
                debug!("👤 User {} is not in guild {}", user_id, self.guild_id);
                Ok(Membership::NotMember)
            }
            Err(e) => Err(GateError::Lookup(e.to_string())),
        }
    }
}
