//! # Bot Module
//!
//! Discord front end of the music bot.
//!
//! [`MusicBot`] implements Serenity's [`EventHandler`]. It parses prefix
//! commands out of guild messages, gates them on server membership, points the
//! voice transport at the caller's channel and hands the rest to
//! [`handlers::execute`], which only knows about the playback controller.

use anyhow::Result;
use serenity::{
    all::{
        ChannelId, ComponentInteraction, Context, CreateInteractionResponse,
        CreateInteractionResponseMessage, CreateMessage, EventHandler, GuildId, Interaction,
        Message, Ready, UserId, VoiceState,
    },
    async_trait,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod events;
pub mod handlers;
pub mod membership;

use self::{
    commands::{Command, CommandParser},
    events::Announcements,
    handlers::{Access, Reply},
    membership::MembershipGate,
};
use crate::{
    audio::{player::PlaybackController, session::SessionKey, songbird_transport::SongbirdTransport},
    config::Config,
    storage::AudienceStore,
    ui::{buttons, messages},
};

/// Main Discord event handler.
pub struct MusicBot {
    config: Arc<Config>,
    parser: CommandParser,
    player: PlaybackController,
    transport: Arc<SongbirdTransport>,
    gate: Arc<dyn MembershipGate>,
    /// Everyone who has talked to the bot, persisted to `users_groups.json`.
    audience: Arc<Mutex<AudienceStore>>,
    announcements: Announcements,
}

impl MusicBot {
    pub fn new(
        config: Arc<Config>,
        player: PlaybackController,
        transport: Arc<SongbirdTransport>,
        gate: Arc<dyn MembershipGate>,
        audience: Arc<Mutex<AudienceStore>>,
        announcements: Announcements,
    ) -> Result<Self> {
        let parser = CommandParser::new(&config.command_prefix)?;

        Ok(Self {
            config,
            parser,
            player,
            transport,
            gate,
            audience,
            announcements,
        })
    }

    async fn handle_message(&self, ctx: &Context, msg: &Message, command: Command) -> Result<()> {
        info!(
            "📝 {:?} from {} in {:?}",
            command, msg.author.name, msg.guild_id
        );

        self.record_audience(msg.author.id, msg.guild_id).await;

        match self.access(msg.author.id).await {
            Access::Granted => {}
            Access::JoinRequired => {
                let join = CreateMessage::new()
                    .content(messages::JOIN_REQUIRED)
                    .components(buttons::join_buttons(self.config.invite_url.as_deref()))
                    .reference_message(msg);
                msg.channel_id.send_message(&ctx.http, join).await?;
                return Ok(());
            }
            Access::Unavailable => {
                msg.reply(ctx, messages::MEMBERSHIP_UNAVAILABLE).await?;
                return Ok(());
            }
        }

        let reply = match command {
            Command::Start => Reply::Welcome,
            Command::Help => Reply::Help,
            command => {
                let Some(guild_id) = msg.guild_id else {
                    msg.reply(ctx, messages::GUILD_ONLY).await?;
                    return Ok(());
                };
                let key = SessionKey::from(guild_id);

                if let Command::Play(query) = &command {
                    if !query.trim().is_empty() {
                        let Some(voice) = user_voice_channel(ctx, guild_id, msg.author.id) else {
                            msg.reply(ctx, messages::NOT_IN_VOICE).await?;
                            return Ok(());
                        };
                        self.transport.set_target(key, voice);
                        self.announcements.insert(key, msg.channel_id);
                    }
                }

                handlers::execute(&self.player, &self.config.command_prefix, key, command).await
            }
        };

        self.send_reply(ctx, msg, reply).await
    }

    async fn send_reply(&self, ctx: &Context, msg: &Message, reply: Reply) -> Result<()> {
        let prefix = &self.config.command_prefix;
        let invite = self.config.invite_url.as_deref();

        match reply {
            Reply::Text(text) => {
                msg.reply(ctx, text).await?;
            }
            Reply::Welcome => {
                let welcome = CreateMessage::new()
                    .content(messages::welcome_text(prefix))
                    .components(buttons::welcome_buttons(invite));
                msg.channel_id.send_message(&ctx.http, welcome).await?;
            }
            Reply::Help => {
                let help = CreateMessage::new()
                    .content(messages::help_text(prefix))
                    .components(buttons::help_buttons());
                msg.channel_id.send_message(&ctx.http, help).await?;
            }
            Reply::Silent => {}
        }

        Ok(())
    }

    async fn handle_component(&self, ctx: &Context, component: &ComponentInteraction) -> Result<()> {
        let text = match component.data.custom_id.as_str() {
            buttons::button_ids::CHECK_USER_ID => {
                format!("🆔 Your user ID: `{}`", component.user.id)
            }
            buttons::button_ids::CHECK_GUILD_ID => match component.guild_id {
                Some(guild_id) => format!("🆔 This server's ID: `{}`", guild_id),
                None => messages::GUILD_ONLY.to_string(),
            },
            buttons::button_ids::CHECK_MEMBERSHIP => match self.access(component.user.id).await {
                Access::Granted => "✅ Thanks for joining! You can use the bot now.".to_string(),
                Access::JoinRequired => messages::JOIN_REQUIRED.to_string(),
                Access::Unavailable => messages::MEMBERSHIP_UNAVAILABLE.to_string(),
            },
            other => {
                debug!("Unknown button {}", other);
                return Ok(());
            }
        };

        let response = CreateInteractionResponse::Message(
            CreateInteractionResponseMessage::new()
                .content(text)
                .ephemeral(true),
        );
        component.create_response(&ctx.http, response).await?;
        Ok(())
    }

    async fn access(&self, user_id: UserId) -> Access {
        handlers::check_access(self.gate.as_ref(), self.config.owner_id, user_id.get()).await
    }

    async fn record_audience(&self, user_id: UserId, guild_id: Option<GuildId>) {
        let mut audience = self.audience.lock().await;

        let mut changed = audience.record_user(user_id.get());
        if let Some(guild_id) = guild_id {
            changed |= audience.record_group(guild_id.get());
        }

        if changed {
            if let Err(e) = audience.save().await {
                warn!("⚠️ Couldn't save {}: {:?}", audience.path().display(), e);
            }
        }
    }
}

/// Voice channel the user is sitting in, from the gateway cache.
fn user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = guild_id.to_guild_cached(&ctx.cache)?;
    guild
        .voice_states
        .get(&user_id)
        .and_then(|state| state.channel_id)
}

#[async_trait]
impl EventHandler for MusicBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        let Some(command) = self.parser.parse(&msg.content) else {
            return;
        };

        if let Err(e) = self.handle_message(&ctx, &msg, command).await {
            error!("Error handling command: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Component(component) = interaction {
            if let Err(e) = self.handle_component(&ctx, &component).await {
                error!("Error handling button: {:?}", e);
            }
        }
    }

    /// Someone (a moderator, or Discord itself) pulled the bot out of voice:
    /// drop the session instead of waiting for a stream end that never comes.
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }

        if let Some(guild_id) = new.guild_id {
            let key = SessionKey::from(guild_id);
            if self.transport.acknowledge_disconnect(key) {
                debug!("Voice disconnect in {} was our own leave", key);
                return;
            }
            info!("🔌 Bot disconnected in {}", key);

            self.transport.forget(key);
            if self.player.snapshot(key).is_some() {
                self.player.stop(key).await;
            }
        }
    }
}
