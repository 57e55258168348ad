use anyhow::Result;
use dashmap::DashMap;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use vc_music::{
    audio::{
        notify::Notifier,
        player::{PlaybackController, PlaybackSettings},
        songbird_transport::SongbirdTransport,
    },
    bot::{
        events,
        membership::{GuildMembershipGate, MembershipGate, OpenGate},
        MusicBot,
    },
    config::Config,
    sources::YtDlpResolver,
    storage::{AudienceStore, AUDIENCE_FILE},
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vc_music=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting vc-music v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load()?;

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check(&config).await;
    }

    info!("{}", config.summary());
    let config = Arc::new(config);

    let audience = AudienceStore::load(config.data_dir.join(AUDIENCE_FILE)).await?;
    let audience = Arc::new(Mutex::new(audience));

    let gate: Arc<dyn MembershipGate> = match config.required_guild_id {
        Some(guild_id) => {
            info!("🔒 Membership in guild {} required", guild_id);
            let http = Arc::new(Http::new(&config.discord_token));
            Arc::new(GuildMembershipGate::new(http, guild_id))
        }
        None => Arc::new(OpenGate),
    };

    // Voice transport and playback controller
    let songbird = Songbird::serenity();
    let (transport_tx, transport_rx) = mpsc::unbounded_channel();
    let transport = Arc::new(SongbirdTransport::new(
        songbird.clone(),
        transport_tx,
        config.default_volume,
    )?);
    let resolver = Arc::new(YtDlpResolver::new(config.ytdlp_path.clone()));
    let (notifier, notifications) = Notifier::channel();
    let player = PlaybackController::new(
        transport.clone(),
        resolver,
        notifier,
        PlaybackSettings::from(&*config),
    );

    let shutdown = CancellationToken::new();
    let event_loop = player.spawn_event_loop(transport_rx, shutdown.clone());

    let announcements: events::Announcements = Arc::new(DashMap::new());
    let handler = MusicBot::new(
        config.clone(),
        player,
        transport,
        gate,
        audience,
        announcements.clone(),
    )?;

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    let forwarder = tokio::spawn(events::forward_notifications(
        client.http.clone(),
        announcements,
        notifications,
        shutdown.clone(),
    ));

    let shard_manager = client.shard_manager.clone();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Error registering Ctrl+C handler: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        signal_token.cancel();
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Error running client: {:?}", why);
    }

    shutdown.cancel();
    let _ = tokio::join!(event_loop, forwarder);
    info!("👋 Bye");

    Ok(())
}

async fn health_check(config: &Config) -> Result<()> {
    let yt_dlp = async_process::Command::new(&config.ytdlp_path)
        .arg("--version")
        .output()
        .await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if yt_dlp.status.success() && ffmpeg.status.success() {
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("Missing dependencies (yt-dlp or ffmpeg)");
    }
}
