use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub owner_id: Option<u64>,
    pub command_prefix: String,

    // Access
    pub required_guild_id: Option<u64>, // Users must be members of this server
    pub invite_url: Option<String>,

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub max_start_attempts: u32,

    // Timeouts (seconds)
    pub resolve_timeout_secs: u64,
    pub start_timeout_secs: u64,
    pub leave_timeout_secs: u64,

    // Paths
    pub data_dir: PathBuf,
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // Discord
            discord_token: std::env::var("DISCORD_TOKEN")?,
            owner_id: std::env::var("OWNER_ID").ok().and_then(|s| s.parse().ok()),
            command_prefix: std::env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string()),

            // Access
            required_guild_id: std::env::var("REQUIRED_GUILD_ID")
                .ok()
                .and_then(|s| s.parse().ok()),
            invite_url: std::env::var("INVITE_URL").ok().filter(|s| !s.trim().is_empty()),

            // Audio
            default_volume: std::env::var("DEFAULT_VOLUME")
                .unwrap_or_else(|_| "0.5".to_string())
                .parse()?,
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "100".to_string())
                .parse()?,
            max_start_attempts: std::env::var("MAX_START_ATTEMPTS")
                .unwrap_or_else(|_| "3".to_string())
                .parse()?,

            // Timeouts
            resolve_timeout_secs: std::env::var("RESOLVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()?,
            start_timeout_secs: std::env::var("START_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            leave_timeout_secs: std::env::var("LEAVE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,

            // Paths
            data_dir: std::env::var("DATA_DIR")
                .unwrap_or_else(|_| "/app/data".to_string())
                .into(),
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string()),
        };

        std::fs::create_dir_all(&config.data_dir)?;

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Volume must be between 0.0 and 2.0
    /// - Queue size and start attempts must be greater than 0
    /// - Timeouts must be greater than 0
    /// - The command prefix must be non-empty and contain no whitespace
    pub fn validate(&self) -> Result<()> {
        if self.default_volume < 0.0 || self.default_volume > 2.0 {
            anyhow::bail!("Default volume must be between 0.0 and 2.0, got: {}", self.default_volume);
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.max_start_attempts == 0 {
            anyhow::bail!("Max start attempts must be greater than 0");
        }

        if self.resolve_timeout_secs == 0 || self.start_timeout_secs == 0 || self.leave_timeout_secs == 0 {
            anyhow::bail!("Timeouts must be greater than 0");
        }

        if self.command_prefix.is_empty() || self.command_prefix.chars().any(char::is_whitespace) {
            anyhow::bail!("Invalid command prefix: {:?}", self.command_prefix);
        }

        Ok(())
    }

    /// Returns a summary of the current configuration for logging.
    /// The token is never included.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: prefix {:?}, owner {}\n  \
            Access: required guild {}\n  \
            Audio: {}% vol, {} queue, {} start attempts\n  \
            Timeouts: resolve {}s, start {}s, leave {}s\n  \
            Data: {}",
            self.command_prefix,
            self.owner_id.map_or("none".to_string(), |id| id.to_string()),
            self.required_guild_id.map_or("none".to_string(), |id| id.to_string()),
            (self.default_volume * 100.0) as u32,
            self.max_queue_size,
            self.max_start_attempts,
            self.resolve_timeout_secs,
            self.start_timeout_secs,
            self.leave_timeout_secs,
            self.data_dir.display()
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            owner_id: None,
            command_prefix: "!".to_string(),

            required_guild_id: None,
            invite_url: None,

            default_volume: 0.5,
            max_queue_size: 100,
            max_start_attempts: 3,

            resolve_timeout_secs: 30,
            start_timeout_secs: 20,
            leave_timeout_secs: 10,

            data_dir: "/app/data".into(),
            ytdlp_path: "yt-dlp".to_string(),
        }
    }
}
