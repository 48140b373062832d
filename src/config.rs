use anyhow::{Context, Result};
use std::time::Duration;

/// Runtime settings, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub guild_id: Option<u64>, // Register commands on one guild during development

    // Session policy
    pub idle_timeout: Duration,
    pub notice_ttl: Duration,

    // Track lookup
    pub resolve_timeout: Duration,
    pub max_playlist_size: usize,
    pub ytdlp_path: String,

    // Audio
    pub default_volume: f32,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; `load` uses the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let duration = |key: &str, default: &str| -> Result<Duration> {
            humantime::parse_duration(&var(key, default))
                .with_context(|| format!("{} is not a valid duration", key))
        };

        let config = Self {
            discord_token: lookup("DISCORD_TOKEN").context("DISCORD_TOKEN is not set")?,
            guild_id: lookup("GUILD_ID").and_then(|s| s.parse().ok()),

            idle_timeout: duration("IDLE_TIMEOUT", "5m")?,
            notice_ttl: duration("NOTICE_TTL", "15s")?,

            resolve_timeout: duration("RESOLVE_TIMEOUT", "30s")?,
            max_playlist_size: var("MAX_PLAYLIST_SIZE", "100")
                .parse()
                .context("MAX_PLAYLIST_SIZE must be a number")?,
            ytdlp_path: var("YTDLP_PATH", "yt-dlp"),

            default_volume: var("DEFAULT_VOLUME", "0.5")
                .parse()
                .context("DEFAULT_VOLUME must be a number")?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Sanity checks on values that would otherwise fail at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.discord_token.trim().is_empty() {
            anyhow::bail!("DISCORD_TOKEN is empty");
        }

        if !(0.0..=2.0).contains(&self.default_volume) {
            anyhow::bail!("Default volume must be between 0.0 and 2.0, got: {}", self.default_volume);
        }

        if self.idle_timeout.is_zero() {
            anyhow::bail!("Idle timeout must be greater than 0");
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.max_playlist_size == 0 {
            anyhow::bail!("Max playlist size must be greater than 0");
        }

        Ok(())
    }

    /// Loggable summary without secrets.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Discord: commands {}\n  \
            Session: idle timeout {}, notices kept {}\n  \
            Lookup: {} (timeout {}, max {} tracks per playlist)\n  \
            Audio: {}% vol",
            self.guild_id.map_or("global".to_string(), |id| format!("on guild {}", id)),
            humantime::format_duration(self.idle_timeout),
            humantime::format_duration(self.notice_ttl),
            self.ytdlp_path,
            humantime::format_duration(self.resolve_timeout),
            self.max_playlist_size,
            (self.default_volume * 100.0) as u32,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            guild_id: None,
            idle_timeout: Duration::from_secs(5 * 60),
            notice_ttl: Duration::from_secs(15),
            resolve_timeout: Duration::from_secs(30),
            max_playlist_size: 100,
            ytdlp_path: "yt-dlp".to_string(),
            default_volume: 0.5,
        }
    }
}
