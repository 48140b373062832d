use anyhow::Result;
use serenity::{model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod error;
mod sources;
mod ui;

use crate::audio::player::SongbirdBackend;
use crate::bot::{
    dispatcher::{DispatchSettings, Dispatcher},
    handlers::SerenityPlatform,
    OpenQueueBot,
};
use crate::config::Config;
use crate::sources::SourceManager;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("open_queue=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    info!("🎵 Starting Open Queue v{}", env!("CARGO_PKG_VERSION"));

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    let config = Arc::new(Config::load()?);
    info!("{}", config.summary());

    let sources = Arc::new(SourceManager::new(&config));
    match sources.verify_dependencies().await {
        Ok(version) => info!("✅ yt-dlp {}", version),
        Err(e) => error!("❌ yt-dlp is not usable, lookups will fail: {}", e),
    }

    let (events, inbox) = flume::unbounded();

    let intents = GatewayIntents::GUILDS | GatewayIntents::GUILD_VOICE_STATES;
    let songbird = Songbird::serenity();

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(OpenQueueBot::new(config.clone(), events.clone()))
        .register_songbird_with(songbird.clone())
        .await?;

    let dispatcher = Dispatcher::new(
        DispatchSettings::from(config.as_ref()),
        (events, inbox),
        Arc::new(SerenityPlatform::new(client.http.clone(), client.cache.clone())),
        Arc::new(SongbirdBackend::new(songbird, config.default_volume)),
        sources,
    );
    tokio::spawn(dispatcher.run());

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {:?}", e);
            return;
        }
        info!("⚠️ Shutdown signal received, closing...");
        shard_manager.shutdown_all().await;
    });

    info!("🚀 Bot starting");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

/// Checks the external tools lookups and playback depend on.
async fn health_check() -> Result<()> {
    let config = Config::load().unwrap_or_default();
    let version = SourceManager::new(&config).verify_dependencies().await?;

    let ffmpeg = async_process::Command::new("ffmpeg")
        .arg("-version")
        .output()
        .await?;

    if ffmpeg.status.success() {
        info!("yt-dlp {}", version);
        println!("OK");
        Ok(())
    } else {
        anyhow::bail!("ffmpeg is missing");
    }
}
