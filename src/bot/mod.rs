//! # Bot Module
//!
//! Discord glue around the session dispatcher.
//!
//! - [`OpenQueueBot`] implements serenity's [`EventHandler`] and forwards
//!   interactions and voice state changes as [`DispatchEvent`]s
//! - [`dispatcher::Dispatcher`] owns every guild session and runs on its
//!   own task
//! - [`gateway::CommandGateway`] checks requests against the
//!   [`commands::CommandTable`] and the voice channel rule
//! - [`handlers`] holds the serenity implementations of the
//!   [`platform`] traits

use anyhow::Result;
use flume::Sender;
use serenity::{
    all::{Context, EventHandler, GuildId, Interaction, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{error, info, warn};

pub mod commands;
pub mod dispatcher;
pub mod gateway;
pub mod handlers;
pub mod platform;

use crate::{audio::occupancy::PresenceChange, bot::dispatcher::DispatchEvent, config::Config};

pub struct OpenQueueBot {
    config: Arc<Config>,
    events: Sender<DispatchEvent>,
}

impl OpenQueueBot {
    pub fn new(config: Arc<Config>, events: Sender<DispatchEvent>) -> Self {
        Self { config, events }
    }

    fn dispatch(&self, event: DispatchEvent) {
        if self.events.send(event).is_err() {
            error!("Dispatcher is gone, dropping event");
        }
    }

    /// Global registration by default, one guild when `GUILD_ID` is set.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registering slash commands...");

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ Bot is not in the configured guild: {}", guild_id);
                    return Ok(());
                }
                commands::register_guild_commands(ctx, guild_id).await
            }
            None => commands::register_global_commands(ctx).await,
        }
    }
}

#[async_trait]
impl EventHandler for OpenQueueBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} guilds", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Failed to register commands: {:?}", e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let request = match interaction {
            Interaction::Command(command) => handlers::command_request(&ctx, command),
            Interaction::Component(component) => handlers::component_request(&ctx, component),
            _ => return,
        };
        self.dispatch(DispatchEvent::Command(request));
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let old_channel = old.and_then(|state| state.channel_id);

        // Mute and deafen toggles
        if old_channel == new.channel_id {
            return;
        }

        if new.user_id == ctx.cache.current_user().id {
            if let (Some(channel_id), None) = (old_channel, new.channel_id) {
                info!("🔌 Bot disconnected in guild {}", guild_id);
                self.dispatch(DispatchEvent::BotDisconnected { guild_id, channel_id });
            }
            return;
        }

        self.dispatch(DispatchEvent::Presence(PresenceChange {
            guild_id,
            user_id: new.user_id,
            old_channel,
            new_channel: new.channel_id,
        }));
    }
}
