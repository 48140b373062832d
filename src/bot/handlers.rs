//! Serenity side of the platform seams: interactions become
//! [`CommandRequest`]s, replies and announcements go back through the
//! HTTP client, listener counts come from the cache.

use anyhow::Result;
use async_trait::async_trait;
use serenity::{
    all::{Cache, CommandDataOptionValue, Http, VoiceState},
    builder::{CreateInteractionResponse, CreateInteractionResponseMessage, EditInteractionResponse},
    model::{
        application::{CommandInteraction, ComponentInteraction},
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    bot::platform::{CommandArgs, CommandRequest, Platform, Responder},
    ui::{self, Reply},
};

/// Converts a slash command
pub fn command_request(ctx: &Context, command: CommandInteraction) -> CommandRequest {
    let args = command
        .data
        .options
        .iter()
        .fold(CommandArgs::new(), |args, option| match option_text(&option.value) {
            Some(value) => args.with(option.name.clone(), value),
            None => args,
        });

    let member = command.member.as_ref().map(|m| m.user.id);
    let member_voice = voice_channel_of(&ctx.cache, command.guild_id, member);

    CommandRequest {
        id: command.data.name.clone(),
        args,
        guild_id: command.guild_id,
        member,
        text_channel: Some(command.channel_id),
        member_voice,
        responder: Arc::new(SerenityResponder::new(
            ctx.http.clone(),
            InteractionSource::Command(command),
        )),
    }
}

/// Converts a button press
pub fn component_request(ctx: &Context, component: ComponentInteraction) -> CommandRequest {
    let member = component.member.as_ref().map(|m| m.user.id);
    let member_voice = voice_channel_of(&ctx.cache, component.guild_id, member);

    CommandRequest {
        id: component.data.custom_id.clone(),
        args: CommandArgs::new(),
        guild_id: component.guild_id,
        member,
        text_channel: Some(component.channel_id),
        member_voice,
        responder: Arc::new(SerenityResponder::new(
            ctx.http.clone(),
            InteractionSource::Component(component),
        )),
    }
}

fn option_text(value: &CommandDataOptionValue) -> Option<String> {
    match value {
        CommandDataOptionValue::String(s) => Some(s.clone()),
        CommandDataOptionValue::Number(n) => Some(n.to_string()),
        CommandDataOptionValue::Integer(i) => Some(i.to_string()),
        CommandDataOptionValue::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

fn voice_channel_of(cache: &Cache, guild_id: Option<GuildId>, user_id: Option<UserId>) -> Option<ChannelId> {
    let guild = cache.guild(guild_id?)?;
    guild
        .voice_states
        .get(&user_id?)
        .and_then(|voice_state| voice_state.channel_id)
}

pub enum InteractionSource {
    Command(CommandInteraction),
    Component(ComponentInteraction),
}

/// Answers one interaction. The first answer creates the response, later
/// ones edit it.
pub struct SerenityResponder {
    http: Arc<Http>,
    source: InteractionSource,
    responded: Mutex<bool>,
}

impl SerenityResponder {
    pub fn new(http: Arc<Http>, source: InteractionSource) -> Self {
        Self {
            http,
            source,
            responded: Mutex::new(false),
        }
    }

    async fn create(&self, response: CreateInteractionResponse) -> serenity::Result<()> {
        match &self.source {
            InteractionSource::Command(c) => c.create_response(&self.http, response).await,
            InteractionSource::Component(c) => c.create_response(&self.http, response).await,
        }
    }

    async fn edit(&self, edit: EditInteractionResponse) -> serenity::Result<()> {
        match &self.source {
            InteractionSource::Command(c) => c.edit_response(&self.http, edit).await.map(|_| ()),
            InteractionSource::Component(c) => c.edit_response(&self.http, edit).await.map(|_| ()),
        }
    }

    async fn delete(&self) -> serenity::Result<()> {
        match &self.source {
            InteractionSource::Command(c) => c.delete_response(&self.http).await,
            InteractionSource::Component(c) => c.delete_response(&self.http).await,
        }
    }
}

#[async_trait]
impl Responder for SerenityResponder {
    async fn defer(&self) -> Result<()> {
        let mut responded = self.responded.lock().await;
        if !*responded {
            self.create(CreateInteractionResponse::Defer(
                CreateInteractionResponseMessage::new(),
            ))
            .await?;
            *responded = true;
        }
        Ok(())
    }

    async fn reply(&self, reply: Reply) -> Result<()> {
        let ttl = reply.ttl();
        let rendered = ui::render(&reply);

        {
            let mut responded = self.responded.lock().await;
            if *responded {
                self.edit(rendered.into_edit()).await?;
            } else {
                self.create(CreateInteractionResponse::Message(rendered.into_response()))
                    .await?;
                *responded = true;
            }
        }

        if let Some(ttl) = ttl {
            tokio::time::sleep(ttl).await;
            self.delete().await?;
            debug!("🧹 Notice deleted after {:?}", ttl);
        }

        Ok(())
    }

    async fn acknowledge(&self) -> Result<()> {
        self.defer().await?;
        self.delete().await?;
        Ok(())
    }
}

pub struct SerenityPlatform {
    http: Arc<Http>,
    cache: Arc<Cache>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<Http>, cache: Arc<Cache>) -> Self {
        Self { http, cache }
    }
}

fn is_bot(state: &VoiceState, members_bot: impl Fn(UserId) -> Option<bool>) -> bool {
    state
        .member
        .as_ref()
        .map(|m| m.user.bot)
        .or_else(|| members_bot(state.user_id))
        .unwrap_or(false)
}

#[async_trait]
impl Platform for SerenityPlatform {
    async fn announce(&self, channel_id: ChannelId, reply: Reply) -> Result<()> {
        channel_id
            .send_message(&self.http, ui::render(&reply).into_message())
            .await?;
        Ok(())
    }

    /// An uncached guild counts as occupied so nothing is paused blindly.
    fn listeners(&self, guild_id: GuildId, channel_id: ChannelId) -> usize {
        let Some(guild) = self.cache.guild(guild_id) else {
            warn!("Guild {} not cached, assuming listeners are present", guild_id);
            return 1;
        };

        guild
            .voice_states
            .values()
            .filter(|state| state.channel_id == Some(channel_id))
            .filter(|state| !is_bot(state, |user_id| guild.members.get(&user_id).map(|m| m.user.bot)))
            .count()
    }
}
