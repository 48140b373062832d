//! Seams between the dispatcher and the chat platform.

use anyhow::Result;
use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId, UserId};
use std::{collections::HashMap, fmt, sync::Arc};

use crate::ui::Reply;

/// Replies to one interaction.
#[async_trait]
pub trait Responder: Send + Sync {
    /// Acknowledges now, the reply follows later.
    async fn defer(&self) -> Result<()>;

    /// Sends or, after `defer`, edits in the reply. Notices are deleted
    /// again once their ttl runs out.
    async fn reply(&self, reply: Reply) -> Result<()>;

    /// Defer then delete; for buttons that need no visible answer.
    async fn acknowledge(&self) -> Result<()>;
}

/// Outgoing side of the platform not tied to an interaction.
#[async_trait]
pub trait Platform: Send + Sync {
    async fn announce(&self, channel_id: ChannelId, reply: Reply) -> Result<()>;

    /// Non-bot members currently in `channel_id`.
    fn listeners(&self, guild_id: GuildId, channel_id: ChannelId) -> usize;
}

/// Option values of a slash command, by option name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandArgs {
    values: HashMap<String, String>,
}

impl CommandArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    pub fn string(&self, name: &str) -> Option<String> {
        self.values
            .get(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.values.get(name)?.trim().parse().ok()
    }
}

/// A slash command or button press, as the platform delivered it.
#[derive(Clone)]
pub struct CommandRequest {
    /// Slash command name or button custom id.
    pub id: String,
    pub args: CommandArgs,
    pub guild_id: Option<GuildId>,
    pub member: Option<UserId>,
    pub text_channel: Option<ChannelId>,
    /// The member's voice channel at the time of the request.
    pub member_voice: Option<ChannelId>,
    pub responder: Arc<dyn Responder>,
}

impl fmt::Debug for CommandRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRequest")
            .field("id", &self.id)
            .field("args", &self.args)
            .field("guild_id", &self.guild_id)
            .field("member", &self.member)
            .field("text_channel", &self.text_channel)
            .field("member_voice", &self.member_voice)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_are_trimmed_and_typed() {
        let args = CommandArgs::new()
            .with("song", "  lofi beats ")
            .with("time", "42.5")
            .with("empty", "   ");

        assert_eq!(args.string("song").as_deref(), Some("lofi beats"));
        assert_eq!(args.number("time"), Some(42.5));
        assert_eq!(args.string("empty"), None);
        assert_eq!(args.number("song"), None);
        assert_eq!(args.string("missing"), None);
    }
}
