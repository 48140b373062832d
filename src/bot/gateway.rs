use serenity::model::id::{ChannelId, GuildId, UserId};
use tracing::debug;

use crate::{
    audio::{registry::SessionRegistry, session::PlaybackState},
    bot::{
        commands::{Access, Command, CommandTable, Origin},
        platform::CommandRequest,
    },
    error::{MusicError, MusicResult},
};

const UNPROCESSABLE: &str = "> Your request could not be processed, please try again later";
const NOT_IN_VOICE: &str = "> You are not in the voice channel";
const JOIN_ANY_VOICE: &str = "> To use the music commands, you need to join voice channel";
const JOIN_BOT_CHANNEL: &str = "> To use the music commands, you need to join the bot voice channel";
const JOIN_BOT_CHANNEL_CONTROLS: &str = "> To use the controls, you need to join the bot voice channel";

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub command: Command,
    pub origin: Origin,
    pub guild_id: GuildId,
    pub member: UserId,
    pub text_channel: ChannelId,
    /// The member's voice channel, which is also the bot's for
    /// `Access::BotChannel` commands.
    pub voice_channel: ChannelId,
    /// The session is idle and must join `voice_channel` first.
    pub needs_join: bool,
}

/// Checks every request against the command table and the voice channel
/// membership rule before any session operation runs.
pub struct CommandGateway {
    table: CommandTable,
}

impl CommandGateway {
    pub fn new(table: CommandTable) -> Self {
        Self { table }
    }

    /// Looks up the command, parses its options and enforces its access
    /// rule. Errors are the rejection to show the member.
    pub fn admit(&self, request: &CommandRequest, registry: &mut SessionRegistry) -> MusicResult<Admission> {
        let entry = self.table.lookup(&request.id).ok_or_else(|| {
            debug!("Unknown command id {}", request.id);
            MusicError::validation(UNPROCESSABLE)
        })?;

        let (Some(guild_id), Some(member), Some(text_channel)) =
            (request.guild_id, request.member, request.text_channel)
        else {
            return Err(MusicError::validation(UNPROCESSABLE));
        };

        let command = (entry.parse)(&request.args).ok_or_else(|| MusicError::validation(UNPROCESSABLE))?;
        let session = registry.get_or_create(guild_id);

        let (voice_channel, needs_join) = match entry.access {
            Access::JoinVoice => {
                let voice = request
                    .member_voice
                    .ok_or_else(|| MusicError::validation(NOT_IN_VOICE))?;
                (voice, session.state() == PlaybackState::Idle)
            }
            Access::BotChannel => {
                let not_in_bot_channel = match entry.origin {
                    Origin::Slash => JOIN_BOT_CHANNEL,
                    Origin::Button => JOIN_BOT_CHANNEL_CONTROLS,
                };
                let voice = request.member_voice.ok_or_else(|| match entry.origin {
                    Origin::Slash => MusicError::validation(JOIN_ANY_VOICE),
                    Origin::Button => MusicError::validation(not_in_bot_channel),
                })?;
                if !session.is_ready() || !session.holds(voice) {
                    return Err(MusicError::validation(not_in_bot_channel));
                }
                (voice, false)
            }
        };

        Ok(Admission {
            command,
            origin: entry.origin,
            guild_id,
            member,
            text_channel,
            voice_channel,
            needs_join,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        audio::{
            session::tests::{TEXT, VOICE},
            sink::testing::RecordingSink,
        },
        bot::platform::{testing::RecordingResponder, CommandArgs},
        ui::buttons::button_ids,
    };
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    const GUILD: GuildId = GuildId::new(1);

    fn request(id: &str, voice: Option<ChannelId>) -> CommandRequest {
        CommandRequest {
            id: id.to_string(),
            args: CommandArgs::new().with("song", "lofi"),
            guild_id: Some(GUILD),
            member: Some(UserId::new(7)),
            text_channel: Some(TEXT),
            member_voice: voice,
            responder: Arc::new(RecordingResponder::default()),
        }
    }

    async fn ready_registry() -> SessionRegistry {
        let mut registry = SessionRegistry::new();
        let session = registry.get_or_create(GUILD);
        session
            .begin_join(VOICE, TEXT, Arc::new(RecordingSink::default()))
            .unwrap();
        session.complete_join(VOICE).await.unwrap();
        registry
    }

    fn rejection(result: MusicResult<Admission>) -> String {
        match result {
            Err(e @ MusicError::Validation(_)) => e.to_string(),
            other => panic!("expected a validation error, got {:?}", other),
        }
    }

    #[test]
    fn missing_guild_or_member_cannot_be_processed() {
        let gateway = CommandGateway::new(CommandTable::new());
        let mut registry = SessionRegistry::new();

        let mut req = request("play", Some(VOICE));
        req.guild_id = None;
        assert_eq!(rejection(gateway.admit(&req, &mut registry)), UNPROCESSABLE);

        let mut req = request("play", Some(VOICE));
        req.member = None;
        assert_eq!(rejection(gateway.admit(&req, &mut registry)), UNPROCESSABLE);
        assert!(registry.is_empty());
    }

    #[test]
    fn play_requires_a_voice_channel_and_joins_when_idle() {
        let gateway = CommandGateway::new(CommandTable::new());
        let mut registry = SessionRegistry::new();

        assert_eq!(rejection(gateway.admit(&request("play", None), &mut registry)), NOT_IN_VOICE);

        let admission = gateway.admit(&request("play", Some(VOICE)), &mut registry).unwrap();
        assert_eq!(admission.command, Command::Play { query: "lofi".into() });
        assert_eq!(admission.voice_channel, VOICE);
        assert!(admission.needs_join);
    }

    #[tokio::test]
    async fn play_while_ready_does_not_rejoin() {
        let gateway = CommandGateway::new(CommandTable::new());
        let mut registry = ready_registry().await;

        let admission = gateway
            .admit(&request("play", Some(ChannelId::new(555))), &mut registry)
            .unwrap();
        assert!(!admission.needs_join);
    }

    #[tokio::test]
    async fn controls_require_the_bot_channel() {
        let gateway = CommandGateway::new(CommandTable::new());
        let mut registry = ready_registry().await;
        let elsewhere = Some(ChannelId::new(555));

        assert_eq!(
            rejection(gateway.admit(&request("skip", elsewhere), &mut registry)),
            JOIN_BOT_CHANNEL
        );
        assert_eq!(
            rejection(gateway.admit(&request(button_ids::NEXT, elsewhere), &mut registry)),
            JOIN_BOT_CHANNEL_CONTROLS
        );
        assert_eq!(
            rejection(gateway.admit(&request("skip", None), &mut registry)),
            JOIN_ANY_VOICE
        );

        let admission = gateway.admit(&request("skip", Some(VOICE)), &mut registry).unwrap();
        assert_eq!(admission.command, Command::Skip);
        assert_eq!(admission.origin, Origin::Slash);
    }

    #[test]
    fn controls_on_an_idle_session_are_rejected() {
        let gateway = CommandGateway::new(CommandTable::new());
        let mut registry = SessionRegistry::new();

        assert_eq!(
            rejection(gateway.admit(&request("pause", Some(VOICE)), &mut registry)),
            JOIN_BOT_CHANNEL
        );
    }

    #[test]
    fn unknown_ids_and_bad_options_are_rejected() {
        let gateway = CommandGateway::new(CommandTable::new());
        let mut registry = SessionRegistry::new();

        assert_eq!(rejection(gateway.admit(&request("dance", Some(VOICE)), &mut registry)), UNPROCESSABLE);

        let mut req = request("seek", Some(VOICE));
        req.args = CommandArgs::new();
        assert_eq!(rejection(gateway.admit(&req, &mut registry)), UNPROCESSABLE);
    }
}
