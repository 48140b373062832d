use anyhow::Result;
use serenity::{
    builder::{CreateCommand, CreateCommandOption},
    model::{application::CommandOptionType, id::GuildId},
    prelude::Context,
};
use std::collections::HashMap;
use tracing::info;

use crate::{bot::platform::CommandArgs, ui::buttons::button_ids};

/// A validated control request, ready for the session.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Play { query: String },
    Playlist { name: String },
    Spotify { url: String },
    Skip,
    Mix,
    Pause,
    Resume,
    Seek { seconds: f64 },
    Leave,
    TogglePause,
    ToggleLoop,
    ToggleRepeat,
    ViewQueue,
    Controls,
}

/// What the member must satisfy before the command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Be in any voice channel; the session joins it if idle.
    JoinVoice,
    /// Be in the channel of a ready session.
    BotChannel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Slash,
    Button,
}

#[derive(Debug, Clone, Copy)]
pub struct CommandEntry {
    pub access: Access,
    pub origin: Origin,
    /// `None` when a required option is missing or malformed.
    pub parse: fn(&CommandArgs) -> Option<Command>,
}

/// Command identity to handler, built once at startup.
pub struct CommandTable {
    entries: HashMap<&'static str, CommandEntry>,
}

impl CommandTable {
    pub fn new() -> Self {
        let mut table = Self {
            entries: HashMap::new(),
        };

        table.slash("play", Access::JoinVoice, |args| {
            Some(Command::Play { query: args.string("song")? })
        });
        table.slash("playlist", Access::JoinVoice, |args| {
            Some(Command::Playlist { name: args.string("playlist")? })
        });
        table.slash("spotify", Access::JoinVoice, |args| {
            Some(Command::Spotify { url: args.string("url")? })
        });
        table.slash("skip", Access::BotChannel, |_| Some(Command::Skip));
        table.slash("mix", Access::BotChannel, |_| Some(Command::Mix));
        table.slash("pause", Access::BotChannel, |_| Some(Command::Pause));
        table.slash("resume", Access::BotChannel, |_| Some(Command::Resume));
        table.slash("seek", Access::BotChannel, |args| {
            Some(Command::Seek { seconds: args.number("time")? })
        });
        table.slash("leave", Access::BotChannel, |_| Some(Command::Leave));

        table.button(button_ids::NEXT, |_| Some(Command::Skip));
        table.button(button_ids::PAUSE, |_| Some(Command::TogglePause));
        table.button(button_ids::LEAVE, |_| Some(Command::Leave));
        table.button(button_ids::REPEAT, |_| Some(Command::ToggleRepeat));
        table.button(button_ids::LOOP, |_| Some(Command::ToggleLoop));
        table.button(button_ids::MIX, |_| Some(Command::Mix));
        table.button(button_ids::QUEUE, |_| Some(Command::ViewQueue));
        table.button(button_ids::CONTROLS, |_| Some(Command::Controls));

        table
    }

    fn slash(&mut self, name: &'static str, access: Access, parse: fn(&CommandArgs) -> Option<Command>) {
        self.entries.insert(
            name,
            CommandEntry {
                access,
                origin: Origin::Slash,
                parse,
            },
        );
    }

    fn button(&mut self, id: &'static str, parse: fn(&CommandArgs) -> Option<Command>) {
        self.entries.insert(
            id,
            CommandEntry {
                access: Access::BotChannel,
                origin: Origin::Button,
                parse,
            },
        );
    }

    pub fn lookup(&self, id: &str) -> Option<&CommandEntry> {
        self.entries.get(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Default for CommandTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Registers commands globally
pub async fn register_global_commands(ctx: &Context) -> Result<()> {
    serenity::all::Command::set_global_commands(&ctx.http, slash_commands()).await?;
    info!("✅ Global commands registered");
    Ok(())
}

/// Registers commands on one guild (development)
pub async fn register_guild_commands(ctx: &Context, guild_id: GuildId) -> Result<()> {
    guild_id.set_commands(&ctx.http, slash_commands()).await?;
    info!("✅ Commands registered on guild {}", guild_id);
    Ok(())
}

pub fn slash_commands() -> Vec<CreateCommand> {
    vec![
        play_command(),
        playlist_command(),
        spotify_command(),
        CreateCommand::new("skip").description("skip track"),
        CreateCommand::new("mix").description("mix tracks"),
        CreateCommand::new("pause").description("pause music"),
        CreateCommand::new("resume").description("resume music"),
        seek_command(),
        CreateCommand::new("leave").description("stop music"),
    ]
}

fn play_command() -> CreateCommand {
    CreateCommand::new("play").description("Play a song").add_option(
        CreateCommandOption::new(CommandOptionType::String, "song", "song url or title")
            .required(true),
    )
}

fn playlist_command() -> CreateCommand {
    CreateCommand::new("playlist").description("Play a playlist").add_option(
        CreateCommandOption::new(CommandOptionType::String, "playlist", "playlist name")
            .required(true),
    )
}

fn spotify_command() -> CreateCommand {
    CreateCommand::new("spotify")
        .description("Play a spotify link")
        .add_option(
            CreateCommandOption::new(CommandOptionType::String, "url", "spotify url").required(true),
        )
}

fn seek_command() -> CreateCommand {
    CreateCommand::new("seek").description("seek music").add_option(
        CreateCommandOption::new(CommandOptionType::Number, "time", "seek time in seconds")
            .required(true)
            .min_number_value(0.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn every_slash_command_is_in_the_table() {
        let table = CommandTable::new();
        for name in ["play", "playlist", "spotify", "skip", "mix", "pause", "resume", "seek", "leave"] {
            let entry = table.lookup(name).unwrap();
            assert_eq!(entry.origin, Origin::Slash, "{name}");
        }
        assert_eq!(slash_commands().len(), 9);
        assert_eq!(table.len(), 17);
    }

    #[test]
    fn join_path_commands_need_any_voice_channel() {
        let table = CommandTable::new();
        assert_eq!(table.lookup("play").unwrap().access, Access::JoinVoice);
        assert_eq!(table.lookup("spotify").unwrap().access, Access::JoinVoice);
        assert_eq!(table.lookup("skip").unwrap().access, Access::BotChannel);
        assert_eq!(table.lookup(button_ids::LOOP).unwrap().access, Access::BotChannel);
    }

    #[test]
    fn options_are_parsed() {
        let table = CommandTable::new();

        let play = table.lookup("play").unwrap();
        assert_eq!(
            (play.parse)(&CommandArgs::new().with("song", "lofi")),
            Some(Command::Play { query: "lofi".into() })
        );
        assert_eq!((play.parse)(&CommandArgs::new()), None);

        let seek = table.lookup("seek").unwrap();
        assert_eq!(
            (seek.parse)(&CommandArgs::new().with("time", "12")),
            Some(Command::Seek { seconds: 12.0 })
        );
        assert_eq!((seek.parse)(&CommandArgs::new().with("time", "soon")), None);
    }

    #[test]
    fn buttons_map_to_controls() {
        let table = CommandTable::new();
        let parse = |id: &str| (table.lookup(id).unwrap().parse)(&CommandArgs::new());

        assert_eq!(parse(button_ids::NEXT), Some(Command::Skip));
        assert_eq!(parse(button_ids::PAUSE), Some(Command::TogglePause));
        assert_eq!(parse(button_ids::QUEUE), Some(Command::ViewQueue));
        assert!(table.lookup("btn-unknown").is_none());
    }
}
