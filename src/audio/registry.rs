use serenity::model::id::GuildId;
use std::collections::HashMap;
use tracing::debug;

use crate::audio::session::Session;

/// Single authoritative [`Session`] per guild.
///
/// Sessions are created on first access and never evicted; a guild whose
/// music stopped keeps an idle session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<GuildId, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create(&mut self, guild_id: GuildId) -> &mut Session {
        self.sessions.entry(guild_id).or_insert_with(|| {
            debug!("🆕 New session for guild {}", guild_id);
            Session::new(guild_id)
        })
    }

    pub fn get(&self, guild_id: GuildId) -> Option<&Session> {
        self.sessions.get(&guild_id)
    }

    pub fn get_mut(&mut self, guild_id: GuildId) -> Option<&mut Session> {
        self.sessions.get_mut(&guild_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
