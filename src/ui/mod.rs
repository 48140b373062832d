//! Semantic replies and their Discord rendering.
//!
//! The dispatcher only decides *what* to say as a [`Reply`]; the serenity
//! adapter turns it into a message, an interaction response or an edit.

pub mod buttons;
pub mod embeds;

use serenity::builder::{
    CreateActionRow, CreateEmbed, CreateInteractionResponseMessage, CreateMessage,
    EditInteractionResponse,
};
use std::time::Duration;

use crate::audio::{queue::QueueInfo, track::Track};

/// Pending tracks shown in the queue view.
pub const QUEUE_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Plain text line.
    Text(String),
    /// Text that is deleted after `ttl`.
    Notice { text: String, ttl: Duration },
    Enqueued(Enqueued),
    Queue(QueueInfo),
    /// Control message for the track that just started.
    NowPlaying(NowPlaying),
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// How long the reply stays visible, if it expires.
    pub fn ttl(&self) -> Option<Duration> {
        match self {
            Self::Notice { ttl, .. } => Some(*ttl),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Enqueued {
    Track(Track),
    Playlist {
        title: String,
        thumbnail: Option<String>,
        count: usize,
    },
    Spotify {
        count: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlaying {
    pub track: Track,
    pub pending: usize,
    pub loop_track: bool,
    pub repeat: bool,
}

/// Message parts shared by every serenity builder.
#[derive(Debug, Default)]
pub struct Rendered {
    content: Option<String>,
    embed: Option<CreateEmbed>,
    components: Vec<CreateActionRow>,
}

impl Rendered {
    pub fn into_message(self) -> CreateMessage {
        let mut message = CreateMessage::new().components(self.components);
        if let Some(content) = self.content {
            message = message.content(content);
        }
        if let Some(embed) = self.embed {
            message = message.embed(embed);
        }
        message
    }

    pub fn into_response(self) -> CreateInteractionResponseMessage {
        let mut response = CreateInteractionResponseMessage::new().components(self.components);
        if let Some(content) = self.content {
            response = response.content(content);
        }
        if let Some(embed) = self.embed {
            response = response.embed(embed);
        }
        response
    }

    pub fn into_edit(self) -> EditInteractionResponse {
        let mut edit = EditInteractionResponse::new().components(self.components);
        if let Some(content) = self.content {
            edit = edit.content(content);
        }
        if let Some(embed) = self.embed {
            edit = edit.embed(embed);
        }
        edit
    }
}

pub fn render(reply: &Reply) -> Rendered {
    match reply {
        Reply::Text(text) | Reply::Notice { text, .. } => Rendered {
            content: Some(text.clone()),
            ..Default::default()
        },
        Reply::Enqueued(enqueued) => Rendered {
            embed: Some(embeds::enqueued_embed(enqueued)),
            ..Default::default()
        },
        Reply::Queue(info) => Rendered {
            embed: Some(embeds::queue_embed(info, QUEUE_PAGE_SIZE)),
            ..Default::default()
        },
        Reply::NowPlaying(now) => Rendered {
            embed: Some(embeds::now_playing_embed(now)),
            components: buttons::control_rows(now.loop_track, now.repeat),
            ..Default::default()
        },
    }
}
