use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};

use crate::{
    audio::{
        queue::QueueInfo,
        track::{format_duration, Track},
    },
    ui::{Enqueued, NowPlaying},
};

/// Standard colour palette
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
}

const STANDARD_FOOTER: &str = "🎵 Open Queue";

fn duration_label(track: &Track) -> String {
    if track.is_live() {
        "🔴 Live".to_string()
    } else {
        format_duration(track.duration())
    }
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "✅ On"
    } else {
        "❌ Off"
    }
}

/// Control message posted when a track starts.
pub fn now_playing_embed(now: &NowPlaying) -> CreateEmbed {
    let track = &now.track;
    let mut embed = CreateEmbed::default()
        .title("🎵 Now Playing")
        .description(format!("**[{}]({})**", track.title(), track.url()))
        .color(colors::MUSIC_PURPLE)
        .field("⏱️ Duration", duration_label(track), true)
        .field("👤 Requested by", format!("<@{}>", track.requested_by()), true)
        .field("📋 Up next", now.pending.to_string(), true)
        .field("🔂 Loop", on_off(now.loop_track), true)
        .field("🔁 Repeat", on_off(now.repeat), true);

    if let Some(thumbnail) = track.thumbnail() {
        embed = embed.thumbnail(thumbnail);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

pub fn enqueued_embed(enqueued: &Enqueued) -> CreateEmbed {
    let embed = CreateEmbed::default()
        .title("Enqueued")
        .color(colors::SUCCESS_GREEN);

    match enqueued {
        Enqueued::Track(track) => {
            let embed = embed.description(format!("Enqueued song **{}**", track.title()));
            match track.thumbnail() {
                Some(thumbnail) => embed.thumbnail(thumbnail),
                None => embed,
            }
        }
        Enqueued::Playlist {
            title,
            thumbnail,
            count,
        } => {
            let embed =
                embed.description(format!("Enqueued  **{}** songs from playlist **{}**", count, title));
            match thumbnail {
                Some(thumbnail) => embed.thumbnail(thumbnail),
                None => embed,
            }
        }
        Enqueued::Spotify { count } => {
            embed.description(format!("Enqueued  **{}** songs from spotify playlist", count))
        }
    }
}

/// Current track, flags and the first page of pending tracks.
pub fn queue_embed(info: &QueueInfo, per_page: usize) -> CreateEmbed {
    let page = info.page(1, per_page);

    let current = match &info.current {
        Some(track) => {
            let state = if info.paused { "⏸️" } else { "▶️" };
            format!("{} **{}** `{}`", state, track.title(), duration_label(track))
        }
        None => "Nothing is playing".to_string(),
    };

    let mut lines: Vec<String> = page
        .items
        .iter()
        .enumerate()
        .map(|(i, track)| {
            format!(
                "`{}.` {} `{}`",
                page.offset + i + 1,
                track.title(),
                duration_label(track)
            )
        })
        .collect();

    if info.items.len() > page.items.len() {
        lines.push(format!("... and {} more", info.items.len() - page.items.len()));
    }

    let pending = if lines.is_empty() {
        "The queue is empty".to_string()
    } else {
        lines.join("\n")
    };

    CreateEmbed::default()
        .title("📋 Queue")
        .color(colors::INFO_BLUE)
        .field("Now playing", current, false)
        .field("Up next", pending, false)
        .field("🔂 Loop", on_off(info.loop_track), true)
        .field("🔁 Repeat", on_off(info.repeat), true)
        .field(
            "📊 Total",
            format!("{} tracks, {}", info.items.len(), format_duration(info.total_duration)),
            true,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}
