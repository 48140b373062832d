//! Spotify links without API credentials: the public embed page carries the
//! track list as JSON, which is enough to search each track on YouTube.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::{debug, info};
use url::Url;

use crate::error::ResolutionError;

static NEXT_DATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<script id="__NEXT_DATA__" type="application/json">(.+?)</script>"#)
        .expect("static regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpotifyKind {
    Track,
    Album,
    Playlist,
}

impl SpotifyKind {
    fn parse(segment: &str) -> Option<Self> {
        match segment {
            "track" => Some(Self::Track),
            "album" => Some(Self::Album),
            "playlist" => Some(Self::Playlist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Track => "track",
            Self::Album => "album",
            Self::Playlist => "playlist",
        }
    }
}

/// Name and artist of one Spotify track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpotifyTrack {
    pub name: String,
    pub artist: String,
}

impl SpotifyTrack {
    /// YouTube query used to find a playable version.
    pub fn search_query(&self) -> String {
        if self.artist.is_empty() {
            self.name.clone()
        } else {
            format!("{} by {}", self.name, self.artist)
        }
    }
}

/// Accepts `open.spotify.com/{kind}/{id}` (optionally `intl-xx/` or
/// `embed/` prefixed) and `spotify:{kind}:{id}` URIs.
pub fn parse_link(link: &str) -> Option<(SpotifyKind, String)> {
    let link = link.trim();

    if let Some(rest) = link.strip_prefix("spotify:") {
        let mut parts = rest.split(':');
        let kind = SpotifyKind::parse(parts.next()?)?;
        let id = parts.next().filter(|id| is_id(id))?;
        return Some((kind, id.to_string()));
    }

    let url = Url::parse(link).ok()?;
    if url.host_str() != Some("open.spotify.com") {
        return None;
    }

    let mut segments = url
        .path_segments()?
        .filter(|s| !s.is_empty() && !s.starts_with("intl-") && *s != "embed");
    let kind = SpotifyKind::parse(segments.next()?)?;
    let id = segments.next().filter(|id| is_id(id))?;
    Some((kind, id.to_string()))
}

fn is_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Pulls the track list out of an embed page.
pub fn extract_tracks(html: &str) -> Option<Vec<SpotifyTrack>> {
    let json = NEXT_DATA.captures(html)?.get(1)?.as_str();
    let data: Value = serde_json::from_str(json).ok()?;
    let entity = data.pointer("/props/pageProps/state/data/entity")?;

    if let Some(list) = entity.get("trackList").and_then(Value::as_array) {
        let tracks: Vec<SpotifyTrack> = list
            .iter()
            .filter_map(|item| {
                Some(SpotifyTrack {
                    name: item.get("title")?.as_str()?.to_string(),
                    artist: item
                        .get("subtitle")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                })
            })
            .collect();
        return Some(tracks);
    }

    let name = entity
        .get("name")
        .or_else(|| entity.get("title"))
        .and_then(Value::as_str)?;
    let artist = entity
        .get("artists")
        .and_then(Value::as_array)
        .and_then(|artists| artists.first())
        .and_then(|a| a.get("name"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    Some(vec![SpotifyTrack {
        name: name.to_string(),
        artist: artist.to_string(),
    }])
}

pub struct SpotifyClient {
    http: reqwest::Client,
}

impl SpotifyClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Any failure maps to `InvalidLink`, matching what the user sees for a
    /// malformed URL.
    pub async fn tracks(&self, link: &str) -> Result<Vec<SpotifyTrack>, ResolutionError> {
        let (kind, id) = parse_link(link).ok_or(ResolutionError::InvalidLink)?;
        let embed = format!("https://open.spotify.com/embed/{}/{}", kind.as_str(), id);

        info!("🟢 Fetching Spotify {} {}", kind.as_str(), id);

        let response = self
            .http
            .get(&embed)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| {
                debug!("Spotify embed request failed: {}", e);
                ResolutionError::InvalidLink
            })?;
        let html = response.text().await?;

        extract_tracks(&html)
            .filter(|tracks| !tracks.is_empty())
            .ok_or(ResolutionError::InvalidLink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page(entity: &str) -> String {
        format!(
            r#"<html><body><script id="__NEXT_DATA__" type="application/json">{{"props":{{"pageProps":{{"state":{{"data":{{"entity":{}}}}}}}}}}}</script></body></html>"#,
            entity
        )
    }

    #[test]
    fn links_are_recognised() {
        assert_eq!(
            parse_link("https://open.spotify.com/track/4uLU6hMCjMI75M1A2tKUQC?si=abc"),
            Some((SpotifyKind::Track, "4uLU6hMCjMI75M1A2tKUQC".to_string()))
        );
        assert_eq!(
            parse_link("https://open.spotify.com/intl-es/playlist/37i9dQZF1DXcBWIGoYBM5M"),
            Some((SpotifyKind::Playlist, "37i9dQZF1DXcBWIGoYBM5M".to_string()))
        );
        assert_eq!(
            parse_link("spotify:album:1DFixLWuPkv3KT3TnV35m3"),
            Some((SpotifyKind::Album, "1DFixLWuPkv3KT3TnV35m3".to_string()))
        );
    }

    #[test]
    fn foreign_or_malformed_links_are_rejected() {
        assert_eq!(parse_link("https://www.youtube.com/watch?v=x"), None);
        assert_eq!(parse_link("https://open.spotify.com/artist/abc"), None);
        assert_eq!(parse_link("https://open.spotify.com/track/"), None);
        assert_eq!(parse_link("not a url"), None);
    }

    #[test]
    fn playlist_embed_lists_tracks() {
        let html = page(
            r#"{"type":"playlist","name":"Mix","trackList":[{"title":"Song A","subtitle":"Artist A"},{"title":"Song B","subtitle":"Artist B"}]}"#,
        );

        let tracks = extract_tracks(&html).unwrap();
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[1].search_query(), "Song B by Artist B");
    }

    #[test]
    fn single_track_embed() {
        let html = page(r#"{"type":"track","name":"Solo","artists":[{"name":"Someone"}]}"#);

        assert_eq!(
            extract_tracks(&html),
            Some(vec![SpotifyTrack {
                name: "Solo".to_string(),
                artist: "Someone".to_string(),
            }])
        );
    }

    #[test]
    fn page_without_data_yields_nothing() {
        assert_eq!(extract_tracks("<html></html>"), None);
    }
}
