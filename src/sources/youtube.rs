use async_process::Command;
use regex::Regex;
use serde::Deserialize;
use serenity::model::id::UserId;
use std::{sync::LazyLock, time::Duration};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::{audio::track::Track, error::ResolutionError};

// YouTube's own "type: playlist" search filter
const PLAYLIST_FILTER: &str = "EgIQAw%253D%253D";

static YOUTUBE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(https?://)?(www\.|m\.)?(youtube\.com/(watch\?v=|embed/|v/|shorts/|playlist\?list=)|youtu\.be/|music\.youtube\.com/)",
    )
    .expect("static regex")
});

/// Playlist found by name, with its first `limit` entries.
#[derive(Debug, Clone)]
pub struct PlaylistHit {
    pub title: String,
    pub url: String,
    pub thumbnail: Option<String>,
}

/// Drives the `yt-dlp` binary for searches and metadata.
pub struct YouTubeClient {
    binary: String,
    rate_limiter: Semaphore,
}

/// One line of `yt-dlp --dump-json` output.
#[derive(Debug, Deserialize)]
pub struct YtDlpInfo {
    id: Option<String>,
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    #[serde(default)]
    thumbnails: Vec<Thumbnail>,
    webpage_url: Option<String>,
    url: Option<String>,
    #[serde(default)]
    is_live: bool,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl YtDlpInfo {
    fn link(&self) -> Option<String> {
        self.webpage_url
            .clone()
            .or_else(|| self.url.clone().filter(|u| u.starts_with("http")))
            .or_else(|| {
                self.id
                    .as_ref()
                    .map(|id| format!("https://www.youtube.com/watch?v={}", id))
            })
    }

    fn thumbnail(&self) -> Option<String> {
        self.thumbnail
            .clone()
            .or_else(|| self.thumbnails.last().map(|t| t.url.clone()))
    }

    /// `None` when the entry has no usable link.
    pub fn into_track(self, requested_by: UserId) -> Option<Track> {
        let url = self.link()?;
        let mut track = Track::new(
            self.title.clone().unwrap_or_else(|| "NaN".to_string()),
            url,
            requested_by,
        );

        // Live streams keep a zero duration
        if let Some(seconds) = self.duration.filter(|d| *d > 0.0 && !self.is_live) {
            track = track.with_duration(Duration::from_secs_f64(seconds));
        }

        if let Some(thumbnail) = self.thumbnail() {
            track = track.with_thumbnail(thumbnail);
        }

        Some(track)
    }
}

/// Parses newline-delimited JSON, skipping lines yt-dlp did not format.
pub fn parse_entries(stdout: &str) -> Vec<YtDlpInfo> {
    stdout
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<YtDlpInfo>(line) {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("Skipping unparsable yt-dlp line: {}", e);
                None
            }
        })
        .collect()
}

impl YouTubeClient {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            // Limit concurrent yt-dlp processes
            rate_limiter: Semaphore::new(3),
        }
    }

    pub fn is_youtube_url(url: &str) -> bool {
        YOUTUBE_URL.is_match(url)
    }

    /// YouTube links are fetched as-is, anything else becomes a search.
    fn search_target(query: &str) -> String {
        if Self::is_youtube_url(query) {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ResolutionError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolutionError::Backend(e.to_string()))?;

        let output = Command::new(&self.binary).args(args).output().await?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp error: {}", error.trim());
            return Err(ResolutionError::Backend(format!("yt-dlp exited with {}", output.status)));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Best match for a title or the video behind a URL.
    pub async fn search_one(&self, query: &str, requested_by: UserId) -> Result<Track, ResolutionError> {
        let target = Self::search_target(query);

        info!("🔍 Searching YouTube: {}", query);

        let stdout = self
            .run(&[
                "--no-playlist",
                "--dump-json",
                "--flat-playlist",
                "--skip-download",
                "--no-warnings",
                &target,
            ])
            .await?;

        parse_entries(&stdout)
            .into_iter()
            .find_map(|info| info.into_track(requested_by))
            .ok_or(ResolutionError::SongNotFound)
    }

    /// First playlist whose search result matches `name`.
    pub async fn find_playlist(&self, name: &str) -> Result<Option<PlaylistHit>, ResolutionError> {
        let url = format!(
            "https://www.youtube.com/results?search_query={}&sp={}",
            urlencoding::encode(name),
            PLAYLIST_FILTER
        );

        info!("📋 Searching playlist: {}", name);

        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-json",
                "--playlist-items",
                "1",
                "--no-warnings",
                &url,
            ])
            .await?;

        Ok(parse_entries(&stdout).into_iter().find_map(|info| {
            let thumbnail = info.thumbnail();
            let title = info.title.clone().unwrap_or_else(|| name.to_string());
            info.link().map(|url| PlaylistHit { title, url, thumbnail })
        }))
    }

    /// Up to `limit` entries of the playlist at `url`.
    pub async fn playlist_tracks(
        &self,
        url: &str,
        limit: usize,
        requested_by: UserId,
    ) -> Result<Vec<Track>, ResolutionError> {
        let stdout = self
            .run(&[
                "--flat-playlist",
                "--dump-json",
                "--playlist-end",
                &limit.to_string(),
                "--no-warnings",
                url,
            ])
            .await?;

        Ok(parse_entries(&stdout)
            .into_iter()
            .filter_map(|info| info.into_track(requested_by))
            .take(limit)
            .collect())
    }

    /// `yt-dlp --version`, for the health check.
    pub async fn version(&self) -> Result<String, ResolutionError> {
        Ok(self.run(&["--version"]).await?.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SEARCH_LINE: &str = r#"{"id":"dQw4w9WgXcQ","title":"Never Gonna Give You Up","duration":212.0,"thumbnails":[{"url":"https://i.ytimg.com/small.jpg"},{"url":"https://i.ytimg.com/big.jpg"}],"url":"https://www.youtube.com/watch?v=dQw4w9WgXcQ"}"#;

    #[test]
    fn test_youtube_url_detection() {
        assert!(YouTubeClient::is_youtube_url("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(YouTubeClient::is_youtube_url("https://youtu.be/dQw4w9WgXcQ"));
        assert!(YouTubeClient::is_youtube_url("https://music.youtube.com/watch?v=x"));
        assert!(!YouTubeClient::is_youtube_url("https://open.spotify.com/track/abc"));
        assert!(!YouTubeClient::is_youtube_url("never gonna give you up"));
    }

    #[test]
    fn only_youtube_links_skip_the_search() {
        assert_eq!(
            YouTubeClient::search_target("https://youtu.be/dQw4w9WgXcQ"),
            "https://youtu.be/dQw4w9WgXcQ"
        );
        assert_eq!(
            YouTubeClient::search_target("never gonna give you up"),
            "ytsearch1:never gonna give you up"
        );
        assert_eq!(
            YouTubeClient::search_target("https://open.spotify.com/track/abc"),
            "ytsearch1:https://open.spotify.com/track/abc"
        );
    }

    #[test]
    fn flat_search_entry_becomes_track() {
        let entries = parse_entries(SEARCH_LINE);
        assert_eq!(entries.len(), 1);

        let track = entries.into_iter().next().unwrap().into_track(UserId::new(5)).unwrap();
        assert_eq!(track.title(), "Never Gonna Give You Up");
        assert_eq!(track.url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
        assert_eq!(track.duration(), Duration::from_secs(212));
        assert_eq!(track.thumbnail(), Some("https://i.ytimg.com/big.jpg"));
        assert_eq!(track.requested_by(), UserId::new(5));
    }

    #[test]
    fn garbage_lines_are_skipped() {
        let stdout = format!("WARNING: something\n\n{}\n{{broken", SEARCH_LINE);
        assert_eq!(parse_entries(&stdout).len(), 1);
    }

    #[test]
    fn live_and_untitled_entries() {
        let info: YtDlpInfo =
            serde_json::from_str(r#"{"id":"live1","duration":null,"is_live":true}"#).unwrap();
        let track = info.into_track(UserId::new(1)).unwrap();

        assert_eq!(track.title(), "NaN");
        assert_eq!(track.url(), "https://www.youtube.com/watch?v=live1");
        assert!(track.is_live());
    }

    #[test]
    fn entry_without_link_is_dropped() {
        let info: YtDlpInfo = serde_json::from_str(r#"{"title":"orphan"}"#).unwrap();
        assert!(info.into_track(UserId::new(1)).is_none());
    }
}
