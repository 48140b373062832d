pub mod spotify;
pub mod youtube;

use async_trait::async_trait;
use futures::future::join_all;
use serenity::model::id::UserId;
use tracing::{info, warn};

use crate::{audio::track::Track, config::Config, error::ResolutionError};

pub use spotify::SpotifyClient;
pub use youtube::YouTubeClient;

/// A YouTube playlist found by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playlist {
    pub title: String,
    pub thumbnail: Option<String>,
    pub tracks: Vec<Track>,
}

/// Turns user input into playable tracks. Every method may suspend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackResolver: Send + Sync {
    /// Best match for a title, or the video behind a URL.
    async fn resolve_search(&self, query: &str, requested_by: UserId) -> Result<Track, ResolutionError>;

    /// Every track of a Spotify track, album or playlist link, each looked
    /// up on YouTube. Tracks that cannot be found are left out.
    async fn resolve_link(&self, url: &str, requested_by: UserId) -> Result<Vec<Track>, ResolutionError>;

    /// The first playlist matching `name`.
    async fn resolve_playlist(&self, name: &str, requested_by: UserId) -> Result<Playlist, ResolutionError>;
}

/// What a member asked to be enqueued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Search(String),
    Playlist(String),
    Spotify(String),
}

/// Outcome of a [`Lookup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Single(Track),
    Playlist(Playlist),
    Spotify(Vec<Track>),
}

impl Lookup {
    pub async fn run(
        &self,
        resolver: &dyn TrackResolver,
        requested_by: UserId,
    ) -> Result<Resolved, ResolutionError> {
        match self {
            Self::Search(query) => resolver
                .resolve_search(query, requested_by)
                .await
                .map(Resolved::Single),
            Self::Playlist(name) => resolver
                .resolve_playlist(name, requested_by)
                .await
                .map(Resolved::Playlist),
            Self::Spotify(url) => resolver
                .resolve_link(url, requested_by)
                .await
                .map(Resolved::Spotify),
        }
    }
}

impl Resolved {
    pub fn tracks(&self) -> &[Track] {
        match self {
            Self::Single(track) => std::slice::from_ref(track),
            Self::Playlist(playlist) => &playlist.tracks,
            Self::Spotify(tracks) => tracks,
        }
    }

    pub fn into_tracks(self) -> Vec<Track> {
        match self {
            Self::Single(track) => vec![track],
            Self::Playlist(playlist) => playlist.tracks,
            Self::Spotify(tracks) => tracks,
        }
    }
}

/// yt-dlp for YouTube, embed scraping for Spotify.
pub struct SourceManager {
    youtube: YouTubeClient,
    spotify: SpotifyClient,
    max_playlist_size: usize,
}

impl SourceManager {
    pub fn new(config: &Config) -> Self {
        Self {
            youtube: YouTubeClient::new(config.ytdlp_path.clone()),
            spotify: SpotifyClient::new(reqwest::Client::new()),
            max_playlist_size: config.max_playlist_size,
        }
    }

    /// Reports the yt-dlp version, failing if the binary is unusable.
    pub async fn verify_dependencies(&self) -> Result<String, ResolutionError> {
        self.youtube.version().await
    }
}

#[async_trait]
impl TrackResolver for SourceManager {
    async fn resolve_search(&self, query: &str, requested_by: UserId) -> Result<Track, ResolutionError> {
        self.youtube.search_one(query, requested_by).await
    }

    async fn resolve_link(&self, url: &str, requested_by: UserId) -> Result<Vec<Track>, ResolutionError> {
        let listed = self.spotify.tracks(url).await?;
        let queries: Vec<String> = listed
            .iter()
            .take(self.max_playlist_size)
            .map(|track| track.search_query())
            .collect();

        let results = join_all(
            queries
                .iter()
                .map(|query| self.youtube.search_one(query, requested_by)),
        )
        .await;

        // Keeps the Spotify order
        let mut tracks = Vec::with_capacity(results.len());
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(track) => tracks.push(track),
                Err(e) => warn!("⚠️ No YouTube match for {}: {}", query, e),
            }
        }

        if tracks.is_empty() {
            return Err(ResolutionError::SongNotFound);
        }

        info!("🟢 Resolved {} of {} Spotify tracks", tracks.len(), queries.len());
        Ok(tracks)
    }

    async fn resolve_playlist(&self, name: &str, requested_by: UserId) -> Result<Playlist, ResolutionError> {
        let hit = self
            .youtube
            .find_playlist(name)
            .await?
            .ok_or(ResolutionError::PlaylistNotFound)?;

        let tracks = self
            .youtube
            .playlist_tracks(&hit.url, self.max_playlist_size, requested_by)
            .await?;

        if tracks.is_empty() {
            return Err(ResolutionError::PlaylistNotFound);
        }

        Ok(Playlist {
            title: hit.title,
            thumbnail: hit.thumbnail,
            tracks,
        })
    }
}
