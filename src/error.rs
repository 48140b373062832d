//! Error taxonomy for the music queue.
//!
//! Every variant is recoverable. `Display` is the line shown to the member
//! who issued the request, so callers can reply with `err.to_string()`.

use thiserror::Error;

/// Failure of a control request, reported back to the requester.
#[derive(Debug, Error)]
pub enum MusicError {
    /// Member, guild or channel preconditions were not met.
    #[error("{0}")]
    Validation(String),

    /// Search, link or playlist lookup failed. The queue is untouched.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// The voice connection could not be established.
    #[error("> I could not join your voice channel: {0}")]
    Connection(String),

    /// Seek target out of range or rejected by the audio backend.
    #[error("{0}")]
    Seek(String),

    /// Operation not valid for the current playback state.
    #[error("{0}")]
    StateConflict(String),
}

impl MusicError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::StateConflict(message.into())
    }

    pub fn seek(message: impl Into<String>) -> Self {
        Self::Seek(message.into())
    }

    /// Short tag for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Resolution(_) => "resolution",
            Self::Connection(_) => "connection",
            Self::Seek(_) => "seek",
            Self::StateConflict(_) => "state_conflict",
        }
    }
}

/// Lookup failures from a [`TrackResolver`](crate::sources::TrackResolver).
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("The song could not be found")]
    SongNotFound,

    #[error("The playlist could not be found")]
    PlaylistNotFound,

    #[error("The Spotify url you provided appears to be invalid, make sure that you have provided a valid url for Spotify")]
    InvalidLink,

    #[error("Track lookup failed: {0}")]
    Backend(String),
}

impl From<reqwest::Error> for ResolutionError {
    fn from(err: reqwest::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

impl From<std::io::Error> for ResolutionError {
    fn from(err: std::io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

pub type MusicResult<T> = std::result::Result<T, MusicError>;
