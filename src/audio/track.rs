use serenity::model::id::UserId;
use std::time::Duration;

/// Normalized metadata for one playable item.
///
/// Tracks are immutable once built; a live stream or an entry without
/// metadata carries a zero duration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    title: String,
    duration: Duration,
    thumbnail: Option<String>,
    url: String,
    requested_by: UserId,
}

impl Track {
    pub fn new(title: impl Into<String>, url: impl Into<String>, requested_by: UserId) -> Self {
        Self {
            title: title.into(),
            duration: Duration::ZERO,
            thumbnail: None,
            url: url.into(),
            requested_by,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    pub fn is_live(&self) -> bool {
        self.duration.is_zero()
    }
}

/// Formats a duration as `m:ss` or `h:mm:ss`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}
