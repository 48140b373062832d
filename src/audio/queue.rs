use rand::{seq::SliceRandom, Rng};
use std::{collections::VecDeque, time::Duration};
use tracing::{debug, info};

use crate::audio::track::Track;

/// Pending tracks in strict FIFO play order.
///
/// The currently loaded track is not part of the queue; the owning
/// session keeps it separately.
#[derive(Debug, Default)]
pub struct MusicQueue {
    items: VecDeque<Track>,
}

impl MusicQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends tracks at the tail, keeping their input order.
    pub fn extend(&mut self, tracks: impl IntoIterator<Item = Track>) -> usize {
        let before = self.items.len();
        self.items.extend(tracks);
        let added = self.items.len() - before;
        info!("➕ {} track(s) added to the queue ({} pending)", added, self.items.len());
        added
    }

    pub fn push_back(&mut self, track: Track) {
        debug!("🔁 Re-queued at tail: {}", track.title());
        self.items.push_back(track);
    }

    /// Takes the next track from the head.
    pub fn pop_next(&mut self) -> Option<Track> {
        let next = self.items.pop_front();
        match &next {
            Some(track) => debug!("➡️ Next in queue: {}", track.title()),
            None => debug!("📭 Queue is empty"),
        }
        next
    }

    /// Randomly permutes the pending tracks.
    pub fn shuffle(&mut self) {
        self.shuffle_with(&mut rand::thread_rng());
    }

    /// Fisher-Yates over the pending tracks using the given generator.
    pub fn shuffle_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.items.make_contiguous().shuffle(rng);
        info!("🔀 Queue mixed ({} pending)", self.items.len());
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    pub fn total_duration(&self) -> Duration {
        self.items.iter().map(Track::duration).sum()
    }
}

/// Snapshot of a session's queue for display.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueInfo {
    pub current: Option<Track>,
    pub items: Vec<Track>,
    pub loop_track: bool,
    pub repeat: bool,
    pub paused: bool,
    pub total_duration: Duration,
}

impl QueueInfo {
    /// One page of pending tracks, `page` counted from 1.
    pub fn page(&self, page: usize, per_page: usize) -> QueuePage {
        let per_page = per_page.max(1);
        let total_pages = self.items.len().div_ceil(per_page).max(1);
        let current_page = page.clamp(1, total_pages);
        let start = (current_page - 1) * per_page;
        let end = (start + per_page).min(self.items.len());

        QueuePage {
            offset: start,
            items: self.items[start..end].to_vec(),
            current_page,
            total_pages,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueuePage {
    /// Index of the first item of this page in the full queue.
    pub offset: usize,
    pub items: Vec<Track>,
    pub current_page: usize,
    pub total_pages: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{rngs::StdRng, SeedableRng};
    use serenity::model::id::UserId;

    fn track(n: u32) -> Track {
        Track::new(format!("T{n}"), format!("https://youtu.be/{n}"), UserId::new(1))
            .with_duration(Duration::from_secs(60))
    }

    fn titles(queue: &MusicQueue) -> Vec<String> {
        queue.iter().map(|t| t.title().to_string()).collect()
    }

    #[test]
    fn order_is_concatenation_of_inputs() {
        let mut queue = MusicQueue::new();
        queue.extend([track(1)]);
        queue.extend([track(2), track(3)]);
        queue.extend(Vec::new());
        queue.extend([track(4)]);

        assert_eq!(titles(&queue), vec!["T1", "T2", "T3", "T4"]);
        assert_eq!(queue.pop_next().map(|t| t.title().to_string()), Some("T1".into()));
        assert_eq!(queue.total_duration(), Duration::from_secs(180));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut queue = MusicQueue::new();
        queue.extend((0..20).map(track));
        let mut before = titles(&queue);

        queue.shuffle_with(&mut StdRng::seed_from_u64(42));
        let mut after = titles(&queue);

        assert_eq!(after.len(), 20);
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn pages_clamp_to_range() {
        let info = QueueInfo {
            current: None,
            items: (0..25).map(track).collect(),
            loop_track: false,
            repeat: false,
            paused: false,
            total_duration: Duration::ZERO,
        };

        let last = info.page(9, 10);
        assert_eq!(last.current_page, 3);
        assert_eq!(last.total_pages, 3);
        assert_eq!(last.offset, 20);
        assert_eq!(last.items.len(), 5);

        let empty = QueueInfo { items: Vec::new(), ..info };
        assert_eq!(empty.page(0, 10).total_pages, 1);
        assert!(empty.page(0, 10).items.is_empty());
    }
}
