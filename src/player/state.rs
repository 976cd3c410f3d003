//! Player state for randplay
//!
//! Play history, favorites and the progress tracker that reconciles engine
//! position polls with user seeks.

use crate::player::{PlaylistEntry, Progress};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Maximum number of history records kept
pub const HISTORY_LIMIT: usize = 100;

/// Polls closer than this to a seek target count as "seek landed"
const SEEK_TOLERANCE_MS: u64 = 1000;

/// One play start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    /// Entry that started playing
    #[serde(rename = "url")]
    pub entry: PlaylistEntry,

    /// Local wall-clock time of the play start
    pub timestamp: NaiveDateTime,

    /// Playlist index at play time
    pub index: usize,
}

impl HistoryRecord {
    pub fn now(entry: PlaylistEntry, index: usize) -> Self {
        Self {
            entry,
            timestamp: chrono::Local::now().naive_local(),
            index,
        }
    }
}

/// Play history bounded to the most recent [`HISTORY_LIMIT`] records
///
/// Oldest records are evicted first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<HistoryRecord>", into = "Vec<HistoryRecord>")]
pub struct History {
    records: VecDeque<HistoryRecord>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: HistoryRecord) {
        self.records.push_back(record);
        while self.records.len() > HISTORY_LIMIT {
            self.records.pop_front();
        }
    }

    /// Records, oldest first
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<HistoryRecord>> for History {
    fn from(records: Vec<HistoryRecord>) -> Self {
        let mut history = History::new();
        for record in records {
            history.push(record);
        }
        history
    }
}

impl From<History> for Vec<HistoryRecord> {
    fn from(history: History) -> Self {
        history.records.into()
    }
}

/// Favorite entries in insertion order, without duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PlaylistEntry>", into = "Vec<PlaylistEntry>")]
pub struct Favorites {
    entries: Vec<PlaylistEntry>,
}

impl Favorites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry; returns false if it was already present
    pub fn insert(&mut self, entry: PlaylistEntry) -> bool {
        if self.entries.contains(&entry) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn contains(&self, entry: &PlaylistEntry) -> bool {
        self.entries.contains(entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlaylistEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<Vec<PlaylistEntry>> for Favorites {
    fn from(entries: Vec<PlaylistEntry>) -> Self {
        let mut favorites = Favorites::new();
        for entry in entries {
            favorites.insert(entry);
        }
        favorites
    }
}

impl From<Favorites> for Vec<PlaylistEntry> {
    fn from(favorites: Favorites) -> Self {
        favorites.entries
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingSeek {
    target_ms: u64,
    issued_at: Instant,
}

/// Last known position and duration
///
/// Engines keep reporting the pre-seek position for a short while after a
/// seek. Until a poll lands near the target, or `grace` has passed, the seek
/// target is reported instead so the progress display does not jump back.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    position_ms: u64,
    duration_ms: u64,
    pending_seek: Option<PendingSeek>,
    grace: Duration,
}

impl ProgressTracker {
    pub fn new(grace: Duration) -> Self {
        Self {
            position_ms: 0,
            duration_ms: 0,
            pending_seek: None,
            grace,
        }
    }

    /// Record a user seek
    pub fn seek_issued(&mut self, target_ms: u64, now: Instant) {
        self.position_ms = target_ms;
        self.pending_seek = Some(PendingSeek { target_ms, issued_at: now });
    }

    /// Fold an engine poll into the tracked progress
    pub fn reconcile(
        &mut self,
        position_ms: Option<u64>,
        duration_ms: Option<u64>,
        now: Instant,
    ) -> Progress {
        if let Some(duration) = duration_ms.filter(|&d| d > 0) {
            self.duration_ms = duration;
        }

        if let Some(reported) = position_ms {
            self.position_ms = match self.pending_seek {
                Some(seek) => {
                    let landed = reported.abs_diff(seek.target_ms) <= SEEK_TOLERANCE_MS;
                    let expired = now.saturating_duration_since(seek.issued_at) >= self.grace;
                    if landed || expired {
                        self.pending_seek = None;
                        reported
                    } else {
                        seek.target_ms
                    }
                }
                None => reported,
            };
        }

        self.progress()
    }

    /// Position back to zero, duration kept
    pub fn reset_position(&mut self) {
        self.position_ms = 0;
        self.pending_seek = None;
    }

    /// Forget everything about the previous media
    pub fn reset(&mut self) {
        self.reset_position();
        self.duration_ms = 0;
    }

    pub fn progress(&self) -> Progress {
        Progress {
            position_ms: self.position_ms,
            duration_ms: self.duration_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> PlaylistEntry {
        PlaylistEntry::Remote(format!("http://x/{}.mp4", n))
    }

    #[test]
    fn test_history_fifo_eviction() {
        let mut history = History::new();
        for n in 0..(HISTORY_LIMIT + 5) {
            history.push(HistoryRecord::now(entry(n), n));
        }

        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.iter().next().unwrap().index, 5);
        assert_eq!(history.iter().last().unwrap().index, HISTORY_LIMIT + 4);
    }

    #[test]
    fn test_history_reads_original_timestamps() {
        let json = r#"[{"url": "http://x/1.mp4", "timestamp": "2024-05-01T10:20:30.123456", "index": 0}]"#;
        let history: History = serde_json::from_str(json).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history.iter().next().unwrap().entry, entry(1));
    }

    #[test]
    fn test_favorites_set_semantics() {
        let mut favorites = Favorites::new();
        assert!(favorites.insert(entry(1)));
        assert!(favorites.insert(entry(2)));
        assert!(!favorites.insert(entry(1)));

        let order: Vec<_> = favorites.iter().cloned().collect();
        assert_eq!(order, vec![entry(1), entry(2)]);
    }

    #[test]
    fn test_progress_follows_polls() {
        let mut tracker = ProgressTracker::new(Duration::from_millis(1500));
        let now = Instant::now();

        let progress = tracker.reconcile(Some(2_000), Some(120_000), now);
        assert_eq!(progress, Progress { position_ms: 2_000, duration_ms: 120_000 });

        // Missing duration keeps the last known one
        let progress = tracker.reconcile(Some(2_500), None, now);
        assert_eq!(progress.duration_ms, 120_000);
    }

    #[test]
    fn test_stale_poll_after_seek_is_masked() {
        let mut tracker = ProgressTracker::new(Duration::from_millis(1500));
        let start = Instant::now();
        tracker.reconcile(Some(2_000), Some(120_000), start);

        tracker.seek_issued(60_000, start);
        let progress = tracker.reconcile(Some(2_500), Some(120_000), start + Duration::from_millis(500));
        assert_eq!(progress.position_ms, 60_000);

        let progress = tracker.reconcile(Some(60_400), Some(120_000), start + Duration::from_millis(900));
        assert_eq!(progress.position_ms, 60_400);

        // Once landed, later polls are trusted again
        let progress = tracker.reconcile(Some(3_000), Some(120_000), start + Duration::from_millis(1000));
        assert_eq!(progress.position_ms, 3_000);
    }

    #[test]
    fn test_seek_grace_expires() {
        let mut tracker = ProgressTracker::new(Duration::from_millis(1500));
        let start = Instant::now();
        tracker.seek_issued(60_000, start);

        let progress = tracker.reconcile(Some(5_000), Some(120_000), start + Duration::from_millis(2000));
        assert_eq!(progress.position_ms, 5_000);
    }

    #[test]
    fn test_reset() {
        let mut tracker = ProgressTracker::new(Duration::from_millis(1500));
        tracker.reconcile(Some(9_000), Some(10_000), Instant::now());

        tracker.reset_position();
        assert_eq!(tracker.progress(), Progress { position_ms: 0, duration_ms: 10_000 });

        tracker.reset();
        assert_eq!(tracker.progress(), Progress { position_ms: 0, duration_ms: 0 });
    }
}
