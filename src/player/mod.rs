//! Player module for randplay
//!
//! The playback controller owns the playlist, settings, history and favorites
//! and drives the engine; the event loop feeds it user intents, engine
//! notifications and progress polls one at a time.

mod controller;
mod event_loop;
mod playlist;
mod state;

pub use controller::{PlaybackController, ControllerOptions};
pub use event_loop::{PlayerCommand, PlayerHandle, PlayerLoop};
pub use playlist::{PlaylistEntry, PlaylistState};
pub use state::{Favorites, History, HistoryRecord, ProgressTracker, HISTORY_LIMIT};

use crate::utils::format_time;
use serde::{Deserialize, Serialize};

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Nothing loaded yet
    Idle,

    /// Waiting for the source provider
    Loading,

    /// Currently playing
    Playing,

    /// Playback paused
    Paused,

    /// Stopped by the user
    Stopped,
}

/// User-toggled playback behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackSettings {
    /// Replay the same entry when it ends
    pub loop_single: bool,

    /// Wrap to the first entry after the last one
    pub loop_playlist: bool,

    /// Start playing once at startup
    pub auto_play: bool,

    /// Pick the next entry at random
    #[serde(rename = "shuffle_mode", alias = "shuffle")]
    pub shuffle: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            loop_single: false,
            loop_playlist: true,
            auto_play: true,
            shuffle: false,
        }
    }
}

/// Settings that can be flipped from the front end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    LoopSingle,
    LoopPlaylist,
    Shuffle,
    AutoPlay,
}

/// Seek request
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SeekTarget {
    /// Fraction of the media duration (0.0 - 1.0)
    Fraction(f64),

    /// Absolute position in milliseconds
    Absolute(u64),
}

/// Result of a successful controller transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Playback of the entry at `index` started
    Started { index: usize },

    Paused,

    Resumed,

    Stopped,

    /// Entry at `index` was appended without playing it
    Queued { index: usize },

    /// `previous()` at the first entry; nothing changed
    AlreadyFirst,

    /// The intent does not apply in the current state
    Ignored,
}

/// Playback position snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl Progress {
    /// Position as a fraction of the duration
    pub fn fraction(&self) -> f64 {
        if self.duration_ms == 0 {
            0.0
        } else {
            (self.position_ms as f64 / self.duration_ms as f64).min(1.0)
        }
    }

    /// "MM:SS / MM:SS" label
    pub fn label(&self) -> String {
        format!(
            "{} / {}",
            format_time(self.position_ms as i64),
            format_time(self.duration_ms as i64)
        )
    }
}

/// Events published to the presentation layer
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Controller state changed
    StateChanged { state: PlaybackState },

    /// Human-readable outcome of the last intent
    Status { message: String },

    /// Periodic position update while playing
    Progress(Progress),

    /// Playlist contents or selection changed
    PlaylistChanged { len: usize, current: Option<usize> },

    /// An intent failed
    Error { message: String },

    /// The engine reached the end of the media
    EndOfMedia,

    /// Answer to a [`Listing`] request
    Listing { title: String, lines: Vec<String> },
}

/// Read-only views the front end can ask for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    Playlist,
    History,
    Favorites,
    Status,
}

/// Player event handler trait
pub trait PlayerEventHandler: Send {
    /// Handle player event
    fn handle_event(&mut self, event: &PlayerEvent);
}
