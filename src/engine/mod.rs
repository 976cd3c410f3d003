//! Playback engine module for randplay
//!
//! The engine decodes and renders media; the controller only sees this
//! trait. End-of-media is pushed as an [`EngineEvent`] onto the channel the
//! controller subscribes with, so the event loop handles it in turn with user
//! intents instead of from an engine callback.

mod clock;
mod process;

pub use clock::ClockEngine;
pub use process::ExternalEngine;

use crate::player::PlaylistEntry;
use crate::utils::config::{EngineConfig, EngineKind};
use crate::utils::error::EngineError;
use crossbeam_channel::Sender;
use std::time::Duration;

/// Identifies one successful `open()`; every open gets a new id
pub type MediaId = u64;

/// Asynchronous engine notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    /// The media opened as `media` played to its end
    Ended { media: MediaId },
}

/// Media engine interface
pub trait PlaybackEngine: Send {
    /// Route engine events into `events`
    fn subscribe(&mut self, events: Sender<EngineEvent>);

    /// Stop sending events
    fn unsubscribe(&mut self);

    /// Load a media location, replacing whatever was open
    ///
    /// The returned id tags the events of this media.
    fn open(&mut self, entry: &PlaylistEntry) -> Result<MediaId, EngineError>;

    /// Start playback of the open media from its current offset
    fn start(&mut self) -> Result<(), EngineError>;

    fn pause(&mut self) -> Result<(), EngineError>;

    fn resume(&mut self) -> Result<(), EngineError>;

    fn stop(&mut self) -> Result<(), EngineError>;

    /// Elapsed time, `None` when nothing is open
    fn position_ms(&mut self) -> Option<u64>;

    /// Total length, `None` while unknown
    fn duration_ms(&mut self) -> Option<u64>;

    /// Absolute seek
    fn seek_ms(&mut self, position_ms: u64) -> Result<(), EngineError>;

    /// Volume level (0 - 100)
    fn set_volume(&mut self, level: u8) -> Result<(), EngineError>;
}

/// Build the engine selected by the configuration
pub fn from_config(config: &EngineConfig) -> Box<dyn PlaybackEngine> {
    match config.kind {
        EngineKind::Headless => Box::new(ClockEngine::new(Duration::from_secs(
            config.nominal_duration_secs,
        ))),
        EngineKind::External => Box::new(ExternalEngine::new(config.clone())),
    }
}
