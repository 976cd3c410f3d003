//! randplay - a random video player
//!
//! The library holds the playback controller and everything it talks to:
//! the source of new videos, the playback engine, downloads and JSON
//! persistence. The binary wires them to a line-oriented front end.

pub mod download;
pub mod engine;
pub mod persistence;
pub mod player;
pub mod source;
pub mod utils;

pub use player::{
    ControllerOptions, PlaybackController, PlaybackState, PlayerCommand, PlayerEvent,
    PlayerHandle, PlayerLoop,
};
pub use utils::{Config, RandplayError, Result};
