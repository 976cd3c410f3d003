//! Utility module for randplay
//!
//! This module provides common utilities used throughout the crate:
//! - Error handling with custom error types
//! - Configuration management
//! - Time formatting for progress labels

pub mod config;
pub mod error;

// Re-export commonly used items
pub use config::{Config, ApiConfig, DownloadConfig, PlaybackConfig, EngineConfig, EngineKind};
pub use error::{RandplayError, Result};

/// Format a millisecond position as "MM:SS"
///
/// Negative values (unknown position) render as "00:00". Minutes are not
/// wrapped into hours.
pub fn format_time(ms: i64) -> String {
    if ms < 0 {
        return "00:00".to_string();
    }
    let seconds = ms / 1000;
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Clamp a value between min and max
pub fn clamp<T: PartialOrd>(value: T, min: T, max: T) -> T {
    if value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}
