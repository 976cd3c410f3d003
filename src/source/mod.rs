//! Video source module for randplay
//!
//! A source hands out one new playlist entry per call. The controller only
//! calls it when it runs out of entries; failures are reported, never retried.

mod http;

pub use http::HttpSource;

use crate::player::PlaylistEntry;
use crate::utils::error::FetchError;

/// Provider of new entries
pub trait SourceProvider: Send {
    /// Fetch one entry
    fn fetch_one(&mut self) -> Result<PlaylistEntry, FetchError>;
}

/// Pull the video URL out of an API response body
///
/// A missing, non-string or blank field is `FetchError::Empty`. The value
/// always names a remote video, even without a scheme.
pub fn parse_video_url(body: &serde_json::Value, field: &str) -> Result<PlaylistEntry, FetchError> {
    match body.get(field).and_then(|v| v.as_str()).map(str::trim) {
        Some(url) if !url.is_empty() => Ok(PlaylistEntry::Remote(url.to_string())),
        _ => Err(FetchError::Empty),
    }
}
