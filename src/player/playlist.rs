//! Playlist state for randplay
//!
//! An ordered, append-only list of entries plus the index of the entry that is
//! (or is about to be) playing.

use crate::utils::error::PlaylistError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// One playable unit
///
/// Serialized as a plain string: remote entries keep their URL, local entries
/// their path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlaylistEntry {
    /// http(s) URL
    Remote(String),

    /// File on the local filesystem
    Local(PathBuf),
}

impl PlaylistEntry {
    /// Build an entry from a URL or a path string
    pub fn parse(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            PlaylistEntry::Remote(location.to_string())
        } else {
            PlaylistEntry::Local(PathBuf::from(location))
        }
    }

    pub fn local(path: impl AsRef<Path>) -> Self {
        PlaylistEntry::Local(path.as_ref().to_path_buf())
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, PlaylistEntry::Remote(_))
    }

    /// Location string handed to engines
    pub fn location(&self) -> String {
        match self {
            PlaylistEntry::Remote(url) => url.clone(),
            PlaylistEntry::Local(path) => path.to_string_lossy().into_owned(),
        }
    }
}

impl From<String> for PlaylistEntry {
    fn from(location: String) -> Self {
        PlaylistEntry::parse(&location)
    }
}

impl From<PlaylistEntry> for String {
    fn from(entry: PlaylistEntry) -> Self {
        entry.location()
    }
}

impl fmt::Display for PlaylistEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.location())
    }
}

/// Ordered entries and the current selection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaylistState {
    entries: Vec<PlaylistEntry>,
    current_index: Option<usize>,
}

impl PlaylistState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted parts
    ///
    /// The index must be `None` or point into `entries`.
    pub fn restore(
        entries: Vec<PlaylistEntry>,
        current_index: Option<usize>,
    ) -> Result<Self, PlaylistError> {
        if let Some(index) = current_index {
            if index >= entries.len() {
                return Err(PlaylistError::OutOfRange { index: index as isize, len: entries.len() });
            }
        }
        Ok(Self { entries, current_index })
    }

    pub fn append(&mut self, entry: PlaylistEntry) {
        self.entries.push(entry);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.current_index = None;
    }

    /// Select an entry
    ///
    /// `None` (nothing selected, persisted as -1) is only accepted while the
    /// playlist is empty.
    pub fn set_index(&mut self, index: Option<usize>) -> Result<(), PlaylistError> {
        let len = self.entries.len();
        match index {
            None if len == 0 => {
                self.current_index = None;
                Ok(())
            }
            None => Err(PlaylistError::OutOfRange { index: -1, len }),
            Some(i) if i < len => {
                self.current_index = Some(i);
                Ok(())
            }
            Some(i) => Err(PlaylistError::OutOfRange { index: i as isize, len }),
        }
    }

    /// The selected entry, re-validated against the current contents
    pub fn current(&self) -> Result<&PlaylistEntry, PlaylistError> {
        self.current_index
            .and_then(|i| self.entries.get(i))
            .ok_or(PlaylistError::NoCurrentEntry)
    }

    /// Index of the selected entry if it is still valid
    pub fn valid_index(&self) -> Option<usize> {
        self.current_index.filter(|&i| i < self.entries.len())
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current_index
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PlaylistEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
