//! JSON persistence for randplay
//!
//! Two documents: a playlist file saved and loaded on request, and the
//! app-data file holding history and favorites, rewritten after every change.

use crate::player::{Favorites, History, PlaybackSettings, PlaylistEntry, PlaylistState};
use crate::utils::error::PersistError;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn no_index() -> i64 {
    -1
}

/// Saved playlist: entries, selection and toggles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistDocument {
    #[serde(default)]
    pub videos: Vec<PlaylistEntry>,

    /// Selected entry, -1 for none
    #[serde(default = "no_index")]
    pub current_index: i64,

    #[serde(default)]
    pub settings: PlaybackSettings,
}

impl PlaylistDocument {
    pub fn capture(playlist: &PlaylistState, settings: &PlaybackSettings) -> Self {
        Self {
            videos: playlist.entries().to_vec(),
            current_index: playlist.current_index().map_or(-1, |i| i as i64),
            settings: *settings,
        }
    }

    /// Validate and convert into live state
    pub fn into_state(self) -> Result<(PlaylistState, PlaybackSettings), PersistError> {
        let index = match self.current_index {
            -1 => None,
            i if i >= 0 => Some(i as usize),
            i => return Err(PersistError::Invalid(format!("current_index {} is negative", i))),
        };

        let playlist = PlaylistState::restore(self.videos, index)
            .map_err(|e| PersistError::Invalid(e.to_string()))?;

        Ok((playlist, self.settings))
    }

    pub fn save(&self, path: &Path) -> Result<(), PersistError> {
        let data = serde_json::to_string_pretty(self)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PersistError> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Contents of the app-data file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppData {
    pub history: History,
    pub favorites: Favorites,
}

#[derive(Serialize)]
struct AppDataRef<'a> {
    history: &'a History,
    favorites: &'a Favorites,
}

/// Location of the app-data file
#[derive(Debug, Clone)]
pub struct AppDataStore {
    path: PathBuf,
}

impl AppDataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the file; a missing or unreadable file yields empty data
    pub fn load(&self) -> AppData {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(data) => data,
            Err(e) => {
                debug!("No app data at {:?}: {}", self.path, e);
                return AppData::default();
            }
        };

        match serde_json::from_str(&data) {
            Ok(app_data) => app_data,
            Err(e) => {
                warn!("Ignoring unreadable app data {:?}: {}", self.path, e);
                AppData::default()
            }
        }
    }

    pub fn save(&self, history: &History, favorites: &Favorites) -> Result<(), PersistError> {
        let data = serde_json::to_string_pretty(&AppDataRef { history, favorites })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::HistoryRecord;

    fn entry(n: usize) -> PlaylistEntry {
        PlaylistEntry::Remote(format!("http://x/{}.mp4", n))
    }

    #[test]
    fn test_playlist_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.json");

        let mut playlist = PlaylistState::new();
        playlist.append(entry(0));
        playlist.append(PlaylistEntry::local("/videos/a.mp4"));
        playlist.set_index(Some(1)).unwrap();
        let settings = PlaybackSettings { loop_single: true, loop_playlist: false, auto_play: false, shuffle: true };

        PlaylistDocument::capture(&playlist, &settings).save(&path).unwrap();
        let (loaded, loaded_settings) = PlaylistDocument::load(&path).unwrap().into_state().unwrap();

        assert_eq!(loaded, playlist);
        assert_eq!(loaded_settings, settings);
    }

    #[test]
    fn test_document_uses_original_keys() {
        let doc = PlaylistDocument::capture(&PlaylistState::new(), &PlaybackSettings::default());
        let value = serde_json::to_value(&doc).unwrap();

        assert_eq!(value["current_index"], -1);
        assert!(value["videos"].as_array().unwrap().is_empty());
        assert_eq!(value["settings"]["shuffle_mode"], false);
        assert_eq!(value["settings"]["loop_playlist"], true);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let doc: PlaylistDocument = serde_json::from_str(r#"{"videos": ["http://x/0.mp4"]}"#).unwrap();
        assert_eq!(doc.current_index, -1);
        assert_eq!(doc.settings, PlaybackSettings::default());
    }

    #[test]
    fn test_invalid_index_rejected() {
        let doc: PlaylistDocument =
            serde_json::from_str(r#"{"videos": ["http://x/0.mp4"], "current_index": 4}"#).unwrap();
        assert!(matches!(doc.into_state(), Err(PersistError::Invalid(_))));

        let doc: PlaylistDocument = serde_json::from_str(r#"{"current_index": -3}"#).unwrap();
        assert!(matches!(doc.into_state(), Err(PersistError::Invalid(_))));
    }

    #[test]
    fn test_app_data_missing_or_corrupt_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppDataStore::new(dir.path().join("player_data.json"));
        assert_eq!(store.load(), AppData::default());

        std::fs::write(store.path(), "{not json").unwrap();
        assert_eq!(store.load(), AppData::default());
    }

    #[test]
    fn test_app_data_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = AppDataStore::new(dir.path().join("nested").join("player_data.json"));

        let mut history = History::new();
        history.push(HistoryRecord::now(entry(0), 0));
        let mut favorites = Favorites::new();
        favorites.insert(entry(0));

        store.save(&history, &favorites).unwrap();
        let loaded = store.load();
        assert_eq!(loaded.history, history);
        assert_eq!(loaded.favorites, favorites);
    }
}
