//! Configuration management for randplay
//!
//! Handles loading the application configuration from a TOML file and
//! environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::player::PlaybackSettings;
use crate::utils::error::{IntoConfigError, RandplayError, Result};

/// Endpoint returning `{"mp4_video": "<url>"}`
pub const DEFAULT_ENDPOINT: &str = "https://api.kuleu.com/api/MP4_xiaojiejie?type=json";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote source configuration
    pub api: ApiConfig,

    /// Download configuration
    pub download: DownloadConfig,

    /// Playback behaviour
    pub playback: PlaybackConfig,

    /// Playback engine selection
    pub engine: EngineConfig,

    /// General application settings
    pub general: GeneralConfig,
}

/// Remote source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// JSON endpoint returning one video URL per request
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Name of the JSON field carrying the URL
    pub url_field: String,
}

/// Download configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Target directory, created on first download
    pub directory: PathBuf,

    /// Connect and per-read timeout in seconds; the whole transfer is unbounded
    pub timeout_secs: u64,
}

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    pub loop_single: bool,
    pub loop_playlist: bool,
    pub auto_play: bool,
    pub shuffle: bool,

    /// Initial volume (0 - 100)
    pub volume: u8,

    /// Progress polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// How long a seek target overrides stale engine positions
    pub seek_grace_ms: u64,
}

/// Which engine implementation to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Clock-driven engine without any output
    Headless,

    /// External player process
    External,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub kind: EngineKind,

    /// External player executable
    pub command: String,

    /// Extra arguments placed before the media location
    pub args: Vec<String>,

    /// Flag taking a start offset in seconds
    pub seek_flag: String,

    /// Flag taking a volume level (0 - 100)
    pub volume_flag: String,

    /// Executable printing the media duration in seconds, empty to disable
    pub probe_command: String,

    /// Media length reported by the headless engine
    pub nominal_duration_secs: u64,
}

/// General application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,

    /// History and favorites document
    pub data_file: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 10,
            url_field: "mp4_video".to_string(),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("downloaded_videos"),
            timeout_secs: 30,
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        let settings = PlaybackSettings::default();
        Self {
            loop_single: settings.loop_single,
            loop_playlist: settings.loop_playlist,
            auto_play: settings.auto_play,
            shuffle: settings.shuffle,
            volume: 100,
            poll_interval_ms: 500,
            seek_grace_ms: 1500,
        }
    }
}

impl PlaybackConfig {
    /// Initial toggle state for the controller
    pub fn settings(&self) -> PlaybackSettings {
        PlaybackSettings {
            loop_single: self.loop_single,
            loop_playlist: self.loop_playlist,
            auto_play: self.auto_play,
            shuffle: self.shuffle,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: EngineKind::External,
            command: "ffplay".to_string(),
            args: vec![
                "-autoexit".to_string(),
                "-loglevel".to_string(),
                "quiet".to_string(),
            ],
            seek_flag: "-ss".to_string(),
            volume_flag: "-volume".to_string(),
            probe_command: "ffprobe".to_string(),
            nominal_duration_secs: 60,
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_file: PathBuf::from("player_data.json"),
        }
    }
}

impl Config {
    /// Load configuration
    ///
    /// Sources, later ones overriding earlier:
    /// 1. Default values
    /// 2. `path` if given, else the user config file
    ///    (~/.config/randplay/config.toml on Linux)
    /// 3. Environment variables (RANDPLAY_* prefix)
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::user_config_path() {
                Some(user_path) if user_path.exists() => Self::from_file(&user_path)?,
                _ => Self::default(),
            },
        };

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to the user config file
    pub fn save(&self) -> Result<()> {
        let path = Self::user_config_path()
            .ok_or_else(|| RandplayError::Config("Cannot determine user config path".to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).config_err("Failed to create config directory")?;
        }

        let toml = toml::to_string_pretty(self).config_err("Failed to serialize config")?;
        std::fs::write(&path, toml).config_err("Failed to write config file")?;

        Ok(())
    }

    /// Parse a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).config_err("Failed to read config file")?;
        toml::from_str(&contents).config_err("Failed to parse config file")
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(endpoint) = std::env::var("RANDPLAY_ENDPOINT") {
            self.api.endpoint = endpoint;
        }

        if let Ok(volume) = std::env::var("RANDPLAY_VOLUME") {
            self.playback.volume = volume.parse().config_err("Invalid RANDPLAY_VOLUME")?;
        }

        if let Ok(dir) = std::env::var("RANDPLAY_DOWNLOAD_DIR") {
            self.download.directory = PathBuf::from(dir);
        }

        if let Ok(log_level) = std::env::var("RANDPLAY_LOG_LEVEL") {
            self.general.log_level = log_level;
        }

        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.api.endpoint.trim().is_empty() {
            return Err(RandplayError::Config("API endpoint must not be empty".to_string()));
        }

        if self.api.url_field.is_empty() {
            return Err(RandplayError::Config("API url_field must not be empty".to_string()));
        }

        if self.playback.volume > 100 {
            return Err(RandplayError::Config("Volume must be between 0 and 100".to_string()));
        }

        if !(500..=1000).contains(&self.playback.poll_interval_ms) {
            return Err(RandplayError::Config(
                "Poll interval must be between 500 and 1000 ms".to_string(),
            ));
        }

        if self.engine.kind == EngineKind::External && self.engine.command.trim().is_empty() {
            return Err(RandplayError::Config("External engine command must not be empty".to_string()));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&self.general.log_level.as_str()) {
            return Err(RandplayError::Config(format!(
                "Invalid log level '{}', must be one of: {:?}",
                self.general.log_level,
                valid_log_levels
            )));
        }

        Ok(())
    }

    /// User config file path
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("randplay").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.url_field, "mp4_video");
        assert_eq!(config.download.directory, PathBuf::from("downloaded_videos"));
        assert_eq!(config.playback.volume, 100);
        assert!(config.playback.loop_playlist);
        assert!(!config.playback.loop_single);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.playback.poll_interval_ms = 100;
        assert!(config.validate().is_err());

        config.playback.poll_interval_ms = 750;
        config.playback.volume = 150;
        assert!(config.validate().is_err());

        config.playback.volume = 50;
        config.general.log_level = "loud".to_string();
        assert!(config.validate().is_err());

        config.general.log_level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[playback]\nshuffle = true\nvolume = 40\n\n[engine]\nkind = \"headless\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert!(config.playback.shuffle);
        assert_eq!(config.playback.volume, 40);
        assert_eq!(config.playback.poll_interval_ms, 500);
        assert_eq!(config.engine.kind, EngineKind::Headless);
        assert_eq!(config.api.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&toml).unwrap();

        assert_eq!(config.api.endpoint, deserialized.api.endpoint);
        assert_eq!(config.engine.kind, deserialized.engine.kind);
        assert_eq!(config.playback.seek_grace_ms, deserialized.playback.seek_grace_ms);
    }
}
