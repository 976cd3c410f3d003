//! Playback controller for randplay
//!
//! The controller owns the playlist, the toggles, history and favorites, and
//! is the only component talking to the engine. Every operation either
//! completes a transition or leaves the state as it was and returns a
//! `ControlError`; the outcome is also recorded as a status line and as
//! [`PlayerEvent`]s for the presentation layer.

use crate::download::{download_path, Downloader};
use crate::engine::{EngineEvent, MediaId, PlaybackEngine};
use crate::persistence::{AppDataStore, PlaylistDocument};
use crate::player::{
    Favorites, History, HistoryRecord, PlaybackSettings, PlaybackState, PlayerEvent,
    PlaylistEntry, PlaylistState, Progress, ProgressTracker, SeekTarget, Toggle, Transition,
};
use crate::source::SourceProvider;
use crate::utils::clamp;
use crate::utils::error::{ControlError, ControlResult, DownloadError, PlaylistError};

use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

/// Construction options
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Initial toggles
    pub settings: PlaybackSettings,

    /// Initial volume (0 - 100)
    pub volume: u8,

    /// How long a seek target masks stale position polls
    pub seek_grace: Duration,

    /// Where downloads are written
    pub download_dir: PathBuf,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        Self {
            settings: PlaybackSettings::default(),
            volume: 100,
            seek_grace: Duration::from_millis(1500),
            download_dir: PathBuf::from("downloaded_videos"),
        }
    }
}

/// Main playback controller
pub struct PlaybackController {
    // Collaborators
    engine: Box<dyn PlaybackEngine>,
    source: Box<dyn SourceProvider>,
    downloader: Box<dyn Downloader>,
    store: Option<AppDataStore>,

    // Owned state
    playlist: PlaylistState,
    settings: PlaybackSettings,
    history: History,
    favorites: Favorites,
    state: PlaybackState,
    is_playing: bool,
    volume: u8,
    progress: ProgressTracker,
    download_dir: PathBuf,
    status: String,

    // Engine id of the media started last
    current_media: Option<MediaId>,

    // Engine notifications; the sender clone keeps the channel connected
    // after the engine unsubscribes
    _engine_tx: Sender<EngineEvent>,
    engine_rx: Receiver<EngineEvent>,

    rng: StdRng,
    events: Vec<PlayerEvent>,
}

impl PlaybackController {
    /// Create a controller and subscribe to the engine's notifications
    pub fn new(
        mut engine: Box<dyn PlaybackEngine>,
        source: Box<dyn SourceProvider>,
        downloader: Box<dyn Downloader>,
        options: ControllerOptions,
    ) -> Self {
        let (engine_tx, engine_rx) = crossbeam_channel::unbounded();
        engine.subscribe(engine_tx.clone());

        Self {
            engine,
            source,
            downloader,
            store: None,
            playlist: PlaylistState::new(),
            settings: options.settings,
            history: History::new(),
            favorites: Favorites::new(),
            state: PlaybackState::Idle,
            is_playing: false,
            volume: options.volume.min(100),
            progress: ProgressTracker::new(options.seek_grace),
            download_dir: options.download_dir,
            status: "Ready".to_string(),
            current_media: None,
            _engine_tx: engine_tx,
            engine_rx,
            rng: StdRng::from_os_rng(),
            events: Vec::new(),
        }
    }

    /// Restore history and favorites from `store` and keep it updated
    pub fn with_store(mut self, store: AppDataStore) -> Self {
        let data = store.load();
        info!(
            "Loaded {} history records and {} favorites from {:?}",
            data.history.len(),
            data.favorites.len(),
            store.path()
        );
        self.history = data.history;
        self.favorites = data.favorites;
        self.store = Some(store);
        self
    }

    /// Use a deterministic shuffle sequence
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    // ---- accessors ----

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Cached play intent; the engine's own state may lag behind
    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    pub fn playlist(&self) -> &PlaylistState {
        &self.playlist
    }

    pub fn settings(&self) -> PlaybackSettings {
        self.settings
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn favorites(&self) -> &Favorites {
        &self.favorites
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    /// Outcome of the last operation
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Last reconciled position, without querying the engine
    pub fn progress(&self) -> Progress {
        self.progress.progress()
    }

    /// End-of-media notifications for the event loop
    pub fn engine_events(&self) -> Receiver<EngineEvent> {
        self.engine_rx.clone()
    }

    /// Drain events produced since the last call
    pub fn take_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.events)
    }

    // ---- transport ----

    /// Play the current entry, fetching a new one if nothing valid is selected
    pub fn play(&mut self) -> ControlResult<Transition> {
        let index = match self.playlist.valid_index() {
            Some(index) => index,
            None => self.acquire_entry()?,
        };
        self.start_index(index)
    }

    /// Toggle between playing and paused
    pub fn pause(&mut self) -> ControlResult<Transition> {
        match self.state {
            PlaybackState::Playing => {
                if let Err(e) = self.engine.pause() {
                    return Err(self.fail(e.into()));
                }
                self.is_playing = false;
                self.set_state(PlaybackState::Paused);
                self.report("Paused");
                Ok(Transition::Paused)
            }
            PlaybackState::Paused => {
                if let Err(e) = self.engine.resume() {
                    return Err(self.fail(e.into()));
                }
                self.is_playing = true;
                self.set_state(PlaybackState::Playing);
                self.report("Resumed");
                Ok(Transition::Resumed)
            }
            state => {
                debug!("Pause ignored while {:?}", state);
                Ok(Transition::Ignored)
            }
        }
    }

    pub fn stop(&mut self) -> ControlResult<Transition> {
        if let Err(e) = self.engine.stop() {
            return Err(self.fail(e.into()));
        }
        self.is_playing = false;
        self.progress.reset_position();
        self.set_state(PlaybackState::Stopped);
        self.report("Stopped");
        Ok(Transition::Stopped)
    }

    /// Advance to the next entry
    ///
    /// Shuffle picks any other entry. Past the end the playlist wraps when
    /// `loop_playlist` is set, otherwise one new entry is fetched.
    pub fn next(&mut self) -> ControlResult<Transition> {
        let len = self.playlist.len();
        let current = self.playlist.valid_index();

        let mut candidate = if self.settings.shuffle && len > 1 {
            self.pick_other(current, len)
        } else {
            current.map_or(0, |i| i + 1)
        };

        if candidate >= len {
            candidate = if self.settings.loop_playlist && len > 0 {
                0
            } else {
                self.acquire_entry()?
            };
        }

        self.start_index(candidate)
    }

    /// Step back one entry; no wraparound
    pub fn previous(&mut self) -> ControlResult<Transition> {
        match self.playlist.valid_index() {
            Some(index) if index > 0 => self.start_index(index - 1),
            _ => {
                self.report("Already at the first video");
                Ok(Transition::AlreadyFirst)
            }
        }
    }

    /// React to the engine reaching the end of `media`
    ///
    /// Replays the entry with `loop_single`, otherwise advances. `auto_play`
    /// does not take part here. Notifications for media other than the one
    /// started last are stale and ignored.
    pub fn on_media_ended(&mut self, media: MediaId) -> ControlResult<Transition> {
        if self.current_media != Some(media) {
            debug!("Ignoring end of stale media {}", media);
            return Ok(Transition::Ignored);
        }
        if self.state != PlaybackState::Playing {
            debug!("End of media ignored while {:?}", self.state);
            return Ok(Transition::Ignored);
        }

        if self.settings.loop_single {
            self.play()
        } else {
            self.next()
        }
    }

    /// Startup action: play once if `auto_play` is set and nothing started yet
    pub fn startup(&mut self) -> ControlResult<Transition> {
        if self.settings.auto_play && self.state == PlaybackState::Idle {
            self.play()
        } else {
            Ok(Transition::Ignored)
        }
    }

    /// Seek within the current media
    ///
    /// Returns the absolute position sent to the engine, or `None` when there
    /// is no media with a known duration.
    pub fn seek(&mut self, target: SeekTarget) -> ControlResult<Option<u64>> {
        if !matches!(self.state, PlaybackState::Playing | PlaybackState::Paused) {
            debug!("Seek ignored while {:?}", self.state);
            return Ok(None);
        }

        let duration = match self.engine.duration_ms().filter(|&d| d > 0) {
            Some(duration) => duration,
            None => {
                self.report("Cannot seek: duration unknown");
                return Ok(None);
            }
        };

        let position = match target {
            SeekTarget::Fraction(fraction) if !fraction.is_finite() => {
                self.report("Cannot seek: invalid position");
                return Ok(None);
            }
            SeekTarget::Fraction(fraction) => {
                (clamp(fraction, 0.0, 1.0) * duration as f64).round() as u64
            }
            SeekTarget::Absolute(ms) => ms.min(duration),
        };

        if let Err(e) = self.engine.seek_ms(position) {
            return Err(self.fail(e.into()));
        }
        self.progress.seek_issued(position, Instant::now());
        debug!("Seeked to {} ms of {} ms", position, duration);
        Ok(Some(position))
    }

    /// Set the volume, clamped to 0 - 100
    pub fn set_volume(&mut self, level: i32) -> ControlResult<u8> {
        let level = clamp(level, 0, 100) as u8;
        if let Err(e) = self.engine.set_volume(level) {
            return Err(self.fail(e.into()));
        }
        self.volume = level;
        debug!("Volume set to {}", level);
        Ok(level)
    }

    /// Query the engine and fold the result into the tracked progress
    pub fn poll_progress(&mut self) -> Progress {
        let position = self.engine.position_ms();
        let duration = self.engine.duration_ms();
        self.progress.reconcile(position, duration, Instant::now())
    }

    // ---- playlist ----

    /// Play the entry at `index`
    pub fn select(&mut self, index: usize) -> ControlResult<Transition> {
        if index >= self.playlist.len() {
            let err = PlaylistError::OutOfRange {
                index: index as isize,
                len: self.playlist.len(),
            };
            return Err(self.fail(err.into()));
        }
        self.start_index(index)
    }

    /// Fetch one more entry without playing it
    pub fn refresh(&mut self) -> ControlResult<Transition> {
        let index = self.acquire_entry()?;
        Ok(Transition::Queued { index })
    }

    /// Append a local file; plays it if nothing is selected
    pub fn open_local(&mut self, path: &Path) -> ControlResult<Transition> {
        self.playlist.append(PlaylistEntry::local(path));
        let index = self.playlist.len() - 1;
        self.playlist_changed();

        if self.playlist.current_index().is_none() {
            self.start_index(index)
        } else {
            self.report(format!("Added {}", path.display()));
            Ok(Transition::Queued { index })
        }
    }

    pub fn clear_playlist(&mut self) {
        self.playlist.clear();
        self.playlist_changed();
        self.report("Playlist cleared");
    }

    pub fn toggle(&mut self, toggle: Toggle) -> bool {
        let flag = match toggle {
            Toggle::LoopSingle => &mut self.settings.loop_single,
            Toggle::LoopPlaylist => &mut self.settings.loop_playlist,
            Toggle::Shuffle => &mut self.settings.shuffle,
            Toggle::AutoPlay => &mut self.settings.auto_play,
        };
        *flag = !*flag;
        let value = *flag;
        self.report(format!("{:?} {}", toggle, if value { "on" } else { "off" }));
        value
    }

    pub fn set_settings(&mut self, settings: PlaybackSettings) {
        self.settings = settings;
    }

    /// Add the current entry to favorites; false if it was already there
    pub fn add_current_to_favorites(&mut self) -> ControlResult<bool> {
        let entry = match self.playlist.current() {
            Ok(entry) => entry.clone(),
            Err(e) => return Err(self.fail(e.into())),
        };

        let added = self.favorites.insert(entry);
        if added {
            self.persist_app_data();
            self.report("Added to favorites");
        } else {
            self.report("Already in favorites");
        }
        Ok(added)
    }

    pub fn save_playlist(&mut self, path: &Path) -> ControlResult<()> {
        let document = PlaylistDocument::capture(&self.playlist, &self.settings);
        if let Err(e) = document.save(path) {
            return Err(self.fail(e.into()));
        }
        self.report(format!("Playlist saved to {}", path.display()));
        Ok(())
    }

    /// Replace playlist and toggles with a saved document
    pub fn load_playlist(&mut self, path: &Path) -> ControlResult<()> {
        let loaded = PlaylistDocument::load(path).and_then(|doc| doc.into_state());
        let (playlist, settings) = match loaded {
            Ok(state) => state,
            Err(e) => return Err(self.fail(e.into())),
        };

        self.playlist = playlist;
        self.settings = settings;
        self.playlist_changed();
        self.report(format!(
            "Loaded {} videos from {}",
            self.playlist.len(),
            path.display()
        ));
        Ok(())
    }

    /// Download the current remote entry
    pub fn download_current(&mut self) -> ControlResult<PathBuf> {
        let (index, entry) = match self.playlist.valid_index() {
            Some(index) => (index, self.playlist.entries()[index].clone()),
            None => return Err(self.fail(DownloadError::NoCurrentEntry.into())),
        };

        let url = match entry {
            PlaylistEntry::Remote(url) => url,
            PlaylistEntry::Local(_) => return Err(self.fail(DownloadError::NotRemote.into())),
        };

        if let Err(e) = std::fs::create_dir_all(&self.download_dir) {
            return Err(self.fail(DownloadError::from(e).into()));
        }

        let dest = download_path(&self.download_dir, index, SystemTime::now());
        self.report("Downloading video...");
        if let Err(e) = self.downloader.download(&url, &dest) {
            return Err(self.fail(e.into()));
        }

        self.report(format!("Video downloaded to {}", dest.display()));
        Ok(dest)
    }

    // ---- internals ----

    /// Fetch one entry and append it, returning its index
    ///
    /// The state is `Loading` for the duration of the fetch and restored
    /// afterwards either way.
    fn acquire_entry(&mut self) -> ControlResult<usize> {
        let prior = self.state;
        self.set_state(PlaybackState::Loading);
        self.report("Fetching video...");

        let fetched = self.source.fetch_one();
        self.set_state(prior);

        match fetched {
            Ok(entry) => {
                info!("Appending {}", entry);
                self.playlist.append(entry);
                self.playlist_changed();
                Ok(self.playlist.len() - 1)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Start the entry at `index` on the engine, then select it
    ///
    /// The selection only moves once the engine has started, so a failure
    /// leaves the index on the media the engine still holds.
    fn start_index(&mut self, index: usize) -> ControlResult<Transition> {
        let entry = match self.playlist.get(index) {
            Some(entry) => entry.clone(),
            None => {
                let err = PlaylistError::OutOfRange {
                    index: index as isize,
                    len: self.playlist.len(),
                };
                return Err(self.fail(err.into()));
            }
        };

        let started = self.engine.open(&entry).and_then(|media| {
            self.engine.start()?;
            Ok(media)
        });
        let media = match started {
            Ok(media) => media,
            Err(e) => return Err(self.fail(e.into())),
        };
        self.current_media = Some(media);

        if let Err(e) = self.playlist.set_index(Some(index)) {
            return Err(self.fail(e.into()));
        }
        self.playlist_changed();

        if let Err(e) = self.engine.set_volume(self.volume) {
            warn!("Could not apply volume {}: {}", self.volume, e);
        }

        self.progress.reset();
        self.is_playing = true;
        self.set_state(PlaybackState::Playing);

        self.history.push(HistoryRecord::now(entry, index));
        self.persist_app_data();

        self.report(format!("Playing video {}", index + 1));
        Ok(Transition::Started { index })
    }

    /// Uniformly random index in `0..len` other than `current`
    fn pick_other(&mut self, current: Option<usize>, len: usize) -> usize {
        match current {
            Some(current) => {
                let pick = self.rng.random_range(0..len - 1);
                if pick >= current {
                    pick + 1
                } else {
                    pick
                }
            }
            None => self.rng.random_range(0..len),
        }
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!("Playback state {:?} -> {:?}", self.state, state);
            self.state = state;
            self.events.push(PlayerEvent::StateChanged { state });
        }
    }

    fn playlist_changed(&mut self) {
        self.events.push(PlayerEvent::PlaylistChanged {
            len: self.playlist.len(),
            current: self.playlist.current_index(),
        });
    }

    fn report(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.status = message.clone();
        self.events.push(PlayerEvent::Status { message });
    }

    fn fail(&mut self, err: ControlError) -> ControlError {
        error!("{}", err);
        self.status = err.to_string();
        self.events.push(PlayerEvent::Error { message: err.to_string() });
        err
    }

    fn persist_app_data(&self) {
        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.history, &self.favorites) {
                warn!("Failed to save app data to {:?}: {}", store.path(), e);
            }
        }
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        self.engine.unsubscribe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ClockEngine;
    use crate::utils::error::FetchError;
    use std::collections::VecDeque;

    struct ScriptedSource(VecDeque<Result<PlaylistEntry, FetchError>>);

    impl SourceProvider for ScriptedSource {
        fn fetch_one(&mut self) -> Result<PlaylistEntry, FetchError> {
            self.0.pop_front().unwrap_or(Err(FetchError::Empty))
        }
    }

    struct NoDownloads;

    impl Downloader for NoDownloads {
        fn download(&mut self, _url: &str, _dest: &Path) -> Result<u64, DownloadError> {
            Err(DownloadError::Network("offline".to_string()))
        }
    }

    fn controller(results: Vec<Result<PlaylistEntry, FetchError>>) -> PlaybackController {
        PlaybackController::new(
            Box::new(ClockEngine::new(Duration::from_secs(120))),
            Box::new(ScriptedSource(results.into())),
            Box::new(NoDownloads),
            ControllerOptions::default(),
        )
        .with_rng_seed(7)
    }

    fn remote(n: usize) -> PlaylistEntry {
        PlaylistEntry::Remote(format!("http://x/{}.mp4", n))
    }

    #[test]
    fn test_initial_state() {
        let controller = controller(Vec::new());
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(!controller.is_playing());
        assert_eq!(controller.status(), "Ready");
        assert_eq!(controller.volume(), 100);
    }

    #[test]
    fn test_play_fetches_when_empty() {
        let mut controller = controller(vec![Ok(remote(0))]);
        assert_eq!(controller.play().unwrap(), Transition::Started { index: 0 });
        assert_eq!(controller.state(), PlaybackState::Playing);
        assert_eq!(controller.history().len(), 1);
    }

    #[test]
    fn test_failed_fetch_keeps_state() {
        let mut controller = controller(vec![Err(FetchError::Network("timeout".to_string()))]);
        assert!(matches!(controller.play(), Err(ControlError::Fetch(FetchError::Network(_)))));
        assert_eq!(controller.state(), PlaybackState::Idle);
        assert!(controller.playlist().is_empty());
        assert!(controller.status().contains("timeout"));
    }

    #[test]
    fn test_pause_from_idle_is_ignored() {
        let mut controller = controller(Vec::new());
        assert_eq!(controller.pause().unwrap(), Transition::Ignored);
        assert_eq!(controller.state(), PlaybackState::Idle);
    }

    #[test]
    fn test_volume_clamped() {
        let mut controller = controller(Vec::new());
        assert_eq!(controller.set_volume(150).unwrap(), 100);
        assert_eq!(controller.set_volume(-3).unwrap(), 0);
        assert_eq!(controller.set_volume(42).unwrap(), 42);
    }

    #[test]
    fn test_pick_other_never_repeats() {
        let mut controller = controller(Vec::new());
        for _ in 0..200 {
            assert_ne!(controller.pick_other(Some(1), 2), 1);
            let pick = controller.pick_other(Some(2), 3);
            assert!(pick < 2);
        }
    }

    #[test]
    fn test_toggle_flips_setting() {
        let mut controller = controller(Vec::new());
        assert!(controller.toggle(Toggle::Shuffle));
        assert!(controller.settings().shuffle);
        assert!(!controller.toggle(Toggle::Shuffle));
        assert!(!controller.toggle(Toggle::LoopPlaylist));
    }

    #[test]
    fn test_events_are_drained() {
        let mut controller = controller(vec![Ok(remote(0))]);
        controller.play().unwrap();

        let events = controller.take_events();
        assert!(events.contains(&PlayerEvent::StateChanged { state: PlaybackState::Loading }));
        assert!(events.contains(&PlayerEvent::StateChanged { state: PlaybackState::Playing }));
        assert!(controller.take_events().is_empty());
    }
}
