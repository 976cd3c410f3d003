//! Shared fakes and fixtures for the integration tests
//!
//! - `RecordingEngine` logs every engine call and can fake end of media
//! - `ScriptedSource` hands out queued fetch results and counts calls
//! - `RecordingDownloader` writes a small file and logs the request

#![allow(dead_code)]

use anyhow::Result;
use crossbeam_channel::Sender;
use parking_lot::Mutex;
use randplay::download::Downloader;
use randplay::engine::{EngineEvent, MediaId, PlaybackEngine};
use randplay::persistence::AppDataStore;
use randplay::player::{ControllerOptions, PlaybackController, PlaybackSettings, PlaylistEntry};
use randplay::source::SourceProvider;
use randplay::utils::error::{DownloadError, EngineError, FetchError};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// One call received by the recording engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Open(String),
    Start,
    Pause,
    Resume,
    Stop,
    Seek(u64),
    Volume(u8),
}

#[derive(Default)]
pub struct EngineProbe {
    pub calls: Vec<EngineCall>,
    pub duration_ms: Option<u64>,
    pub position_ms: Option<u64>,
    pub fail_open: bool,
    /// Id handed out by the last successful open
    pub media: MediaId,
    events: Option<Sender<EngineEvent>>,
}

impl EngineProbe {
    pub fn is_subscribed(&self) -> bool {
        self.events.is_some()
    }

    /// Pretend the open media finished; false when nobody listens
    pub fn end_of_media(&self) -> bool {
        self.end_of(self.media)
    }

    /// Report the end of a specific media, current or not
    pub fn end_of(&self, media: MediaId) -> bool {
        match &self.events {
            Some(events) => events.send(EngineEvent::Ended { media }).is_ok(),
            None => false,
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Open(location) => Some(location.clone()),
                _ => None,
            })
            .collect()
    }
}

pub struct RecordingEngine {
    probe: Arc<Mutex<EngineProbe>>,
}

impl RecordingEngine {
    pub fn new() -> (Self, Arc<Mutex<EngineProbe>>) {
        let probe = Arc::new(Mutex::new(EngineProbe::default()));
        (Self { probe: Arc::clone(&probe) }, probe)
    }

    fn record(&self, call: EngineCall) {
        self.probe.lock().calls.push(call);
    }
}

impl PlaybackEngine for RecordingEngine {
    fn subscribe(&mut self, events: Sender<EngineEvent>) {
        self.probe.lock().events = Some(events);
    }

    fn unsubscribe(&mut self) {
        self.probe.lock().events = None;
    }

    fn open(&mut self, entry: &PlaylistEntry) -> Result<MediaId, EngineError> {
        let mut probe = self.probe.lock();
        if probe.fail_open {
            return Err(EngineError::Open(entry.location()));
        }
        probe.calls.push(EngineCall::Open(entry.location()));
        probe.media += 1;
        Ok(probe.media)
    }

    fn start(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::Start);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::Pause);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::Resume);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.record(EngineCall::Stop);
        Ok(())
    }

    fn position_ms(&mut self) -> Option<u64> {
        self.probe.lock().position_ms
    }

    fn duration_ms(&mut self) -> Option<u64> {
        self.probe.lock().duration_ms
    }

    fn seek_ms(&mut self, position_ms: u64) -> Result<(), EngineError> {
        self.record(EngineCall::Seek(position_ms));
        Ok(())
    }

    fn set_volume(&mut self, level: u8) -> Result<(), EngineError> {
        self.record(EngineCall::Volume(level));
        Ok(())
    }
}

#[derive(Default)]
pub struct SourceLog {
    pub queue: VecDeque<Result<String, FetchError>>,
    pub calls: usize,
}

pub struct ScriptedSource {
    log: Arc<Mutex<SourceLog>>,
}

impl ScriptedSource {
    pub fn new(results: Vec<Result<String, FetchError>>) -> (Self, Arc<Mutex<SourceLog>>) {
        let log = Arc::new(Mutex::new(SourceLog {
            queue: results.into(),
            calls: 0,
        }));
        (Self { log: Arc::clone(&log) }, log)
    }
}

impl SourceProvider for ScriptedSource {
    fn fetch_one(&mut self) -> Result<PlaylistEntry, FetchError> {
        let mut log = self.log.lock();
        log.calls += 1;
        match log.queue.pop_front() {
            Some(result) => result.map(|url| PlaylistEntry::parse(&url)),
            None => Err(FetchError::Empty),
        }
    }
}

pub struct RecordingDownloader {
    requests: Arc<Mutex<Vec<(String, PathBuf)>>>,
}

impl RecordingDownloader {
    pub fn new() -> (Self, Arc<Mutex<Vec<(String, PathBuf)>>>) {
        let requests = Arc::new(Mutex::new(Vec::new()));
        (Self { requests: Arc::clone(&requests) }, requests)
    }
}

impl Downloader for RecordingDownloader {
    fn download(&mut self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let body = b"not really a video";
        std::fs::write(dest, body)?;
        self.requests.lock().push((url.to_string(), dest.to_path_buf()));
        Ok(body.len() as u64)
    }
}

/// Controller wired to fakes, with persistence in a temp directory
pub struct Harness {
    pub controller: PlaybackController,
    pub engine: Arc<Mutex<EngineProbe>>,
    pub source: Arc<Mutex<SourceLog>>,
    pub downloads: Arc<Mutex<Vec<(String, PathBuf)>>>,
    pub temp_dir: TempDir,
}

impl Harness {
    /// Id of the media the engine opened last
    pub fn media(&self) -> MediaId {
        self.engine.lock().media
    }

    pub fn new(settings: PlaybackSettings, fetches: &[&str]) -> Result<Self> {
        let results = fetches.iter().map(|url| Ok(url.to_string())).collect();
        Self::with_results(settings, results)
    }

    pub fn with_results(
        settings: PlaybackSettings,
        fetches: Vec<Result<String, FetchError>>,
    ) -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let (engine, engine_probe) = RecordingEngine::new();
        let (source, source_log) = ScriptedSource::new(fetches);
        let (downloader, downloads) = RecordingDownloader::new();

        let options = ControllerOptions {
            settings,
            volume: 100,
            seek_grace: Duration::from_millis(1500),
            download_dir: temp_dir.path().join("downloads"),
        };

        let controller = PlaybackController::new(
            Box::new(engine),
            Box::new(source),
            Box::new(downloader),
            options,
        )
        .with_store(AppDataStore::new(temp_dir.path().join("player_data.json")))
        .with_rng_seed(42);

        Ok(Self {
            controller,
            engine: engine_probe,
            source: source_log,
            downloads,
            temp_dir,
        })
    }

    pub fn store(&self) -> AppDataStore {
        AppDataStore::new(self.temp_dir.path().join("player_data.json"))
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }

    pub fn fetch_calls(&self) -> usize {
        self.source.lock().calls
    }
}

/// Settings with every toggle off
pub fn plain_settings() -> PlaybackSettings {
    PlaybackSettings {
        loop_single: false,
        loop_playlist: false,
        auto_play: false,
        shuffle: false,
    }
}

pub fn url(n: usize) -> String {
    format!("http://x/{}.mp4", n)
}
