//! External player process engine
//!
//! Plays media by spawning a command-line player (ffplay by default). The
//! process cannot be paused or seeked in place, so pause, resume and seek
//! stop the process and respawn it at the remembered offset. A watcher
//! thread reports `Ended` when the current process exits on its own.

use crate::engine::{EngineEvent, MediaId, PlaybackEngine};
use crate::player::PlaylistEntry;
use crate::utils::config::EngineConfig;
use crate::utils::error::EngineError;
use crossbeam_channel::Sender;
use log::{debug, warn};
use parking_lot::Mutex;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const WATCH_INTERVAL: Duration = Duration::from_millis(200);

pub struct ExternalEngine {
    config: EngineConfig,
    location: Option<String>,
    media: MediaId,
    duration_ms: Option<u64>,
    volume: u8,
    offset_ms: u64,
    started_at: Option<Instant>,
    child: Arc<Mutex<Option<Child>>>,
    generation: Arc<AtomicU64>,
    events: Arc<Mutex<Option<Sender<EngineEvent>>>>,
}

impl ExternalEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            location: None,
            media: 0,
            duration_ms: None,
            volume: 100,
            offset_ms: 0,
            started_at: None,
            child: Arc::new(Mutex::new(None)),
            generation: Arc::new(AtomicU64::new(0)),
            events: Arc::new(Mutex::new(None)),
        }
    }

    fn elapsed_ms(&self) -> u64 {
        let running = self
            .started_at
            .map(|s| s.elapsed().as_millis() as u64)
            .unwrap_or(0);
        let position = self.offset_ms + running;
        match self.duration_ms {
            Some(duration) => position.min(duration),
            None => position,
        }
    }

    /// Arguments for a process starting at the current offset
    fn build_args(&self, location: &str) -> Vec<String> {
        let mut args = self.config.args.clone();
        if self.offset_ms > 0 && !self.config.seek_flag.is_empty() {
            args.push(self.config.seek_flag.clone());
            args.push(format!("{:.3}", self.offset_ms as f64 / 1000.0));
        }
        if !self.config.volume_flag.is_empty() {
            args.push(self.config.volume_flag.clone());
            args.push(self.volume.to_string());
        }
        args.push(location.to_string());
        args
    }

    fn spawn(&mut self) -> Result<(), EngineError> {
        let location = self
            .location
            .clone()
            .ok_or_else(|| EngineError::Command("No media opened".to_string()))?;

        self.kill();

        let args = self.build_args(&location);
        debug!("Spawning {} {:?}", self.config.command, args);

        let child = Command::new(&self.config.command)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    EngineError::Unavailable(format!("{}: {}", self.config.command, e))
                }
                _ => EngineError::Open(format!("{}: {}", location, e)),
            })?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        *self.child.lock() = Some(child);
        self.started_at = Some(Instant::now());

        let media = self.media;
        let child = Arc::clone(&self.child);
        let current = Arc::clone(&self.generation);
        let events = Arc::clone(&self.events);
        thread::spawn(move || Self::watch(media, generation, child, current, events));

        Ok(())
    }

    /// Wait for the process of `generation` to exit by itself
    fn watch(
        media: MediaId,
        generation: u64,
        child: Arc<Mutex<Option<Child>>>,
        current: Arc<AtomicU64>,
        events: Arc<Mutex<Option<Sender<EngineEvent>>>>,
    ) {
        loop {
            thread::sleep(WATCH_INTERVAL);
            if current.load(Ordering::SeqCst) != generation {
                return;
            }

            let mut guard = child.lock();
            let exited = match guard.as_mut() {
                None => return,
                Some(process) => match process.try_wait() {
                    Ok(Some(status)) => {
                        debug!("Player process exited with {}", status);
                        true
                    }
                    Ok(None) => false,
                    Err(e) => {
                        warn!("Lost track of player process: {}", e);
                        return;
                    }
                },
            };

            if exited {
                guard.take();
                drop(guard);
                if current.load(Ordering::SeqCst) == generation {
                    if let Some(events) = events.lock().as_ref() {
                        let _ = events.send(EngineEvent::Ended { media });
                    }
                }
                return;
            }
        }
    }

    /// Terminate the running process without reporting `Ended`
    fn kill(&mut self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if let Some(mut process) = self.child.lock().take() {
            let _ = process.kill();
            let _ = process.wait();
        }
    }

    /// Ask the probe command for the media length
    fn probe_duration(&self, location: &str) -> Option<u64> {
        if self.config.probe_command.is_empty() {
            return None;
        }

        let output = Command::new(&self.config.probe_command)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
                location,
            ])
            .stdin(Stdio::null())
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        parse_probe_seconds(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse a duration in seconds as printed by the probe command
fn parse_probe_seconds(text: &str) -> Option<u64> {
    let seconds: f64 = text.trim().parse().ok()?;
    if seconds.is_finite() && seconds > 0.0 {
        Some((seconds * 1000.0).round() as u64)
    } else {
        None
    }
}

impl PlaybackEngine for ExternalEngine {
    fn subscribe(&mut self, events: Sender<EngineEvent>) {
        *self.events.lock() = Some(events);
    }

    fn unsubscribe(&mut self) {
        *self.events.lock() = None;
    }

    fn open(&mut self, entry: &PlaylistEntry) -> Result<MediaId, EngineError> {
        self.kill();
        let location = entry.location();

        if !entry.is_remote() && !std::path::Path::new(&location).exists() {
            return Err(EngineError::Open(format!("File not found: {}", location)));
        }

        self.duration_ms = self.probe_duration(&location);
        self.location = Some(location);
        self.media += 1;
        self.offset_ms = 0;
        self.started_at = None;
        Ok(self.media)
    }

    fn start(&mut self) -> Result<(), EngineError> {
        self.spawn()
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        if self.started_at.is_some() {
            self.offset_ms = self.elapsed_ms();
            self.started_at = None;
            self.kill();
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        if self.started_at.is_none() {
            self.spawn()?;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.kill();
        self.offset_ms = 0;
        self.started_at = None;
        Ok(())
    }

    fn position_ms(&mut self) -> Option<u64> {
        self.location.as_ref()?;
        Some(self.elapsed_ms())
    }

    fn duration_ms(&mut self) -> Option<u64> {
        self.duration_ms
    }

    fn seek_ms(&mut self, position_ms: u64) -> Result<(), EngineError> {
        self.offset_ms = match self.duration_ms {
            Some(duration) => position_ms.min(duration),
            None => position_ms,
        };
        if self.started_at.is_some() {
            self.spawn()?;
        }
        Ok(())
    }

    /// Takes effect when the process is next (re)spawned
    fn set_volume(&mut self, level: u8) -> Result<(), EngineError> {
        self.volume = level.min(100);
        Ok(())
    }
}

impl Drop for ExternalEngine {
    fn drop(&mut self) {
        self.kill();
    }
}
