//! Headless engine driven by the wall clock
//!
//! Nothing is decoded. Every opened entry is treated as media of a fixed
//! length; the position advances in real time while playing and `Ended` is
//! emitted the first time a position query finds the end reached.

use crate::engine::{EngineEvent, MediaId, PlaybackEngine};
use crate::player::PlaylistEntry;
use crate::utils::error::EngineError;
use crossbeam_channel::Sender;
use log::debug;
use std::time::{Duration, Instant};

pub struct ClockEngine {
    duration: Duration,
    location: Option<String>,
    media: MediaId,
    offset: Duration,
    started_at: Option<Instant>,
    volume: u8,
    ended_sent: bool,
    events: Option<Sender<EngineEvent>>,
}

impl ClockEngine {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            location: None,
            media: 0,
            offset: Duration::ZERO,
            started_at: None,
            volume: 100,
            ended_sent: false,
            events: None,
        }
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_playing(&self) -> bool {
        self.started_at.is_some()
    }

    fn elapsed(&self) -> Duration {
        let running = self.started_at.map(|s| s.elapsed()).unwrap_or_default();
        (self.offset + running).min(self.duration)
    }
}

impl PlaybackEngine for ClockEngine {
    fn subscribe(&mut self, events: Sender<EngineEvent>) {
        self.events = Some(events);
    }

    fn unsubscribe(&mut self) {
        self.events = None;
    }

    fn open(&mut self, entry: &PlaylistEntry) -> Result<MediaId, EngineError> {
        self.media += 1;
        debug!("Clock engine opened {} as media {}", entry, self.media);
        self.location = Some(entry.location());
        self.offset = Duration::ZERO;
        self.started_at = None;
        self.ended_sent = false;
        Ok(self.media)
    }

    fn start(&mut self) -> Result<(), EngineError> {
        if self.location.is_none() {
            return Err(EngineError::Command("No media opened".to_string()));
        }
        self.started_at = Some(Instant::now());
        Ok(())
    }

    fn pause(&mut self) -> Result<(), EngineError> {
        if self.started_at.is_some() {
            self.offset = self.elapsed();
            self.started_at = None;
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<(), EngineError> {
        if self.location.is_some() && self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), EngineError> {
        self.offset = Duration::ZERO;
        self.started_at = None;
        Ok(())
    }

    fn position_ms(&mut self) -> Option<u64> {
        self.location.as_ref()?;
        let elapsed = self.elapsed();

        if self.started_at.is_some() && elapsed >= self.duration && !self.ended_sent {
            self.offset = self.duration;
            self.started_at = None;
            self.ended_sent = true;
            if let Some(events) = &self.events {
                let _ = events.send(EngineEvent::Ended { media: self.media });
            }
        }

        Some(elapsed.as_millis() as u64)
    }

    fn duration_ms(&mut self) -> Option<u64> {
        self.location.as_ref()?;
        Some(self.duration.as_millis() as u64)
    }

    fn seek_ms(&mut self, position_ms: u64) -> Result<(), EngineError> {
        self.offset = Duration::from_millis(position_ms).min(self.duration);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
        self.ended_sent = false;
        Ok(())
    }

    fn set_volume(&mut self, level: u8) -> Result<(), EngineError> {
        self.volume = level.min(100);
        Ok(())
    }
}
