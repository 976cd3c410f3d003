//! Single-threaded player event loop
//!
//! User intents arrive as [`PlayerCommand`]s from any thread through a
//! [`PlayerHandle`]. The loop owns the controller and handles commands,
//! engine notifications and progress polls one at a time, publishing the
//! resulting [`PlayerEvent`]s to the registered handlers.

use crate::engine::EngineEvent;
use crate::player::{
    Listing, PlaybackController, PlaybackState, PlayerEvent, PlayerEventHandler, SeekTarget,
    Toggle,
};
use crate::utils::format_time;

use crossbeam_channel::{select, Receiver, Sender};
use log::{debug, info};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// User intent
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerCommand {
    Play,
    Pause,
    Stop,
    Next,
    Previous,
    Seek(SeekTarget),
    SetVolume(i32),
    AddFavorite,
    Toggle(Toggle),
    ClearPlaylist,
    OpenLocal(PathBuf),
    Select(usize),
    Refresh,
    SavePlaylist(PathBuf),
    LoadPlaylist(PathBuf),
    Download,
    Describe(Listing),
    Shutdown,
}

/// Cloneable sender of commands into a running [`PlayerLoop`]
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    commands: Sender<PlayerCommand>,
}

impl PlayerHandle {
    /// Queue a command; false once the loop is gone
    pub fn send(&self, command: PlayerCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(PlayerCommand::Shutdown);
    }
}

pub struct PlayerLoop {
    controller: PlaybackController,
    commands_tx: Sender<PlayerCommand>,
    commands_rx: Receiver<PlayerCommand>,
    engine_events: Receiver<EngineEvent>,
    handlers: Vec<Box<dyn PlayerEventHandler>>,
    poll_interval: Duration,
    next_poll: Option<Instant>,
}

impl PlayerLoop {
    pub fn new(controller: PlaybackController, poll_interval: Duration) -> Self {
        let (commands_tx, commands_rx) = crossbeam_channel::unbounded();
        let engine_events = controller.engine_events();

        Self {
            controller,
            commands_tx,
            commands_rx,
            engine_events,
            handlers: Vec::new(),
            poll_interval,
            next_poll: None,
        }
    }

    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle {
            commands: self.commands_tx.clone(),
        }
    }

    pub fn add_event_handler(&mut self, handler: Box<dyn PlayerEventHandler>) {
        self.handlers.push(handler);
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut PlaybackController {
        &mut self.controller
    }

    /// Run until a `Shutdown` command arrives
    pub fn run(&mut self) {
        info!("Player loop started");
        let commands = self.commands_rx.clone();
        let engine_events = self.engine_events.clone();
        self.startup();

        loop {
            self.schedule_poll();
            let poll = match self.next_poll {
                Some(deadline) => crossbeam_channel::at(deadline),
                None => crossbeam_channel::never(),
            };

            select! {
                recv(commands) -> command => match command {
                    Ok(PlayerCommand::Shutdown) | Err(_) => break,
                    Ok(command) => self.execute(command),
                },
                recv(engine_events) -> event => {
                    if let Ok(event) = event {
                        self.on_engine_event(event);
                    }
                },
                recv(poll) -> _ => {
                    self.next_poll = None;
                    self.poll();
                },
            }
        }

        info!("Player loop stopped");
    }

    /// Handle everything already queued without blocking
    ///
    /// Returns false if a `Shutdown` command was seen.
    pub fn run_pending(&mut self) -> bool {
        loop {
            if let Ok(event) = self.engine_events.try_recv() {
                self.on_engine_event(event);
                continue;
            }
            match self.commands_rx.try_recv() {
                Ok(PlayerCommand::Shutdown) => return false,
                Ok(command) => self.execute(command),
                Err(_) => return true,
            }
        }
    }

    /// Auto-play once, if enabled
    pub fn startup(&mut self) {
        if let Err(e) = self.controller.startup() {
            debug!("Startup playback failed: {}", e);
        }
        self.flush();
    }

    /// Poll progress now and publish it
    pub fn poll(&mut self) {
        if self.controller.state() != PlaybackState::Playing {
            return;
        }
        let progress = self.controller.poll_progress();
        self.dispatch(PlayerEvent::Progress(progress));
        self.flush();
    }

    pub fn execute(&mut self, command: PlayerCommand) {
        debug!("Executing {:?}", command);
        if let PlayerCommand::Describe(listing) = command {
            let event = self.describe(listing);
            self.dispatch(event);
            return;
        }

        let controller = &mut self.controller;

        let result = match command {
            PlayerCommand::Play => controller.play().map(drop),
            PlayerCommand::Pause => controller.pause().map(drop),
            PlayerCommand::Stop => controller.stop().map(drop),
            PlayerCommand::Next => controller.next().map(drop),
            PlayerCommand::Previous => controller.previous().map(drop),
            PlayerCommand::Seek(target) => controller.seek(target).map(drop),
            PlayerCommand::SetVolume(level) => controller.set_volume(level).map(drop),
            PlayerCommand::AddFavorite => controller.add_current_to_favorites().map(drop),
            PlayerCommand::Toggle(toggle) => {
                controller.toggle(toggle);
                Ok(())
            }
            PlayerCommand::ClearPlaylist => {
                controller.clear_playlist();
                Ok(())
            }
            PlayerCommand::OpenLocal(path) => controller.open_local(&path).map(drop),
            PlayerCommand::Select(index) => controller.select(index).map(drop),
            PlayerCommand::Refresh => controller.refresh().map(drop),
            PlayerCommand::SavePlaylist(path) => controller.save_playlist(&path),
            PlayerCommand::LoadPlaylist(path) => controller.load_playlist(&path),
            PlayerCommand::Download => controller.download_current().map(drop),
            PlayerCommand::Describe(_) | PlayerCommand::Shutdown => Ok(()),
        };

        if let Err(e) = result {
            debug!("Command failed: {}", e);
        }
        self.flush();
    }

    fn on_engine_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Ended { media } => {
                self.dispatch(PlayerEvent::EndOfMedia);
                if let Err(e) = self.controller.on_media_ended(media) {
                    debug!("Advance after end of media failed: {}", e);
                }
                self.flush();
            }
        }
    }

    /// Polls are scheduled only while playing
    fn schedule_poll(&mut self) {
        if self.controller.state() == PlaybackState::Playing {
            if self.next_poll.is_none() {
                self.next_poll = Some(Instant::now() + self.poll_interval);
            }
        } else {
            self.next_poll = None;
        }
    }

    fn describe(&self, listing: Listing) -> PlayerEvent {
        let controller = &self.controller;
        let (title, lines) = match listing {
            Listing::Playlist => {
                let current = controller.playlist().current_index();
                let lines = controller
                    .playlist()
                    .entries()
                    .iter()
                    .enumerate()
                    .map(|(i, entry)| {
                        let marker = if Some(i) == current { ">" } else { " " };
                        format!("{} {:3}. {}", marker, i + 1, entry)
                    })
                    .collect();
                ("Playlist".to_string(), lines)
            }
            Listing::History => {
                let lines = controller
                    .history()
                    .iter()
                    .rev()
                    .map(|record| {
                        format!(
                            "{} #{} {}",
                            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                            record.index + 1,
                            record.entry
                        )
                    })
                    .collect();
                ("History".to_string(), lines)
            }
            Listing::Favorites => {
                let lines = controller.favorites().iter().map(|entry| entry.to_string()).collect();
                ("Favorites".to_string(), lines)
            }
            Listing::Status => {
                let settings = controller.settings();
                let progress = controller.progress();
                let lines = vec![
                    format!("State: {:?}", controller.state()),
                    format!(
                        "Video: {} of {}",
                        controller.playlist().current_index().map_or(0, |i| i + 1),
                        controller.playlist().len()
                    ),
                    format!(
                        "Position: {} / {}",
                        format_time(progress.position_ms as i64),
                        format_time(progress.duration_ms as i64)
                    ),
                    format!("Volume: {}", controller.volume()),
                    format!(
                        "Loop single: {}, loop playlist: {}, shuffle: {}, auto play: {}",
                        settings.loop_single,
                        settings.loop_playlist,
                        settings.shuffle,
                        settings.auto_play
                    ),
                    format!("Last: {}", controller.status()),
                ];
                ("Status".to_string(), lines)
            }
        };
        PlayerEvent::Listing { title, lines }
    }

    fn flush(&mut self) {
        for event in self.controller.take_events() {
            self.dispatch(event);
        }
    }

    fn dispatch(&mut self, event: PlayerEvent) {
        for handler in &mut self.handlers {
            handler.handle_event(&event);
        }
    }
}
