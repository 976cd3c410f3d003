use anyhow::{bail, Result};
use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use randplay::download::HttpDownloader;
use randplay::engine;
use randplay::persistence::AppDataStore;
use randplay::player::{
    ControllerOptions, Listing, PlaybackController, PlayerCommand, PlayerEvent,
    PlayerEventHandler, PlayerHandle, PlayerLoop, SeekTarget, Toggle,
};
use randplay::source::HttpSource;
use randplay::utils::{Config, EngineKind};

/// randplay - plays random videos from a JSON API
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Local media files to queue
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Configuration file (defaults to the user config file)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Set initial volume (0-100)
    #[arg(short, long, value_name = "VOLUME")]
    volume: Option<u8>,

    /// Video API endpoint
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Use the clock-driven engine instead of an external player
    #[arg(long)]
    headless: bool,

    /// Do not start playing at startup
    #[arg(long)]
    no_autoplay: bool,

    /// Write the effective configuration to the user config file
    #[arg(long)]
    save_config: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref())?;
    if let Some(volume) = args.volume {
        config.playback.volume = volume;
    }
    if let Some(endpoint) = args.endpoint {
        config.api.endpoint = endpoint;
    }
    if args.headless {
        config.engine.kind = EngineKind::Headless;
    }
    if args.no_autoplay {
        config.playback.auto_play = false;
    }
    config.validate()?;

    // Initialize logging
    let log_level = if args.debug { "debug" } else { config.general.log_level.as_str() };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    info!("Starting randplay v{}", env!("CARGO_PKG_VERSION"));

    if args.save_config {
        config.save()?;
        info!("Configuration saved");
    }

    let runtime = Arc::new(
        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?,
    );

    let source = HttpSource::new(&config.api, Arc::clone(&runtime))?;
    let downloader = HttpDownloader::new(&config.download, Arc::clone(&runtime))?;
    let options = ControllerOptions {
        settings: config.playback.settings(),
        volume: config.playback.volume,
        seek_grace: Duration::from_millis(config.playback.seek_grace_ms),
        download_dir: config.download.directory.clone(),
    };

    let mut controller = PlaybackController::new(
        engine::from_config(&config.engine),
        Box::new(source),
        Box::new(downloader),
        options,
    )
    .with_store(AppDataStore::new(&config.general.data_file));

    for file in &args.files {
        if !file.exists() {
            bail!("File not found: {:?}", file);
        }
        // Failures are already reported through the controller's events
        let _ = controller.open_local(file);
    }

    let mut player_loop =
        PlayerLoop::new(controller, Duration::from_millis(config.playback.poll_interval_ms));
    player_loop.add_event_handler(Box::new(ConsoleEventHandler));

    let handle = player_loop.handle();
    thread::Builder::new()
        .name("stdin".to_string())
        .spawn(move || read_commands(handle))?;

    println!("Type 'help' for commands");
    player_loop.run();

    info!("randplay exiting");
    Ok(())
}

/// One line of user input
#[derive(Debug, PartialEq)]
enum Input {
    Command(PlayerCommand),
    Help,
    Empty,
}

const HELP: &str = "\
Commands:
  play | pause | stop | next | prev
  seek <percent>       jump to a position (0-100)
  vol <level>          set volume (0-100)
  select <n>           play playlist entry n
  open <path>          add a local file
  refresh              fetch one more video
  clear                clear the playlist
  fav                  add current video to favorites
  loop-single | loop-list | shuffle | autoplay
  save <path> | load <path>
  download             save current video to disk
  list | history | favorites | status
  quit";

fn parse_command(line: &str) -> std::result::Result<Input, String> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "" => return Ok(Input::Empty),
        "help" | "?" => return Ok(Input::Help),
        "play" => PlayerCommand::Play,
        "pause" => PlayerCommand::Pause,
        "stop" => PlayerCommand::Stop,
        "next" => PlayerCommand::Next,
        "prev" | "previous" => PlayerCommand::Previous,
        "seek" => {
            let percent = rest
                .parse::<f64>()
                .ok()
                .filter(|p: &f64| p.is_finite())
                .ok_or_else(|| format!("Invalid seek position '{}'", rest))?;
            PlayerCommand::Seek(SeekTarget::Fraction(percent / 100.0))
        }
        "vol" | "volume" => {
            let level: i32 = rest
                .parse()
                .map_err(|_| format!("Invalid volume '{}'", rest))?;
            PlayerCommand::SetVolume(level)
        }
        "select" => match rest.parse::<usize>() {
            Ok(n) if n > 0 => PlayerCommand::Select(n - 1),
            _ => return Err(format!("Invalid playlist entry '{}'", rest)),
        },
        "open" => PlayerCommand::OpenLocal(required_path(rest)?),
        "save" => PlayerCommand::SavePlaylist(required_path(rest)?),
        "load" => PlayerCommand::LoadPlaylist(required_path(rest)?),
        "refresh" => PlayerCommand::Refresh,
        "clear" => PlayerCommand::ClearPlaylist,
        "fav" | "favorite" => PlayerCommand::AddFavorite,
        "loop-single" => PlayerCommand::Toggle(Toggle::LoopSingle),
        "loop-list" => PlayerCommand::Toggle(Toggle::LoopPlaylist),
        "shuffle" => PlayerCommand::Toggle(Toggle::Shuffle),
        "autoplay" => PlayerCommand::Toggle(Toggle::AutoPlay),
        "download" => PlayerCommand::Download,
        "list" => PlayerCommand::Describe(Listing::Playlist),
        "history" => PlayerCommand::Describe(Listing::History),
        "favorites" => PlayerCommand::Describe(Listing::Favorites),
        "status" => PlayerCommand::Describe(Listing::Status),
        "quit" | "exit" => PlayerCommand::Shutdown,
        other => return Err(format!("Unknown command '{}', type 'help'", other)),
    };

    Ok(Input::Command(command))
}

fn required_path(rest: &str) -> std::result::Result<PathBuf, String> {
    if rest.is_empty() {
        Err("Missing path".to_string())
    } else {
        Ok(PathBuf::from(rest))
    }
}

/// Feed stdin lines into the player loop until quit or EOF
fn read_commands(handle: PlayerHandle) {
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        match parse_command(&line) {
            Ok(Input::Command(PlayerCommand::Shutdown)) => break,
            Ok(Input::Command(command)) => {
                if !handle.send(command) {
                    return;
                }
            }
            Ok(Input::Help) => println!("{}", HELP),
            Ok(Input::Empty) => {}
            Err(message) => println!("{}", message),
        }
    }
    handle.shutdown();
}

/// Prints player events to the console
struct ConsoleEventHandler;

impl PlayerEventHandler for ConsoleEventHandler {
    fn handle_event(&mut self, event: &PlayerEvent) {
        match event {
            PlayerEvent::Status { message } => println!("{}", message),
            PlayerEvent::Error { message } => println!("Error: {}", message),
            PlayerEvent::Listing { title, lines } => {
                println!("{}:", title);
                if lines.is_empty() {
                    println!("  (empty)");
                }
                for line in lines {
                    println!("  {}", line);
                }
            }
            PlayerEvent::Progress(progress) => {
                // Polled every few hundred ms, keep it out of the console
                debug!("Progress: {}", progress.label());
            }
            PlayerEvent::StateChanged { state } => debug!("State: {:?}", state),
            PlayerEvent::PlaylistChanged { len, current } => {
                debug!("Playlist: {} entries, current {:?}", len, current);
            }
            PlayerEvent::EndOfMedia => debug!("End of media reached"),
        }
    }
}
