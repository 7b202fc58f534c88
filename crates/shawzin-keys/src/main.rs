//! shawzin-keys - Play MIDI on the Warframe shawzin
//!
//! Plays MIDI files or live MIDI input by pressing the shawzin's keys in the
//! game window.

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use crossbeam_channel::{bounded, never, select, unbounded, Receiver};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use shawzin_keys::{
    config::Config,
    engine::Engine,
    focus::{FocusGate, UncheckedWindows, WindowSystem, XdotoolWindows},
    instrument::SCALE_NAMES,
    keys::{injection_available, parse_key, DryRunKeySink, KeyBindings, KeySink, RdevKeySink},
    midi::{list_devices, LiveInput},
    os_keyboard::HotkeyListener,
    playback::{Player, PlayerEvent, Song},
    session::{Session, SessionCommand, SessionOptions, SessionStatus},
    KeyActuator,
};

#[derive(Parser)]
#[command(name = "shawzin-keys")]
#[command(author, version, about = "Play MIDI on the Warframe shawzin", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (default: ~/.config/shawzin-keys/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Never press the vibrato key
    #[arg(long, global = true)]
    no_vibrato: bool,

    /// Skip notes outside the shawzin's range instead of folding them in
    #[arg(long, global = true)]
    no_transpose: bool,

    /// Title of the game window
    #[arg(short, long, global = true)]
    window: Option<String>,

    /// Send keys regardless of which window has focus
    #[arg(long, global = true)]
    no_focus_check: bool,

    /// Log key presses instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    /// Scale currently selected in the game (0-8, default 0)
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(0..9))]
    start_scale: Option<u8>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a MIDI file
    Play {
        /// MIDI file to play
        file: PathBuf,

        /// Playback speed multiplier
        #[arg(short, long)]
        speed: Option<f64>,

        /// Tracks to play, comma separated (default: all)
        #[arg(short, long, value_delimiter = ',')]
        tracks: Vec<usize>,
    },
    /// Play notes from a MIDI input device
    Listen {
        /// Input device name (partial match)
        #[arg(short, long)]
        device: Option<String>,
    },
    /// List the tracks of a MIDI file
    Tracks {
        /// MIDI file to inspect
        file: PathBuf,
    },
    /// List available MIDI input devices
    Devices,
    /// Create a default configuration file
    Init,
    /// Show the configuration file path
    ConfigPath,
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let path = Config::create_default_config_file()?;
            println!("Created default config at: {}", path.display());
            return Ok(());
        }
        Commands::ConfigPath => {
            let path = Config::config_path()?;
            println!("{}", path.display());
            return Ok(());
        }
        Commands::Devices => {
            let devices = list_devices()?;
            if devices.is_empty() {
                println!("No MIDI input devices found");
            } else {
                println!("Available MIDI input devices:");
                for device in devices {
                    println!("  {}: {}", device.port_index, device.name);
                }
            }
            return Ok(());
        }
        Commands::Tracks { ref file } => return print_tracks(file),
        _ => {}
    }

    // Load config
    let mut config = if let Some(path) = &cli.config {
        Config::load_from(path).with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        Config::load_or_default()
    };

    // Apply CLI overrides
    if cli.no_vibrato {
        config.playback.enable_vibrato = false;
    }
    if cli.no_transpose {
        config.playback.transpose_notes = false;
    }
    if let Some(title) = &cli.window {
        config.window.title = title.clone();
    }
    if cli.no_focus_check {
        config.window.check_focus = false;
    }

    let mut engine = build_engine(&config, cli.dry_run)?;
    if let Some(scale) = cli.start_scale {
        engine.sync_scale(scale as usize);
    }

    match cli.command {
        Commands::Play { file, speed, tracks } => {
            let speed = speed.unwrap_or(config.playback.speed);
            play_file(&config, engine, &file, speed, &tracks)
        }
        Commands::Listen { device } => {
            let device = device.or_else(|| config.midi.input_device.clone());
            listen(&config, engine, device.as_deref())
        }
        _ => Ok(()),
    }
}

/// Set up key output and focus gating, then capture the game window
fn build_engine(config: &Config, dry_run: bool) -> Result<Engine> {
    let bindings = KeyBindings::from_settings(&config.keys).context("Invalid key binding in config")?;

    let sink: Arc<dyn KeySink> = if dry_run {
        Arc::new(DryRunKeySink)
    } else if injection_available() {
        Arc::new(RdevKeySink::new(config.playback.key_delay()))
    } else {
        bail!("Cannot send key presses on this system (is DISPLAY set?). Try --dry-run.");
    };

    let windows: Box<dyn WindowSystem> = if dry_run || !config.window.check_focus {
        Box::new(UncheckedWindows)
    } else {
        Box::new(XdotoolWindows::new().context("Focus checking is unavailable, use --no-focus-check to skip it")?)
    };

    log::info!("Sending keys via {}", sink.name());
    let actuator = KeyActuator::new(sink, bindings, config.playback.vibrato_hold());
    let mut engine = Engine::new(actuator, FocusGate::new(windows));

    engine
        .arm_window(&config.window.title)
        .with_context(|| format!("Is the game running? No window titled '{}'", config.window.title))?;

    Ok(engine)
}

/// Start the stop hotkey listener, if the system supports it
fn stop_hotkey(config: &Config) -> Result<Option<HotkeyListener>> {
    let key = parse_key(&config.keys.stop).context("Invalid stop key in config")?;
    let listener = HotkeyListener::new(key);
    if listener.is_none() {
        log::warn!("Global hotkeys unavailable, press Ctrl+C to stop");
    }
    Ok(listener)
}

fn play_file(config: &Config, engine: Engine, file: &Path, speed: f64, tracks: &[usize]) -> Result<()> {
    let song = Song::load(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let notes = song.notes_for(tracks);
    if notes.is_empty() {
        bail!("No notes to play in {}", file.display());
    }

    let (status_tx, status_rx) = unbounded();
    let session = Session::spawn(engine, SessionOptions::from(&config.playback), status_tx);

    // Held until the session reports the window is focused
    let (done_tx, done_rx) = bounded(1);
    let note_tx = session.sender();
    let player = Player::paused(notes, speed, move |event| match event {
        PlayerEvent::Note(note) => {
            let _ = note_tx.send(SessionCommand::Note(note));
        }
        PlayerEvent::Finished => {
            let _ = done_tx.send(());
        }
    });

    let hotkey = stop_hotkey(config)?;
    println!(
        "Playing '{}' ({}) at {}x. Focus the game window to start, press {} to stop.",
        song.name,
        format_time(player.duration()),
        speed,
        config.keys.stop
    );

    let stopped = run_status_loop(&session, &status_rx, hotkey.as_ref(), Some(&done_rx), |status| {
        match status {
            SessionStatus::Playing => player.resume(),
            SessionStatus::Paused => player.pause(),
            SessionStatus::Played { scale, .. } => {
                log::debug!(
                    "{} / {} {}",
                    format_time(player.position()),
                    format_time(player.duration()),
                    SCALE_NAMES[*scale]
                );
            }
            _ => {}
        }
    });

    player.stop();
    session.shutdown();
    println!("{}", if stopped { "Stopped" } else { "Finished" });
    Ok(())
}

fn listen(config: &Config, engine: Engine, device: Option<&str>) -> Result<()> {
    let (status_tx, status_rx) = unbounded();
    let session = Session::spawn(engine, SessionOptions::from(&config.playback), status_tx);

    let note_tx = session.sender();
    let on_note = move |note| {
        let _ = note_tx.send(SessionCommand::Note(note));
    };
    let input = match device {
        Some(name) => LiveInput::open(name, on_note)?,
        None => {
            let first = list_devices()?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("No MIDI input devices found"))?;
            LiveInput::open_device(first, on_note)?
        }
    };

    let hotkey = stop_hotkey(config)?;
    println!(
        "Listening on '{}'. Focus the game window to play, press {} to stop.",
        input.device().name,
        config.keys.stop
    );

    run_status_loop(&session, &status_rx, hotkey.as_ref(), None, |_| {});

    drop(input);
    session.shutdown();
    println!("Stopped");
    Ok(())
}

/// Print session status until the session stops or `done` fires
///
/// Returns true if playback was stopped by the hotkey.
fn run_status_loop<F>(
    session: &Session,
    status_rx: &Receiver<SessionStatus>,
    hotkey: Option<&HotkeyListener>,
    done: Option<&Receiver<()>>,
    mut on_status: F,
) -> bool
where
    F: FnMut(&SessionStatus),
{
    let no_hotkey = never();
    let hotkey_rx = hotkey.map(|h| h.receiver()).unwrap_or(&no_hotkey);
    let not_done = never();
    let done_rx = done.unwrap_or(&not_done);

    loop {
        select! {
            recv(status_rx) -> status => {
                let Ok(status) = status else { return false };
                on_status(&status);
                match status {
                    SessionStatus::Playing => println!("Game window focused, playing"),
                    SessionStatus::Paused => println!("Game window lost focus, paused"),
                    SessionStatus::Played { pitch, scale } => {
                        log::info!("Played {} on {}", pitch, SCALE_NAMES[scale]);
                    }
                    SessionStatus::Dropped { pitch } => log::info!("Skipped note {} (out of range)", pitch),
                    SessionStatus::Failed(e) => eprintln!("Failed to send keys: {}", e),
                    SessionStatus::Stopped => return true,
                }
            }
            recv(hotkey_rx) -> _ => session.stop(),
            recv(done_rx) -> _ => return false,
        }
    }
}

fn format_time(time: Duration) -> String {
    let secs = time.as_secs();
    format!("{}:{:02}", secs / 60, secs % 60)
}

fn print_tracks(file: &Path) -> Result<()> {
    let song = Song::load(file).with_context(|| format!("Failed to read {}", file.display()))?;
    println!("{} ({})", song.name, format_time(song.duration));
    for track in &song.tracks {
        println!(
            "  {:>2}: {:<24} {} notes",
            track.index,
            track.name.as_deref().unwrap_or("(unnamed)"),
            track.note_count
        );
    }
    let playable = song.playable_tracks().count();
    if playable == 0 {
        println!("No tracks with notes");
    }
    Ok(())
}
