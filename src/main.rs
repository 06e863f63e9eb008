//! Bardkeys - MIDI controller to keystroke bridge
//!
//! Plays in-game instruments from a MIDI keyboard or Rock Band keytar.

use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bardkeys::cli::{self, Command, HELP};
use bardkeys::config::{AppConfig, ConfigWatcher, OutputKind};
use bardkeys::drivers::MidirBackend;
use bardkeys::paths::AppPaths;
use bardkeys::port::{find_device, Device, InputBackend};
use bardkeys::sink::{self, ConsoleSink, KeySink};
use bardkeys::{Engine, EngineError, EngineEvent};

/// Bardkeys - play in-game instruments from a MIDI controller
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (default: detected per install mode)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI inputs and exit
    #[arg(long)]
    list_ports: bool,

    /// Device to open, by index or name (overrides the config)
    #[arg(short, long)]
    device: Option<String>,

    /// Log keystrokes instead of sending them
    #[arg(long)]
    dry_run: bool,

    /// Run without the interactive prompt
    #[arg(long)]
    no_prompt: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let paths = match &args.config {
        Some(path) => AppPaths::with_config(path.clone()),
        None => AppPaths::detect(),
    };
    paths.ensure_directories()?;

    let _log_guard = init_logging(&args.log_level, &paths.logs_dir)?;

    info!("Starting Bardkeys v{}...", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", paths.config.display());

    // Enumeration only; the engine gets its own backend
    let mut scanner = MidirBackend::new("bardkeys-scan")?;

    if args.list_ports {
        print_devices(&scanner.enumerate()?);
        return Ok(());
    }

    let config = AppConfig::load_or_default(&paths.config).await?;

    let devices = scanner.enumerate()?;
    if devices.is_empty() {
        return Err(EngineError::NoDevices.into());
    }
    let device = initial_device(&devices, &args, &config);

    let sink = make_sink(config.keys.output, args.dry_run);
    let backend = MidirBackend::new("bardkeys")?;
    let mut engine = Engine::spawn(backend, sink, config.engine_options()?)?;
    let events = engine
        .take_event_receiver()
        .context("engine event receiver already taken")?;

    engine.request_device(device.id);

    let config_watcher = if paths.config.exists() {
        match ConfigWatcher::new(&paths.config) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Config hot-reload disabled: {:#}", e);
                None
            }
        }
    } else {
        None
    };

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    if !args.no_prompt {
        cli::spawn_prompt(command_tx).context("Failed to start prompt")?;
    } else {
        drop(command_tx);
    }

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    thread::Builder::new()
        .name("bardkeys-events".to_string())
        .spawn(move || {
            for event in events {
                if event_tx.send(event).is_err() {
                    break;
                }
            }
        })?;

    let app = App {
        engine,
        scanner,
        config,
    };
    let engine = app
        .run(command_rx, event_rx, config_watcher, shutdown_signal())
        .await;

    tokio::task::spawn_blocking(move || engine.shutdown()).await?;

    info!("Bardkeys shutdown complete");
    Ok(())
}

struct App {
    engine: Engine,
    scanner: MidirBackend,
    config: AppConfig,
}

impl App {
    /// Main loop. Hands the engine back for shutdown.
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<EngineEvent>,
        mut config_watcher: Option<ConfigWatcher>,
        shutdown: impl std::future::Future<Output = ()>,
    ) -> Engine {
        tokio::pin!(shutdown);
        let mut prompt_open = true;

        info!("✅ Bardkeys ready");

        loop {
            tokio::select! {
                command = commands.recv(), if prompt_open => {
                    match command {
                        Some(Command::Quit) => break,
                        Some(command) => self.handle_command(command),
                        None => {
                            debug!("Prompt closed");
                            prompt_open = false;
                        }
                    }
                }

                Some(event) = events.recv() => {
                    if !self.handle_event(event) {
                        break;
                    }
                }

                Some(config) = next_config(&mut config_watcher) => {
                    self.apply_config(config);
                }

                _ = &mut shutdown => break,
            }
        }

        self.engine
    }

    fn handle_command(&mut self, command: Command) {
        let result = match command {
            Command::List => {
                match self.scanner.enumerate() {
                    Ok(devices) => print_devices(&devices),
                    Err(e) => fail(&e),
                }
                return;
            }
            Command::Device(selector) => {
                self.switch_device(&selector);
                return;
            }
            Command::Status => {
                self.print_status();
                return;
            }
            Command::Help => {
                println!("{}", HELP);
                return;
            }
            Command::Quit => return,
            Command::Transpose(n) => self.engine.set_transpose(n),
            Command::MiddleC(note) => self.engine.set_middle_c(note),
            Command::Period(n) => self.engine.set_period(n),
            Command::Window { root, max } => self.engine.set_note_window(root, max),
            Command::Range(range) => self.engine.set_note_range(range),
            Command::Rock(enabled) => self.engine.set_rock_octave(enabled),
            Command::Bend(enabled) => self.engine.set_pitch_bend(enabled),
            Command::Modifier(controller) => self.engine.set_modifier_cc(controller),
        };

        match result {
            Ok(()) => println!("{} {:?}", "✓".green(), self.engine.settings()),
            Err(e) => fail(&e),
        }
    }

    fn switch_device(&mut self, selector: &str) {
        let devices = match self.scanner.enumerate() {
            Ok(devices) => devices,
            Err(e) => return fail(&e),
        };

        match find_device(&devices, selector) {
            Some(device) => {
                println!("{} switching to {}", "→".cyan(), device);
                self.engine.request_device(device.id);
            }
            None => println!("{} no device matches '{}'", "✗".red(), selector),
        }
    }

    /// Returns false once the engine has stopped
    fn handle_event(&mut self, event: EngineEvent) -> bool {
        match event {
            EngineEvent::Listening(device) => info!("🎹 Now playing from {}", device),
            EngineEvent::OpenFailed { device, error } => {
                warn!("Could not open {}: {} (use 'device' to pick another)", device, error)
            }
            EngineEvent::Recovered(device) => info!("MIDI subsystem reset, {} reopened", device),
            EngineEvent::Closed(device) => debug!("Closed {}", device),
            EngineEvent::Stopped => {
                warn!("Engine stopped");
                return false;
            }
        }
        true
    }

    fn apply_config(&mut self, config: AppConfig) {
        match config.translation.to_settings() {
            Ok(settings) => match self.engine.apply_settings(settings) {
                Ok(()) => info!("Translation settings updated"),
                Err(e) => warn!("Reloaded settings rejected: {}", e),
            },
            Err(e) => warn!("Reloaded settings rejected: {}", e),
        }

        if config.keys != self.config.keys {
            warn!("Changes to 'keys' take effect after a restart");
        }

        if config.midi.device != self.config.midi.device {
            if let Some(selector) = &config.midi.device {
                match self.scanner.enumerate() {
                    Ok(devices) => match selector.resolve(&devices) {
                        Some(device) => self.engine.request_device(device.id),
                        None => warn!("Configured device {} not found", selector),
                    },
                    Err(e) => warn!("Failed to list MIDI inputs: {}", e),
                }
            }
        }

        self.config = config;
    }

    fn print_status(&self) {
        let device = match self.engine.current_device() {
            Some(device) => device.to_string().green(),
            None => format!("{:?}", self.engine.state()).yellow(),
        };
        let settings = self.engine.settings();

        println!("\n{}", "=== Status ===".bold().cyan());
        println!("  Device:     {}", device);
        println!("  Transpose:  {}", settings.transpose);
        println!("  Period:     {}", settings.period);
        println!(
            "  Window:     {}..={} ({:?})",
            settings.root_note, settings.max_note, settings.note_range
        );
        println!("  Symbols:    {}", self.engine.symbol_count());
        println!("  Rock:       {}", on_off(settings.rock_octave_enabled));
        println!("  Pitch bend: {}", on_off(settings.pitch_bend_enabled));
        match settings.modifier_cc {
            Some(cc) => println!("  Modifier:   CC {}", cc),
            None => println!("  Modifier:   {}", "off".dimmed()),
        }
    }
}

/// Device from `--device`, then the config, then the first one
fn initial_device(devices: &[Device], args: &Args, config: &AppConfig) -> Device {
    let chosen = match (&args.device, &config.midi.device) {
        (Some(selector), _) => {
            let found = find_device(devices, selector);
            if found.is_none() {
                warn!("No device matches '{}'", selector);
            }
            found
        }
        (None, Some(selector)) => {
            let found = selector.resolve(devices);
            if found.is_none() {
                warn!("Configured device {} not found", selector);
            }
            found
        }
        (None, None) => None,
    };

    // Caller checked the list is not empty
    chosen.unwrap_or(&devices[0]).clone()
}

fn make_sink(output: OutputKind, dry_run: bool) -> Box<dyn KeySink> {
    if dry_run || output == OutputKind::Console {
        info!("Keystrokes are logged only");
        return Box::new(ConsoleSink::new());
    }

    match sink::system_sink() {
        Some(sink) => sink,
        None => {
            warn!("No system keystroke output on this platform, logging only");
            Box::new(ConsoleSink::new())
        }
    }
}

async fn next_config(watcher: &mut Option<ConfigWatcher>) -> Option<AppConfig> {
    match watcher {
        Some(watcher) => watcher.next_config().await,
        None => std::future::pending().await,
    }
}

fn print_devices(devices: &[Device]) {
    println!("\n{}", "=== MIDI Inputs ===".bold().cyan());
    if devices.is_empty() {
        println!("  {}", "No input devices found".dimmed());
    }
    for device in devices {
        println!("  {} {}", format!("[{}]", device.id.0).yellow(), device.name);
    }
}

fn fail(error: &dyn std::fmt::Display) {
    println!("{} {}", "✗".red(), error);
}

fn on_off(enabled: bool) -> ColoredString {
    if enabled {
        "on".green()
    } else {
        "off".dimmed()
    }
}

fn init_logging(level: &str, logs_dir: &Path) -> Result<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let file_appender = tracing_appender::rolling::daily(logs_dir, "bardkeys.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(file_writer),
        )
        .init();

    Ok(guard)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
