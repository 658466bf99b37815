//! Desk Sentinel command-line interface.

use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use crossbeam_channel::bounded;
use desk_sentinel::engine::producers::{spawn_capture, spawn_input, spawn_timers};
use desk_sentinel::engine::QUEUE_CAPACITY;
use desk_sentinel::sensors::{ScriptedInput, ScriptedSession};
use desk_sentinel::{Config, Dispatcher, Engine, LogNotifier, LogSpeaker, Store};
use std::error::Error;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "desk-sentinel",
    version = desk_sentinel::VERSION,
    about = "Work-session wellness monitoring and alerting"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a monitoring session against the scripted demo camera
    Start {
        /// Session length in seconds
        #[arg(long, default_value_t = 30)]
        duration: u64,

        /// Scripted blink cadence, in frames
        #[arg(long, default_value_t = 20)]
        blink_every: usize,

        /// Scripted keyboard presses over the session
        #[arg(long, default_value_t = 300)]
        key_presses: usize,

        /// Scripted mouse clicks over the session
        #[arg(long, default_value_t = 120)]
        mouse_clicks: usize,
    },
    /// Print summed activity for the recent past
    Status {
        /// Look-back window in hours
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },
    /// Print the current monitoring thresholds
    Settings,
    /// Update one monitoring threshold
    Set { name: String, value: String },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Start {
            duration,
            blink_every,
            key_presses,
            mouse_clicks,
        } => cmd_start(duration, blink_every, key_presses, mouse_clicks),
        Commands::Status { hours } => cmd_status(hours),
        Commands::Settings => cmd_settings(),
        Commands::Set { name, value } => cmd_set(&name, &value),
    };

    if let Err(err) = result {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn cmd_start(
    duration: u64,
    blink_every: usize,
    key_presses: usize,
    mouse_clicks: usize,
) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    config.ensure_directories()?;
    let store = Store::open(config.db_path())?;
    let settings = store.load_settings()?;
    let dispatcher = Dispatcher::new(Box::new(LogNotifier), Box::new(LogSpeaker));

    let (tx, rx) = bounded(QUEUE_CAPACITY);
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);
        })?;
    }

    let frame_count = (duration * 1000 / config.frame_interval_ms) as usize;
    let (camera, detector) = ScriptedSession::demo(frame_count, blink_every).split();
    let capture = spawn_capture(
        Box::new(camera),
        Box::new(detector),
        tx.clone(),
        running.clone(),
        Duration::from_millis(config.frame_interval_ms),
    )?;
    let input = spawn_input(
        Box::new(ScriptedInput::typing_burst(
            key_presses,
            mouse_clicks,
            Duration::from_millis(10),
        )),
        tx.clone(),
        running.clone(),
    )?;
    let timers = spawn_timers(tx, running.clone(), &config)?;

    let started = Utc::now();
    let mut engine = Engine::new(settings, store, dispatcher, started);
    let run_result = engine.run(&rx, running.clone());

    running.store(false, Ordering::SeqCst);
    let _ = capture.join();
    let _ = input.join();
    let _ = timers.join();
    run_result?;

    let totals = engine.store().totals_since(started)?;
    println!("Session summary:");
    println!("{}", serde_json::to_string_pretty(&totals)?);
    Ok(())
}

fn cmd_status(hours: i64) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    config.ensure_directories()?;
    let store = Store::open(config.db_path())?;
    let totals = store.totals_since(Utc::now() - ChronoDuration::hours(hours))?;
    println!("{}", serde_json::to_string_pretty(&totals)?);
    Ok(())
}

fn cmd_settings() -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    config.ensure_directories()?;
    let store = Store::open(config.db_path())?;
    let settings = store.load_settings()?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

fn cmd_set(name: &str, value: &str) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    config.ensure_directories()?;
    let store = Store::open(config.db_path())?;
    let settings = store.update_setting(name, value)?;
    let stored = settings.get(name).unwrap_or_default();
    println!("{name} = {stored}");
    Ok(())
}
