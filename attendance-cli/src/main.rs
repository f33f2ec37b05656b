//! Attendance CLI Application
//!
//! Command-line front end for the attendance-core library. It adds:
//! - TOML configuration and logging setup
//! - The attendance loop against a USB NFC reader
//! - Operator prompt and console status feedback
//! - Roster administration commands

use anyhow::{bail, Context, Result};
use attendance_core::reader::{select_first_device, select_named_device, NfcReader};
use attendance_core::{
    AttendanceCoordinator, CardReader, CardUid, JsonFileBackend, PresenceTracker, RecordStore,
    SystemClock,
};
use clap::{Parser, Subcommand};
use std::io;
use std::path::PathBuf;

mod admin;
mod config;
mod display;
mod prompt;
mod status;

use config::AppConfig;
use prompt::LinePrompt;
use status::ConsoleIndicator;

/// Attendance - log club attendance from NFC cards
#[derive(Parser, Debug)]
#[command(name = "attendance")]
#[command(about = "Log attendance from proximity cards and manage the roster", long_about = None)]
#[command(version)]
struct Args {
    /// Path to configuration file (default: <config dir>/attendance/config.toml)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Store file, overriding the configured one
    #[arg(short, long, value_name = "FILE", global = true)]
    store: Option<PathBuf>,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the attendance loop (default)
    Run {
        /// Reader connection string (default: configured, then first found)
        #[arg(short, long)]
        device: Option<String>,
    },
    /// List reader devices
    Devices,
    /// Show everyone with their cards and attendance count
    List,
    /// Show the attendance history of one person
    Show {
        /// Person id or name
        person: String,
    },
    /// Change a person's name
    Rename { person: String, name: String },
    /// Give a person another card
    AddCard {
        person: String,
        /// Card UID in hex; omit with --scan
        #[arg(required_unless_present = "scan", conflicts_with = "scan")]
        uid: Option<CardUid>,
        /// Read the card from the reader instead
        #[arg(long)]
        scan: bool,
    },
    /// Take a card away from a person
    RemoveCard { person: String, uid: CardUid },
    /// Create a person without presenting a card
    Register {
        name: String,
        /// First card UID in hex
        #[arg(long)]
        card: Option<CardUid>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    log::info!("Attendance CLI v{}", env!("CARGO_PKG_VERSION"));
    log::debug!("Using attendance-core v{}", attendance_core::VERSION);

    let config = config::resolve_config(args.config.as_deref())?;
    let store_path = config.store_path(args.store.as_deref());
    log::debug!("Store file {:?}", store_path);

    let mut out = io::stdout().lock();
    match args.command.unwrap_or(Command::Run { device: None }) {
        Command::Run { device } => run_mode(&config, store_path, device),
        Command::Devices => devices_mode(&config),
        Command::List => admin::list(&open_store(&config, store_path)?, &mut out),
        Command::Show { person } => admin::show(&open_store(&config, store_path)?, &person, &mut out),
        Command::Rename { person, name } => {
            let mut store = open_store(&config, store_path)?;
            admin::rename(&mut store, &person, &name, &mut out)
        }
        Command::AddCard { person, uid, scan } => {
            let mut store = open_store(&config, store_path)?;
            let card = match uid {
                Some(card) => card,
                None if scan => scan_mode(&config)?,
                None => bail!("Give a card UID or --scan"),
            };
            admin::add_card(&mut store, &person, card, &mut out)
        }
        Command::RemoveCard { person, uid } => {
            let mut store = open_store(&config, store_path)?;
            admin::remove_card(&mut store, &person, uid, &mut out)
        }
        Command::Register { name, card } => {
            let mut store = open_store(&config, store_path)?;
            admin::register(&mut store, &name, card, &mut out)
        }
    }
}

fn open_store(config: &AppConfig, path: PathBuf) -> Result<RecordStore<JsonFileBackend>> {
    RecordStore::open_with(
        JsonFileBackend::new(&path),
        config.store_config(),
        SystemClock,
    )
    .with_context(|| format!("Failed to open store {:?}", path))
}

fn open_reader(config: &AppConfig) -> Result<NfcReader> {
    NfcReader::open(&config.nfc_libraries()).context("Failed to initialise NFC reader")
}

/// Attendance loop: poll the reader and log every card that appears
fn run_mode(config: &AppConfig, store_path: PathBuf, device: Option<String>) -> Result<()> {
    let mut store = open_store(config, store_path)?;
    log::info!("Loaded {} people", store.len());

    let mut reader = open_reader(config)?;
    match device.as_deref().or(config.reader.device.as_deref()) {
        Some(name) => select_named_device(&mut reader, name)
            .with_context(|| format!("Failed to open NFC device {}", name))?,
        None => select_first_device(&mut reader).context("Failed to open NFC device")?,
    };

    let tracker = PresenceTracker::new(reader, config.tracker_config());
    println!("Ready, present a card");

    let mut coordinator = AttendanceCoordinator::new(&mut store, LinePrompt::stdin())
        .with_indicator(ConsoleIndicator::stdout());
    let summary = coordinator.run(tracker).context("Card reader failed")?;

    log::info!(
        "Stopped after {} cards: {} logged, {} repeats, {} registered, {} failed",
        summary.events,
        summary.accepted,
        summary.suppressed,
        summary.registered,
        summary.failed
    );
    Ok(())
}

fn devices_mode(config: &AppConfig) -> Result<()> {
    let mut reader = open_reader(config)?;
    let devices = reader.list_devices().context("Failed to list NFC devices")?;
    if devices.is_empty() {
        println!("No NFC devices found");
    }
    for device in devices {
        println!("{}", device);
    }
    Ok(())
}

/// Wait for a card on the reader, for `add-card --scan`
fn scan_mode(config: &AppConfig) -> Result<CardUid> {
    let mut reader = open_reader(config)?;
    admin::scan_card(
        &mut reader,
        config.reader.device.as_deref(),
        config.tracker_config().poll_interval(),
    )
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
