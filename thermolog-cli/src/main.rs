//! CLI for the thermolog telemetry retention pipeline.
//!
//! Provides the retention daemon itself, a measurement simulator to feed
//! it, and an inspection command for the tier logs.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use rand::Rng;

use thermolog::channel::{Channel, ChannelListener, SocketChannel};
use thermolog::cutoff::CutoffConfig;
use thermolog::record::Record;
use thermolog::store::{LOG_NAMES, TieredLogStore};
use thermolog::Pipeline;

/// thermolog — tiered telemetry retention pipeline.
#[derive(Parser)]
#[command(name = "thermolog", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Run the retention daemon: ingest from the channel, roll up, expire.
    Run {
        /// Path of the channel socket to bind.
        #[arg(long, default_value = "/tmp/thermolog.sock")]
        socket: PathBuf,

        /// Directory holding the three tier logs.
        #[arg(long, default_value = "./logs")]
        log_dir: PathBuf,

        /// Use the short debug cutoffs (30s/120s/300s/600s) instead of the
        /// production hour/day/month/year set.
        #[arg(short, long)]
        debug_cutoffs: bool,

        /// Load cutoffs from a JSON file instead of the built-in sets.
        #[arg(long, conflicts_with = "debug_cutoffs")]
        cutoffs: Option<PathBuf>,
    },

    /// Simulate a measurement device: random-walk temperatures into the channel.
    Simulate {
        /// Path of the channel socket to connect to.
        #[arg(long, default_value = "/tmp/thermolog.sock")]
        socket: PathBuf,

        /// Seconds between measurements.
        #[arg(long, default_value = "5")]
        interval: u64,

        /// Starting temperature in °C.
        #[arg(long, default_value = "-5.0", allow_hyphen_values = true)]
        start_temp: f32,
    },

    /// Display record counts and age spans for each tier log.
    Info {
        /// Directory holding the three tier logs.
        #[arg(long, default_value = "./logs")]
        log_dir: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            socket,
            log_dir,
            debug_cutoffs,
            cutoffs,
        } => cmd_run(&socket, &log_dir, debug_cutoffs, cutoffs.as_deref()),
        Commands::Simulate {
            socket,
            interval,
            start_temp,
        } => cmd_simulate(&socket, interval, start_temp),
        Commands::Info { log_dir } => cmd_info(&log_dir),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Implements `thermolog run`.
fn cmd_run(
    socket: &Path,
    log_dir: &Path,
    debug_cutoffs: bool,
    cutoffs_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let cutoffs = match cutoffs_file {
        Some(path) => CutoffConfig::load(path)?,
        None if debug_cutoffs => CutoffConfig::debug(),
        None => CutoffConfig::production(),
    };
    tracing::info!(?cutoffs, "cutoff configuration");

    let listener = ChannelListener::bind(socket)?;
    tracing::info!("waiting for producer on '{}'", listener.path().display());
    let channel = listener.accept()?;
    // Armed so shutdown can interrupt a quiet channel.
    channel.set_read_timeout(Some(Duration::from_millis(500)))?;
    tracing::info!("producer connected");

    let store = Arc::new(TieredLogStore::open(log_dir, cutoffs)?);
    let pipeline = Pipeline::spawn(channel, store);

    // Workers loop until the channel fails; a fatal channel error surfaces
    // here and exits non-zero.
    pipeline.join()?;
    Ok(())
}

/// Implements `thermolog simulate`.
///
/// Mirrors a sensor device: a random walk around the starting temperature,
/// one fixed-size frame per interval, forever.
fn cmd_simulate(
    socket: &Path,
    interval: u64,
    start_temp: f32,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut channel = SocketChannel::connect(socket)?;
    tracing::info!("connected to '{}'", socket.display());

    let mut rng = rand::rng();
    let mut temperature = start_temp;
    let mut feels_like = start_temp - 5.0;

    loop {
        temperature += rng.random_range(-0.1..0.1f32);
        feels_like += rng.random_range(-0.1..0.1f32);

        let record = Record::new(temperature, feels_like, epoch_now()?);
        channel.write(&record)?;
        tracing::debug!(temperature, feels_like, "measurement sent");

        std::thread::sleep(Duration::from_secs(interval));
    }
}

/// Implements `thermolog info`.
fn cmd_info(log_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let now = epoch_now()?;

    println!("Log directory: {}", log_dir.display());
    println!();

    for (tier, name) in LOG_NAMES.iter().enumerate() {
        let path = log_dir.join(name);
        println!("Tier {tier}: {name}");

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                println!("  (no log file yet)");
                println!();
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        let mut malformed = 0usize;
        for line in contents.lines().filter(|l| !l.is_empty()) {
            match Record::parse(line) {
                Ok(record) => records.push(record),
                Err(_) => malformed += 1,
            }
        }

        println!("  Records: {}", records.len());
        if malformed > 0 {
            println!("  Malformed lines: {malformed}");
        }
        if let (Some(oldest), Some(newest)) = (records.first(), records.last()) {
            println!("  Oldest: {} ago", format_age(now - oldest.timestamp));
            println!("  Newest: {} ago", format_age(now - newest.timestamp));
            println!(
                "  Last record: {:.2}°C feels like {:.2}°C",
                newest.temperature, newest.feels_like
            );
        }
        println!();
    }

    Ok(())
}

/// Current time in epoch seconds.
#[allow(clippy::cast_possible_wrap)] // epoch seconds fit in i64 far beyond any plausible date
fn epoch_now() -> Result<i64, Box<dyn std::error::Error>> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as i64)
}

/// Formats an age in seconds as a compact human-readable duration.
fn format_age(secs: i64) -> String {
    if secs < 0 {
        return format!("-{}", format_age(-secs));
    }
    #[allow(clippy::cast_sign_loss)] // negative handled above
    let secs = secs as u64;
    if secs >= 86400 {
        format!("{}d{}h", secs / 86400, (secs % 86400) / 3600)
    } else if secs >= 3600 {
        format!("{}h{}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m{}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}
