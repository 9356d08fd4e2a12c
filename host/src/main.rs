//! BlueSentry host binary.
//!
//! Reads advertisement events from the platform BLE bridge (NDJSON on a
//! file, FIFO or stdin) and drives the engine: live device table and
//! radar, CSV session log, single-device tracker, GATT interrogation.
//!
//! Commands:
//! - scan: classify everything in range, export on exit
//! - track: follow one address with a live signal chart
//! - interrogate: dump one device's GATT table

mod display;
mod gatt_dump;
mod scan;
mod source;
mod track;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use bluesentry::config::{ScanConfig, TrackerConfig};
use bluesentry::gatt;
use bluesentry::protocol::VERSION;

use source::Input;

/// BlueSentry - BLE advertisement analysis and proximity tracking
#[derive(Parser)]
#[command(name = "bluesentry")]
#[command(version = VERSION)]
#[command(about = "Passive BLE scanner, radar and proximity tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for devices, then export the session log
    Scan {
        /// Scan duration in seconds
        #[arg(short, long, default_value_t = 20)]
        duration: u64,

        /// CSV output path (default: sentry_log_<timestamp>.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the post-scan interrogation prompt
        #[arg(long)]
        passive: bool,

        /// Advertisement source, NDJSON (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Write classified observations as NDJSON instead of the live table
        #[arg(long)]
        ndjson: bool,

        /// GATT dump file used for interrogation
        #[arg(long)]
        gatt: Option<PathBuf>,

        /// Ignore observations weaker than this (dBm)
        #[arg(long, default_value_t = -100, allow_negative_numbers = true)]
        min_rssi: i16,

        /// Hide the radar view
        #[arg(long)]
        no_radar: bool,
    },

    /// Track one device's signal strength
    Track {
        /// Target address (XX:XX:XX:XX:XX:XX)
        mac: String,

        /// Advertisement source, NDJSON (use - for stdin)
        #[arg(short, long, default_value = "-")]
        input: PathBuf,

        /// Write tracker ticks as NDJSON instead of the chart
        #[arg(long)]
        ndjson: bool,
    },

    /// Connect to a device and dump its GATT table
    Interrogate {
        /// Target address (XX:XX:XX:XX:XX:XX)
        mac: String,

        /// GATT dump file
        #[arg(long)]
        gatt: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let cli = Cli::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(cli));
    // A pending stdin read cannot be cancelled; don't wait on it
    runtime.shutdown_timeout(Duration::from_millis(250));
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    log::info!("BlueSentry v{} starting", VERSION);

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Ctrl+C received, stopping");
            stop.cancel();
        }
    });

    match cli.command {
        Commands::Scan {
            duration,
            output,
            passive,
            input,
            ndjson,
            gatt,
            min_rssi,
            no_radar,
        } => {
            let config = ScanConfig {
                duration: Duration::from_secs(duration),
                passive,
                output,
                min_rssi,
                ..ScanConfig::new()
            };
            let opts = scan::ScanOptions {
                config,
                input: Input::from_arg(&input),
                ndjson,
                radar: !no_radar,
                gatt,
            };
            scan::run(opts, cancel).await
        }
        Commands::Track { mac, input, ndjson } => {
            let opts = track::TrackOptions {
                address: mac,
                input: Input::from_arg(&input),
                ndjson,
                config: TrackerConfig::new(),
            };
            track::run(opts, cancel).await
        }
        Commands::Interrogate { mac, gatt } => {
            let mut client = gatt_dump::client(gatt.as_deref())?;
            println!("{}", display::interrogating(&mac));
            match gatt::interrogate(client.as_mut(), &mac) {
                Ok(reports) => print!("{}", display::render_report(&mac, &reports)),
                Err(err) => println!("{}", display::connection_failed(&err)),
            }
            Ok(())
        }
    }
}
