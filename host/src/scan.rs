//! `bluesentry scan`: live device table and radar, CSV export, optional
//! post-scan interrogation.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{Local, Utc};
use colored::Colorize;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use bluesentry::classifier;
use bluesentry::config::ScanConfig;
use bluesentry::gatt;
use bluesentry::protocol::{self, DeviceMessage, MAX_MSG_LEN, VERSION};
use bluesentry::radar;
use bluesentry::scanner::AdvertisementEvent;
use bluesentry::session::Session;

use crate::display;
use crate::gatt_dump;
use crate::source::{self, Input};

pub struct ScanOptions {
    pub config: ScanConfig,
    pub input: Input,
    /// Emit NDJSON instead of the live table
    pub ndjson: bool,
    pub radar: bool,
    pub gatt: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Timeout,
    Interrupted,
    SourceClosed,
}

pub async fn run(opts: ScanOptions, cancel: CancellationToken) -> anyhow::Result<()> {
    let config = &opts.config;
    let session = Session::new();
    let reader = opts.input.open().await?;
    let source_cancel = cancel.child_token();
    let (mut rx, reader_task) = source::spawn(reader, source_cancel.clone());

    log::info!(
        "scan started: {}s, min rssi {} dBm, source {:?}",
        config.duration.as_secs(),
        config.min_rssi,
        opts.input
    );

    let started = Instant::now();
    let deadline = time::sleep(config.duration);
    tokio::pin!(deadline);
    let mut render = time::interval(config.render_interval);
    render.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stdout = std::io::stdout();

    let reason = loop {
        tokio::select! {
            _ = &mut deadline => break StopReason::Timeout,
            _ = cancel.cancelled() => break StopReason::Interrupted,
            event = rx.recv() => match event {
                Some(event) => ingest(&session, config, &event, opts.ndjson, &mut stdout),
                None => break StopReason::SourceClosed,
            },
            _ = render.tick(), if !opts.ndjson => {
                let frame = draw(&session, &opts, started.elapsed());
                let _ = stdout.write_all(frame.as_bytes());
                let _ = stdout.flush();
            }
        }
    };
    source_cancel.cancel();
    drop(rx);

    match reason {
        StopReason::Timeout => log::info!("scan duration reached"),
        StopReason::Interrupted => log::info!("scan interrupted"),
        StopReason::SourceClosed => log::warn!("event source closed, ending scan early"),
    }
    match reader_task.await {
        Ok(Ok(events)) => log::debug!("reader delivered {} events", events),
        Ok(Err(err)) => log::warn!("event source failed: {:#}", err),
        Err(err) => log::warn!("event source task failed: {}", err),
    }

    if opts.ndjson {
        let msg = DeviceMessage::Status {
            devices: session.registry().len(),
            elapsed: started.elapsed().as_secs() as u32,
            version: VERSION,
        };
        write_message(&msg, &mut stdout);
    } else {
        let frame = draw(&session, &opts, started.elapsed());
        let _ = stdout.write_all(frame.as_bytes());
        println!("\n{}", "Scan complete.".green().bold());
    }

    let path = config.output_path(&Local::now());
    match session.finish(&path) {
        Ok(Some(rows)) => eprintln!("[*] Session saved to {} ({} devices)", path.display(), rows),
        Ok(None) => {}
        // The registry is still intact; report and carry on
        Err(err) => eprintln!("[!] {}", err),
    }

    let interactive =
        !config.passive && !opts.ndjson && !opts.input.is_stdin() && reason != StopReason::Interrupted;
    if interactive {
        follow_up(&session, &opts, &cancel).await?;
    }
    Ok(())
}

fn ingest<W: Write>(session: &Session, config: &ScanConfig, event: &AdvertisementEvent, ndjson: bool, out: &mut W) {
    let obs = classifier::classify(event);
    if !config.accepts(obs.rssi) {
        log::trace!("{} below threshold ({} dBm)", event.address, obs.rssi);
        return;
    }
    let now = Utc::now();
    session.registry().upsert(&event.address, obs.clone(), now);

    if ndjson {
        let services: Vec<&str> = obs.service_hints.iter().map(|h| h.label).collect();
        let msg = DeviceMessage::Device {
            mac: &event.address,
            name: &obs.name,
            rssi: obs.rssi,
            vendor: &obs.vendor,
            services: &services,
            privacy: obs.privacy.as_str(),
            ts: now.timestamp_millis(),
        };
        write_message(&msg, out);
    }
}

pub(crate) fn write_message<W: Write>(msg: &DeviceMessage, out: &mut W) {
    let mut buf = [0u8; MAX_MSG_LEN];
    match protocol::serialize_message(msg, &mut buf) {
        Some(len) => {
            let _ = out.write_all(&buf[..len]);
            let _ = out.flush();
        }
        None => log::warn!("message exceeds {} bytes, not written", MAX_MSG_LEN),
    }
}

fn draw(session: &Session, opts: &ScanOptions, elapsed: std::time::Duration) -> String {
    let snapshot = session.registry().snapshot();
    let rows = bluesentry::registry::to_rows(&snapshot);
    let grid = opts.radar.then(|| {
        radar::project(
            &snapshot,
            opts.config.radar_width,
            opts.config.radar_height,
            opts.config.radar_points,
        )
    });
    display::render_scan(&rows, grid.as_ref(), elapsed, opts.config.duration)
}

/// Parsed answer to the post-scan prompt.
#[derive(Debug, PartialEq, Eq)]
enum Selection {
    Exit,
    Device(usize),
    Invalid,
}

fn parse_selection(input: &str, count: usize) -> Selection {
    match input.trim().parse::<usize>() {
        Ok(0) => Selection::Exit,
        Ok(id) if id <= count => Selection::Device(id - 1),
        Ok(_) => Selection::Exit,
        Err(_) => Selection::Invalid,
    }
}

/// Run `fut` unless `cancel` fires first.
async fn until_cancelled<F: std::future::Future>(fut: F, cancel: &CancellationToken) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}

async fn follow_up(session: &Session, opts: &ScanOptions, cancel: &CancellationToken) -> anyhow::Result<()> {
    let rows = session.registry().rows();
    if rows.is_empty() {
        println!("No devices found.");
        return Ok(());
    }

    println!("\n{}", "Post-Scan Actions:".bold());
    print!("{}", display::render_table(&rows));
    print!("Enter the ID of a device to interrogate, or 0 to exit: ");
    std::io::stdout().flush()?;

    // Abandoned on Ctrl+C; main shuts the runtime down with a timeout
    let prompt = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        std::io::stdin().read_line(&mut line).map(|_| line)
    });
    let answer = match until_cancelled(prompt, cancel).await {
        Some(joined) => joined
            .context("prompt task failed")?
            .context("failed to read selection")?,
        None => {
            println!("\nExiting.");
            return Ok(());
        }
    };

    let index = match parse_selection(&answer, rows.len()) {
        Selection::Device(index) => index,
        Selection::Exit => {
            println!("Exiting.");
            return Ok(());
        }
        Selection::Invalid => {
            println!("Invalid selection.");
            return Ok(());
        }
    };

    let address = rows[index].address.clone();
    let mut client = gatt_dump::client(opts.gatt.as_deref())?;
    println!("\n{}", display::interrogating(&address));
    let result = tokio::task::spawn_blocking(move || gatt::interrogate(client.as_mut(), &address).map(|r| (address, r)))
        .await
        .context("interrogation task failed")?;
    match result {
        Ok((address, reports)) => print!("{}", display::render_report(&address, &reports)),
        Err(err) => println!("{}", display::connection_failed(&err)),
    }
    Ok(())
}
