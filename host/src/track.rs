//! `bluesentry track <MAC>`: live RSSI chart and proximity panel for one
//! device.

use std::io::Write;
use std::time::Instant;

use colored::Colorize;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use bluesentry::config::TrackerConfig;
use bluesentry::protocol::DeviceMessage;
use bluesentry::tracker::{SharedTracker, SignalTracker};

use crate::display;
use crate::scan::write_message;
use crate::source::{self, Input};

pub struct TrackOptions {
    pub address: String,
    pub input: Input,
    pub ndjson: bool,
    pub config: TrackerConfig,
}

pub async fn run(opts: TrackOptions, cancel: CancellationToken) -> anyhow::Result<()> {
    let tracker = SharedTracker::new(SignalTracker::with_stale_after(
        opts.address.as_str(),
        opts.config.stale_after,
    ));
    let reader = opts.input.open().await?;
    let source_cancel = cancel.child_token();
    let (mut rx, reader_task) = source::spawn(reader, source_cancel.clone());

    log::info!("tracking {} (tick {:?})", opts.address, opts.config.tick_interval);

    let mut ticker = time::interval(opts.config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut stdout = std::io::stdout();
    let mut source_open = true;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv(), if source_open => match event {
                Some(event) => {
                    if tracker.on_advertisement(&event, Instant::now()) {
                        log::trace!("target seen at {:?} dBm", event.rssi);
                    }
                }
                None => {
                    source_open = false;
                    log::warn!("event source closed; signal will go stale");
                }
            },
            _ = ticker.tick() => {
                tracker.tick(Instant::now());
                emit(&tracker, opts.ndjson, &mut stdout);
            }
        }
    }

    // Stop at the tick boundary, then draw the final frame
    tracker.stop();
    emit(&tracker, opts.ndjson, &mut stdout);
    if !opts.ndjson {
        println!("{}", "Tracker stopped.".red().bold());
    }

    source_cancel.cancel();
    drop(rx);
    match reader_task.await {
        Ok(Ok(events)) => log::debug!("reader delivered {} events", events),
        Ok(Err(err)) => log::warn!("event source failed: {:#}", err),
        Err(err) => log::warn!("event source task failed: {}", err),
    }
    Ok(())
}

fn emit<W: Write>(tracker: &SharedTracker, ndjson: bool, out: &mut W) {
    tracker.with(|t| {
        if ndjson {
            let msg = DeviceMessage::Track {
                mac: t.address(),
                name: t.name(),
                rssi: t.current_rssi(),
                proximity: t.proximity().label(),
                state: t.state().as_str(),
                samples: t.len(),
            };
            write_message(&msg, out);
        } else {
            let _ = out.write_all(display::render_tracker(t).as_bytes());
            let _ = out.flush();
        }
    })
}
