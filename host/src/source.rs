//! Advertisement event source.
//!
//! The BLE stack bridge writes one NDJSON advertisement per line to a file,
//! FIFO or our stdin. A reader task decodes lines and feeds a bounded
//! channel; the scan or track loop is the single consumer.

use std::path::{Path, PathBuf};

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use bluesentry::protocol;
use bluesentry::scanner::AdvertisementEvent;

/// Ingest channel depth
pub const CHANNEL_CAPACITY: usize = 16;

/// Lines longer than this are discarded whole
const MAX_LINE_LEN: usize = 4096;

pub type EventReader = Box<dyn AsyncBufRead + Send + Unpin>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Stdin,
    File(PathBuf),
}

impl Input {
    /// `-` selects stdin.
    pub fn from_arg(path: &Path) -> Self {
        if path == Path::new("-") {
            Input::Stdin
        } else {
            Input::File(path.to_path_buf())
        }
    }

    pub fn is_stdin(&self) -> bool {
        matches!(self, Input::Stdin)
    }

    pub async fn open(&self) -> anyhow::Result<EventReader> {
        match self {
            Input::Stdin => Ok(Box::new(BufReader::new(tokio::io::stdin()))),
            Input::File(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("failed to open event source {}", path.display()))?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }
}

/// Start the reader task. The receiver yields `None` once the source hits
/// EOF, the token is cancelled, or the reader fails.
pub fn spawn(
    reader: EventReader,
    cancel: CancellationToken,
) -> (mpsc::Receiver<AdvertisementEvent>, JoinHandle<anyhow::Result<usize>>) {
    let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
    let handle = tokio::spawn(read_events(reader, tx, cancel));
    (rx, handle)
}

/// Decode lines until EOF or cancellation. Returns the number of events
/// delivered.
pub async fn read_events<R>(
    mut reader: R,
    tx: mpsc::Sender<AdvertisementEvent>,
    cancel: CancellationToken,
) -> anyhow::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = Vec::with_capacity(256);
    let mut delivered = 0usize;
    let mut dropped = 0usize;

    loop {
        line.clear();
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            read = reader.read_until(b'\n', &mut line) => read.context("event source read failed")?,
        };
        if read == 0 {
            log::info!("event source closed after {} events", delivered);
            break;
        }
        if line.len() > MAX_LINE_LEN {
            log::warn!("discarding {} byte line from event source", line.len());
            dropped += 1;
            continue;
        }

        let Some(event) = protocol::parse_advertisement(&line) else {
            dropped += 1;
            continue;
        };
        if tx.send(event).await.is_err() {
            // Consumer gone
            break;
        }
        delivered += 1;
    }

    if dropped > 0 {
        log::info!("dropped {} undecodable lines", dropped);
    }
    Ok(delivered)
}
