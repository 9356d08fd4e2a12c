//! Scan and tracker configuration.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, TimeZone};

use crate::export;
use crate::radar;
use crate::tracker;

/// Runtime configuration for a scan session
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    /// How long to listen before exporting
    pub duration: Duration,
    /// Table/radar redraw period
    pub render_interval: Duration,
    /// Skip the post-scan interrogation prompt
    pub passive: bool,
    /// CSV destination. `None` derives a timestamped name at export time.
    pub output: Option<PathBuf>,
    /// Minimum RSSI threshold (dBm). Observations weaker than this are ignored.
    pub min_rssi: i16,
    pub radar_width: usize,
    pub radar_height: usize,
    /// Number of strongest devices plotted on the radar
    pub radar_points: usize,
}

impl ScanConfig {
    pub const fn new() -> Self {
        Self {
            duration: Duration::from_secs(20),
            render_interval: Duration::from_millis(500),
            passive: false,
            output: None,
            min_rssi: -100,
            radar_width: 41,
            radar_height: 17,
            radar_points: radar::DEFAULT_MAX_POINTS,
        }
    }

    /// Export destination, falling back to `sentry_log_<timestamp>.csv`.
    pub fn output_path<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> PathBuf
    where
        Tz::Offset: std::fmt::Display,
    {
        self.output
            .clone()
            .unwrap_or_else(|| export::default_log_path(now))
    }

    /// Whether an observation at `rssi` passes the threshold.
    pub fn accepts(&self, rssi: i16) -> bool {
        rssi >= self.min_rssi
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime configuration for the signal tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Sampling tick period
    pub tick_interval: Duration,
    /// Silence after which a tick records signal loss
    pub stale_after: Duration,
}

impl TrackerConfig {
    pub const fn new() -> Self {
        Self {
            tick_interval: Duration::from_millis(200),
            stale_after: tracker::STALE_AFTER,
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new()
    }
}
