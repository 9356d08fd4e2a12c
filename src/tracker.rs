//! Single-target signal tracker.
//!
//! Holds a bounded, time-ordered RSSI history for one address. Samples are
//! appended by [`SignalTracker::tick`] on the render cadence, not on every
//! advertisement, so the series advances even when the target goes quiet;
//! after [`STALE_AFTER`] without a matching advertisement the tick records
//! [`SIGNAL_LOST_RSSI`] instead of the last real reading.
//!
//! State machine:
//!
//! ```text
//! Acquiring --adv--> Tracking --tick, no adv for STALE_AFTER--> Stale
//!                       ^                                         |
//!                       +------------------adv--------------------+
//! any --stop()--> Stopped (terminal)
//! ```

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use heapless::Deque;
use serde::Serialize;

use crate::classifier::{self, UNKNOWN_NAME};
use crate::scanner::AdvertisementEvent;

/// Samples kept in the rolling history.
pub const HISTORY_SIZE: usize = 50;

/// Silence after which the target is considered lost.
pub const STALE_AFTER: Duration = Duration::from_millis(3000);

/// Value recorded while the target is lost.
pub const SIGNAL_LOST_RSSI: i16 = -100;

/// Y-axis range of the tracker chart (dBm).
pub const CHART_MIN_RSSI: i16 = -100;
pub const CHART_MAX_RSSI: i16 = -30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrackerState {
    /// No advertisement seen yet
    Acquiring,
    Tracking,
    /// No advertisement for longer than the staleness timeout
    Stale,
    Stopped,
}

impl TrackerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackerState::Acquiring => "ACQUIRING",
            TrackerState::Tracking => "TRACKING",
            TrackerState::Stale => "STALE",
            TrackerState::Stopped => "STOPPED",
        }
    }
}

/// Hot/cold proximity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Proximity {
    /// rssi > -50
    VeryClose,
    /// -70 < rssi <= -50
    Nearby,
    /// -90 < rssi <= -70
    InRange,
    WeakOrLost,
}

impl Proximity {
    pub fn label(&self) -> &'static str {
        match self {
            Proximity::VeryClose => "VERY CLOSE",
            Proximity::Nearby => "NEARBY",
            Proximity::InRange => "IN RANGE",
            Proximity::WeakOrLost => "WEAK / LOST SIGNAL",
        }
    }
}

pub fn proximity(rssi: i16) -> Proximity {
    if rssi > -50 {
        Proximity::VeryClose
    } else if rssi > -70 {
        Proximity::Nearby
    } else if rssi > -90 {
        Proximity::InRange
    } else {
        Proximity::WeakOrLost
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub at: Instant,
    pub rssi: i16,
}

#[derive(Debug)]
pub struct SignalTracker {
    address: String,
    name: String,
    rssi: i16,
    last_seen_at: Option<Instant>,
    stale_after: Duration,
    history: Deque<Sample, HISTORY_SIZE>,
    state: TrackerState,
}

impl SignalTracker {
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_stale_after(address, STALE_AFTER)
    }

    pub fn with_stale_after(address: impl Into<String>, stale_after: Duration) -> Self {
        Self {
            address: address.into().trim().to_string(),
            name: UNKNOWN_NAME.to_string(),
            rssi: SIGNAL_LOST_RSSI,
            last_seen_at: None,
            stale_after,
            history: Deque::new(),
            state: TrackerState::Acquiring,
        }
    }

    /// Feed one advertisement. Returns `true` if it matched the target.
    pub fn on_advertisement(&mut self, event: &AdvertisementEvent, now: Instant) -> bool {
        if self.state == TrackerState::Stopped || !event.address.trim().eq_ignore_ascii_case(&self.address) {
            return false;
        }

        self.last_seen_at = Some(now);
        self.rssi = classifier::resolve_rssi(event.rssi);
        let name = classifier::resolve_name(event);
        // A nameless packet does not erase a name learned earlier
        if name != UNKNOWN_NAME || self.name == UNKNOWN_NAME {
            self.name = name;
        }
        if self.state != TrackerState::Tracking {
            log::info!("target {} acquired at {} dBm", self.address, self.rssi);
            self.state = TrackerState::Tracking;
        }
        true
    }

    /// Append one sample for `now`. Returns `None` once stopped.
    pub fn tick(&mut self, now: Instant) -> Option<Sample> {
        if self.state == TrackerState::Stopped {
            return None;
        }

        let fresh = self
            .last_seen_at
            .is_some_and(|seen| now.saturating_duration_since(seen) <= self.stale_after);
        let rssi = if fresh { self.rssi } else { SIGNAL_LOST_RSSI };

        if !fresh && self.state == TrackerState::Tracking {
            log::info!("target {} went quiet", self.address);
            self.state = TrackerState::Stale;
        }

        let sample = Sample { at: now, rssi };
        if self.history.is_full() {
            self.history.pop_front();
        }
        let _ = self.history.push_back(sample);
        Some(sample)
    }

    /// Stop tracking. History is kept as-is; later ticks and
    /// advertisements are ignored.
    pub fn stop(&mut self) {
        if self.state != TrackerState::Stopped {
            log::info!("tracker for {} stopped after {} samples", self.address, self.history.len());
            self.state = TrackerState::Stopped;
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> TrackerState {
        self.state
    }

    pub fn last_seen_at(&self) -> Option<Instant> {
        self.last_seen_at
    }

    /// Oldest first.
    pub fn history(&self) -> impl Iterator<Item = &Sample> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Newest sample value, or signal-lost before the first tick.
    pub fn current_rssi(&self) -> i16 {
        self.history.back().map(|s| s.rssi).unwrap_or(SIGNAL_LOST_RSSI)
    }

    pub fn proximity(&self) -> Proximity {
        proximity(self.current_rssi())
    }

    /// History values clamped to the chart's y-axis, oldest first.
    pub fn series(&self) -> Vec<i16> {
        self.history
            .iter()
            .map(|s| s.rssi.clamp(CHART_MIN_RSSI, CHART_MAX_RSSI))
            .collect()
    }
}

/// Cloneable handle so the stop request can come from outside the render
/// loop (signal handler, UI) at any tick boundary.
#[derive(Debug, Clone)]
pub struct SharedTracker {
    inner: Arc<Mutex<SignalTracker>>,
}

impl SharedTracker {
    pub fn new(tracker: SignalTracker) -> Self {
        Self {
            inner: Arc::new(Mutex::new(tracker)),
        }
    }

    pub fn on_advertisement(&self, event: &AdvertisementEvent, now: Instant) -> bool {
        self.lock().on_advertisement(event, now)
    }

    pub fn tick(&self, now: Instant) -> Option<Sample> {
        self.lock().tick(now)
    }

    pub fn stop(&self) {
        self.lock().stop()
    }

    /// Run `f` against a consistent view of the tracker.
    pub fn with<R>(&self, f: impl FnOnce(&SignalTracker) -> R) -> R {
        f(&self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, SignalTracker> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TARGET: &str = "AA:BB:CC:DD:EE:FF";

    fn adv(address: &str, rssi: i16) -> AdvertisementEvent {
        let mut ev = AdvertisementEvent::new(address);
        ev.rssi = Some(rssi);
        ev
    }

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    // ── Proximity ───────────────────────────────────────────────────

    #[test]
    fn proximity_tiers() {
        assert_eq!(proximity(-30), Proximity::VeryClose);
        assert_eq!(proximity(-49), Proximity::VeryClose);
        assert_eq!(proximity(-50), Proximity::Nearby);
        assert_eq!(proximity(-69), Proximity::Nearby);
        assert_eq!(proximity(-70), Proximity::InRange);
        assert_eq!(proximity(-89), Proximity::InRange);
        assert_eq!(proximity(-90), Proximity::WeakOrLost);
        assert_eq!(proximity(-100), Proximity::WeakOrLost);
    }

    // ── Advertisement matching ──────────────────────────────────────

    #[test]
    fn matching_is_case_insensitive() {
        let t0 = Instant::now();
        let mut tracker = SignalTracker::new(TARGET);
        let mut ev = adv("aa:bb:cc:dd:ee:ff", -55);
        ev.local_name = Some("Tag".into());
        assert!(tracker.on_advertisement(&ev, t0));
        assert_eq!(tracker.name(), "Tag");
        assert_eq!(tracker.state(), TrackerState::Tracking);
    }

    #[test]
    fn other_addresses_ignored() {
        let t0 = Instant::now();
        let mut tracker = SignalTracker::new(TARGET);
        assert!(!tracker.on_advertisement(&adv("00:11:22:33:44:55", -40), t0));
        assert_eq!(tracker.state(), TrackerState::Acquiring);
        assert_eq!(tracker.last_seen_at(), None);
    }

    #[test]
    fn nameless_packet_keeps_known_name() {
        let t0 = Instant::now();
        let mut tracker = SignalTracker::new(TARGET);
        let mut ev = adv(TARGET, -60);
        ev.name = Some("Watch".into());
        tracker.on_advertisement(&ev, t0);
        tracker.on_advertisement(&adv(TARGET, -61), ms(t0, 100));
        assert_eq!(tracker.name(), "Watch");
    }

    // ── Ticks / history ─────────────────────────────────────────────

    #[test]
    fn tick_before_acquisition_records_signal_lost() {
        let t0 = Instant::now();
        let mut tracker = SignalTracker::new(TARGET);
        let s = tracker.tick(t0).unwrap();
        assert_eq!(s.rssi, SIGNAL_LOST_RSSI);
        assert_eq!(tracker.state(), TrackerState::Acquiring);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn tick_repeats_last_reading_without_new_adverts() {
        let t0 = Instant::now();
        let mut tracker = SignalTracker::new(TARGET);
        tracker.on_advertisement(&adv(TARGET, -55), t0);
        for i in 1..=10 {
            assert_eq!(tracker.tick(ms(t0, i * 200)).unwrap().rssi, -55);
        }
        assert_eq!(tracker.len(), 10);
    }

    #[test]
    fn history_is_bounded_fifo() {
        let t0 = Instant::now();
        let mut tracker = SignalTracker::new(TARGET);
        for i in 0..60u64 {
            let now = ms(t0, i * 10);
            tracker.on_advertisement(&adv(TARGET, -30 - i as i16), now);
            tracker.tick(now);
        }
        assert_eq!(tracker.len(), HISTORY_SIZE);
        let values: Vec<i16> = tracker.history().map(|s| s.rssi).collect();
        let expected: Vec<i16> = (10..60).map(|i| -30 - i as i16).collect();
        assert_eq!(values, expected);
        let times: Vec<Instant> = tracker.history().map(|s| s.at).collect();
        assert!(times.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn stale_target_synthesizes_signal_lost() {
        let t0 = Instant::now();
        let mut tracker = SignalTracker::new(TARGET);
        tracker.on_advertisement(&adv(TARGET, -55), t0);
        assert_eq!(tracker.tick(ms(t0, 3000)).unwrap().rssi, -55);
        assert_eq!(tracker.tick(ms(t0, 3001)).unwrap().rssi, -100);
        assert_eq!(tracker.state(), TrackerState::Stale);
        assert_eq!(tracker.proximity(), Proximity::WeakOrLost);
    }

    #[test]
    fn reacquisition_after_stale() {
        let t0 = Instant::now();
        let mut tracker = SignalTracker::new(TARGET);
        tracker.on_advertisement(&adv(TARGET, -55), t0);
        tracker.tick(ms(t0, 5000));
        assert_eq!(tracker.state(), TrackerState::Stale);
        tracker.on_advertisement(&adv(TARGET, -45), ms(t0, 5100));
        assert_eq!(tracker.state(), TrackerState::Tracking);
        assert_eq!(tracker.tick(ms(t0, 5200)).unwrap().rssi, -45);
        assert_eq!(tracker.proximity(), Proximity::VeryClose);
    }

    #[test]
    fn custom_staleness_timeout() {
        let t0 = Instant::now();
        let mut tracker = SignalTracker::with_stale_after(TARGET, Duration::from_millis(500));
        tracker.on_advertisement(&adv(TARGET, -60), t0);
        assert_eq!(tracker.tick(ms(t0, 600)).unwrap().rssi, -100);
    }

    #[test]
    fn series_clamped_to_chart_range() {
        let t0 = Instant::now();
        let mut tracker = SignalTracker::new(TARGET);
        tracker.on_advertisement(&adv(TARGET, -20), t0);
        tracker.tick(t0);
        tracker.on_advertisement(&adv(TARGET, -110), t0);
        tracker.tick(t0);
        assert_eq!(tracker.series(), vec![-30, -100]);
        assert_eq!(tracker.current_rssi(), -110);
    }

    // ── Stop ────────────────────────────────────────────────────────

    #[test]
    fn stop_preserves_history_and_ignores_further_input() {
        let t0 = Instant::now();
        let shared = SharedTracker::new(SignalTracker::new(TARGET));
        shared.on_advertisement(&adv(TARGET, -50), t0);
        shared.tick(ms(t0, 200));
        shared.tick(ms(t0, 400));

        let remote = shared.clone();
        std::thread::spawn(move || remote.stop()).join().unwrap();

        assert!(shared.tick(ms(t0, 600)).is_none());
        assert!(!shared.on_advertisement(&adv(TARGET, -40), ms(t0, 700)));
        shared.with(|t| {
            assert_eq!(t.state(), TrackerState::Stopped);
            assert_eq!(t.series(), vec![-50, -50]);
        });
    }
}
