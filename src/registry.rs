//! Device registry: one record per observed address.
//!
//! Records are created on first sighting and updated in place afterwards.
//! There is no eviction: a device once seen stays until the session ends.
//! [`SharedRegistry`] is the handle passed between the ingest task, the
//! render loop and the exporter; every read or write holds the lock only
//! for the duration of that single operation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::classifier::{self, DeviceObservation, Privacy, ServiceHint, UNKNOWN_NAME, UNKNOWN_VENDOR};
use crate::scanner::AdvertisementEvent;

/// Display tier of a signal strength reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SignalTier {
    /// rssi > -60
    Strong,
    /// -80 < rssi <= -60
    Medium,
    /// rssi <= -80
    Weak,
}

impl SignalTier {
    pub fn from_rssi(rssi: i16) -> Self {
        if rssi > -60 {
            SignalTier::Strong
        } else if rssi > -80 {
            SignalTier::Medium
        } else {
            SignalTier::Weak
        }
    }
}

/// Aggregated knowledge about one address.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    pub address: String,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub name: String,
    pub rssi: i16,
    pub vendor: String,
    /// Ordered set, first-seen order
    pub service_hints: Vec<ServiceHint>,
    pub privacy: Privacy,
    /// Last observed manufacturer payload
    #[serde(skip)]
    pub raw_manufacturer_data: Vec<u8>,
    pub sightings: u32,
}

impl DeviceRecord {
    fn new(address: String, seen_at: DateTime<Utc>) -> Self {
        let privacy = classifier::classify_address(&address);
        Self {
            address,
            first_seen: seen_at,
            last_seen: seen_at,
            name: UNKNOWN_NAME.to_string(),
            rssi: classifier::NO_SIGNAL_RSSI,
            vendor: UNKNOWN_VENDOR.to_string(),
            service_hints: Vec::new(),
            privacy,
            raw_manufacturer_data: Vec::new(),
            sightings: 0,
        }
    }

    fn apply(&mut self, obs: DeviceObservation, seen_at: DateTime<Utc>) {
        if seen_at > self.last_seen {
            self.last_seen = seen_at;
        }
        self.name = obs.name;
        self.rssi = obs.rssi;
        self.vendor = obs.vendor;
        for hint in obs.service_hints {
            if !self.service_hints.contains(&hint) {
                self.service_hints.push(hint);
            }
        }
        self.raw_manufacturer_data = obs.manufacturer_data;
        self.sightings = self.sightings.saturating_add(1);
    }

    pub fn tier(&self) -> SignalTier {
        SignalTier::from_rssi(self.rssi)
    }
}

/// One line of the ranked device table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRow {
    /// 1-based, strongest first
    pub rank: usize,
    pub address: String,
    pub rssi: i16,
    pub tier: SignalTier,
    pub name: String,
    pub vendor: String,
    pub service_hints: Vec<ServiceHint>,
    pub privacy: Privacy,
}

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    devices: HashMap<String, DeviceRecord>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update the record for `address`. Returns `true` when the
    /// address was not known before.
    pub fn upsert(&mut self, address: &str, obs: DeviceObservation, seen_at: DateTime<Utc>) -> bool {
        let key = normalize_address(address);
        let mut created = false;
        let record = self.devices.entry(key).or_insert_with_key(|k| {
            created = true;
            DeviceRecord::new(k.clone(), seen_at)
        });
        record.apply(obs, seen_at);
        if created {
            log::debug!("new device {} ({})", record.address, record.vendor);
        }
        created
    }

    pub fn get(&self, address: &str) -> Option<&DeviceRecord> {
        self.devices.get(&normalize_address(address))
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// All records, strongest signal first, ties broken by address.
    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        let mut records: Vec<DeviceRecord> = self.devices.values().cloned().collect();
        sort_by_signal(&mut records);
        records
    }

    /// Ranked row-set for the device table.
    pub fn rows(&self) -> Vec<DeviceRow> {
        to_rows(&self.snapshot())
    }
}

/// Ranking order used everywhere: rssi descending, then address.
pub fn sort_by_signal(records: &mut [DeviceRecord]) {
    records.sort_by(|a, b| b.rssi.cmp(&a.rssi).then_with(|| a.address.cmp(&b.address)));
}

pub fn to_rows(snapshot: &[DeviceRecord]) -> Vec<DeviceRow> {
    snapshot
        .iter()
        .enumerate()
        .map(|(i, r)| DeviceRow {
            rank: i + 1,
            address: r.address.clone(),
            rssi: r.rssi,
            tier: r.tier(),
            name: r.name.clone(),
            vendor: r.vendor.clone(),
            service_hints: r.service_hints.clone(),
            privacy: r.privacy,
        })
        .collect()
}

fn normalize_address(address: &str) -> String {
    address.trim().to_ascii_uppercase()
}

/// Cloneable, lock-guarded registry handle.
#[derive(Debug, Clone, Default)]
pub struct SharedRegistry {
    inner: Arc<Mutex<DeviceRegistry>>,
}

impl SharedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify an event and upsert it. Classification runs outside the lock.
    pub fn observe(&self, event: &AdvertisementEvent, seen_at: DateTime<Utc>) -> DeviceObservation {
        let obs = classifier::classify(event);
        self.lock().upsert(&event.address, obs.clone(), seen_at);
        obs
    }

    pub fn upsert(&self, address: &str, obs: DeviceObservation, seen_at: DateTime<Utc>) -> bool {
        self.lock().upsert(address, obs, seen_at)
    }

    pub fn snapshot(&self) -> Vec<DeviceRecord> {
        self.lock().snapshot()
    }

    pub fn rows(&self) -> Vec<DeviceRow> {
        self.lock().rows()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic elsewhere cannot leave a record half-written (apply() has no
    // fallible steps), so a poisoned lock is still safe to read.
    fn lock(&self) -> MutexGuard<'_, DeviceRegistry> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
