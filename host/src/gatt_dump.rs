//! GATT transport backed by a JSON dump of device attribute tables.
//!
//! The platform BLE stack (or a capture from an earlier session) exports
//! what a connection would reveal:
//!
//! ```json
//! {"devices": {"AA:BB:CC:DD:EE:FF": {"services": [
//!   {"uuid": "180a", "characteristics": [
//!     {"uuid": "2a29", "properties": ["read"], "value": "41636d65"}]}]}}}
//! ```
//!
//! A device missing from the dump behaves like one out of range. A
//! readable characteristic without a `value` behaves like a protected one.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use bluesentry::defaults;
use bluesentry::gatt::{GattCharacteristic, GattClient, GattService};
use bluesentry::protocol;
use bluesentry::{Error, Result};

#[derive(Debug, Default, Deserialize)]
pub struct GattDump {
    #[serde(default)]
    devices: HashMap<String, DumpDevice>,
}

#[derive(Debug, Deserialize)]
struct DumpDevice {
    #[serde(default)]
    services: Vec<DumpService>,
}

#[derive(Debug, Deserialize)]
struct DumpService {
    uuid: String,
    #[serde(default)]
    characteristics: Vec<DumpCharacteristic>,
}

#[derive(Debug, Deserialize)]
struct DumpCharacteristic {
    uuid: String,
    #[serde(default)]
    properties: Vec<String>,
    /// Hex-encoded value
    value: Option<String>,
}

impl GattDump {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read GATT dump {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid GATT dump {}", path.display()))
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn into_client(self) -> DumpClient {
        DumpClient {
            dump: self,
            connected: None,
        }
    }
}

/// [`GattClient`] answering from a [`GattDump`].
#[derive(Debug)]
pub struct DumpClient {
    dump: GattDump,
    connected: Option<String>,
}

impl DumpClient {
    fn device(&self) -> Result<&DumpDevice> {
        self.connected
            .as_ref()
            .and_then(|key| self.dump.devices.get(key))
            .ok_or_else(|| Error::Transport("not connected".into()))
    }
}

impl GattClient for DumpClient {
    fn connect(&mut self, address: &str) -> Result<Vec<GattService>> {
        let key = self
            .dump
            .devices
            .keys()
            .find(|k| k.trim().eq_ignore_ascii_case(address.trim()))
            .cloned()
            .ok_or_else(|| Error::Transport(format!("device {} not reachable", address)))?;
        self.connected = Some(key);

        let device = self.device()?;
        Ok(device
            .services
            .iter()
            .map(|s| GattService {
                uuid: defaults::expand_uuid(&s.uuid),
                characteristics: s
                    .characteristics
                    .iter()
                    .map(|c| GattCharacteristic {
                        uuid: defaults::expand_uuid(&c.uuid),
                        properties: c.properties.clone(),
                    })
                    .collect(),
            })
            .collect())
    }

    fn read(&mut self, service: &str, characteristic: &str) -> Result<Vec<u8>> {
        let device = self.device()?;
        let ch = device
            .services
            .iter()
            .filter(|s| defaults::expand_uuid(&s.uuid) == service)
            .flat_map(|s| s.characteristics.iter())
            .find(|c| defaults::expand_uuid(&c.uuid) == characteristic)
            .ok_or_else(|| Error::Transport(format!("characteristic {} not found", characteristic)))?;
        let hex = ch
            .value
            .as_deref()
            .ok_or_else(|| Error::Transport("insufficient authentication".into()))?;
        protocol::decode_hex(hex).ok_or_else(|| Error::Transport(format!("bad value for {}", characteristic)))
    }
}

/// Transport used when no GATT source is configured.
#[derive(Debug, Default)]
pub struct NoTransport;

impl GattClient for NoTransport {
    fn connect(&mut self, _address: &str) -> Result<Vec<GattService>> {
        Err(Error::Transport("no GATT transport configured (use --gatt <FILE>)".into()))
    }

    fn read(&mut self, _service: &str, _characteristic: &str) -> Result<Vec<u8>> {
        Err(Error::Transport("not connected".into()))
    }
}

/// Pick the GATT transport for this run.
pub fn client(path: Option<&Path>) -> anyhow::Result<Box<dyn GattClient + Send>> {
    match path {
        Some(path) => Ok(Box::new(GattDump::load(path)?.into_client())),
        None => Ok(Box::new(NoTransport)),
    }
}
