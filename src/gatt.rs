//! GATT interrogation helper.
//!
//! Connects through a [`GattClient`] (provided by the platform BLE stack),
//! walks the service table and reads every readable characteristic.
//! Values are shown as text when they decode cleanly, otherwise as
//! lowercase hex. A failed read is a marker in the report, not an error.

use std::fmt;

use crate::defaults;
use crate::error::Result;

/// One characteristic as enumerated by the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: String,
    /// Property flags as the stack names them ("read", "write", "notify", ...)
    pub properties: Vec<String>,
}

impl GattCharacteristic {
    pub fn is_readable(&self) -> bool {
        self.properties.iter().any(|p| p.eq_ignore_ascii_case("read"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: String,
    pub characteristics: Vec<GattCharacteristic>,
}

/// Connection-oriented access to a remote device's GATT table.
pub trait GattClient {
    /// Connect and enumerate services. Fails with a transport error when
    /// the device is out of range or refuses the connection.
    fn connect(&mut self, address: &str) -> Result<Vec<GattService>>;

    /// Read one characteristic value.
    fn read(&mut self, service: &str, characteristic: &str) -> Result<Vec<u8>>;
}

/// Outcome of reading a characteristic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Value(String),
    /// Read rejected (authentication, encryption, or stack failure)
    Failed,
}

impl fmt::Display for ReadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadOutcome::Value(v) => f.write_str(v),
            ReadOutcome::Failed => f.write_str("READ FAILED (protected)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicReport {
    pub uuid: String,
    pub name: &'static str,
    pub properties: String,
    /// `None` when the characteristic is not readable
    pub value: Option<ReadOutcome>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub uuid: String,
    pub name: &'static str,
    pub characteristics: Vec<CharacteristicReport>,
}

/// Render a raw characteristic value for display.
///
/// Strict UTF-8 with printable characters only (trailing NUL padding is
/// dropped); anything else falls back to lowercase hex.
pub fn format_characteristic_value(raw: &[u8]) -> String {
    let trimmed = trim_nul_padding(raw);
    match core::str::from_utf8(trimmed) {
        Ok(text) if !text.is_empty() && text.chars().all(|c| !c.is_control() || c == '\t') => {
            text.to_string()
        }
        _ => to_hex(raw),
    }
}

pub fn to_hex(raw: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(raw.len() * 2);
    for b in raw {
        let _ = write!(out, "{:02x}", b);
    }
    out
}

fn trim_nul_padding(raw: &[u8]) -> &[u8] {
    let mut end = raw.len();
    while end > 0 && raw[end - 1] == 0 {
        end -= 1;
    }
    &raw[..end]
}

/// Connect to `address` and dump its GATT table.
pub fn interrogate<C: GattClient + ?Sized>(client: &mut C, address: &str) -> Result<Vec<ServiceReport>> {
    log::info!("interrogating {}", address);
    let services = client.connect(address)?;
    log::debug!("{} exposes {} services", address, services.len());

    let mut reports = Vec::with_capacity(services.len());
    for service in services {
        let mut characteristics = Vec::with_capacity(service.characteristics.len());
        for ch in &service.characteristics {
            let value = if ch.is_readable() {
                Some(match client.read(&service.uuid, &ch.uuid) {
                    Ok(raw) => ReadOutcome::Value(format_characteristic_value(&raw)),
                    Err(err) => {
                        log::debug!("read {} failed: {}", ch.uuid, err);
                        ReadOutcome::Failed
                    }
                })
            } else {
                None
            };
            characteristics.push(CharacteristicReport {
                uuid: ch.uuid.clone(),
                name: defaults::gatt_name(&ch.uuid).unwrap_or("Unknown Characteristic"),
                properties: ch.properties.join(","),
                value,
            });
        }
        reports.push(ServiceReport {
            name: defaults::gatt_name(&service.uuid).unwrap_or("Unknown Service"),
            uuid: service.uuid,
            characteristics,
        });
    }
    Ok(reports)
}
