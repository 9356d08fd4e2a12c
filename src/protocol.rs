//! NDJSON wire format between the BLE stack bridge and BlueSentry.
//!
//! Inbound: one advertisement per line, a flat object decoded with
//! `serde_json` into owned strings, so long names, long UUID lists and
//! escaped characters all survive:
//!
//! ```text
//! {"mac":"AA:BB:CC:DD:EE:FF","name":"..","local_name":"..","rssi":-60,
//!  "mfr":76,"mfr_data":"0512ab","uuids":["0000180d-..."],"adv":"0201061aff4c00.."}
//! ```
//!
//! Every field except `mac` is optional and unknown fields are skipped, so
//! tagged `{"type":"ble",...}` scanner messages are accepted as they are.
//!
//! Outbound: [`DeviceMessage`] lines for the `--ndjson` output mode, written
//! with `serde_json_core` into a fixed [`MAX_MSG_LEN`] buffer.

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::scanner::{AdvertisementEvent, BleAdvParser};

/// Library version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 512;

/// Wire format for one inbound advertisement. Converted to an
/// [`AdvertisementEvent`] in [`parse_advertisement`].
#[derive(Deserialize)]
pub(crate) struct RawAdvertisement {
    /// Tagged message type; anything other than "ble" is rejected
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    pub mac: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub local_name: Option<String>,
    #[serde(default)]
    pub rssi: Option<i16>,
    /// Manufacturer company ID. 0 without `mfr_data` means "none".
    #[serde(default)]
    pub mfr: Option<u16>,
    #[serde(default)]
    pub mfr_data: Option<String>,
    /// Single primary service UUID
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub uuids: Option<Vec<String>>,
    /// Raw advertising payload (AD structures), hex
    #[serde(default)]
    pub adv: Option<String>,
}

/// Messages written in NDJSON output mode
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// One classified advertisement
    #[serde(rename = "device")]
    Device {
        mac: &'a str,
        name: &'a str,
        rssi: i16,
        vendor: &'a str,
        services: &'a [&'a str],
        privacy: &'static str,
        /// Unix time in milliseconds
        ts: i64,
    },
    /// One tracker tick
    #[serde(rename = "track")]
    Track {
        mac: &'a str,
        name: &'a str,
        rssi: i16,
        proximity: &'static str,
        state: &'static str,
        samples: usize,
    },
    /// End-of-scan summary
    #[serde(rename = "status")]
    Status {
        devices: usize,
        /// Scan time in seconds
        elapsed: u32,
        version: &'static str,
    },
}

/// Serialize a DeviceMessage to JSON bytes and write to the output buffer.
/// Returns the number of bytes written including the trailing newline, or
/// None if the message and its newline do not fit.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    match serde_json_core::to_slice(msg, buf) {
        Ok(len) => {
            // Append newline for NDJSON
            if len < buf.len() {
                buf[len] = b'\n';
                Some(len + 1)
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Deserialize one advertisement line. Malformed or non-BLE lines yield
/// `None`; they are dropped, never fatal.
pub fn parse_advertisement(line: &[u8]) -> Option<AdvertisementEvent> {
    let trimmed = trim_whitespace(line);
    if trimmed.is_empty() {
        return None;
    }
    let raw = match serde_json::from_slice::<RawAdvertisement>(trimmed) {
        Ok(raw) => raw,
        Err(err) => {
            log::debug!("dropping malformed advertisement line: {:?}", err);
            return None;
        }
    };
    if raw.kind.as_deref().is_some_and(|k| k != "ble") {
        return None;
    }
    Some(raw.into_event())
}

impl RawAdvertisement {
    fn into_event(self) -> AdvertisementEvent {
        let mut event = AdvertisementEvent::new(self.mac.as_str());
        event.name = self.name;
        event.local_name = self.local_name;
        event.rssi = self.rssi;

        let payload = self.mfr_data.as_deref().map(|hex| {
            decode_hex(hex).unwrap_or_else(|| {
                log::debug!("{}: undecodable mfr_data, treating as empty", event.address);
                Vec::new()
            })
        });
        match (self.mfr, payload) {
            (Some(0), None) | (None, None) => {}
            (Some(id), payload) => {
                event.manufacturer_data.insert(id, payload.unwrap_or_default());
            }
            // Payload with the company ID still in front
            (None, Some(bytes)) if bytes.len() >= 2 => {
                let id = u16::from_le_bytes([bytes[0], bytes[1]]);
                event.manufacturer_data.insert(id, bytes[2..].to_vec());
            }
            (None, Some(_)) => {}
        }

        for uuid in self.uuid.iter().chain(self.uuids.iter().flatten()) {
            let full = defaults::expand_uuid(uuid);
            if !event.service_uuids.contains(&full) {
                event.service_uuids.push(full);
            }
        }

        if let Some(adv) = self.adv.as_deref() {
            match decode_hex(adv) {
                Some(bytes) => {
                    let parsed = BleAdvParser::parse(&event.address, event.rssi, &bytes);
                    event.merge_missing(parsed);
                }
                None => log::debug!("{}: undecodable adv payload ignored", event.address),
            }
        }

        event
    }
}

/// Decode a hex string. Separators (`:`, `-`, space) and a `0x` prefix are
/// tolerated; odd length or non-hex characters yield `None`.
pub fn decode_hex(hex: &str) -> Option<Vec<u8>> {
    let hex = hex.trim();
    let hex = hex.strip_prefix("0x").unwrap_or(hex);
    let digits: Vec<u8> = hex
        .bytes()
        .filter(|b| !matches!(b, b':' | b'-' | b' '))
        .collect();
    if digits.len() % 2 != 0 {
        return None;
    }
    digits
        .chunks_exact(2)
        .map(|pair| {
            let s = core::str::from_utf8(pair).ok()?;
            u8::from_str_radix(s, 16).ok()
        })
        .collect()
}

fn trim_whitespace(data: &[u8]) -> &[u8] {
    let is_ws = |b: &u8| matches!(b, b' ' | b'\n' | b'\r' | b'\t');
    let start = data.iter().position(|b| !is_ws(b)).unwrap_or(data.len());
    let end = data.iter().rposition(|b| !is_ws(b)).map_or(start, |i| i + 1);
    &data[start..end]
}
