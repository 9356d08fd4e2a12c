//! Advertisement event model and raw AD-structure parser.
//!
//! The external BLE stack delivers one [`AdvertisementEvent`] per received
//! advertisement. Stacks that only hand over the raw advertising payload
//! go through [`BleAdvParser`] first.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::defaults::BASE_UUID_SUFFIX;

/// One raw advertisement as seen by the BLE stack. Never persisted; the
/// classifier derives everything the registry keeps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdvertisementEvent {
    /// `XX:XX:XX:XX:XX:XX`
    pub address: String,
    /// Name resolved by the stack for a connectable device
    pub name: Option<String>,
    /// Local name from the advertisement or scan response
    pub local_name: Option<String>,
    /// Received signal strength in dBm
    pub rssi: Option<i16>,
    /// Manufacturer company ID -> payload (company ID bytes stripped).
    /// Ordered so the lowest ID is always "first".
    pub manufacturer_data: BTreeMap<u16, Vec<u8>>,
    /// Advertised service UUIDs, lowercase full form
    pub service_uuids: Vec<String>,
}

impl AdvertisementEvent {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// Merge fields from `other` that this event does not already carry.
    pub fn merge_missing(&mut self, other: AdvertisementEvent) {
        if self.name.is_none() {
            self.name = other.name;
        }
        if self.local_name.is_none() {
            self.local_name = other.local_name;
        }
        if self.rssi.is_none() {
            self.rssi = other.rssi;
        }
        for (id, data) in other.manufacturer_data {
            self.manufacturer_data.entry(id).or_insert(data);
        }
        for uuid in other.service_uuids {
            if !self.service_uuids.contains(&uuid) {
                self.service_uuids.push(uuid);
            }
        }
    }
}

/// Parse BLE advertisement data (AD structures) into an event.
///
/// AD structure format: [length] [type] [data...]
/// Types we care about:
///   0x02/0x03 = Incomplete/Complete list of 16-bit service UUIDs
///   0x06/0x07 = Incomplete/Complete list of 128-bit service UUIDs
///   0x08/0x09 = Shortened/Complete local name
///   0xFF      = Manufacturer specific data (first 2 bytes = company ID, little-endian)
pub struct BleAdvParser;

impl BleAdvParser {
    /// Parse advertisement data bytes. Truncated structures end the parse;
    /// whatever was decoded before them is kept.
    pub fn parse(address: &str, rssi: Option<i16>, ad_data: &[u8]) -> AdvertisementEvent {
        let mut event = AdvertisementEvent::new(address);
        event.rssi = rssi;

        let mut pos = 0;
        while pos < ad_data.len() {
            let len = ad_data[pos] as usize;
            if len == 0 || pos + 1 + len > ad_data.len() {
                break;
            }

            let ad_type = ad_data[pos + 1];
            let data = &ad_data[pos + 2..pos + 1 + len];

            match ad_type {
                0x02 | 0x03 => {
                    for chunk in data.chunks_exact(2) {
                        let uuid = u16::from_le_bytes([chunk[0], chunk[1]]);
                        push_unique(&mut event.service_uuids, uuid16_string(uuid));
                    }
                }
                0x06 | 0x07 => {
                    for chunk in data.chunks_exact(16) {
                        push_unique(&mut event.service_uuids, uuid128_string(chunk));
                    }
                }
                0x08 | 0x09 => {
                    if let Ok(name) = core::str::from_utf8(data) {
                        let name = name.trim_end_matches('\0');
                        // Complete name wins over a shortened one
                        if !name.is_empty() && (ad_type == 0x09 || event.local_name.is_none()) {
                            event.local_name = Some(name.to_string());
                        }
                    }
                }
                0xFF => {
                    if data.len() >= 2 {
                        let id = u16::from_le_bytes([data[0], data[1]]);
                        event.manufacturer_data.insert(id, data[2..].to_vec());
                    }
                }
                _ => {}
            }

            pos += 1 + len;
        }

        log::trace!(
            "parsed {} AD bytes for {}: {} uuids, {} mfr entries",
            ad_data.len(),
            address,
            event.service_uuids.len(),
            event.manufacturer_data.len()
        );
        event
    }
}

fn uuid16_string(uuid: u16) -> String {
    format!("0000{:04x}{}", uuid, BASE_UUID_SUFFIX)
}

/// 128-bit UUIDs are transmitted little-endian.
fn uuid128_string(le: &[u8]) -> String {
    let mut s = String::with_capacity(36);
    for (i, b) in le.iter().rev().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            s.push('-');
        }
        let _ = write!(s, "{:02x}", b);
    }
    s
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if !list.contains(&value) {
        list.push(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "AA:BB:CC:DD:EE:FF";

    #[test]
    fn parse_empty_payload() {
        let ev = BleAdvParser::parse(ADDR, Some(-60), &[]);
        assert_eq!(ev.address, ADDR);
        assert_eq!(ev.rssi, Some(-60));
        assert!(ev.service_uuids.is_empty());
        assert!(ev.manufacturer_data.is_empty());
        assert!(ev.local_name.is_none());
    }

    #[test]
    fn parse_16bit_uuids_and_name() {
        let data = [
            0x02, 0x01, 0x06, // flags
            0x05, 0x03, 0x0D, 0x18, 0x0F, 0x18, // 0x180D, 0x180F
            0x06, 0x09, b'P', b'o', b'l', b'a', b'r', // complete local name
        ];
        let ev = BleAdvParser::parse(ADDR, None, &data);
        assert_eq!(
            ev.service_uuids,
            vec![
                "0000180d-0000-1000-8000-00805f9b34fb".to_string(),
                "0000180f-0000-1000-8000-00805f9b34fb".to_string(),
            ]
        );
        assert_eq!(ev.local_name.as_deref(), Some("Polar"));
    }

    #[test]
    fn parse_128bit_uuid() {
        // 4a690001-1c4a-4e3c-b5d8-f47b2e1c0a9d, little-endian on the air
        let be: [u8; 16] = [
            0x4a, 0x69, 0x00, 0x01, 0x1c, 0x4a, 0x4e, 0x3c, 0xb5, 0xd8, 0xf4, 0x7b, 0x2e, 0x1c,
            0x0a, 0x9d,
        ];
        let mut data = vec![17, 0x07];
        data.extend(be.iter().rev());
        let ev = BleAdvParser::parse(ADDR, None, &data);
        assert_eq!(ev.service_uuids, vec!["4a690001-1c4a-4e3c-b5d8-f47b2e1c0a9d".to_string()]);
    }

    #[test]
    fn parse_manufacturer_data() {
        // Apple (0x004C), AirDrop type byte
        let data = [0x05, 0xFF, 0x4C, 0x00, 0x05, 0x12];
        let ev = BleAdvParser::parse(ADDR, None, &data);
        assert_eq!(ev.manufacturer_data.get(&76), Some(&vec![0x05, 0x12]));
    }

    #[test]
    fn parse_truncated_structure_keeps_earlier_fields() {
        let data = [0x03, 0x03, 0x0F, 0x18, 0x09, 0xFF, 0x4C];
        let ev = BleAdvParser::parse(ADDR, None, &data);
        assert_eq!(ev.service_uuids.len(), 1);
        assert!(ev.manufacturer_data.is_empty());
    }

    #[test]
    fn shortened_name_does_not_replace_complete() {
        let data = [
            0x04, 0x09, b'A', b'B', b'C', // complete
            0x02, 0x08, b'A', // shortened
        ];
        let ev = BleAdvParser::parse(ADDR, None, &data);
        assert_eq!(ev.local_name.as_deref(), Some("ABC"));
    }

    #[test]
    fn merge_missing_prefers_existing() {
        let mut a = AdvertisementEvent::new(ADDR);
        a.rssi = Some(-40);
        a.service_uuids.push("x".into());
        let mut b = AdvertisementEvent::new(ADDR);
        b.rssi = Some(-90);
        b.local_name = Some("Tag".into());
        b.service_uuids = vec!["x".into(), "y".into()];
        b.manufacturer_data.insert(6, vec![1]);
        a.merge_missing(b);
        assert_eq!(a.rssi, Some(-40));
        assert_eq!(a.local_name.as_deref(), Some("Tag"));
        assert_eq!(a.service_uuids, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(a.manufacturer_data.len(), 1);
    }
}
