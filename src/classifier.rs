//! Advertisement classifier.
//!
//! Turns one raw [`AdvertisementEvent`] into a [`DeviceObservation`]:
//! best name, signal strength, vendor label (with Apple Continuity
//! decoding), service hints and address privacy. Pure and infallible;
//! malformed input degrades to defaults so one bad packet never blocks
//! analysis.

use serde::Serialize;

use crate::defaults::{self, APPLE_COMPANY_ID};
use crate::scanner::AdvertisementEvent;

/// RSSI substituted when the stack reports none. Treated as "no signal".
pub const NO_SIGNAL_RSSI: i16 = -100;

/// Name used when neither the stack nor the advertisement provides one.
pub const UNKNOWN_NAME: &str = "Unknown";

/// Vendor label when no manufacturer data was advertised.
pub const UNKNOWN_VENDOR: &str = "Unknown";

/// Address privacy posture derived from the locally-administered bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Privacy {
    /// Fixed, manufacturer-assigned address
    Public,
    /// Locally administered (randomized) address
    Random,
    /// Address could not be parsed
    Unknown,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Public => "Public",
            Privacy::Random => "Random",
            Privacy::Unknown => "?",
        }
    }

    pub fn is_random(&self) -> bool {
        matches!(self, Privacy::Random)
    }
}

/// Semantic styling of a service hint. Colour is chosen by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HintStyle {
    Health,
    Power,
    Input,
    Vendor,
    Tracker,
    Exposure,
    Plain,
}

/// Short label derived from an advertised service UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceHint {
    pub label: &'static str,
    pub style: HintStyle,
}

/// Services that get a dedicated tag instead of the first word of their name.
static DEDICATED_HINTS: &[(&str, &str, HintStyle)] = &[
    ("0000180d-0000-1000-8000-00805f9b34fb", "Heart Rate", HintStyle::Health),
    ("0000180f-0000-1000-8000-00805f9b34fb", "Battery", HintStyle::Power),
    ("00001812-0000-1000-8000-00805f9b34fb", "HID", HintStyle::Input),
    ("0000fe9f-0000-1000-8000-00805f9b34fb", "Google", HintStyle::Vendor),
    ("0000feed-0000-1000-8000-00805f9b34fb", "Tile", HintStyle::Tracker),
    ("0000fd6f-0000-1000-8000-00805f9b34fb", "Exposure", HintStyle::Exposure),
];

/// Everything the registry learns from one advertisement.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceObservation {
    pub name: String,
    pub rssi: i16,
    pub vendor: String,
    pub service_hints: Vec<ServiceHint>,
    pub privacy: Privacy,
    /// Payload of the selected manufacturer entry (export only)
    pub manufacturer_data: Vec<u8>,
}

/// Classify one advertisement.
pub fn classify(event: &AdvertisementEvent) -> DeviceObservation {
    let (vendor, manufacturer_data) = match event.manufacturer_data.iter().next() {
        Some((&id, payload)) => (resolve_vendor(id, payload), payload.clone()),
        None => (UNKNOWN_VENDOR.to_string(), Vec::new()),
    };

    DeviceObservation {
        name: resolve_name(event),
        rssi: resolve_rssi(event.rssi),
        vendor,
        service_hints: service_hints(&event.service_uuids),
        privacy: classify_address(&event.address),
        manufacturer_data,
    }
}

/// Resolved device name, then advertised local name, then "Unknown".
pub fn resolve_name(event: &AdvertisementEvent) -> String {
    [event.name.as_deref(), event.local_name.as_deref()]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|n| !n.is_empty())
        .unwrap_or(UNKNOWN_NAME)
        .to_string()
}

pub fn resolve_rssi(rssi: Option<i16>) -> i16 {
    rssi.unwrap_or(NO_SIGNAL_RSSI)
}

/// Vendor label for a manufacturer company ID and its payload.
///
/// Apple payloads are decoded further and the Continuity device hint
/// replaces the registered "Apple Inc." name.
pub fn resolve_vendor(company_id: u16, payload: &[u8]) -> String {
    if company_id == APPLE_COMPANY_ID {
        return identify_apple_device(payload);
    }
    match defaults::company_name(company_id) {
        Some(name) => name.to_string(),
        None => format!("ID: {}", company_id),
    }
}

/// Probable Apple device/packet type from a Continuity payload.
pub fn identify_apple_device(payload: &[u8]) -> String {
    if payload.len() < 2 {
        return "Apple Device".to_string();
    }
    let type_byte = payload[0];
    match defaults::apple_continuity_type(type_byte) {
        Some(hint) => hint.to_string(),
        None => format!("Apple Device (Type: {:#x})", type_byte),
    }
}

/// Hints for the known services in `uuids`, in advertised order.
/// Unknown UUIDs are skipped, duplicates suppressed.
pub fn service_hints(uuids: &[String]) -> Vec<ServiceHint> {
    let mut hints: Vec<ServiceHint> = Vec::new();
    for uuid in uuids {
        if let Some(hint) = service_hint(uuid) {
            if !hints.contains(&hint) {
                hints.push(hint);
            }
        }
    }
    hints
}

/// Hint for a single service UUID, if the knowledge base knows it.
pub fn service_hint(uuid: &str) -> Option<ServiceHint> {
    let full = defaults::expand_uuid(uuid);
    if let Some(&(_, label, style)) = DEDICATED_HINTS.iter().find(|&&(u, _, _)| u == full) {
        return Some(ServiceHint { label, style });
    }
    let name = defaults::service_name(&full)?;
    let label = name.split_whitespace().next().unwrap_or(name);
    Some(ServiceHint {
        label,
        style: HintStyle::Plain,
    })
}

/// Classify an address by the locally-administered bit (0x02) of its
/// first octet.
pub fn classify_address(address: &str) -> Privacy {
    let first = address.trim().split([':', '-']).next().unwrap_or("");
    if first.len() != 2 {
        return Privacy::Unknown;
    }
    match u8::from_str_radix(first, 16) {
        Ok(octet) if octet & 0x02 != 0 => Privacy::Random,
        Ok(_) => Privacy::Public,
        Err(_) => Privacy::Unknown,
    }
}

/// Join hint labels for display or export.
pub fn join_hints(hints: &[ServiceHint]) -> String {
    hints.iter().map(|h| h.label).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(address: &str) -> AdvertisementEvent {
        AdvertisementEvent::new(address)
    }

    // ── Name / RSSI resolution ──────────────────────────────────────

    #[test]
    fn name_prefers_resolved_then_local() {
        let mut ev = event("00:11:22:33:44:55");
        assert_eq!(resolve_name(&ev), "Unknown");
        ev.local_name = Some("Local".into());
        assert_eq!(resolve_name(&ev), "Local");
        ev.name = Some("Resolved".into());
        assert_eq!(resolve_name(&ev), "Resolved");
    }

    #[test]
    fn blank_name_falls_through() {
        let mut ev = event("00:11:22:33:44:55");
        ev.name = Some("  ".into());
        ev.local_name = Some("Band".into());
        assert_eq!(resolve_name(&ev), "Band");
    }

    #[test]
    fn missing_rssi_is_no_signal() {
        assert_eq!(resolve_rssi(None), -100);
        assert_eq!(resolve_rssi(Some(-42)), -42);
    }

    // ── Vendor resolution ───────────────────────────────────────────

    #[test]
    fn known_company_ids_resolve_to_registered_name() {
        for &(id, name) in defaults::COMPANY_IDS {
            if id == APPLE_COMPANY_ID {
                continue;
            }
            assert_eq!(resolve_vendor(id, &[]), name);
        }
    }

    #[test]
    fn apple_vendor_is_continuity_hint() {
        // The company table keeps "Apple Inc."; the label carries the packet type
        assert_eq!(defaults::company_name(APPLE_COMPANY_ID), Some("Apple Inc."));
        assert_eq!(resolve_vendor(APPLE_COMPANY_ID, &[0x05, 0x12]), "Apple AirDrop");
        assert_eq!(resolve_vendor(APPLE_COMPANY_ID, &[0x07]), "Apple Device");
    }

    #[test]
    fn unknown_company_id_is_verbatim() {
        assert_eq!(resolve_vendor(14, &[1, 2]), "ID: 14");
        assert_eq!(resolve_vendor(65535, &[]), "ID: 65535");
    }

    #[test]
    fn apple_continuity_types() {
        assert_eq!(identify_apple_device(&[0x05, 0x12, 0x34]), "Apple AirDrop");
        assert_eq!(identify_apple_device(&[0x10, 0x00]), "Apple Nearby");
        assert!(identify_apple_device(&[0xFF, 0x00]).contains("Type: 0xff"));
    }

    #[test]
    fn short_apple_payload_is_generic() {
        assert_eq!(identify_apple_device(&[]), "Apple Device");
        assert_eq!(identify_apple_device(&[0x05]), "Apple Device");
        assert_eq!(resolve_vendor(76, &[0x07]), "Apple Device");
    }

    #[test]
    fn lowest_company_id_wins() {
        let mut ev = event("00:11:22:33:44:55");
        ev.manufacturer_data.insert(117, vec![9]);
        ev.manufacturer_data.insert(6, vec![1, 2]);
        let obs = classify(&ev);
        assert_eq!(obs.vendor, "Microsoft");
        assert_eq!(obs.manufacturer_data, vec![1, 2]);
    }

    #[test]
    fn no_manufacturer_data_is_unknown_vendor() {
        let obs = classify(&event("00:11:22:33:44:55"));
        assert_eq!(obs.vendor, "Unknown");
        assert!(obs.manufacturer_data.is_empty());
    }

    // ── Service hints ───────────────────────────────────────────────

    #[test]
    fn dedicated_hints() {
        let uuids: Vec<String> = [
            "0000180d-0000-1000-8000-00805f9b34fb",
            "0000180f-0000-1000-8000-00805f9b34fb",
            "00001812-0000-1000-8000-00805f9b34fb",
            "0000fe9f-0000-1000-8000-00805f9b34fb",
            "0000feed-0000-1000-8000-00805f9b34fb",
            "0000fd6f-0000-1000-8000-00805f9b34fb",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let labels: Vec<_> = service_hints(&uuids).iter().map(|h| h.label).collect();
        assert_eq!(labels, ["Heart Rate", "Battery", "HID", "Google", "Tile", "Exposure"]);
    }

    #[test]
    fn other_known_services_use_first_word() {
        let hint = service_hint("0000181a-0000-1000-8000-00805f9b34fb").unwrap();
        assert_eq!(hint.label, "Environmental");
        assert_eq!(hint.style, HintStyle::Plain);
        assert_eq!(service_hint("110b").unwrap().label, "Audio");
    }

    #[test]
    fn unknown_services_omitted_and_duplicates_suppressed() {
        let uuids = vec![
            "0000abcd-0000-1000-8000-00805f9b34fb".to_string(),
            "0000180F-0000-1000-8000-00805F9B34FB".to_string(),
            "0000180f-0000-1000-8000-00805f9b34fb".to_string(),
        ];
        let hints = service_hints(&uuids);
        assert_eq!(hints.len(), 1);
        assert_eq!(hints[0].label, "Battery");
    }

    // ── Privacy ─────────────────────────────────────────────────────

    #[test]
    fn randomized_address() {
        assert_eq!(classify_address("02:AA:BB:CC:DD:EE"), Privacy::Random);
        assert_eq!(classify_address("c3:aa:bb:cc:dd:ee"), Privacy::Random);
    }

    #[test]
    fn public_address() {
        assert_eq!(classify_address("00:11:22:33:44:55"), Privacy::Public);
        assert_eq!(classify_address("B4:1E:52:AB:CD:EF"), Privacy::Public);
    }

    #[test]
    fn malformed_address_is_indeterminate() {
        assert_eq!(classify_address(""), Privacy::Unknown);
        assert_eq!(classify_address("ZZ:11:22:33:44:55"), Privacy::Unknown);
        assert_eq!(classify_address("123:45"), Privacy::Unknown);
        assert_eq!(Privacy::Unknown.as_str(), "?");
    }

    // ── Full classification ─────────────────────────────────────────

    #[test]
    fn classify_apple_airpods() {
        let mut ev = event("4E:11:22:33:44:55");
        ev.rssi = Some(-48);
        ev.local_name = Some("AirPods".into());
        ev.manufacturer_data.insert(76, vec![0x07, 0x19, 0x01]);
        let obs = classify(&ev);
        assert_eq!(obs.name, "AirPods");
        assert_eq!(obs.rssi, -48);
        assert_eq!(obs.vendor, "Apple AirPods");
        assert_eq!(obs.privacy, Privacy::Random);
        assert!(obs.service_hints.is_empty());
    }

    #[test]
    fn join_hints_readable() {
        let hints = service_hints(&["180d".to_string(), "180f".to_string()]);
        assert_eq!(join_hints(&hints), "Heart Rate, Battery");
        assert_eq!(join_hints(&[]), "");
    }
}
