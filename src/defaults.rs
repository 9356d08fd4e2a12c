//! Static knowledge base for advertisement analysis.
//!
//! Company identifiers from the Bluetooth SIG assigned-numbers list, common
//! GATT service UUIDs, and the Apple Continuity message types observed in
//! manufacturer payloads.

/// Apple's registered company identifier (0x004C).
pub const APPLE_COMPANY_ID: u16 = 76;

/// Bluetooth base UUID suffix. 16-bit short IDs expand to
/// `0000XXXX-0000-1000-8000-00805f9b34fb`.
pub const BASE_UUID_SUFFIX: &str = "-0000-1000-8000-00805f9b34fb";

/// Bluetooth SIG company identifiers (subset).
///
/// Source: https://www.bluetooth.com/specifications/assigned-numbers/company-identifiers/
pub static COMPANY_IDS: &[(u16, &str)] = &[
    (0, "Ericsson"),
    (1, "Nokia Mobile Phones"),
    (2, "Intel Corp."),
    (3, "IBM Corp."),
    (4, "Toshiba Corp."),
    (5, "3Com"),
    (6, "Microsoft"),
    (7, "Lucent"),
    (8, "Motorola"),
    (9, "Infineon Technologies"),
    (10, "Cambridge Silicon Radio"),
    (11, "Silicon Wave"),
    (12, "Digianswer A/S"),
    (13, "Texas Instruments"),
    (15, "Broadcom"),
    (19, "Atmel"),
    (20, "Mitsubishi"),
    (29, "Qualcomm"),
    (57, "Gensys"),
    (76, "Apple Inc."),
    (80, "Innovative Systems"),
    (81, "Fitbit, Inc."),
    (86, "Synopsys"),
    (87, "Sony"),
    (89, "Nordic Semiconductor"),
    (117, "Samsung Electronics"),
    (152, "Garmin"),
    (196, "Bose Corporation"),
    (224, "Google"),
    (269, "Beats Electronics"),
    (338, "Nintendo"),
    (343, "Logitech"),
    (841, "Tile, Inc."),
    (1122, "Anker Innovations"),
    (2055, "Wyze Labs"),
];

/// Advertised service UUIDs worth surfacing as hints.
pub static SERVICE_UUIDS: &[(&str, &str)] = &[
    ("00001800-0000-1000-8000-00805f9b34fb", "Generic Access"),
    ("00001801-0000-1000-8000-00805f9b34fb", "Generic Attribute"),
    ("0000180a-0000-1000-8000-00805f9b34fb", "Device Information"),
    ("0000180f-0000-1000-8000-00805f9b34fb", "Battery Service"),
    ("0000180d-0000-1000-8000-00805f9b34fb", "Heart Rate"),
    ("00001805-0000-1000-8000-00805f9b34fb", "Current Time"),
    ("00001821-0000-1000-8000-00805f9b34fb", "Indoor Positioning"),
    ("00001819-0000-1000-8000-00805f9b34fb", "Location and Navigation"),
    ("00001827-0000-1000-8000-00805f9b34fb", "Mesh Provisioning"),
    ("00001828-0000-1000-8000-00805f9b34fb", "Mesh Proxy"),
    ("00001812-0000-1000-8000-00805f9b34fb", "Human Interface Device (HID)"),
    ("00001810-0000-1000-8000-00805f9b34fb", "Blood Pressure"),
    ("0000181a-0000-1000-8000-00805f9b34fb", "Environmental Sensing"),
    ("0000110b-0000-1000-8000-00805f9b34fb", "Audio Sink (A2DP)"),
    ("0000fe9f-0000-1000-8000-00805f9b34fb", "Google (Chromecast/Smart Home)"),
    ("0000feed-0000-1000-8000-00805f9b34fb", "Tile, Inc."),
    ("0000fd6f-0000-1000-8000-00805f9b34fb", "COVID-19 Exposure Notification"),
];

/// GATT services and characteristics named in interrogation output.
pub static GATT_NAMES: &[(&str, &str)] = &[
    ("00001800-0000-1000-8000-00805f9b34fb", "Generic Access"),
    ("00001801-0000-1000-8000-00805f9b34fb", "Generic Attribute"),
    ("0000180a-0000-1000-8000-00805f9b34fb", "Device Information"),
    ("0000180f-0000-1000-8000-00805f9b34fb", "Battery Service"),
    ("0000180d-0000-1000-8000-00805f9b34fb", "Heart Rate"),
    ("00002a00-0000-1000-8000-00805f9b34fb", "Device Name"),
    ("00002a19-0000-1000-8000-00805f9b34fb", "Battery Level"),
    ("00002a29-0000-1000-8000-00805f9b34fb", "Manufacturer Name String"),
    ("00002a24-0000-1000-8000-00805f9b34fb", "Model Number String"),
];

/// Apple Continuity message types (first byte of the 0x004C payload).
///
/// Reverse-engineered; a single advertisement may carry several TLVs but
/// only the leading type is used as the device hint.
pub static APPLE_CONTINUITY_TYPES: &[(u8, &str)] = &[
    (0x02, "Apple iBeacon"),
    (0x05, "Apple AirDrop"),
    (0x07, "Apple AirPods"),
    (0x09, "Apple AirPlay Target"),
    (0x0C, "Apple Handoff"),
    (0x10, "Apple Nearby"),
    (0x12, "Apple Find My (AirTag?)"),
];

/// Look up a registered company name.
pub fn company_name(id: u16) -> Option<&'static str> {
    COMPANY_IDS
        .iter()
        .find(|&&(cid, _)| cid == id)
        .map(|&(_, name)| name)
}

/// Look up the canonical name of an advertised service UUID.
///
/// Accepts full 128-bit UUIDs in any case as well as 16-bit short forms
/// (`"180d"`, `"0x180D"`).
pub fn service_name(uuid: &str) -> Option<&'static str> {
    lookup_uuid(SERVICE_UUIDS, uuid)
}

/// Look up the name of a GATT service or characteristic.
pub fn gatt_name(uuid: &str) -> Option<&'static str> {
    lookup_uuid(GATT_NAMES, uuid)
}

/// Look up the Continuity hint for an Apple message type byte.
pub fn apple_continuity_type(type_byte: u8) -> Option<&'static str> {
    APPLE_CONTINUITY_TYPES
        .iter()
        .find(|&&(t, _)| t == type_byte)
        .map(|&(_, hint)| hint)
}

/// Expand a 16-bit short UUID string to the full base UUID form.
/// Anything that is not a 4-digit hex short form is returned lowercased.
pub fn expand_uuid(uuid: &str) -> String {
    let trimmed = uuid.trim();
    let short = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if short.len() == 4 && short.chars().all(|c| c.is_ascii_hexdigit()) {
        format!("0000{}{}", short.to_ascii_lowercase(), BASE_UUID_SUFFIX)
    } else {
        trimmed.to_ascii_lowercase()
    }
}

fn lookup_uuid(table: &'static [(&'static str, &'static str)], uuid: &str) -> Option<&'static str> {
    let full = expand_uuid(uuid);
    table
        .iter()
        .find(|&&(u, _)| u == full)
        .map(|&(_, name)| name)
}
