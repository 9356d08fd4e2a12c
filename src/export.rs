//! Session exporter: writes the registry as CSV.
//!
//! Fixed column order: `Address,Name,Manufacturer,Last RSSI,Services,Privacy`.
//! One row per known device, strongest first. Quoting is left to the `csv`
//! writer (RFC 4180, only where needed); line breaks inside a field are
//! flattened to spaces first so every record stays on one line.

use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use serde::Serialize;

use crate::classifier;
use crate::error::{Error, Result};
use crate::registry::DeviceRecord;

pub const CSV_HEADER: &str = "Address,Name,Manufacturer,Last RSSI,Services,Privacy";

/// One exported row, in header order.
#[derive(Serialize)]
struct CsvRow<'a> {
    address: Cow<'a, str>,
    name: Cow<'a, str>,
    vendor: Cow<'a, str>,
    rssi: i16,
    services: String,
    privacy: &'static str,
}

impl<'a> From<&'a DeviceRecord> for CsvRow<'a> {
    fn from(r: &'a DeviceRecord) -> Self {
        Self {
            address: flatten(&r.address),
            name: flatten(&r.name),
            vendor: flatten(&r.vendor),
            rssi: r.rssi,
            services: flatten(&classifier::join_hints(&r.service_hints)).into_owned(),
            privacy: r.privacy.as_str(),
        }
    }
}

/// Default export file name, e.g. `sentry_log_20240131_142501.csv`.
pub fn default_log_path<Tz: TimeZone>(now: &DateTime<Tz>) -> PathBuf
where
    Tz::Offset: std::fmt::Display,
{
    PathBuf::from(format!("sentry_log_{}.csv", now.format("%Y%m%d_%H%M%S")))
}

/// Write `records` as CSV. Returns the number of data rows written.
pub fn write_csv<W: Write>(records: &[DeviceRecord], out: W) -> io::Result<usize> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(out);
    // Header goes out even when there are no rows
    wtr.write_record(CSV_HEADER.split(','))?;
    for r in records {
        wtr.serialize(CsvRow::from(r))?;
    }
    wtr.flush()?;
    Ok(records.len())
}

/// Export to a file. A failure leaves `records` untouched; the caller
/// decides how to report it.
pub fn export_csv_file(records: &[DeviceRecord], path: &Path) -> Result<usize> {
    let export_err = |source: io::Error| Error::Export {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(export_err)?;
    let rows = write_csv(records, BufWriter::new(file)).map_err(export_err)?;
    log::info!("exported {} devices to {}", rows, path.display());
    Ok(rows)
}

fn flatten(field: &str) -> Cow<'_, str> {
    if field.contains(['\n', '\r']) {
        Cow::Owned(field.replace(['\n', '\r'], " "))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{HintStyle, Privacy, ServiceHint};
    use chrono::Utc;

    fn record(address: &str, rssi: i16) -> DeviceRecord {
        let now = Utc::now();
        DeviceRecord {
            address: address.into(),
            first_seen: now,
            last_seen: now,
            name: "Unknown".into(),
            rssi,
            vendor: "Unknown".into(),
            service_hints: Vec::new(),
            privacy: Privacy::Public,
            raw_manufacturer_data: Vec::new(),
            sightings: 1,
        }
    }

    fn render(records: &[DeviceRecord]) -> String {
        let mut buf = Vec::new();
        write_csv(records, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ── Line counts ─────────────────────────────────────────────────

    #[test]
    fn zero_records_is_header_only() {
        let out = render(&[]);
        assert_eq!(out, "Address,Name,Manufacturer,Last RSSI,Services,Privacy\n");
    }

    #[test]
    fn n_records_give_n_plus_one_lines() {
        for n in [1usize, 2, 17] {
            let records: Vec<_> = (0..n)
                .map(|i| record(&format!("00:00:00:00:00:{:02X}", i), -50))
                .collect();
            let out = render(&records);
            assert_eq!(out.lines().count(), n + 1);
            assert_eq!(out.lines().next(), Some(CSV_HEADER));
        }
    }

    // ── Row content ─────────────────────────────────────────────────

    #[test]
    fn row_column_order() {
        let mut r = record("02:AA:BB:CC:DD:EE", -63);
        r.name = "Polar H10".into();
        r.vendor = "Apple AirDrop".into();
        r.privacy = Privacy::Random;
        r.service_hints = vec![ServiceHint { label: "Heart Rate", style: HintStyle::Health }];
        let out = render(&[r]);
        assert_eq!(
            out.lines().nth(1),
            Some("02:AA:BB:CC:DD:EE,Polar H10,Apple AirDrop,-63,Heart Rate,Random")
        );
    }

    #[test]
    fn joined_services_are_quoted() {
        let mut r = record("00:11:22:33:44:55", -70);
        r.service_hints = vec![
            ServiceHint { label: "Heart Rate", style: HintStyle::Health },
            ServiceHint { label: "Battery", style: HintStyle::Power },
        ];
        let out = render(&[r]);
        assert!(out.contains(",\"Heart Rate, Battery\","));
    }

    #[test]
    fn awkward_names_stay_on_one_line() {
        let mut r = record("00:11:22:33:44:55", -70);
        r.name = "Bob's \"Buds\"\r\nPro".into();
        r.vendor = "Fitbit, Inc.".into();
        let out = render(&[r]);
        assert_eq!(out.lines().count(), 2);
        assert!(out.contains("\"Bob's \"\"Buds\"\"  Pro\""));
        assert!(out.contains("\"Fitbit, Inc.\""));
    }

    #[test]
    fn rows_read_back_as_six_fields() {
        let mut r = record("00:11:22:33:44:55", -70);
        r.name = "Bob's \"Buds\"".into();
        r.vendor = "Fitbit, Inc.".into();
        let out = render(&[r]);
        let mut reader = csv::Reader::from_reader(out.as_bytes());
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), 6);
        assert_eq!(&headers[3], "Last RSSI");
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(&row[1], "Bob's \"Buds\"");
        assert_eq!(&row[2], "Fitbit, Inc.");
        assert_eq!(&row[3], "-70");
    }

    #[test]
    fn indeterminate_privacy_exported_as_question_mark() {
        let mut r = record("garbage", -70);
        r.privacy = Privacy::Unknown;
        assert!(render(&[r]).lines().nth(1).unwrap().ends_with(",?"));
    }

    // ── Paths / failures ────────────────────────────────────────────

    #[test]
    fn default_path_format() {
        let t = Utc.with_ymd_and_hms(2024, 1, 31, 14, 25, 1).unwrap();
        assert_eq!(default_log_path(&t), PathBuf::from("sentry_log_20240131_142501.csv"));
    }

    #[test]
    fn unwritable_path_is_export_error() {
        let path = Path::new("/nonexistent-dir/for/sure/log.csv");
        let err = export_csv_file(&[record("00:11:22:33:44:55", -50)], path).unwrap_err();
        assert!(matches!(err, Error::Export { .. }));
    }

    #[test]
    fn export_to_temp_file() {
        let path = std::env::temp_dir().join(format!("bluesentry-export-{}.csv", std::process::id()));
        let rows = export_csv_file(&[record("00:11:22:33:44:55", -50)], &path).unwrap();
        assert_eq!(rows, 1);
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), 2);
        let _ = std::fs::remove_file(&path);
    }
}
