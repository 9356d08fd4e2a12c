//! Terminal rendering for the scan table, radar, tracker chart and
//! interrogation report, coloured with `colored`.
//!
//! Every renderer returns a `String` frame; callers decide where it goes.
//! Colour lives only here. The library hands over semantic tiers and
//! styles, and the CSV export never sees escape codes.

use std::fmt::Write;
use std::time::Duration;

use colored::{Color, ColoredString, Colorize};

use bluesentry::classifier::{HintStyle, Privacy, ServiceHint};
use bluesentry::gatt::{ReadOutcome, ServiceReport};
use bluesentry::radar::{Cell, RadarGrid};
use bluesentry::registry::{DeviceRow, SignalTier};
use bluesentry::tracker::{self, Proximity, SignalTracker, TrackerState, CHART_MAX_RSSI, CHART_MIN_RSSI};

/// Clear screen and home the cursor
pub const CLEAR: &str = "\x1b[2J\x1b[H";

// ── Column widths ────────────────────────────────────────────────────

const ID_W: usize = 3;
const ADDR_W: usize = 17;
const RSSI_W: usize = 8;
const NAME_W: usize = 22;
const VENDOR_W: usize = 28;
const PRIVACY_W: usize = 7;

/// Tracker chart resolution (dB per row)
const CHART_STEP: i16 = 5;

pub fn tier_color(tier: SignalTier) -> Color {
    match tier {
        SignalTier::Strong => Color::Green,
        SignalTier::Medium => Color::Yellow,
        SignalTier::Weak => Color::Red,
    }
}

pub fn hint_label(hint: &ServiceHint) -> ColoredString {
    let label = hint.label;
    match hint.style {
        HintStyle::Health => label.red(),
        HintStyle::Power => label.yellow(),
        HintStyle::Input => label.magenta(),
        HintStyle::Vendor => label.blue(),
        HintStyle::Tracker => label.cyan(),
        HintStyle::Exposure => label.red().bold(),
        HintStyle::Plain => label.normal(),
    }
}

/// Pad or truncate to exactly `width` characters.
fn fit(text: &str, width: usize) -> String {
    let count = text.chars().count();
    if count <= width {
        format!("{text:<width$}")
    } else {
        let mut out: String = text.chars().take(width.saturating_sub(1)).collect();
        out.push('~');
        out
    }
}

fn hints(service_hints: &[ServiceHint]) -> String {
    service_hints
        .iter()
        .map(|h| hint_label(h).to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Scan view ────────────────────────────────────────────────────────

pub fn render_table(rows: &[DeviceRow]) -> String {
    let mut out = String::new();
    let header = format!(
        "{:>ID_W$} {:<ADDR_W$} {:>RSSI_W$} {:<NAME_W$} {:<VENDOR_W$} {:<PRIVACY_W$} Services",
        "ID", "Address", "RSSI", "Name", "Manufacturer", "Privacy",
    );
    let _ = writeln!(out, "{}", header.bold());
    for row in rows {
        let rssi = format!("{:>RSSI_W$}", format!("{} dBm", row.rssi));
        let privacy = fit(row.privacy.as_str(), PRIVACY_W);
        let privacy = match row.privacy {
            Privacy::Random => privacy.dimmed(),
            Privacy::Public | Privacy::Unknown => privacy.normal(),
        };
        let _ = writeln!(
            out,
            "{:>ID_W$} {} {} {} {} {} {}",
            row.rank,
            fit(&row.address, ADDR_W).cyan(),
            rssi.color(tier_color(row.tier)),
            fit(&row.name, NAME_W),
            fit(&row.vendor, VENDOR_W),
            privacy,
            hints(&row.service_hints),
        );
    }
    out
}

pub fn render_radar(grid: &RadarGrid) -> String {
    let mut out = String::with_capacity(grid.width() * grid.height() * 4);
    for row in grid.rows() {
        for cell in row {
            let ch = cell.symbol().to_string();
            let _ = match *cell {
                Cell::Empty => write!(out, " "),
                Cell::AxisH | Cell::AxisV => write!(out, "{}", ch.dimmed()),
                Cell::Center => write!(out, "{}", ch.bold()),
                Cell::Device { tier, .. } => write!(out, "{}", ch.color(tier_color(tier))),
            };
        }
        out.push('\n');
    }
    out
}

/// One live scan frame: status line, ranked table, optional radar.
pub fn render_scan(rows: &[DeviceRow], radar: Option<&RadarGrid>, elapsed: Duration, total: Duration) -> String {
    let mut out = String::from(CLEAR);
    let _ = writeln!(
        out,
        "{} scanning {}s / {}s  {} devices  (Ctrl+C to stop)\n",
        "BlueSentry".yellow().bold(),
        elapsed.as_secs().min(total.as_secs()),
        total.as_secs(),
        rows.len(),
    );
    out.push_str(&render_table(rows));
    if let Some(grid) = radar {
        out.push('\n');
        out.push_str(&render_radar(grid));
    }
    out
}

// ── Tracker view ─────────────────────────────────────────────────────

/// Plot the tracker history, newest sample on the right.
pub fn render_chart(series: &[i16]) -> String {
    let rows = ((CHART_MAX_RSSI - CHART_MIN_RSSI) / CHART_STEP) as usize + 1;
    let width = tracker::HISTORY_SIZE;
    let mut grid = vec![vec![' '; width]; rows];
    let recent = &series[series.len().saturating_sub(width)..];
    let offset = width - recent.len();
    for (i, &rssi) in recent.iter().enumerate() {
        let rssi = rssi.clamp(CHART_MIN_RSSI, CHART_MAX_RSSI);
        let row = ((CHART_MAX_RSSI - rssi + CHART_STEP / 2) / CHART_STEP) as usize;
        grid[row.min(rows - 1)][offset + i] = '*';
    }

    let mut out = String::new();
    for (r, line) in grid.iter().enumerate() {
        let label = CHART_MAX_RSSI - r as i16 * CHART_STEP;
        let plot: String = line.iter().collect();
        let _ = writeln!(out, "{}{}", format!("{label:>4} |").dimmed(), plot.green());
    }
    let _ = writeln!(out, "{}", format!("     +{}", "-".repeat(width)).dimmed());
    out
}

pub fn proximity_panel(proximity: Proximity) -> String {
    let label = match proximity {
        Proximity::VeryClose => format!(" !!! {} !!! ", proximity.label()),
        _ => format!(" {} ", proximity.label()),
    };
    let label = match proximity {
        Proximity::VeryClose => label.white().bold().on_red(),
        Proximity::Nearby => label.black().bold().on_yellow(),
        Proximity::InRange => label.white().bold().on_blue(),
        Proximity::WeakOrLost => label.dimmed(),
    };
    format!("Proximity: {}", label)
}

pub fn render_tracker(tracker: &SignalTracker) -> String {
    let state = tracker.state();
    let state_label = match state {
        TrackerState::Tracking => state.as_str().green().bold(),
        TrackerState::Acquiring => state.as_str().yellow(),
        TrackerState::Stale | TrackerState::Stopped => state.as_str().red().bold(),
    };
    let mut out = String::from(CLEAR);
    let _ = writeln!(
        out,
        "{} {} ({})  [{}]  {} dBm\n",
        "Signal Strength:".bold(),
        tracker.name(),
        tracker.address(),
        state_label,
        tracker.current_rssi(),
    );
    out.push_str(&render_chart(&tracker.series()));
    out.push('\n');
    out.push_str(&proximity_panel(tracker.proximity()));
    out.push('\n');
    if state != TrackerState::Stopped {
        let _ = writeln!(out, "{}", "Move around to locate the signal source. Press Ctrl+C to stop.".dimmed());
    }
    out
}

// ── Status lines ─────────────────────────────────────────────────────

pub fn interrogating(address: &str) -> String {
    format!("{} {}", "[*] Interrogating Target:".yellow().bold(), address)
}

pub fn connection_failed(err: &dyn std::fmt::Display) -> String {
    format!(
        "{} {}\n{}",
        "[-] Connection failed:".red().bold(),
        err,
        "Note: Device might be out of range or rejecting connections.".dimmed(),
    )
}

// ── Interrogation report ─────────────────────────────────────────────

pub fn render_report(address: &str, reports: &[ServiceReport]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", format!("[+] Connected to {address}").green().bold());
    let _ = writeln!(out, "\n{}", "[*] Dumping Service Table:".bold());
    for service in reports {
        let _ = writeln!(out, "\n{} {} ({})", "SERVICE:".cyan().bold(), service.uuid, service.name);
        for ch in &service.characteristics {
            let _ = writeln!(out, "  └── {} {} ({})", "CHAR:".yellow(), ch.uuid, ch.name);
            let _ = writeln!(out, "      Properties: [{}]", ch.properties);
            match &ch.value {
                Some(value @ ReadOutcome::Value(_)) => {
                    let _ = writeln!(out, "      >>> {} {value}", "VALUE:".green().bold());
                }
                Some(failed @ ReadOutcome::Failed) => {
                    let _ = writeln!(out, "      >>> {}", failed.to_string().dimmed());
                }
                None => {}
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bluesentry::gatt::CharacteristicReport;

    fn row(rank: usize, rssi: i16) -> DeviceRow {
        DeviceRow {
            rank,
            address: "02:AA:BB:CC:DD:EE".into(),
            rssi,
            tier: SignalTier::from_rssi(rssi),
            name: "Polar H10".into(),
            vendor: "Unknown".into(),
            service_hints: vec![ServiceHint {
                label: "Heart Rate",
                style: HintStyle::Health,
            }],
            privacy: Privacy::Random,
        }
    }

    // ── Table ───────────────────────────────────────────────────────

    #[test]
    fn table_rows_colored_by_tier() {
        colored::control::set_override(true);
        let out = render_table(&[row(1, -45), row(2, -85)]);
        assert_eq!(out.lines().count(), 3);
        assert!(out.contains("\x1b[32m -45 dBm\x1b[0m"));
        assert!(out.contains("\x1b[31m -85 dBm\x1b[0m"));
        assert!(out.contains(&"Heart Rate".red().to_string()));
    }

    #[test]
    fn status_lines_carry_address_and_error() {
        assert!(interrogating("AA:BB:CC:DD:EE:FF").ends_with(" AA:BB:CC:DD:EE:FF"));
        let failed = connection_failed(&"timed out");
        assert!(failed.contains("timed out"));
        assert!(failed.contains("out of range or rejecting connections"));
    }

    #[test]
    fn fit_pads_and_truncates() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdef", 4), "abc~");
    }

    // ── Radar ───────────────────────────────────────────────────────

    #[test]
    fn radar_keeps_grid_shape() {
        let grid = bluesentry::radar::project(&[], 21, 11, 10);
        let out = render_radar(&grid);
        assert_eq!(out.lines().count(), 11);
    }

    // ── Tracker ─────────────────────────────────────────────────────

    #[test]
    fn chart_places_extremes_on_edges() {
        let out = render_chart(&[-30, -100]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 16);
        assert!(lines[0].contains(" -30 |"));
        assert!(lines[0].contains('*'));
        assert!(lines[14].contains("-100 |"));
        assert!(lines[14].contains('*'));
        assert!(!lines[7].contains('*'));
    }

    #[test]
    fn proximity_labels() {
        assert!(proximity_panel(Proximity::VeryClose).contains("!!! VERY CLOSE !!!"));
        assert!(proximity_panel(Proximity::WeakOrLost).contains("WEAK / LOST SIGNAL"));
    }

    // ── Report ──────────────────────────────────────────────────────

    #[test]
    fn report_shows_values_and_failures() {
        let reports = vec![ServiceReport {
            uuid: "0000180a-0000-1000-8000-00805f9b34fb".into(),
            name: "Device Information",
            characteristics: vec![
                CharacteristicReport {
                    uuid: "00002a29-0000-1000-8000-00805f9b34fb".into(),
                    name: "Manufacturer Name String",
                    properties: "read".into(),
                    value: Some(ReadOutcome::Value("Acme".into())),
                },
                CharacteristicReport {
                    uuid: "00002a24-0000-1000-8000-00805f9b34fb".into(),
                    name: "Model Number String",
                    properties: "read,write".into(),
                    value: Some(ReadOutcome::Failed),
                },
            ],
        }];
        let out = render_report("AA:BB:CC:DD:EE:FF", &reports);
        assert!(out.contains("(Device Information)"));
        assert!(out.contains("Properties: [read,write]"));
        assert!(out.contains("Acme"));
        assert!(out.contains("READ FAILED (protected)"));
    }
}
