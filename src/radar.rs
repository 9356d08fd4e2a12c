//! Radar projection of a ranked snapshot onto a character grid.
//!
//! There is no bearing information in an advertisement, so the angle is
//! illustrative: the N plotted devices are spread evenly around the circle
//! by rank. Only the distance from the centre carries meaning (signal
//! strength). Two devices landing on the same cell: the later rank wins.

use std::f64::consts::PI;

use crate::registry::{DeviceRecord, SignalTier};

/// Devices plotted by default.
pub const DEFAULT_MAX_POINTS: usize = 10;

/// RSSI at or above which a device sits on the centre.
pub const NEAR_RSSI: f64 = -30.0;

/// Span from [`NEAR_RSSI`] to the edge (-100 dBm).
pub const RSSI_SPAN: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    /// Horizontal crosshair
    AxisH,
    /// Vertical crosshair
    AxisV,
    /// The scanner itself
    Center,
    Device { rank: usize, tier: SignalTier },
}

impl Cell {
    /// Plain character for this cell. Ranks above 9 continue as a, b, ...
    pub fn symbol(&self) -> char {
        match *self {
            Cell::Empty => ' ',
            Cell::AxisH => '-',
            Cell::AxisV => '|',
            Cell::Center => '@',
            Cell::Device { rank, .. } => char::from_digit(rank as u32, 36).unwrap_or('*'),
        }
    }
}

/// Where one device ended up.
#[derive(Debug, Clone, PartialEq)]
pub struct Blip {
    pub rank: usize,
    pub address: String,
    /// Unit distance factor, 0 = centre, 1 = edge
    pub distance: f64,
    pub x: usize,
    pub y: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RadarGrid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    blips: Vec<Blip>,
}

impl RadarGrid {
    fn empty(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            cells: vec![Cell::Empty; width * height],
            blips: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn center(&self) -> (usize, usize) {
        (self.width / 2, self.height / 2)
    }

    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        if x < self.width && y < self.height {
            Some(self.cells[y * self.width + x])
        } else {
            None
        }
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.width.max(1))
    }

    pub fn blips(&self) -> &[Blip] {
        &self.blips
    }

    /// Grid as plain text, one line per row.
    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity((self.width + 1) * self.height);
        for row in self.rows() {
            out.extend(row.iter().map(Cell::symbol));
            out.push('\n');
        }
        out
    }
}

/// Unit distance for a signal strength: -30 dBm or stronger is 0,
/// -100 dBm or weaker is 1.
pub fn distance_factor(rssi: i16) -> f64 {
    ((f64::from(rssi) - NEAR_RSSI) / -RSSI_SPAN).clamp(0.0, 1.0)
}

/// Project the strongest `max_points` records of `snapshot` onto a
/// `width` x `height` grid. The snapshot is re-ranked defensively so
/// callers may pass records in any order.
pub fn project(snapshot: &[DeviceRecord], width: usize, height: usize, max_points: usize) -> RadarGrid {
    let mut grid = RadarGrid::empty(width, height);
    if width == 0 || height == 0 {
        return grid;
    }

    let (cx, cy) = grid.center();
    for x in 0..width {
        grid.set(x, cy, Cell::AxisH);
    }
    for y in 0..height {
        grid.set(cx, y, Cell::AxisV);
    }
    grid.set(cx, cy, Cell::Center);

    let mut ranked: Vec<&DeviceRecord> = snapshot.iter().collect();
    ranked.sort_by(|a, b| b.rssi.cmp(&a.rssi).then_with(|| a.address.cmp(&b.address)));
    ranked.truncate(max_points);

    let n = ranked.len();
    let radius_x = (width as f64 / 2.0 - 2.0).max(0.0);
    let radius_y = (height as f64 / 2.0 - 1.0).max(0.0);

    for (i, record) in ranked.into_iter().enumerate() {
        let d = distance_factor(record.rssi);
        let theta = i as f64 * 2.0 * PI / n as f64;
        let fx = cx as f64 + d * radius_x * theta.cos();
        let fy = cy as f64 + d * radius_y * theta.sin();
        let x = clamp_cell(fx, width);
        let y = clamp_cell(fy, height);
        let rank = i + 1;

        grid.set(
            x,
            y,
            Cell::Device {
                rank,
                tier: record.tier(),
            },
        );
        grid.blips.push(Blip {
            rank,
            address: record.address.clone(),
            distance: d,
            x,
            y,
        });
    }

    grid
}

fn clamp_cell(v: f64, len: usize) -> usize {
    let max = (len - 1) as f64;
    v.round().clamp(0.0, max) as usize
}
