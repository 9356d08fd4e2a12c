//! BlueSentry library: BLE advertisement analysis and proximity tracking.
//!
//! The engine turns raw advertisement events from an external BLE stack
//! into a live registry of classified devices. It covers vendor and Apple
//! Continuity heuristics, service hints, and address privacy. On top of the
//! registry it builds a signal-strength radar, a single-target proximity
//! tracker, a GATT interrogation report and a CSV session log.
//!
//! Nothing in here touches a radio or a terminal. The `bluesentry` binary
//! in `host/` supplies the event source, the GATT transport and the
//! rendering, and can be swapped for any other consumer.
//!
//! Layout:
//! - `defaults`, `scanner`, `classifier`: knowledge base, event model,
//!   per-advertisement classification
//! - `registry`, `radar`, `tracker`: aggregated state and its projections
//! - `gatt`, `export`, `session`: interrogation and end-of-session output
//! - `protocol`, `config`, `error`: wire codec and ambient plumbing

pub mod classifier;
pub mod config;
pub mod defaults;
pub mod error;
pub mod export;
pub mod gatt;
pub mod protocol;
pub mod radar;
pub mod registry;
pub mod scanner;
pub mod session;
pub mod tracker;

pub use error::{Error, Result};
