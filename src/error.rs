//! Error types for BlueSentry.
//!
//! Decode problems (bad payloads, unreadable characteristic values) are not
//! errors; they degrade to defaults in the classifier and GATT helper.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// BLE stack unavailable, connection refused or timed out
    #[error("BLE transport error: {0}")]
    Transport(String),

    #[error("failed to export session to {path}: {source}")]
    Export {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = core::result::Result<T, Error>;
