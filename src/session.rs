//! Scan session lifecycle.
//!
//! A session ends on timeout, on Ctrl+C, or when the event source closes,
//! and those paths can race. [`Session::finish`] exports the registry at
//! most once whichever of them gets there first.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::Result;
use crate::export;
use crate::registry::SharedRegistry;

#[derive(Debug, Default)]
pub struct Session {
    registry: SharedRegistry,
    exported: AtomicBool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: SharedRegistry) -> Self {
        Self {
            registry,
            exported: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &SharedRegistry {
        &self.registry
    }

    pub fn is_finished(&self) -> bool {
        self.exported.load(Ordering::Acquire)
    }

    /// Export the registry to `path`. Returns `Ok(None)` if the session was
    /// already finished. A failed export still counts as finished; the
    /// registry is left intact.
    pub fn finish(&self, path: &Path) -> Result<Option<usize>> {
        if self.exported.swap(true, Ordering::AcqRel) {
            log::debug!("session already exported, skipping {}", path.display());
            return Ok(None);
        }
        let snapshot = self.registry.snapshot();
        log::info!("session finished with {} devices", snapshot.len());
        export::export_csv_file(&snapshot, path).map(Some)
    }
}
