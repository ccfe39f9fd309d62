//! Progress tracking
//!
//! [`ProgressTracker`] is a cloneable handle over the latest
//! [`ProgressSnapshot`]. The session worker is the only writer; any number of
//! observers may read. Each update replaces the whole snapshot, so readers
//! never see a half-written row/color pair.

use crate::data::ProgressSnapshot;
use crate::error::ProgressError;
use parking_lot::RwLock;
use std::sync::Arc;

/// Shared progress snapshot
#[derive(Debug, Clone, Default)]
pub struct ProgressTracker {
    snapshot: Arc<RwLock<ProgressSnapshot>>,
}

impl ProgressTracker {
    /// Create a tracker in the "no image" state
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the snapshot
    ///
    /// A negative row is rejected and leaves the snapshot untouched.
    pub fn update(&self, row: i32, total: i32, repeats: i32, color: i32) -> Result<(), ProgressError> {
        if row < 0 {
            tracing::warn!("Rejected progress update with row {}", row);
            return Err(ProgressError::NegativeRow { row });
        }

        *self.snapshot.write() = ProgressSnapshot {
            row,
            total,
            repeats,
            color,
        };
        Ok(())
    }

    /// Return to the "no image" state
    pub fn reset(&self) {
        *self.snapshot.write() = ProgressSnapshot::NONE;
    }

    /// Current snapshot
    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.snapshot.read()
    }
}
