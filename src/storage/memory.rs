//! In-memory storage
//!
//! Keeps the snapshot in process memory. Nothing survives a restart of the
//! process, but a fresh `Table` over the same `MemoryStorage` sees everything.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::error::Result;

use super::{Snapshot, Storage};

/// Volatile storage backend
#[derive(Debug, Default)]
pub struct MemoryStorage {
    /// `None` until the first write
    snapshot: RwLock<Option<Snapshot>>,

    /// Number of completed writes (for tests/diagnostics)
    writes: AtomicU64,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing snapshot
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: RwLock::new(Some(snapshot)),
            writes: AtomicU64::new(0),
        }
    }

    /// Number of writes performed so far
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Storage for MemoryStorage {
    fn read(&self) -> Result<Option<Snapshot>> {
        // Hand out a copy so callers can never alias stored state
        Ok(self.snapshot.read().clone())
    }

    fn write(&self, snapshot: &Snapshot) -> Result<()> {
        *self.snapshot.write() = Some(snapshot.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        tracing::trace!(tables = snapshot.len(), "memory snapshot replaced");
        Ok(())
    }
}
