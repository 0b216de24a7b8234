//! Document id allocation
//!
//! Hands out strictly increasing ids for one table. The first allocation in
//! a process scans the table for its largest id; later allocations are served
//! from an in-memory hint until something invalidates it.

use crate::document::DocId;
use crate::error::{AtlasError, Result};

/// Allocates document ids for a single table
#[derive(Debug, Default)]
pub struct IdAllocator {
    /// Next id to hand out, if still known to be max + 1
    next: Option<DocId>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: None }
    }

    /// Produce the next id for `table`
    ///
    /// `max_id` is only called when there is no live hint; it must scan the
    /// current logical table and return its largest id. Fails with
    /// `IdSpaceExhausted` once `DocId::MAX` is taken.
    pub fn next_id<F>(&mut self, table: &str, max_id: F) -> Result<DocId>
    where
        F: FnOnce() -> Result<Option<DocId>>,
    {
        let id = match self.next {
            Some(id) => id,
            // Hint is gone: rescan. Empty table starts at 1.
            None => match max_id()? {
                None => 1,
                Some(max) => max.checked_add(1).ok_or_else(|| {
                    AtlasError::IdSpaceExhausted {
                        table: table.to_string(),
                    }
                })?,
            },
        };

        // Nothing follows DocId::MAX; the next call rescans and fails
        self.next = id.checked_add(1);
        Ok(id)
    }

    /// Forget the hint; the next allocation rescans the table
    pub fn invalidate(&mut self) {
        self.next = None;
    }

    /// The id the next allocation would return without a rescan
    pub fn peek(&self) -> Option<DocId> {
        self.next
    }
}
