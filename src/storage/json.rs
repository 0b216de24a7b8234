//! JSON file storage
//!
//! The snapshot is the file: one JSON object of tables. An empty file means
//! a fresh database.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::Result;

use super::{
    encode_json, prepare_file, read_file, write_file_atomic, FileOptions, Snapshot, Storage,
};

/// Storage backed by a plain JSON file
#[derive(Debug)]
pub struct JsonStorage {
    path: PathBuf,
    options: FileOptions,

    /// Serializes file access within this process
    io_lock: Mutex<()>,

    closed: AtomicBool,
}

impl JsonStorage {
    /// Open (creating if needed) a JSON snapshot file
    pub fn open(path: impl AsRef<Path>, options: FileOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        prepare_file(&path, &options)?;

        tracing::debug!(path = %path.display(), "opened JSON storage");

        Ok(Self {
            path,
            options,
            io_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// Path of the snapshot file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Storage for JsonStorage {
    fn read(&self) -> Result<Option<Snapshot>> {
        let _guard = self.io_lock.lock();

        let bytes = match read_file(&self.path)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };

        tracing::trace!(bytes = bytes.len(), "read JSON snapshot");
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    fn write(&self, snapshot: &Snapshot) -> Result<()> {
        let bytes = encode_json(snapshot, self.options.pretty)?;

        let _guard = self.io_lock.lock();
        write_file_atomic(&self.path, &bytes, self.options.sync_on_write)?;

        tracing::trace!(bytes = bytes.len(), "wrote JSON snapshot");
        Ok(())
    }

    fn close(&self) -> Result<()> {
        // Every write is already complete on disk; nothing is held open
        self.closed.store(true, Ordering::SeqCst);
        tracing::debug!(path = %self.path.display(), "closed JSON storage");
        Ok(())
    }
}
