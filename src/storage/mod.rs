//! Storage Module
//!
//! Persists the whole-database snapshot. Backends know nothing about typed
//! document ids: they exchange one nested, string-keyed structure and must
//! store exactly what they are given.
//!
//! ## Snapshot Shape
//! ```text
//! {
//!   "<table name>": {
//!     "<decimal doc id>": { ...document fields... },
//!     ...
//!   },
//!   ...
//! }
//! ```
//!
//! ## Backends
//! - `MemoryStorage`: process-local, for tests and scratch databases
//! - `JsonStorage`:   the snapshot as a plain JSON file
//! - `FramedStorage`: JSON payload behind a checksummed binary header

mod framed;
mod json;
mod memory;

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::document::Fields;
use crate::error::{AtlasError, Result};

pub use framed::{FrameHeader, FramedStorage, HEADER_SIZE, MAGIC, VERSION};
pub use json::JsonStorage;
pub use memory::MemoryStorage;

/// One table as stored: decimal id strings to document bodies
pub type RawTable = BTreeMap<String, Fields>;

/// Every table in the database, keyed by table name
pub type Snapshot = BTreeMap<String, RawTable>;

/// A backend able to load and replace the whole-database snapshot
///
/// All methods take `&self`; a single backend is shared by every table of a
/// database through an `Arc<dyn Storage>`.
pub trait Storage: Send + Sync + fmt::Debug {
    /// Load the snapshot, or `None` if nothing has been written yet
    fn read(&self) -> Result<Option<Snapshot>>;

    /// Replace the stored snapshot with `snapshot`
    fn write(&self, snapshot: &Snapshot) -> Result<()>;

    /// Release underlying resources. Reads after a premature close still work.
    fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Options shared by the file-backed storages
#[derive(Debug, Clone, Copy)]
pub struct FileOptions {
    /// Create missing parent directories on open
    pub create_dirs: bool,

    /// fsync after each write
    pub sync_on_write: bool,

    /// Indent the JSON payload
    pub pretty: bool,
}

impl Default for FileOptions {
    fn default() -> Self {
        Self {
            create_dirs: true,
            sync_on_write: true,
            pretty: false,
        }
    }
}

// =============================================================================
// File Helpers (shared by JsonStorage and FramedStorage)
// =============================================================================

/// Make sure the snapshot file exists, creating parents if allowed
fn prepare_file(path: &Path, options: &FileOptions) -> Result<()> {
    if options.create_dirs {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
    }

    if !path.exists() {
        File::create(path)?;
    }

    Ok(())
}

/// Read the whole file; `None` if it is missing or empty
fn read_file(path: &Path) -> Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(None),
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Replace `path` with `bytes` via a sibling temp file and a rename
///
/// Readers see either the old file or the new one, never a torn write.
fn write_file_atomic(path: &Path, bytes: &[u8], sync: bool) -> Result<()> {
    let tmp = temp_path(path)?;

    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        if sync {
            file.sync_all()?;
        }
    }

    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    Ok(())
}

/// "db.json" → "db.json.tmp"
fn temp_path(path: &Path) -> Result<PathBuf> {
    let mut name = path
        .file_name()
        .ok_or_else(|| {
            AtlasError::Storage(format!("not a file path: {}", path.display()))
        })?
        .to_os_string();
    name.push(".tmp");
    Ok(path.with_file_name(name))
}

/// Serialize a snapshot to JSON bytes
fn encode_json(snapshot: &Snapshot, pretty: bool) -> Result<Vec<u8>> {
    let bytes = if pretty {
        serde_json::to_vec_pretty(snapshot)?
    } else {
        serde_json::to_vec(snapshot)?
    };
    Ok(bytes)
}
