//! Configuration for AtlasDoc
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};

/// Name of the table used by `Database` pass-through methods
pub const DEFAULT_TABLE: &str = "_default";

/// Default per-table query cache capacity
pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// Main configuration for an AtlasDoc database
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Which backend persists the whole-database snapshot
    pub backend: StorageBackend,

    /// Create missing parent directories for file backends
    pub create_dirs: bool,

    /// fsync the snapshot file after every write
    pub sync_on_write: bool,

    /// Indent JSON output (file backends only)
    pub pretty_json: bool,

    // -------------------------------------------------------------------------
    // Table Configuration
    // -------------------------------------------------------------------------
    /// Table targeted by the database-level pass-through methods
    pub default_table: String,

    /// Max cached query results per table (0 disables the cache)
    pub cache_capacity: usize,
}

/// Storage backend selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageBackend {
    /// Volatile, process-local snapshot
    Memory,

    /// Plain JSON file
    Json { path: PathBuf },

    /// Checksummed binary-framed file
    Framed { path: PathBuf },
}

impl StorageBackend {
    /// Path of the backing file, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            StorageBackend::Memory => None,
            StorageBackend::Json { path } | StorageBackend::Framed { path } => Some(path),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            create_dirs: true,
            sync_on_write: true,
            pretty_json: false,
            default_table: DEFAULT_TABLE.to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Keep the snapshot in memory only
    pub fn memory(mut self) -> Self {
        self.config.backend = StorageBackend::Memory;
        self
    }

    /// Persist to a plain JSON file
    pub fn json_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.backend = StorageBackend::Json { path: path.into() };
        self
    }

    /// Persist to a checksummed framed file
    pub fn framed_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.backend = StorageBackend::Framed { path: path.into() };
        self
    }

    /// Set whether missing parent directories are created
    pub fn create_dirs(mut self, create: bool) -> Self {
        self.config.create_dirs = create;
        self
    }

    /// Set whether every write is fsynced
    pub fn sync_on_write(mut self, sync: bool) -> Self {
        self.config.sync_on_write = sync;
        self
    }

    /// Set whether JSON output is indented
    pub fn pretty_json(mut self, pretty: bool) -> Self {
        self.config.pretty_json = pretty;
        self
    }

    /// Set the default table name
    pub fn default_table(mut self, name: impl Into<String>) -> Self {
        self.config.default_table = name.into();
        self
    }

    /// Set the per-table query cache capacity
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
