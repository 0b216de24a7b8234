//! Database Module
//!
//! Thin registry of tables sharing one storage backend.
//!
//! ## Responsibilities
//! - Build the configured backend on open
//! - Hand out one long-lived `Table` per name (so id hints and query
//!   caches survive between calls)
//! - Table-level housekeeping that spans the snapshot: listing and dropping
//! - Forward common calls to the default table

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::document::{DocId, Document, IntoDocument};
use crate::error::{AtlasError, Result};
use crate::query::Query;
use crate::storage::{FileOptions, FramedStorage, JsonStorage, MemoryStorage, Storage};
use crate::table::Table;

/// An open document database
pub struct Database {
    /// Database configuration
    config: Config,

    /// Backend shared by every table
    storage: Arc<dyn Storage>,

    /// Tables handed out so far
    tables: HashMap<String, Table>,
}

impl Database {
    /// Open or create a database with the given config
    pub fn open(config: Config) -> Result<Self> {
        let options = FileOptions {
            create_dirs: config.create_dirs,
            sync_on_write: config.sync_on_write,
            pretty: config.pretty_json,
        };

        let storage: Arc<dyn Storage> = match &config.backend {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Json { path } => Arc::new(JsonStorage::open(path, options)?),
            StorageBackend::Framed { path } => Arc::new(FramedStorage::open(path, options)?),
        };

        Self::with_storage(storage, config)
    }

    /// Wrap an existing backend
    pub fn with_storage(storage: Arc<dyn Storage>, config: Config) -> Result<Self> {
        if config.default_table.is_empty() {
            return Err(AtlasError::Config(
                "default table name must not be empty".to_string(),
            ));
        }

        Ok(Self::assemble(storage, config))
    }

    /// A volatile database with default settings
    pub fn in_memory() -> Self {
        Self::assemble(Arc::new(MemoryStorage::new()), Config::default())
    }

    /// Every open path ends here, with a validated config
    fn assemble(storage: Arc<dyn Storage>, config: Config) -> Self {
        tracing::info!(backend = ?config.backend, "database opened");

        Self {
            config,
            storage,
            tables: HashMap::new(),
        }
    }

    /// Get (creating the handle if needed) the table called `name`
    ///
    /// The table itself only appears in storage after its first write.
    pub fn table(&mut self, name: &str) -> &mut Table {
        let storage = &self.storage;
        let capacity = self.config.cache_capacity;
        self.tables
            .entry(name.to_string())
            .or_insert_with(|| Table::with_cache_capacity(Arc::clone(storage), name, capacity))
    }

    /// The table used by the pass-through methods
    pub fn default_table(&mut self) -> &mut Table {
        let name = self.config.default_table.clone();
        self.table(&name)
    }

    /// Names of all tables present in storage
    pub fn table_names(&self) -> Result<BTreeSet<String>> {
        Ok(self
            .storage
            .read()?
            .map(|snapshot| snapshot.into_keys().collect())
            .unwrap_or_default())
    }

    /// Remove a table from storage; returns whether it existed
    pub fn drop_table(&mut self, name: &str) -> Result<bool> {
        if let Some(table) = self.tables.get_mut(name) {
            table.reset();
        }

        let mut snapshot = match self.storage.read()? {
            Some(snapshot) => snapshot,
            None => return Ok(false),
        };

        if snapshot.remove(name).is_none() {
            return Ok(false);
        }

        self.storage.write(&snapshot)?;
        tracing::debug!(table = name, "dropped table");
        Ok(true)
    }

    /// Remove every table
    pub fn drop_tables(&mut self) -> Result<()> {
        self.storage.write(&Default::default())?;
        for table in self.tables.values_mut() {
            table.reset();
        }
        tracing::debug!("dropped all tables");
        Ok(())
    }

    /// The shared backend
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Close the backend
    pub fn close(self) -> Result<()> {
        self.storage.close()?;
        tracing::info!("database closed");
        Ok(())
    }

    // =========================================================================
    // Default-table Pass-throughs
    // =========================================================================

    pub fn insert(&mut self, document: impl IntoDocument) -> Result<DocId> {
        self.default_table().insert(document)
    }

    pub fn all(&mut self) -> Result<Vec<Document>> {
        self.default_table().all()
    }

    pub fn search(&mut self, query: &Query) -> Result<Vec<Document>> {
        self.default_table().search(query)
    }

    pub fn len(&mut self) -> Result<usize> {
        self.default_table().len()
    }
}
