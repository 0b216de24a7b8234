//! Table Module
//!
//! A named collection of documents inside one storage backend.
//!
//! ## Responsibilities
//! - Materialize the logical table (id → fields) from the stored snapshot
//! - Run every mutation through a single read-modify-write cycle
//! - Allocate ids for new documents
//! - Serve repeated searches from the query cache
//!
//! ## Read-Modify-Write
//! ```text
//! storage.read() ──► snapshot[name] ──► decode keys ──► updater(&mut table)
//!                                                             │ Err ⇒ abort, nothing written
//!                                                             ▼
//! cache.clear() ◄── storage.write() ◄── snapshot[name] = encode(table)
//! ```
//! The table holds no documents between calls. The only state it keeps is
//! the id hint and the query cache.

mod allocator;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::cache::QueryCache;
use crate::config::DEFAULT_CACHE_CAPACITY;
use crate::document::{DocId, Document, Fields, IntoDocument};
use crate::error::{AtlasError, Result};
use crate::query::{Change, Query, QueryKey, Selector};
use crate::storage::{RawTable, Storage};

pub use allocator::IdAllocator;

/// Decoded form of one table
pub type LogicalTable = BTreeMap<DocId, Fields>;

/// A handle on one named table
pub struct Table {
    /// Table name (key in the snapshot)
    name: String,

    /// Shared backend; source of truth for all documents
    storage: Arc<dyn Storage>,

    /// Next-id hint
    ids: IdAllocator,

    /// Cached search results, cleared on every mutation
    cache: QueryCache<QueryKey, Vec<Document>>,
}

impl Table {
    /// Bind a table to a backend with the default cache capacity
    pub fn new(storage: Arc<dyn Storage>, name: impl Into<String>) -> Self {
        Self::with_cache_capacity(storage, name, DEFAULT_CACHE_CAPACITY)
    }

    /// Bind a table to a backend, caching at most `capacity` query results
    pub fn with_cache_capacity(
        storage: Arc<dyn Storage>,
        name: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            name: name.into(),
            storage,
            ids: IdAllocator::new(),
            cache: QueryCache::new(capacity),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Every document, in id order
    pub fn all(&self) -> Result<Vec<Document>> {
        Ok(into_documents(self.read_table()?))
    }

    /// Number of documents
    pub fn len(&self) -> Result<usize> {
        Ok(self.read_table()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Fetch one document by id
    pub fn get(&self, id: DocId) -> Result<Option<Document>> {
        let mut table = self.read_table()?;
        Ok(table.remove(&id).map(|fields| Document::new(id, fields)))
    }

    /// Fetch the documents that exist among `ids`, in the order given
    pub fn get_many(&self, ids: &[DocId]) -> Result<Vec<Document>> {
        let table = self.read_table()?;
        Ok(ids
            .iter()
            .filter_map(|id| table.get(id).map(|f| Document::new(*id, f.clone())))
            .collect())
    }

    /// First document (lowest id) matching `query`
    pub fn find(&self, query: &Query) -> Result<Option<Document>> {
        Ok(self
            .read_table()?
            .into_iter()
            .find(|(_, fields)| query.matches(fields))
            .map(|(id, fields)| Document::new(id, fields)))
    }

    /// All documents matching `query`
    ///
    /// Results of keyed queries are cached until the next mutation.
    pub fn search(&mut self, query: &Query) -> Result<Vec<Document>> {
        if let Some(key) = query.key() {
            if let Some(hit) = self.cache.get(key) {
                tracing::trace!(table = %self.name, key, "query cache hit");
                return Ok(hit);
            }
            tracing::trace!(table = %self.name, key, "query cache miss");
        }

        let docs: Vec<Document> = self
            .read_table()?
            .into_iter()
            .filter(|(_, fields)| query.matches(fields))
            .map(|(id, fields)| Document::new(id, fields))
            .collect();

        if let Some(key) = query.key() {
            self.cache.put(key.to_owned(), docs.clone());
        }

        Ok(docs)
    }

    /// Whether a document with this id exists
    pub fn contains(&self, id: DocId) -> Result<bool> {
        Ok(self.read_table()?.contains_key(&id))
    }

    /// Whether any document matches `query`
    pub fn contains_matching(&self, query: &Query) -> Result<bool> {
        Ok(self.find(query)?.is_some())
    }

    /// Number of documents matching `query`
    pub fn count(&mut self, query: &Query) -> Result<usize> {
        Ok(self.search(query)?.len())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert one document and return its id
    ///
    /// A `Document` keeps its own id; anything else gets a fresh one.
    /// Fails with `DuplicateIdentity` if the id is already taken.
    pub fn insert(&mut self, document: impl IntoDocument) -> Result<DocId> {
        let (explicit, fields) = document.into_parts()?;
        if explicit.is_some() {
            self.ids.invalidate();
        }

        let ids = &mut self.ids;
        let result = read_modify_write(self.storage.as_ref(), &self.name, |name, table| {
            let id = match explicit {
                Some(id) => id,
                None => ids.next_id(name, || Ok(max_id(table)))?,
            };
            insert_new(name, table, id, fields)?;
            Ok(id)
        });

        // The hint may be behind an out-of-band write
        if let Err(AtlasError::DuplicateIdentity { .. }) = &result {
            self.ids.invalidate();
        }
        let id = result?;

        self.cache.clear();
        tracing::debug!(table = %self.name, id, "inserted document");
        Ok(id)
    }

    /// Insert several documents in one write
    ///
    /// All documents are validated first. If any id collides, with the table
    /// or within the batch, nothing is written.
    pub fn insert_multiple<I, D>(&mut self, documents: I) -> Result<Vec<DocId>>
    where
        I: IntoIterator<Item = D>,
        D: IntoDocument,
    {
        let parts = documents
            .into_iter()
            .map(IntoDocument::into_parts)
            .collect::<Result<Vec<_>>>()?;

        let ids = &mut self.ids;
        let result = read_modify_write(self.storage.as_ref(), &self.name, |name, table| {
            let mut inserted = Vec::with_capacity(parts.len());
            for (explicit, fields) in parts {
                let id = match explicit {
                    Some(id) => {
                        ids.invalidate();
                        id
                    }
                    None => ids.next_id(name, || Ok(max_id(table)))?,
                };
                insert_new(name, table, id, fields)?;
                inserted.push(id);
            }
            Ok(inserted)
        });

        // Explicit ids earlier in a failed batch may have moved the hint
        if result.is_err() {
            self.ids.invalidate();
        }
        let inserted = result?;

        self.cache.clear();
        tracing::debug!(table = %self.name, count = inserted.len(), "inserted documents");
        Ok(inserted)
    }

    /// Apply `change` to every selected document; returns the ids touched
    ///
    /// Selecting a missing id fails with `DocumentNotFound` and writes nothing.
    pub fn update(
        &mut self,
        change: impl Into<Change>,
        selector: impl Into<Selector>,
    ) -> Result<Vec<DocId>> {
        let change = change.into();
        let selector = selector.into();

        let updated = read_modify_write(self.storage.as_ref(), &self.name, |name, table| {
            let ids = select(name, table, &selector)?;
            for id in &ids {
                if let Some(fields) = table.get_mut(id) {
                    change.apply_to(fields);
                }
            }
            Ok(ids)
        })?;

        self.cache.clear();
        tracing::debug!(table = %self.name, ids = ?updated, "updated documents");
        Ok(updated)
    }

    /// Update matching documents, or insert if there are none
    ///
    /// A `Document` targets its own id: merged if present, inserted at that
    /// id otherwise. Without an id, `query` picks the documents to merge into.
    /// Fails with `InvalidDocument` when there is neither an id nor a query.
    pub fn upsert(
        &mut self,
        document: impl IntoDocument,
        query: Option<&Query>,
    ) -> Result<Vec<DocId>> {
        let (explicit, fields) = document.into_parts()?;

        if explicit.is_none() && query.is_none() {
            return Err(AtlasError::InvalidDocument(
                "upsert needs a document id or a query".to_string(),
            ));
        }
        if explicit.is_some() {
            self.ids.invalidate();
        }

        let ids = &mut self.ids;
        let result = read_modify_write(self.storage.as_ref(), &self.name, |name, table| {
            let targets: Vec<DocId> = match (explicit, query) {
                (Some(id), _) => table.contains_key(&id).then_some(id).into_iter().collect(),
                (None, Some(query)) => table
                    .iter()
                    .filter(|(_, f)| query.matches(f))
                    .map(|(id, _)| *id)
                    .collect(),
                (None, None) => unreachable!("checked above"),
            };

            if targets.is_empty() {
                let id = match explicit {
                    Some(id) => id,
                    None => ids.next_id(name, || Ok(max_id(table)))?,
                };
                insert_new(name, table, id, fields)?;
                return Ok(vec![id]);
            }

            let change = Change::Merge(fields);
            for id in &targets {
                if let Some(existing) = table.get_mut(id) {
                    change.apply_to(existing);
                }
            }
            Ok(targets)
        });

        // Same recovery as insert: a fresh id may collide with an out-of-band write
        if let Err(AtlasError::DuplicateIdentity { .. }) = &result {
            self.ids.invalidate();
        }
        let touched = result?;

        self.cache.clear();
        tracing::debug!(table = %self.name, ids = ?touched, "upserted documents");
        Ok(touched)
    }

    /// Delete every selected document; returns the ids removed
    ///
    /// Removed ids are not handed out again while the id hint is live.
    pub fn remove(&mut self, selector: impl Into<Selector>) -> Result<Vec<DocId>> {
        let selector = selector.into();

        let removed = read_modify_write(self.storage.as_ref(), &self.name, |name, table| {
            let ids = select(name, table, &selector)?;
            for id in &ids {
                table.remove(id);
            }
            Ok(ids)
        })?;

        self.cache.clear();
        tracing::debug!(table = %self.name, ids = ?removed, "removed documents");
        Ok(removed)
    }

    /// Delete every document and reset id allocation
    pub fn truncate(&mut self) -> Result<()> {
        read_modify_write(self.storage.as_ref(), &self.name, |_, table| {
            table.clear();
            Ok(())
        })?;

        self.ids.invalidate();
        self.cache.clear();
        tracing::debug!(table = %self.name, "truncated table");
        Ok(())
    }

    // =========================================================================
    // Cache / Hint Maintenance
    // =========================================================================

    /// Drop all cached query results
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// Forget the id hint (call after editing storage out-of-band)
    pub fn reset_id_hint(&mut self) {
        self.ids.invalidate();
    }

    /// Forget all in-process state derived from storage
    pub fn reset(&mut self) {
        self.clear_cache();
        self.reset_id_hint();
    }

    /// Number of cached query results
    pub fn cached_queries(&self) -> usize {
        self.cache.len()
    }

    /// Whether results for `key` are currently cached
    pub fn is_cached(&self, key: &str) -> bool {
        self.cache.contains(key)
    }

    /// Id the next auto-insert will get without rescanning, if known
    pub fn id_hint(&self) -> Option<DocId> {
        self.ids.peek()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn read_table(&self) -> Result<LogicalTable> {
        read_logical(self.storage.as_ref(), &self.name)
    }
}

impl fmt::Debug for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("name", &self.name)
            .field("total", &self.len().ok())
            .field("storage", &self.storage)
            .field("id_hint", &self.ids.peek())
            .field("cached_queries", &self.cache.len())
            .finish()
    }
}

// =============================================================================
// Snapshot Protocol
// =============================================================================

/// Load and decode one table; a missing database or table is empty
pub fn read_logical(storage: &dyn Storage, name: &str) -> Result<LogicalTable> {
    match storage.read()? {
        Some(mut snapshot) => match snapshot.remove(name) {
            Some(raw) => decode_table(name, raw),
            None => Ok(LogicalTable::new()),
        },
        None => Ok(LogicalTable::new()),
    }
}

/// Run `updater` against one table of the stored snapshot and write it back
///
/// If `updater` fails, nothing is written. If the write fails, the error is
/// returned unchanged. The snapshot is always written whole.
pub fn read_modify_write<T, F>(storage: &dyn Storage, name: &str, updater: F) -> Result<T>
where
    F: FnOnce(&str, &mut LogicalTable) -> Result<T>,
{
    // Step 1: Cold start reads as an empty database
    let mut snapshot = storage.read()?.unwrap_or_default();

    // Step 2-3: Missing table reads as empty; every key must decode
    let mut table = match snapshot.remove(name) {
        Some(raw) => decode_table(name, raw)?,
        None => LogicalTable::new(),
    };

    // Step 4: Business rules live in the updater
    let output = updater(name, &mut table)?;

    // Step 5-6: Re-encode and splice back under this table's name
    snapshot.insert(name.to_string(), encode_table(table));

    // Step 7: Single commit point
    storage.write(&snapshot)?;

    Ok(output)
}

/// String keys → ids; any undecodable key fails the whole table
pub fn decode_table(name: &str, raw: RawTable) -> Result<LogicalTable> {
    raw.into_iter()
        .map(|(key, fields)| match key.parse::<DocId>() {
            Ok(id) => Ok((id, fields)),
            Err(_) => Err(AtlasError::CorruptTable {
                table: name.to_string(),
                key,
            }),
        })
        .collect()
}

/// Ids → decimal string keys
pub fn encode_table(table: LogicalTable) -> RawTable {
    table
        .into_iter()
        .map(|(id, fields)| (id.to_string(), fields))
        .collect()
}

fn max_id(table: &LogicalTable) -> Option<DocId> {
    table.keys().next_back().copied()
}

fn insert_new(name: &str, table: &mut LogicalTable, id: DocId, fields: Fields) -> Result<()> {
    if table.contains_key(&id) {
        return Err(AtlasError::DuplicateIdentity {
            table: name.to_string(),
            id,
        });
    }
    table.insert(id, fields);
    Ok(())
}

/// Resolve a selector to concrete ids; explicit ids must all exist
fn select(name: &str, table: &LogicalTable, selector: &Selector) -> Result<Vec<DocId>> {
    match selector {
        Selector::Ids(ids) => {
            let mut selected = Vec::with_capacity(ids.len());
            for &id in ids {
                if !table.contains_key(&id) {
                    return Err(AtlasError::DocumentNotFound {
                        table: name.to_string(),
                        id,
                    });
                }
                // Repeated ids are applied once
                if !selected.contains(&id) {
                    selected.push(id);
                }
            }
            Ok(selected)
        }
        Selector::Matching(query) => Ok(table
            .iter()
            .filter(|(_, fields)| query.matches(fields))
            .map(|(id, _)| *id)
            .collect()),
        Selector::All => Ok(table.keys().copied().collect()),
    }
}

fn into_documents(table: LogicalTable) -> Vec<Document> {
    table
        .into_iter()
        .map(|(id, fields)| Document::new(id, fields))
        .collect()
}
