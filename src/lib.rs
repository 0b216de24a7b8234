//! # AtlasDoc
//!
//! An embedded, file-backed JSON document store with:
//! - Named tables of integer-keyed JSON documents
//! - Whole-snapshot read-modify-write for every mutation (no partial writes)
//! - Per-table LRU query cache, cleared on mutation
//! - Pluggable storage: memory, JSON file, checksummed framed file
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Database                              │
//! │                  (table name → Table)                        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                         Table                                │
//! │             (read-modify-write orchestration)                │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────┐
//!          │            │                 │
//!          ▼            ▼                 ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │ IdAllocator │ │ QueryCache  │ │   Storage   │
//!   │ (next hint) │ │    (LRU)    │ │ (snapshot)  │
//!   └─────────────┘ └─────────────┘ └─────────────┘
//! ```
//!
//! ## Example
//! ```
//! use atlasdoc::{Database, Query};
//! use serde_json::json;
//!
//! let mut db = Database::in_memory();
//! let users = db.table("users");
//!
//! let id = users.insert(json!({"name": "ada"})).unwrap();
//! assert_eq!(id, 1);
//!
//! let found = users.search(&Query::field_eq("name", "ada")).unwrap();
//! assert_eq!(found[0].id, id);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod document;
pub mod query;
pub mod cache;
pub mod storage;
pub mod table;
pub mod database;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AtlasError, Result};
pub use config::Config;
pub use document::{DocId, Document, Fields, IntoDocument};
pub use query::{Change, Query, Selector};
pub use storage::{Snapshot, Storage};
pub use table::Table;
pub use database::Database;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasDoc
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
