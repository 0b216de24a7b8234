//! Queries and Changes
//!
//! There is no query language here. A `Query` is a plain predicate over a
//! document body plus an optional, caller-chosen cache key. Two queries with
//! the same key are assumed to select the same documents; the key is opaque
//! and never inspected.
//!
//! A `Change` describes how an update rewrites each selected document.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::document::{into_fields, DocId, Fields};
use crate::error::Result;

/// Opaque identity of a query, used as the query cache key
pub type QueryKey = String;

type Predicate = Arc<dyn Fn(&Fields) -> bool + Send + Sync>;

/// A document predicate with an optional cache key
#[derive(Clone)]
pub struct Query {
    key: Option<QueryKey>,
    predicate: Predicate,
}

impl Query {
    /// A cacheable query identified by `key`
    pub fn new<F>(key: impl Into<QueryKey>, predicate: F) -> Self
    where
        F: Fn(&Fields) -> bool + Send + Sync + 'static,
    {
        Self {
            key: Some(key.into()),
            predicate: Arc::new(predicate),
        }
    }

    /// A query whose results are never cached
    pub fn uncached<F>(predicate: F) -> Self
    where
        F: Fn(&Fields) -> bool + Send + Sync + 'static,
    {
        Self {
            key: None,
            predicate: Arc::new(predicate),
        }
    }

    /// Matches documents whose `field` equals `value`
    pub fn field_eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        let field = field.into();
        let value = value.into();
        let key = format!("{} == {}", field, value);
        Self::new(key, move |fields| fields.get(&field) == Some(&value))
    }

    /// Matches documents that contain `field`
    pub fn has_field(field: impl Into<String>) -> Self {
        let field = field.into();
        let key = format!("exists({})", field);
        Self::new(key, move |fields| fields.contains_key(&field))
    }

    /// Matches every document
    pub fn everything() -> Self {
        Self::new("*", |_| true)
    }

    /// Evaluate the predicate against a document body
    pub fn matches(&self, fields: &Fields) -> bool {
        (self.predicate)(fields)
    }

    /// Cache key, or `None` if the query is not cacheable
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("key", &self.key).finish()
    }
}

/// Which documents a mutation applies to
#[derive(Debug, Clone)]
pub enum Selector {
    /// Exactly these ids; every one must exist
    Ids(Vec<DocId>),

    /// Every document matching the query
    Matching(Query),

    /// Every document in the table
    All,
}

impl From<Query> for Selector {
    fn from(query: Query) -> Self {
        Selector::Matching(query)
    }
}

impl From<DocId> for Selector {
    fn from(id: DocId) -> Self {
        Selector::Ids(vec![id])
    }
}

impl From<Vec<DocId>> for Selector {
    fn from(ids: Vec<DocId>) -> Self {
        Selector::Ids(ids)
    }
}

type Transform = Arc<dyn Fn(&mut Fields) + Send + Sync>;

/// How an update rewrites a document body
#[derive(Clone)]
pub enum Change {
    /// Overwrite the given fields, keeping all others
    Merge(Fields),

    /// Remove the named fields
    Unset(Vec<String>),

    /// Run an arbitrary transformation
    Apply(Transform),
}

impl Change {
    /// Merge the fields of a JSON object
    pub fn merge(value: Value) -> Result<Self> {
        Ok(Change::Merge(into_fields(value)?))
    }

    /// Remove a single field
    pub fn unset(field: impl Into<String>) -> Self {
        Change::Unset(vec![field.into()])
    }

    /// Apply a closure to each selected document
    pub fn apply<F>(transform: F) -> Self
    where
        F: Fn(&mut Fields) + Send + Sync + 'static,
    {
        Change::Apply(Arc::new(transform))
    }

    /// Rewrite one document body in place
    pub fn apply_to(&self, fields: &mut Fields) {
        match self {
            Change::Merge(update) => {
                for (key, value) in update {
                    fields.insert(key.clone(), value.clone());
                }
            }
            Change::Unset(names) => {
                for name in names {
                    fields.remove(name);
                }
            }
            Change::Apply(transform) => transform(fields),
        }
    }
}

impl From<Fields> for Change {
    fn from(fields: Fields) -> Self {
        Change::Merge(fields)
    }
}

impl fmt::Debug for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::Merge(fields) => f.debug_tuple("Merge").field(fields).finish(),
            Change::Unset(names) => f.debug_tuple("Unset").field(names).finish(),
            Change::Apply(_) => f.write_str("Apply(..)"),
        }
    }
}
