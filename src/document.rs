//! Documents
//!
//! A document is a JSON object paired with the integer id that identifies it
//! within its table. The id is never stored inside the object itself.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AtlasError, Result};

/// Identity of a document within one table
pub type DocId = u64;

/// Body of a document: string keys to arbitrary JSON values
pub type Fields = Map<String, Value>;

/// A document body together with its id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocId,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: DocId, fields: Fields) -> Self {
        Self { id, fields }
    }

    /// Build a document from a JSON value, which must be an object
    pub fn from_value(id: DocId, value: Value) -> Result<Self> {
        Ok(Self::new(id, into_fields(value)?))
    }

    /// Look up a single field
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The body as a JSON object (the id is not included)
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Anything that can be inserted into a table
///
/// Returns the caller-assigned id (if any) and the document body.
pub trait IntoDocument {
    fn into_parts(self) -> Result<(Option<DocId>, Fields)>;
}

impl IntoDocument for Document {
    fn into_parts(self) -> Result<(Option<DocId>, Fields)> {
        Ok((Some(self.id), self.fields))
    }
}

impl IntoDocument for Fields {
    fn into_parts(self) -> Result<(Option<DocId>, Fields)> {
        Ok((None, self))
    }
}

impl IntoDocument for Value {
    fn into_parts(self) -> Result<(Option<DocId>, Fields)> {
        Ok((None, into_fields(self)?))
    }
}

/// Unwrap a JSON object, rejecting every other kind of value
pub(crate) fn into_fields(value: Value) -> Result<Fields> {
    match value {
        Value::Object(fields) => Ok(fields),
        other => Err(AtlasError::InvalidDocument(format!(
            "expected a JSON object, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
