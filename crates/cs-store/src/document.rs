// document.rs: Loosely-typed documents and the atomic write batch.
//
// Documents are plain JSON objects keyed by field name, the way a document
// database hands them back. Typed records live in `records.rs`; this module
// knows nothing about `streak` or `steps`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field map of a stored document.
pub type Fields = serde_json::Map<String, Value>;

/// The collections the store exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Communities,
    Goals,
}

impl Collection {
    pub fn name(&self) -> &'static str {
        match self {
            Collection::Communities => "communities",
            Collection::Goals => "goals",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A document as returned by a list or query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub fields: Fields,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: Fields::new(),
        }
    }

    /// Builder-style field setter.
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Reference to one document in one collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocRef {
    pub collection: Collection,
    pub id: String,
}

impl DocRef {
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.into(),
        }
    }
}

impl fmt::Display for DocRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

/// One `(document, field, value)` assignment inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub doc: DocRef,
    pub field: String,
    pub value: Value,
}

/// A set of field updates that a store must apply as a single
/// all-or-nothing unit.
///
/// Updates only ever modify existing documents. If any target is missing
/// the store rejects the whole batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WriteBatch {
    updates: Vec<FieldUpdate>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an assignment of `value` to `field` on `doc`.
    pub fn update(
        &mut self,
        doc: DocRef,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.updates.push(FieldUpdate {
            doc,
            field: field.into(),
            value: value.into(),
        });
        self
    }

    pub fn updates(&self) -> &[FieldUpdate] {
        &self.updates
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    /// True if any update in the batch targets the given document.
    pub fn touches(&self, collection: Collection, id: &str) -> bool {
        self.updates
            .iter()
            .any(|u| u.doc.collection == collection && u.doc.id == id)
    }
}
