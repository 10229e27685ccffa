//! Documents and write operations
//!
//! A document is keyed by a typed [`Value`] and carries exactly one payload:
//! the `#`-joined field blob of a table row, or the row-id list of an index
//! entry.

use serde::{Deserialize, Serialize};
use std::ops::Bound;

use super::value::Value;

/// The single payload field of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Payload {
    /// Non-key fields of a table row
    Blob(String),
    /// Row ids sharing one indexed value
    RowIds(Vec<Value>),
}

impl Payload {
    pub fn as_blob(&self) -> Option<&str> {
        match self {
            Payload::Blob(s) => Some(s),
            Payload::RowIds(_) => None,
        }
    }

    pub fn as_row_ids(&self) -> Option<&[Value]> {
        match self {
            Payload::RowIds(ids) => Some(ids),
            Payload::Blob(_) => None,
        }
    }
}

/// A keyed document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: Value,
    pub payload: Payload,
}

impl Document {
    pub fn blob(id: Value, blob: impl Into<String>) -> Self {
        Self {
            id,
            payload: Payload::Blob(blob.into()),
        }
    }

    pub fn row_ids(id: Value, ids: Vec<Value>) -> Self {
        Self {
            id,
            payload: Payload::RowIds(ids),
        }
    }
}

/// Point or range predicate on a document key
#[derive(Debug, Clone, PartialEq)]
pub enum KeyFilter {
    All,
    Eq(Value),
    Ne(Value),
    Lt(Value),
    Gt(Value),
    Le(Value),
    Ge(Value),
    In(Vec<Value>),
}

impl KeyFilter {
    /// Check a key against the filter
    pub fn matches(&self, key: &Value) -> bool {
        match self {
            KeyFilter::All => true,
            KeyFilter::Eq(v) => key == v,
            KeyFilter::Ne(v) => key != v,
            KeyFilter::Lt(v) => key < v,
            KeyFilter::Gt(v) => key > v,
            KeyFilter::Le(v) => key <= v,
            KeyFilter::Ge(v) => key >= v,
            KeyFilter::In(vs) => vs.contains(key),
        }
    }

    /// Key bounds for an ordered scan, when the filter is a single range
    pub fn bounds(&self) -> Option<(Bound<&Value>, Bound<&Value>)> {
        match self {
            KeyFilter::All => Some((Bound::Unbounded, Bound::Unbounded)),
            KeyFilter::Eq(v) => Some((Bound::Included(v), Bound::Included(v))),
            KeyFilter::Lt(v) => Some((Bound::Unbounded, Bound::Excluded(v))),
            KeyFilter::Gt(v) => Some((Bound::Excluded(v), Bound::Unbounded)),
            KeyFilter::Le(v) => Some((Bound::Unbounded, Bound::Included(v))),
            KeyFilter::Ge(v) => Some((Bound::Included(v), Bound::Unbounded)),
            KeyFilter::Ne(_) | KeyFilter::In(_) => None,
        }
    }
}

/// One step of an atomic write batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Insert a new document; fails if the key exists
    InsertOne { collection: String, doc: Document },
    /// Delete a document by key
    DeleteOne { collection: String, id: Value },
    /// Append a row id to an index entry
    Push {
        collection: String,
        id: Value,
        value: Value,
    },
    /// Remove a row id from an index entry
    Pull {
        collection: String,
        id: Value,
        value: Value,
    },
}

impl WriteOp {
    pub fn collection(&self) -> &str {
        match self {
            WriteOp::InsertOne { collection, .. }
            | WriteOp::DeleteOne { collection, .. }
            | WriteOp::Push { collection, .. }
            | WriteOp::Pull { collection, .. } => collection,
        }
    }

    /// Key of the one document the op touches
    pub fn key(&self) -> &Value {
        match self {
            WriteOp::InsertOne { doc, .. } => &doc.id,
            WriteOp::DeleteOne { id, .. } | WriteOp::Push { id, .. } | WriteOp::Pull { id, .. } => id,
        }
    }
}
