//! Document store contract
//!
//! The query layer talks to its backing store only through [`DocumentStore`]:
//! databases hold named collections, collections hold documents keyed by a
//! typed value.

use super::document::{Document, KeyFilter, WriteOp};
use super::value::Value;
use crate::error::Result;

/// Storage backend for rows and index entries
pub trait DocumentStore: Send + Sync {
    /// Databases that currently hold at least one collection
    fn list_databases(&self) -> Result<Vec<String>>;

    /// Create a collection; a no-op if it already exists
    fn create_collection(&self, db: &str, collection: &str) -> Result<()>;

    /// Drop a collection; returns whether it existed
    fn drop_collection(&self, db: &str, collection: &str) -> Result<bool>;

    /// Drop every collection of a database
    fn drop_database(&self, db: &str) -> Result<()>;

    /// Collection names of a database, sorted
    fn list_collections(&self, db: &str) -> Result<Vec<String>>;

    /// Documents whose key matches the filter, in key order.
    ///
    /// A missing collection yields no documents.
    fn find(&self, db: &str, collection: &str, filter: &KeyFilter) -> Result<Vec<Document>>;

    /// Point lookup by key
    fn find_one(&self, db: &str, collection: &str, id: &Value) -> Result<Option<Document>>;

    fn count_documents(&self, db: &str, collection: &str) -> Result<usize>;

    /// Apply every operation or none of them
    fn apply(&self, db: &str, ops: &[WriteOp]) -> Result<()>;

    fn insert_one(&self, db: &str, collection: &str, doc: Document) -> Result<()> {
        self.apply(
            db,
            &[WriteOp::InsertOne {
                collection: collection.to_string(),
                doc,
            }],
        )
    }

    fn delete_one(&self, db: &str, collection: &str, id: Value) -> Result<()> {
        self.apply(
            db,
            &[WriteOp::DeleteOne {
                collection: collection.to_string(),
                id,
            }],
        )
    }

    fn push(&self, db: &str, collection: &str, id: Value, value: Value) -> Result<()> {
        self.apply(
            db,
            &[WriteOp::Push {
                collection: collection.to_string(),
                id,
                value,
            }],
        )
    }

    fn pull(&self, db: &str, collection: &str, id: Value, value: Value) -> Result<()> {
        self.apply(
            db,
            &[WriteOp::Pull {
                collection: collection.to_string(),
                id,
                value,
            }],
        )
    }
}
