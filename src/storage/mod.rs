//! Storage module
//!
//! This module contains the storage-facing types:
//! - Typed values and table rows
//! - Documents, key filters and write batches
//! - The document store contract and its in-process implementation

pub mod document;
pub mod memory;
pub mod row;
pub mod store;
pub mod value;

pub use document::{Document, KeyFilter, Payload, WriteOp};
pub use memory::MemoryStore;
pub use row::{Row, FIELD_DELIMITER};
pub use store::DocumentStore;
pub use value::Value;
