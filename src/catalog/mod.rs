//! Catalog module
//!
//! This module contains the file-backed system catalog, table definitions,
//! and column data types.

pub mod catalog;
pub mod schema;
pub mod types;

pub use catalog::Catalog;
pub use schema::{index_collection_name, validate_name, Column, ForeignKey, KeyRef, TableDef};
pub use types::DataType;
