//! abkrdb - A relational query layer over a document store
//!
//! This library provides the pieces of a small multi-database server:
//! - Command-line front end (lexer, parser)
//! - Wire protocol (keyword codes, response frames)
//! - System catalog (databases, tables, keys)
//! - Document storage with a snapshot-backed in-memory store
//! - Secondary indexes and key constraints
//! - Query planning and execution
//! - TCP server and blocking client

pub mod catalog;
pub mod client;
pub mod constraint;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod index;
pub mod protocol;
pub mod server;
pub mod sql;
pub mod storage;

pub use error::{Error, ErrorCode, Result};
