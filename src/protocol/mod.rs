//! Wire protocol module
//!
//! This module contains the request and response formats:
//! - Keyword codes
//! - Command encoding and decoding
//! - Length-framed responses

pub mod command;
pub mod keyword;
pub mod response;

pub use command::{ColumnSpec, Command, Operator, Predicate, Projection};
pub use keyword::Keyword;
pub use response::{read_frame, Response, ResultSet};
