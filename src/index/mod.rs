//! Secondary index module

pub mod manager;

pub use manager::{key_filter, ColumnConditions, IndexManager};
