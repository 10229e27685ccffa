//! Query execution module
//!
//! This module contains the select planner and the execution engine.

pub mod executor;
pub mod planner;

pub use executor::{ExecutionEngine, QueryResult, PLACEHOLDER_COLLECTION};
pub use planner::{Planner, ScanFilter, SelectPlan};
