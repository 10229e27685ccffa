//! Constraint enforcement module

pub mod enforcer;

pub use enforcer::{cast_literal, ConstraintEnforcer};
