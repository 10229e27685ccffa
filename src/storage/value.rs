//! Typed values for abkrdb
//!
//! This module defines how column values are represented in memory and how
//! they are ordered when used as document keys.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Text format of a DATE literal
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Text format of a DATETIME literal; date and time are joined by an
/// underscore so the literal stays a single wire token
pub const DATETIME_FORMAT: &str = "%Y-%m-%d_%H:%M:%S";

/// A typed column value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    /// INT
    Int(i64),
    /// FLOAT
    Float(f64),
    /// BIT
    Bit(bool),
    /// DATE
    Date(NaiveDate),
    /// DATETIME
    DateTime(NaiveDateTime),
    /// STRING
    String(String),
}

impl Value {
    /// Rank used to order values of different variants
    fn rank(&self) -> u8 {
        match self {
            Value::Bit(_) => 0,
            Value::Int(_) => 1,
            Value::Float(_) => 2,
            Value::Date(_) => 3,
            Value::DateTime(_) => 4,
            Value::String(_) => 5,
        }
    }
}

// Floats compare by `total_cmp`, so equality is bitwise and `Value` can be a
// map key.
impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Float(a), Value::Float(b)) => a.total_cmp(b),
            (Value::Bit(a), Value::Bit(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl std::hash::Hash for Value {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Bit(v) => v.hash(state),
            Value::Date(v) => v.hash(state),
            Value::DateTime(v) => v.hash(state),
            Value::String(v) => v.hash(state),
        }
    }
}

/// Formats a value in the same literal syntax the type parser accepts
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(n) => write!(f, "{}", n),
            Value::Bit(b) => write!(f, "{}", if *b { "1" } else { "0" }),
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(t) => write!(f, "{}", t.format(DATETIME_FORMAT)),
            Value::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bit(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_ordering() {
        assert_eq!(Value::Int(5).cmp(&Value::Int(3)), Ordering::Greater);
        assert_eq!(
            Value::from("abc").cmp(&Value::from("def")),
            Ordering::Less
        );
        assert!(Value::Float(-0.5) < Value::Float(0.25));
        assert_eq!(Value::Float(1.5), Value::Float(1.5));
    }

    #[test]
    fn test_value_display() {
        let date = NaiveDate::from_ymd_opt(2022, 3, 14).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2022-03-14");

        let datetime = date.and_hms_opt(9, 26, 53).unwrap();
        assert_eq!(Value::DateTime(datetime).to_string(), "2022-03-14_09:26:53");

        assert_eq!(Value::Bit(true).to_string(), "1");
        assert_eq!(Value::Int(-4).to_string(), "-4");
    }
}
