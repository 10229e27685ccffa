//! Data types for abkrdb
//!
//! This module defines the scalar column types and how literals are validated
//! and cast against them.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::storage::value::{Value, DATETIME_FORMAT, DATE_FORMAT};

/// Column data types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 64-bit signed integer
    Int,
    /// 64-bit floating point
    Float,
    /// Single bit, written as `0` or `1`
    Bit,
    /// Calendar date, `YYYY-MM-DD`
    Date,
    /// Date and time, `YYYY-MM-DD_HH:MM:SS`
    DateTime,
    /// Free text
    String,
}

impl DataType {
    /// Lowercase name as stored in catalog files
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int => "int",
            DataType::Float => "float",
            DataType::Bit => "bit",
            DataType::Date => "date",
            DataType::DateTime => "datetime",
            DataType::String => "string",
        }
    }

    /// Cast a literal to a value of this type.
    ///
    /// Returns `None` when the literal is not valid for the type.
    pub fn parse(&self, literal: &str) -> Option<Value> {
        match self {
            DataType::Int => literal.parse::<i64>().ok().map(Value::Int),
            DataType::Float => literal
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                // -0 and 0 are one value; `+ 0.0` clears the sign of zero
                .map(|f| Value::Float(f + 0.0)),
            DataType::Bit => match literal {
                "0" => Some(Value::Bit(false)),
                "1" => Some(Value::Bit(true)),
                _ => None,
            },
            DataType::Date => NaiveDate::parse_from_str(literal, DATE_FORMAT)
                .ok()
                .map(Value::Date),
            DataType::DateTime => NaiveDateTime::parse_from_str(literal, DATETIME_FORMAT)
                .ok()
                .map(Value::DateTime),
            DataType::String => Some(Value::String(literal.to_string())),
        }
    }

    /// Check whether a literal is valid for this type
    pub fn accepts(&self, literal: &str) -> bool {
        self.parse(literal).is_some()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Float => write!(f, "FLOAT"),
            DataType::Bit => write!(f, "BIT"),
            DataType::Date => write!(f, "DATE"),
            DataType::DateTime => write!(f, "DATETIME"),
            DataType::String => write!(f, "STRING"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_literals() {
        assert_eq!(DataType::Int.parse("42"), Some(Value::Int(42)));
        assert_eq!(DataType::Int.parse("-7"), Some(Value::Int(-7)));
        assert!(!DataType::Int.accepts("4.2"));
        assert!(!DataType::Int.accepts("abc"));

        assert_eq!(DataType::Float.parse("4.5"), Some(Value::Float(4.5)));
        assert_eq!(DataType::Float.parse("3"), Some(Value::Float(3.0)));
        assert!(!DataType::Float.accepts("nan"));
    }

    #[test]
    fn test_negative_zero_is_zero() {
        let zero = DataType::Float.parse("0").unwrap();
        for literal in ["-0", "-0.0", "-0e3"] {
            let parsed = DataType::Float.parse(literal).unwrap();
            assert_eq!(parsed, zero);
            assert_eq!(parsed.to_string(), "0");
        }
        assert_eq!(
            DataType::Float.parse("-1.5"),
            Some(Value::Float(-1.5))
        );
    }

    #[test]
    fn test_bit_literals() {
        assert_eq!(DataType::Bit.parse("1"), Some(Value::Bit(true)));
        assert_eq!(DataType::Bit.parse("0"), Some(Value::Bit(false)));
        assert!(!DataType::Bit.accepts("2"));
        assert!(!DataType::Bit.accepts("true"));
    }

    #[test]
    fn test_date_literals() {
        assert!(DataType::Date.accepts("2024-02-29"));
        assert!(!DataType::Date.accepts("2023-02-29"));
        assert!(!DataType::Date.accepts("2023/01/01"));

        assert!(DataType::DateTime.accepts("2024-02-29_23:59:59"));
        assert!(!DataType::DateTime.accepts("2024-02-29 23:59:59"));
        assert!(!DataType::DateTime.accepts("2024-02-29"));
    }

    #[test]
    fn test_string_accepts_anything() {
        assert_eq!(DataType::String.parse("x1"), Some(Value::from("x1")));
        assert_eq!(DataType::String.name(), "string");
    }
}
