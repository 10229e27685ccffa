//! Error types for abkrdb
//!
//! Every failure that can reach a client is a variant of [`Error`]. Each
//! variant belongs to one [`ErrorCode`] class, and that class travels on the
//! wire next to the rendered message so callers can branch on it.

use std::fmt;

use thiserror::Error;

/// The main error type for abkrdb
#[derive(Error, Debug)]
pub enum Error {
    // ========== Schema Errors ==========
    #[error("Schema error: invalid name '{0}', names use only letters, digits and '_'")]
    InvalidName(String),

    #[error("Schema error: database '{0}' does not exist")]
    DatabaseNotFound(String),

    #[error("Schema error: database '{0}' already exists")]
    DatabaseAlreadyExists(String),

    #[error("Schema error: no database selected")]
    NoDatabaseSelected,

    #[error("Schema error: table '{0}' does not exist")]
    TableNotFound(String),

    #[error("Schema error: table '{0}' already exists")]
    TableAlreadyExists(String),

    #[error("Schema error: table '{0}' must declare at least one column")]
    EmptyTable(String),

    #[error("Schema error: column '{0}' does not exist in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Schema error: column '{0}' is declared twice in table '{1}'")]
    DuplicateColumn(String, String),

    #[error("Schema error: column '{0}' is already a primary key")]
    AlreadyPrimaryKey(String),

    #[error("Schema error: column '{0}' is already a foreign key")]
    AlreadyForeignKey(String),

    #[error("Schema error: column '{0}' of table '{1}' is already indexed")]
    AlreadyIndexed(String, String),

    #[error("Schema error: row '{id}' does not exist in table '{table}'")]
    RowNotFound { table: String, id: String },

    // ========== Type Errors ==========
    #[error("Type error: value '{value}' is not a valid {expected} for column '{column}'")]
    TypeMismatch {
        column: String,
        expected: String,
        value: String,
    },

    #[error("Type error: table '{table}' has {expected} columns but {found} values were given")]
    ArityMismatch {
        table: String,
        expected: usize,
        found: usize,
    },

    #[error("Type error: foreign key column '{column}' is {found} but the referenced column is {expected}")]
    ForeignKeyTypeMismatch {
        column: String,
        expected: String,
        found: String,
    },

    // ========== Uniqueness Errors ==========
    #[error("Uniqueness violation: primary key '{value}' already exists in table '{table}'")]
    DuplicatePrimaryKey { table: String, value: String },

    #[error("Uniqueness violation: value '{value}' already exists in column '{column}' of table '{table}'")]
    DuplicateValue {
        table: String,
        column: String,
        value: String,
    },

    // ========== Referential Integrity Errors ==========
    #[error("Referential integrity error: '{value}' does not exist in {table}.{column}")]
    MissingParent {
        value: String,
        table: String,
        column: String,
    },

    #[error("Referential integrity error: '{value}' is still referenced by {table}.{column}")]
    DependentRows {
        value: String,
        table: String,
        column: String,
    },

    #[error("Referential integrity error: table '{0}' is referenced by table '{1}'")]
    ReferencedTable(String, String),

    // ========== Protocol Errors ==========
    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Protocol error: unknown operation code '{0}'")]
    UnknownOperation(String),

    #[error("Protocol error: unexpected end of request, expected {0}")]
    UnexpectedEnd(String),

    #[error("Protocol error: unexpected token '{found}', expected {expected}")]
    UnexpectedToken { expected: String, found: String },

    // ========== Storage Errors ==========
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Storage error: duplicate key '{key}' in collection '{collection}'")]
    DuplicateKey { collection: String, key: String },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // ========== Internal Errors ==========
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error class carried on the wire alongside the message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Schema,
    TypeMismatch,
    Uniqueness,
    ReferentialIntegrity,
    Protocol,
    Storage,
    Internal,
}

impl ErrorCode {
    /// Single-byte wire representation
    pub fn as_u8(self) -> u8 {
        match self {
            ErrorCode::Schema => 1,
            ErrorCode::TypeMismatch => 2,
            ErrorCode::Uniqueness => 3,
            ErrorCode::ReferentialIntegrity => 4,
            ErrorCode::Protocol => 5,
            ErrorCode::Storage => 6,
            ErrorCode::Internal => 7,
        }
    }

    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            1 => Some(ErrorCode::Schema),
            2 => Some(ErrorCode::TypeMismatch),
            3 => Some(ErrorCode::Uniqueness),
            4 => Some(ErrorCode::ReferentialIntegrity),
            5 => Some(ErrorCode::Protocol),
            6 => Some(ErrorCode::Storage),
            7 => Some(ErrorCode::Internal),
            _ => None,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::Schema => "SchemaError",
            ErrorCode::TypeMismatch => "TypeMismatchError",
            ErrorCode::Uniqueness => "UniquenessViolation",
            ErrorCode::ReferentialIntegrity => "ReferentialIntegrityError",
            ErrorCode::Protocol => "ProtocolError",
            ErrorCode::Storage => "StorageError",
            ErrorCode::Internal => "InternalError",
        };
        write!(f, "{}", name)
    }
}

impl Error {
    /// Classify this error for the wire
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidName(_)
            | Error::DatabaseNotFound(_)
            | Error::DatabaseAlreadyExists(_)
            | Error::NoDatabaseSelected
            | Error::TableNotFound(_)
            | Error::TableAlreadyExists(_)
            | Error::EmptyTable(_)
            | Error::ColumnNotFound(_, _)
            | Error::DuplicateColumn(_, _)
            | Error::AlreadyPrimaryKey(_)
            | Error::AlreadyForeignKey(_)
            | Error::AlreadyIndexed(_, _)
            | Error::RowNotFound { .. } => ErrorCode::Schema,

            Error::TypeMismatch { .. }
            | Error::ArityMismatch { .. }
            | Error::ForeignKeyTypeMismatch { .. } => ErrorCode::TypeMismatch,

            Error::DuplicatePrimaryKey { .. } | Error::DuplicateValue { .. } => {
                ErrorCode::Uniqueness
            }

            Error::MissingParent { .. }
            | Error::DependentRows { .. }
            | Error::ReferencedTable(_, _) => ErrorCode::ReferentialIntegrity,

            Error::Protocol(_)
            | Error::UnknownOperation(_)
            | Error::UnexpectedEnd(_)
            | Error::UnexpectedToken { .. } => ErrorCode::Protocol,

            Error::Storage(_)
            | Error::DuplicateKey { .. }
            | Error::IoError(_)
            | Error::Serialization(_) => ErrorCode::Storage,

            Error::Internal(_) => ErrorCode::Internal,
        }
    }
}

/// Result type alias for abkrdb operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::TableNotFound("users".to_string());
        assert_eq!(err.to_string(), "Schema error: table 'users' does not exist");

        let err = Error::DuplicatePrimaryKey {
            table: "users".to_string(),
            value: "7".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Uniqueness violation: primary key '7' already exists in table 'users'"
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::NoDatabaseSelected.code(), ErrorCode::Schema);
        assert_eq!(
            Error::InvalidName("../x".to_string()).code(),
            ErrorCode::Schema
        );
        assert_eq!(
            Error::UnknownOperation("99".to_string()).code(),
            ErrorCode::Protocol
        );
        assert_eq!(
            Error::ReferencedTable("a".to_string(), "b".to_string()).code(),
            ErrorCode::ReferentialIntegrity
        );

        for code in 1..=7u8 {
            let parsed = ErrorCode::from_u8(code).unwrap();
            assert_eq!(parsed.as_u8(), code);
        }
        assert_eq!(ErrorCode::from_u8(0), None);
    }
}
