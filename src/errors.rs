use crate::storage::StorageError;
use thiserror::Error;

/// Every failure the engine can report. All of them are recoverable: the
/// `Database` turns them into failed `QueryResult`s instead of propagating.
#[derive(Debug, Error)]
pub enum DbError {
    // Parser hataları
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unsupported data type: {0}")]
    UnsupportedType(String),

    #[error("Column count mismatch: expected {expected} values, got {actual}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    // Şema ve doğrulama hataları
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),

    #[error("Column '{0}' cannot be NULL")]
    NullConstraintViolation(String),

    #[error("Invalid value for column '{column}': expected {expected}, got '{value}'")]
    TypeMismatch {
        column: String,
        expected: String,
        value: String,
    },

    #[error("Duplicate value '{value}' for {} column '{column}'", constraint_label(.primary))]
    DuplicateKey {
        column: String,
        value: String,
        primary: bool,
    },

    #[error("Schema error: {0}")]
    Schema(String),

    // Tablo hataları
    #[error("Table '{0}' does not exist")]
    TableNotFound(String),

    #[error("Table '{0}' already exists")]
    TableAlreadyExists(String),

    // Dosya sistemi hataları
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

fn constraint_label(primary: &bool) -> &'static str {
    if *primary {
        "primary key"
    } else {
        "unique"
    }
}

/// Coarse classification of a `DbError`, for callers that decide how to
/// render or retry a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Validation,
    NotFound,
    Conflict,
    Storage,
}

impl DbError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::Parse(_)
            | DbError::Syntax(_)
            | DbError::UnsupportedType(_)
            | DbError::ColumnCountMismatch { .. } => ErrorKind::Parse,
            DbError::UnknownColumn(_)
            | DbError::NullConstraintViolation(_)
            | DbError::TypeMismatch { .. }
            | DbError::DuplicateKey { .. }
            | DbError::Schema(_) => ErrorKind::Validation,
            DbError::TableNotFound(_) => ErrorKind::NotFound,
            DbError::TableAlreadyExists(_) => ErrorKind::Conflict,
            DbError::Storage(_) => ErrorKind::Storage,
        }
    }
}

// Yaygın hata yaratım fonksiyonları
impl DbError {
    pub fn parse_error(msg: &str) -> Self {
        DbError::Parse(msg.to_string())
    }

    pub fn syntax_error(msg: &str) -> Self {
        DbError::Syntax(msg.to_string())
    }

    pub fn table_not_found(table_name: &str) -> Self {
        DbError::TableNotFound(table_name.to_string())
    }

    pub fn table_already_exists(table_name: &str) -> Self {
        DbError::TableAlreadyExists(table_name.to_string())
    }

    pub fn unknown_column(column_name: &str) -> Self {
        DbError::UnknownColumn(column_name.to_string())
    }

    pub fn column_count_mismatch(expected: usize, actual: usize) -> Self {
        DbError::ColumnCountMismatch { expected, actual }
    }
}
