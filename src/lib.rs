//! minidb: a small embeddable relational engine with a SQL subset,
//! typed columns, primary/unique hash indexes and pluggable persistence.
//!
//! One `Database` owns its tables. Callers that share it across threads
//! must serialize mutations of a given table themselves.

pub mod config;
pub mod database;
pub mod errors;
pub mod executor;
pub mod parser;
pub mod row;
pub mod storage;
pub mod table;
pub mod types;

pub use config::{ConfigError, DatabaseConfig, StorageKind};
pub use database::Database;
pub use errors::{DbError, ErrorKind};
pub use executor::{QueryExecutor, QueryResult};
pub use parser::{
    parse_sql, Assignment, ColumnDefinition, Condition, Filter, JoinClause, JoinCondition,
    OrderBy, Query, SelectQuery,
};
pub use row::{Row, RowId};
pub use storage::{
    DatabaseStats, FileStorage, MemoryStorage, StorageBackend, StorageError, StorageFormat,
    StorageResult, TableMetadata,
};
pub use table::{HashIndex, Table, TableData, TableSchema};
pub use types::{Column, DataType, TypedValue};
