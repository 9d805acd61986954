//! The `Database` orchestrator: owns the live tables and one storage backend
//! and drives parse, execute and persist for every statement.
//!
//! A `Database` is a single logical owner. Backend I/O is serialized inside
//! the backend, but nothing serializes mutations of one table across
//! threads; an embedding application that shares a `Database` must
//! serialize calls per table itself (one lock per table name or a single
//! request queue). Backup and restore are not atomic with respect to
//! concurrent mutation, so pause writers around them.

use crate::config::{DatabaseConfig, StorageKind};
use crate::errors::DbError;
use crate::executor::{QueryExecutor, QueryResult};
use crate::parser::{parse_sql, Query};
use crate::storage::{DatabaseStats, FileStorage, MemoryStorage, StorageBackend, StorageError};
use crate::table::Table;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;

/// What has to reach storage after a statement succeeds.
enum Persist {
    Save(String),
    Delete(String),
}

impl Persist {
    fn table_name(&self) -> &str {
        match self {
            Persist::Save(table_name) | Persist::Delete(table_name) => table_name,
        }
    }
}

pub struct Database {
    pub name: String,
    tables: HashMap<String, Table>,
    storage: Box<dyn StorageBackend>,
    executor: QueryExecutor,
    closed: bool,
}

impl Drop for Database {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.close() {
            warn!("Failed to close database '{}': {}", self.name, e);
        }
    }
}

impl Database {
    /// Builds the configured backend and loads every table it knows.
    pub fn open(config: DatabaseConfig) -> Result<Self, DbError> {
        let storage: Box<dyn StorageBackend> = match config.storage {
            StorageKind::File => Box::new(FileStorage::new(&config.data_dir, config.format)?),
            StorageKind::Memory => Box::new(MemoryStorage::new()),
        };
        Self::with_storage(config.name, storage)
    }

    /// A fresh database whose tables live only as long as the process.
    pub fn in_memory(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: HashMap::new(),
            storage: Box::new(MemoryStorage::new()),
            executor: QueryExecutor::new(),
            closed: false,
        }
    }

    pub fn with_storage(
        name: impl Into<String>,
        storage: Box<dyn StorageBackend>,
    ) -> Result<Self, DbError> {
        let mut db = Self {
            name: name.into(),
            tables: HashMap::new(),
            storage,
            executor: QueryExecutor::new(),
            closed: false,
        };
        let loaded = db.load_tables()?;
        info!(
            "Opened database '{}' with {} table(s) on {} storage",
            db.name,
            loaded,
            db.storage.backend_name()
        );
        Ok(db)
    }

    /// Loads every stored table; one that cannot be read is skipped.
    fn load_tables(&mut self) -> Result<usize, DbError> {
        for table_name in self.storage.list_tables()? {
            match self.storage.load_table(&table_name) {
                Ok(Some(data)) => match Table::from_data(data) {
                    Ok(table) => {
                        debug!("Loaded table '{}' ({} rows)", table_name, table.row_count());
                        self.tables.insert(table_name, table);
                    }
                    Err(e) => warn!("Skipping table '{}': {}", table_name, e),
                },
                Ok(None) => warn!("Skipping table '{}': no stored data", table_name),
                Err(e) => warn!("Skipping table '{}': {}", table_name, e),
            }
        }
        Ok(self.tables.len())
    }

    /// Runs one statement. Never fails: errors come back as a failed
    /// `QueryResult`.
    pub fn execute(&mut self, sql: &str) -> QueryResult {
        let start_time = Instant::now();
        let mut result = match self.run(sql) {
            Ok(result) => result,
            Err(e) => {
                warn!("Query failed: {}", e);
                QueryResult::from(e)
            }
        };
        result.execution_time_us = start_time.elapsed().as_micros() as u64;
        result
    }

    fn run(&mut self, sql: &str) -> Result<QueryResult, DbError> {
        if self.closed {
            return Err(StorageError::Closed.into());
        }

        let query = parse_sql(sql)?;
        let persist = match &query {
            Query::CreateTable { table_name, .. }
            | Query::Insert { table_name, .. }
            | Query::Update { table_name, .. }
            | Query::Delete { table_name, .. } => Some(Persist::Save(table_name.clone())),
            Query::DropTable { table_name } => Some(Persist::Delete(table_name.clone())),
            Query::Select(_) | Query::ShowTables | Query::Describe { .. } => None,
        };
        // Pre-statement state of the target table; `None` when it does not exist yet
        let snapshot = persist
            .as_ref()
            .and_then(|p| self.tables.get(p.table_name()).cloned());

        let result = self.executor.execute_statement(query, &mut self.tables)?;

        let Some(persist) = persist else {
            return Ok(result);
        };
        let persisted = match &persist {
            Persist::Save(table_name) => self.save_table(table_name),
            Persist::Delete(table_name) => self
                .storage
                .delete_table(table_name)
                .map(|_| ())
                .map_err(DbError::from),
        };
        if let Err(e) = persisted {
            // Memory must not get ahead of what storage holds
            let table_name = persist.table_name().to_string();
            warn!("Rolling back '{}' after failed persist: {}", table_name, e);
            match snapshot {
                Some(table) => {
                    self.tables.insert(table_name, table);
                }
                None => {
                    self.tables.remove(&table_name);
                }
            }
            return Err(e);
        }
        Ok(result)
    }

    /// Writes one live table to storage.
    pub fn save_table(&self, table_name: &str) -> Result<(), DbError> {
        let table = self
            .tables
            .get(table_name)
            .ok_or_else(|| DbError::table_not_found(table_name))?;
        self.storage.save_table(table_name, &table.to_data())?;
        Ok(())
    }

    pub fn get_table(&self, table_name: &str) -> Option<&Table> {
        self.tables.get(table_name)
    }

    /// Live table names, sorted.
    pub fn list_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get_database_stats(&self) -> Result<DatabaseStats, DbError> {
        let mut stats = self.storage.get_database_stats()?;
        stats.tables_in_memory = self.tables.len();
        Ok(stats)
    }

    pub fn storage(&self) -> &dyn StorageBackend {
        self.storage.as_ref()
    }

    pub fn backup(&self, path: impl AsRef<Path>) -> Result<(), DbError> {
        self.storage.backup(path.as_ref())?;
        Ok(())
    }

    /// Restores storage from a backup and reloads every table from it.
    pub fn restore(&mut self, path: impl AsRef<Path>) -> Result<(), DbError> {
        self.storage.restore(path.as_ref())?;
        self.tables.clear();
        let loaded = self.load_tables()?;
        info!("Database '{}' reloaded {} table(s) after restore", self.name, loaded);
        Ok(())
    }

    pub fn compact(&self) -> Result<(), DbError> {
        self.storage.compact()?;
        Ok(())
    }

    /// Saves every live table, closes storage and drops the tables from
    /// memory. Later statements fail.
    pub fn close(&mut self) -> Result<(), DbError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let mut first_error = None;
        for table_name in self.list_tables() {
            if let Err(e) = self.save_table(&table_name) {
                warn!("Failed to save table '{}' on close: {}", table_name, e);
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.storage.close() {
            first_error.get_or_insert(e.into());
        }
        self.tables.clear();
        debug!("Closed database '{}'", self.name);

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}
