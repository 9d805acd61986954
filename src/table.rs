use crate::errors::DbError;
use crate::parser::{Assignment, Filter};
use crate::row::{Row, RowId};
use crate::types::{Column, TypedValue};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// Hash index yapısı: column_value -> row ids
///
/// Only non-null values are indexed; NULL never takes part in a uniqueness
/// conflict.
#[derive(Debug, Clone, Default)]
pub struct HashIndex {
    pub column_name: String,
    entries: HashMap<TypedValue, BTreeSet<RowId>>,
}

impl HashIndex {
    pub fn new(column_name: String) -> Self {
        Self {
            column_name,
            entries: HashMap::new(),
        }
    }

    /// Index'e yeni bir row ekler
    pub fn insert(&mut self, value: TypedValue, row_id: RowId) {
        if value.is_null() {
            return;
        }
        self.entries.entry(value).or_default().insert(row_id);
    }

    /// Index'den bir row siler
    pub fn remove(&mut self, value: &TypedValue, row_id: RowId) {
        if let Some(ids) = self.entries.get_mut(value) {
            ids.remove(&row_id);
            if ids.is_empty() {
                self.entries.remove(value);
            }
        }
    }

    /// Belirli bir value için row id'lerini getirir
    pub fn get(&self, value: &TypedValue) -> Option<&BTreeSet<RowId>> {
        self.entries.get(value)
    }

    /// True when some row other than `exclude` holds `value`.
    pub fn conflicts(&self, value: &TypedValue, exclude: Option<RowId>) -> bool {
        self.entries
            .get(value)
            .map_or(false, |ids| ids.iter().any(|id| Some(*id) != exclude))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of distinct indexed values.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Serialized table form. Index state is never persisted; it is rebuilt when
/// the table is reconstructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableData {
    pub name: String,
    pub columns: Vec<Column>,
    pub column_order: Vec<String>,
    pub rows: Vec<Row>,
    pub primary_key: Option<String>,
    pub unique_columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: Option<String>,
    pub row_count: usize,
}

/// An in-memory relation. Rows are keyed by a stable id handed out at insert
/// time and never reused, so deleting a row only touches its own index
/// buckets.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    columns: Vec<Column>,
    rows: BTreeMap<RowId, Row>,
    next_row_id: RowId,
    indexes: HashMap<String, HashIndex>, // column_name -> index (unique columns only)
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Result<Self, DbError> {
        let name = name.into();
        if columns.is_empty() {
            return Err(DbError::Schema(format!(
                "Table '{}' must declare at least one column",
                name
            )));
        }

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(DbError::Schema(format!(
                    "Duplicate column name '{}'",
                    column.name
                )));
            }
        }

        if columns.iter().filter(|c| c.primary_key).count() > 1 {
            return Err(DbError::Schema(format!(
                "Table '{}' can have only one primary key",
                name
            )));
        }

        let indexes = columns
            .iter()
            .filter(|c| c.requires_uniqueness())
            .map(|c| (c.name.clone(), HashIndex::new(c.name.clone())))
            .collect();

        Ok(Self {
            name,
            columns,
            rows: BTreeMap::new(),
            next_row_id: 0,
            indexes,
        })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Declared column names; the positional contract for value-only inserts.
    pub fn column_order(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn primary_key(&self) -> Option<&str> {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.as_str())
    }

    /// Primary key plus explicitly unique columns, in declared order.
    pub fn unique_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.requires_uniqueness())
            .map(|c| c.name.as_str())
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Live rows in insertion order.
    pub fn rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.values()
    }

    pub fn index(&self, column: &str) -> Option<&HashIndex> {
        self.indexes.get(column)
    }

    pub fn schema(&self) -> TableSchema {
        TableSchema {
            name: self.name.clone(),
            columns: self.columns.clone(),
            primary_key: self.primary_key().map(str::to_string),
            row_count: self.row_count(),
        }
    }

    /// Validates and stores one row, returning its id.
    pub fn insert(&mut self, row: Row) -> Result<RowId, DbError> {
        let validated = self.validate_row(&row)?;
        self.check_unique(&validated, None)?;

        let row_id = self.next_row_id;
        self.next_row_id += 1;
        self.index_row(row_id, &validated);
        self.rows.insert(row_id, validated);
        Ok(row_id)
    }

    /// Inserts every row or none: a failing row removes the ones already
    /// inserted by the same call.
    pub fn insert_many(&mut self, rows: Vec<Row>) -> Result<usize, DbError> {
        let mut inserted = Vec::with_capacity(rows.len());
        for row in rows {
            match self.insert(row) {
                Ok(row_id) => inserted.push(row_id),
                Err(e) => {
                    for row_id in inserted {
                        self.remove_row(row_id);
                    }
                    return Err(e);
                }
            }
        }
        Ok(inserted.len())
    }

    /// Resolves a projection list: empty or `*` means every declared column.
    pub fn resolve_columns(&self, columns: &[String]) -> Result<Vec<String>, DbError> {
        if columns.is_empty() || (columns.len() == 1 && columns[0] == "*") {
            return Ok(self.column_order());
        }
        for column in columns {
            if !self.has_column(column) {
                return Err(DbError::unknown_column(column));
            }
        }
        Ok(columns.to_vec())
    }

    /// Rows matching `filter`, in insertion order.
    pub fn find_rows(&self, filter: Option<&Filter>) -> Result<Vec<&Row>, DbError> {
        Ok(self
            .matching_ids(filter)?
            .into_iter()
            .filter_map(|row_id| self.rows.get(&row_id))
            .collect())
    }

    pub fn select(&self, columns: &[String], filter: Option<&Filter>) -> Result<Vec<Row>, DbError> {
        let projection = self.resolve_columns(columns)?;
        Ok(self
            .find_rows(filter)?
            .into_iter()
            .map(|row| project(row, &projection))
            .collect())
    }

    /// Applies `assignments` to every matching row. Either every matched row
    /// is rewritten or, on any validation failure, none is.
    pub fn update(
        &mut self,
        assignments: &[Assignment],
        filter: Option<&Filter>,
    ) -> Result<usize, DbError> {
        for assignment in assignments {
            if !self.has_column(&assignment.column) {
                return Err(DbError::unknown_column(&assignment.column));
            }
        }

        let targets = self.matching_ids(filter)?;
        let mut updated = Vec::with_capacity(targets.len());
        for row_id in &targets {
            let Some(current) = self.rows.get(row_id) else {
                continue;
            };
            let mut merged = current.clone();
            for assignment in assignments {
                merged.insert(assignment.column.clone(), assignment.value.clone());
            }
            updated.push((*row_id, self.validate_row(&merged)?));
        }

        self.check_batch_unique(&updated)?;

        for (row_id, new_row) in updated.iter() {
            if let Some(old_row) = self.rows.remove(row_id) {
                self.unindex_row(*row_id, &old_row);
            }
            self.index_row(*row_id, new_row);
            self.rows.insert(*row_id, new_row.clone());
        }

        debug!("Updated {} row(s) in table '{}'", updated.len(), self.name);
        Ok(updated.len())
    }

    pub fn delete(&mut self, filter: Option<&Filter>) -> Result<usize, DbError> {
        let targets = self.matching_ids(filter)?;
        for row_id in &targets {
            self.remove_row(*row_id);
        }
        Ok(targets.len())
    }

    /// Index'leri tamamen yeniden oluşturur
    pub fn rebuild_indexes(&mut self) {
        for index in self.indexes.values_mut() {
            index.clear();
            for (row_id, row) in &self.rows {
                index.insert(row.value(&index.column_name).clone(), *row_id);
            }
        }
        debug!("Rebuilt {} index(es) for table '{}'", self.indexes.len(), self.name);
    }

    pub fn to_data(&self) -> TableData {
        TableData {
            name: self.name.clone(),
            columns: self.columns.clone(),
            column_order: self.column_order(),
            rows: self.rows.values().cloned().collect(),
            primary_key: self.primary_key().map(str::to_string),
            unique_columns: self.unique_columns().into_iter().map(str::to_string).collect(),
        }
    }

    /// Reconstructs a table from its serialized form. Every row goes through
    /// normal validation, so indexes are rebuilt rather than trusted.
    pub fn from_data(data: TableData) -> Result<Self, DbError> {
        let TableData {
            name,
            mut columns,
            column_order,
            rows,
            primary_key,
            unique_columns,
        } = data;

        if !column_order.is_empty() {
            let mut ordered = Vec::with_capacity(column_order.len());
            for column_name in &column_order {
                let position = columns
                    .iter()
                    .position(|c| &c.name == column_name)
                    .ok_or_else(|| {
                        DbError::Schema(format!(
                            "Column order names undeclared column '{}'",
                            column_name
                        ))
                    })?;
                ordered.push(columns.remove(position));
            }
            columns = ordered;
        }

        let columns = columns
            .into_iter()
            .map(|column| {
                let is_pk = column.primary_key || primary_key.as_deref() == Some(column.name.as_str());
                let is_unique =
                    column.unique || (!is_pk && unique_columns.contains(&column.name));
                Column::with_constraints(
                    column.name,
                    column.data_type,
                    is_pk,
                    is_unique,
                    column.nullable,
                )
            })
            .collect();

        let mut table = Table::new(name, columns)?;
        for row in rows {
            table.insert(row)?;
        }
        Ok(table)
    }

    fn validate_row(&self, row: &Row) -> Result<Row, DbError> {
        if let Some(unknown) = row.columns().find(|c| !self.has_column(c)) {
            return Err(DbError::unknown_column(unknown));
        }

        let mut validated = Row::new();
        for column in &self.columns {
            let value = column.validate_value(row.value(&column.name).clone())?;
            validated.insert(column.name.clone(), value);
        }
        Ok(validated)
    }

    fn check_unique(&self, row: &Row, exclude: Option<RowId>) -> Result<(), DbError> {
        for column in self.columns.iter().filter(|c| c.requires_uniqueness()) {
            let value = row.value(&column.name);
            if value.is_null() {
                continue;
            }
            let taken = self
                .indexes
                .get(&column.name)
                .map_or(false, |index| index.conflicts(value, exclude));
            if taken {
                return Err(duplicate_key(column, value));
            }
        }
        Ok(())
    }

    /// Uniqueness for a set of rewritten rows: against rows outside the batch
    /// and among the batch itself.
    fn check_batch_unique(&self, batch: &[(RowId, Row)]) -> Result<(), DbError> {
        let batch_ids: HashSet<RowId> = batch.iter().map(|(row_id, _)| *row_id).collect();

        for column in self.columns.iter().filter(|c| c.requires_uniqueness()) {
            let mut claimed = HashSet::new();
            for (_, row) in batch {
                let value = row.value(&column.name);
                if value.is_null() {
                    continue;
                }
                let held_outside = self.indexes.get(&column.name).map_or(false, |index| {
                    index
                        .get(value)
                        .map_or(false, |ids| ids.iter().any(|id| !batch_ids.contains(id)))
                });
                if held_outside || !claimed.insert(value) {
                    return Err(duplicate_key(column, value));
                }
            }
        }
        Ok(())
    }

    fn matching_ids(&self, filter: Option<&Filter>) -> Result<Vec<RowId>, DbError> {
        let Some(filter) = filter.filter(|f| !f.is_empty()) else {
            return Ok(self.rows.keys().copied().collect());
        };

        for condition in filter.iter() {
            if !self.has_column(&condition.column) {
                return Err(DbError::unknown_column(&condition.column));
            }
        }

        let candidates: Vec<RowId> = match self.indexed_candidates(filter) {
            Some(ids) => ids,
            None => self.rows.keys().copied().collect(),
        };

        Ok(candidates
            .into_iter()
            .filter(|row_id| {
                self.rows
                    .get(row_id)
                    .map_or(false, |row| row_matches(row, filter))
            })
            .collect())
    }

    /// Candidate ids from an index bucket, when the filter tests an indexed
    /// column against a literal already in that column's type.
    fn indexed_candidates(&self, filter: &Filter) -> Option<Vec<RowId>> {
        filter.iter().find_map(|condition| {
            let index = self.indexes.get(&condition.column)?;
            let column = self.column(&condition.column)?;
            if condition.value.is_null()
                || condition.value.coerce(column.data_type).as_ref() != Some(&condition.value)
            {
                return None;
            }
            Some(
                index
                    .get(&condition.value)
                    .map(|ids| ids.iter().copied().collect())
                    .unwrap_or_default(),
            )
        })
    }

    fn index_row(&mut self, row_id: RowId, row: &Row) {
        for (column_name, index) in &mut self.indexes {
            index.insert(row.value(column_name).clone(), row_id);
        }
    }

    fn unindex_row(&mut self, row_id: RowId, row: &Row) {
        for (column_name, index) in &mut self.indexes {
            index.remove(row.value(column_name), row_id);
        }
    }

    fn remove_row(&mut self, row_id: RowId) {
        if let Some(row) = self.rows.remove(&row_id) {
            self.unindex_row(row_id, &row);
        }
    }
}

/// Every condition must match; NULL matches only NULL.
pub fn row_matches(row: &Row, filter: &Filter) -> bool {
    filter
        .iter()
        .all(|condition| row.value(&condition.column).matches(&condition.value))
}

/// Copies the given columns out of `row`; missing ones read as NULL.
pub fn project(row: &Row, columns: &[String]) -> Row {
    columns
        .iter()
        .map(|c| (c.clone(), row.value(c).clone()))
        .collect()
}

fn duplicate_key(column: &Column, value: &TypedValue) -> DbError {
    DbError::DuplicateKey {
        column: column.name.clone(),
        value: value.to_string(),
        primary: column.primary_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;

    fn users_table() -> Table {
        Table::new(
            "users",
            vec![
                Column::new("id", DataType::INT).primary_key(),
                Column::new("name", DataType::TEXT).not_null(),
                Column::new("email", DataType::VARCHAR).unique(),
                Column::new("age", DataType::INT),
            ],
        )
        .unwrap()
    }

    fn user(id: i64, name: &str, email: Option<&str>) -> Row {
        Row::from_iter([
            ("id", TypedValue::Integer(id)),
            ("name", TypedValue::text(name)),
            ("email", TypedValue::from(email)),
        ])
    }

    /// Compares the live indexes against a freshly rebuilt copy.
    fn assert_indexes_fresh(table: &Table) {
        let mut rebuilt = table.clone();
        rebuilt.rebuild_indexes();
        for (column, index) in &table.indexes {
            assert_eq!(
                index.entries, rebuilt.indexes[column].entries,
                "stale index on column '{}'",
                column
            );
        }
    }

    #[test]
    fn test_schema_rules() {
        let two_pks = Table::new(
            "t",
            vec![
                Column::new("a", DataType::INT).primary_key(),
                Column::new("b", DataType::INT).primary_key(),
            ],
        );
        match two_pks {
            Err(DbError::Schema(msg)) => assert!(msg.contains("only one primary key")),
            other => panic!("Expected schema error, got {:?}", other),
        }

        let duplicate = Table::new(
            "t",
            vec![Column::new("a", DataType::INT), Column::new("a", DataType::TEXT)],
        );
        assert!(matches!(duplicate, Err(DbError::Schema(_))));

        let table = users_table();
        assert_eq!(table.primary_key(), Some("id"));
        assert_eq!(table.unique_columns(), vec!["id", "email"]);
        assert_eq!(table.column_order(), vec!["id", "name", "email", "age"]);
    }

    #[test]
    fn test_insert_coerces_and_fills_missing_with_null() {
        let mut table = users_table();
        let row = Row::from_iter([
            ("id", TypedValue::text("7")),
            ("name", TypedValue::Integer(42)),
        ]);
        table.insert(row).unwrap();

        let rows = table.select(&[], None).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("id"), &TypedValue::Integer(7));
        assert_eq!(rows[0].value("name"), &TypedValue::text("42"));
        assert_eq!(rows[0].get("email"), Some(&TypedValue::Null));
        assert_eq!(rows[0].get("age"), Some(&TypedValue::Null));
    }

    #[test]
    fn test_insert_rejects_bad_rows() {
        let mut table = users_table();

        let unknown = Row::from_iter([("id", 1i64), ("nickname", 2i64)]);
        assert!(matches!(table.insert(unknown), Err(DbError::UnknownColumn(c)) if c == "nickname"));

        let bad_type = Row::from_iter([
            ("id", TypedValue::text("abc")),
            ("name", TypedValue::text("Ann")),
        ]);
        assert!(matches!(table.insert(bad_type), Err(DbError::TypeMismatch { .. })));

        let null_name = Row::from_iter([("id", TypedValue::Integer(1))]);
        assert!(matches!(
            table.insert(null_name),
            Err(DbError::NullConstraintViolation(c)) if c == "name"
        ));
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_duplicate_keys() {
        let mut table = users_table();
        table.insert(user(1, "Ann", Some("ann@x.io"))).unwrap();

        match table.insert(user(1, "Cy", None)) {
            Err(DbError::DuplicateKey { column, primary, .. }) => {
                assert_eq!(column, "id");
                assert!(primary);
            }
            other => panic!("Expected duplicate key, got {:?}", other),
        }

        match table.insert(user(2, "Bo", Some("ann@x.io"))) {
            Err(DbError::DuplicateKey { column, primary, .. }) => {
                assert_eq!(column, "email");
                assert!(!primary);
            }
            other => panic!("Expected duplicate key, got {:?}", other),
        }

        // NULL never conflicts
        table.insert(user(3, "Cy", None)).unwrap();
        table.insert(user(4, "Di", None)).unwrap();
        assert_eq!(table.row_count(), 3);
        assert_indexes_fresh(&table);
    }

    #[test]
    fn test_insert_many_rolls_back() {
        let mut table = users_table();
        table.insert(user(1, "Ann", None)).unwrap();

        let result = table.insert_many(vec![user(2, "Bo", None), user(3, "Cy", None), user(1, "Dup", None)]);
        assert!(matches!(result, Err(DbError::DuplicateKey { .. })));
        assert_eq!(table.row_count(), 1);
        assert!(table.index("id").unwrap().get(&TypedValue::Integer(2)).is_none());
        assert_indexes_fresh(&table);

        assert_eq!(table.insert_many(vec![user(2, "Bo", None), user(3, "Cy", None)]).unwrap(), 2);
    }

    #[test]
    fn test_select_filter_and_projection() {
        let mut table = users_table();
        table.insert(user(1, "Ann", None)).unwrap();
        table.insert(user(2, "Bo", None)).unwrap();
        table.insert(user(3, "Ann", Some("a@b.c"))).unwrap();

        let rows = table
            .select(&["id".to_string()], Some(&Filter::eq("name", "Ann")))
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0].value("id"), &TypedValue::Integer(1));
        assert_eq!(rows[1].value("id"), &TypedValue::Integer(3));

        // NULL has to be matched explicitly
        let rows = table.select(&[], Some(&Filter::eq("email", TypedValue::Null))).unwrap();
        assert_eq!(rows.len(), 2);

        let rows = table
            .select(&[], Some(&Filter::eq("name", "Ann").and("id", 3i64)))
            .unwrap();
        assert_eq!(rows.len(), 1);

        assert!(matches!(
            table.select(&["nope".to_string()], None),
            Err(DbError::UnknownColumn(_))
        ));
        assert!(matches!(
            table.select(&[], Some(&Filter::eq("nope", 1i64))),
            Err(DbError::UnknownColumn(_))
        ));
    }

    #[test]
    fn test_indexed_and_scanned_lookups_agree() {
        let mut table = Table::new(
            "prices",
            vec![
                Column::new("sku", DataType::TEXT).primary_key(),
                Column::new("price", DataType::REAL).unique(),
            ],
        )
        .unwrap();
        table
            .insert(Row::from_iter([("sku", TypedValue::text("a")), ("price", TypedValue::real(5.0))]))
            .unwrap();

        // Integer literal on a REAL column falls back to a numeric scan
        let by_int = table.select(&[], Some(&Filter::eq("price", 5i64))).unwrap();
        let by_real = table.select(&[], Some(&Filter::eq("price", 5.0))).unwrap();
        assert_eq!(by_int, by_real);
        assert_eq!(by_int.len(), 1);

        assert!(table.select(&[], Some(&Filter::eq("sku", "b"))).unwrap().is_empty());
    }

    #[test]
    fn test_update_rewrites_rows_and_indexes() {
        let mut table = users_table();
        table.insert(user(1, "Ann", Some("ann@x.io"))).unwrap();
        table.insert(user(2, "Bo", None)).unwrap();

        let assignments = vec![Assignment {
            column: "email".to_string(),
            value: TypedValue::text("ann@y.io"),
        }];
        let count = table.update(&assignments, Some(&Filter::eq("id", 1i64))).unwrap();
        assert_eq!(count, 1);
        assert!(table.index("email").unwrap().get(&TypedValue::text("ann@x.io")).is_none());

        // The row's own value does not conflict with itself
        let count = table.update(&assignments, Some(&Filter::eq("id", 1i64))).unwrap();
        assert_eq!(count, 1);
        assert_indexes_fresh(&table);
    }

    #[test]
    fn test_update_is_all_or_nothing() {
        let mut table = users_table();
        table.insert(user(1, "Ann", None)).unwrap();
        table.insert(user(2, "Bo", None)).unwrap();

        // Both rows would end up with the same email
        let assignments = vec![Assignment {
            column: "email".to_string(),
            value: TypedValue::text("same@x.io"),
        }];
        assert!(matches!(
            table.update(&assignments, None),
            Err(DbError::DuplicateKey { .. })
        ));
        assert!(table.index("email").unwrap().is_empty());

        let null_name = vec![Assignment {
            column: "name".to_string(),
            value: TypedValue::Null,
        }];
        assert!(table.update(&null_name, None).is_err());
        let names: Vec<_> = table.rows().map(|r| r.value("name").clone()).collect();
        assert_eq!(names, vec![TypedValue::text("Ann"), TypedValue::text("Bo")]);

        // A batch that leaves key columns alone goes through
        table.update(
            &[Assignment { column: "age".to_string(), value: TypedValue::Integer(30) }],
            None,
        )
        .unwrap();
        assert_indexes_fresh(&table);
    }

    #[test]
    fn test_delete_semantics() {
        let mut table = users_table();
        for (id, name) in [(1, "Ann"), (2, "Bo"), (3, "Cy")] {
            table.insert(user(id, name, None)).unwrap();
        }

        // Zero matches leaves everything untouched
        let before: Vec<Row> = table.rows().cloned().collect();
        let entries_before: HashMap<String, HashMap<TypedValue, BTreeSet<RowId>>> = table
            .indexes
            .iter()
            .map(|(column, index)| (column.clone(), index.entries.clone()))
            .collect();
        assert_eq!(table.delete(Some(&Filter::eq("id", 99i64))).unwrap(), 0);
        assert_eq!(table.rows().cloned().collect::<Vec<_>>(), before);
        for (column, entries) in &entries_before {
            assert_eq!(&table.indexes[column].entries, entries);
        }
        assert_eq!(entries_before.len(), 2);
        assert_indexes_fresh(&table);

        assert_eq!(table.delete(Some(&Filter::eq("id", 2i64))).unwrap(), 1);
        assert_eq!(table.row_count(), 2);
        assert_indexes_fresh(&table);

        // Delete everything, reinsert the same rows
        let snapshot: Vec<Row> = table.rows().cloned().collect();
        assert_eq!(table.delete(None).unwrap(), 2);
        for row in snapshot {
            table.insert(row).unwrap();
        }
        assert_indexes_fresh(&table);
        assert_eq!(table.select(&[], Some(&Filter::eq("id", 3i64))).unwrap().len(), 1);
    }

    #[test]
    fn test_data_round_trip() {
        let mut table = users_table();
        table.insert(user(1, "Ann", Some("ann@x.io"))).unwrap();
        table.insert(user(2, "Bo", None)).unwrap();

        let data = table.to_data();
        assert_eq!(data.primary_key.as_deref(), Some("id"));
        assert_eq!(data.unique_columns, vec!["id", "email"]);

        let restored = Table::from_data(data.clone()).unwrap();
        assert_eq!(restored.column_order(), table.column_order());
        assert_eq!(restored.columns(), table.columns());
        assert_eq!(restored.to_data(), data);
        assert_indexes_fresh(&restored);
        assert_eq!(
            restored.index("id").unwrap().len(),
            table.index("id").unwrap().len()
        );
    }

    #[test]
    fn test_from_data_rejects_duplicates() {
        let mut data = users_table().to_data();
        data.rows = vec![user(1, "Ann", None), user(1, "Bo", None)];
        assert!(matches!(Table::from_data(data), Err(DbError::DuplicateKey { .. })));
    }

    #[test]
    fn test_schema_snapshot() {
        let mut table = users_table();
        table.insert(user(1, "Ann", None)).unwrap();
        let schema = table.schema();
        assert_eq!(schema.name, "users");
        assert_eq!(schema.primary_key.as_deref(), Some("id"));
        assert_eq!(schema.row_count, 1);
        assert_eq!(schema.columns.len(), 4);
    }
}
