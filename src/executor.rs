use crate::errors::DbError;
use crate::parser::{
    parse_sql, ColumnDefinition, Condition, Filter, JoinClause, JoinCondition, OrderBy, Query,
    SelectQuery,
};
use crate::row::{Row, NULL};
use crate::table::{project, Table};
use crate::types::{Column, TypedValue};
use log::debug;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::time::Instant;

/// Uniform outcome of one statement. On success `data`/`message` are
/// meaningful, on failure only `error` is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    pub success: bool,
    pub data: Option<Vec<Row>>,
    /// Order in which `data` should be read.
    pub columns: Vec<String>,
    pub rows_affected: usize,
    pub message: Option<String>,
    pub error: Option<String>,
    pub execution_time_us: u64,
}

impl QueryResult {
    pub fn with_rows(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            success: true,
            rows_affected: rows.len(),
            data: Some(rows),
            columns,
            message: None,
            error: None,
            execution_time_us: 0,
        }
    }

    pub fn with_message(message: impl Into<String>, rows_affected: usize) -> Self {
        Self {
            success: true,
            data: None,
            columns: Vec::new(),
            rows_affected,
            message: Some(message.into()),
            error: None,
            execution_time_us: 0,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            columns: Vec::new(),
            rows_affected: 0,
            message: None,
            error: Some(error.into()),
            execution_time_us: 0,
        }
    }

    pub fn rows(&self) -> &[Row] {
        self.data.as_deref().unwrap_or(&[])
    }

    pub fn row_count(&self) -> usize {
        self.rows().len()
    }

    /// Renders the result for a console: an error line, the message, or a
    /// boxed table followed by the row count.
    pub fn format(&self) -> String {
        if !self.success {
            return format!(
                "Error: {}",
                self.error.as_deref().unwrap_or("Unknown error")
            );
        }

        match &self.data {
            Some(rows) if !rows.is_empty() => {
                let cells: Vec<Vec<String>> = rows
                    .iter()
                    .map(|row| self.columns.iter().map(|c| row.get_as_string(c)).collect())
                    .collect();
                format!(
                    "{}{} row(s) returned",
                    render_table(&self.columns, &cells),
                    rows.len()
                )
            }
            Some(_) => "No results".to_string(),
            None => self
                .message
                .clone()
                .unwrap_or_else(|| "No results".to_string()),
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

impl From<DbError> for QueryResult {
    fn from(error: DbError) -> Self {
        QueryResult::failure(error.to_string())
    }
}

fn render_table(columns: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = columns.iter().map(|c| c.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.chars().count());
            }
        }
    }
    // Minimum genişlik 8
    for width in &mut widths {
        *width = (*width).max(8);
    }

    let border = |left: &str, middle: &str, right: &str| {
        let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
        format!("{}{}{}\n", left, segments.join(middle), right)
    };
    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| format!(" {:width$} ", cell, width = width))
            .collect();
        format!("│{}│\n", padded.join("│"))
    };

    let mut out = border("┌", "┬", "┐");
    out.push_str(&line(columns));
    out.push_str(&border("├", "┼", "┤"));
    for row in rows {
        out.push_str(&line(row.as_slice()));
    }
    out.push_str(&border("└", "┴", "┘"));
    out
}

/// QueryExecutor - AST'yi yorumlayıp tablolar üzerinde çalıştıran yapı
///
/// Holds no state of its own; the caller owns the live table map and any
/// persistence.
#[derive(Debug, Clone, Default)]
pub struct QueryExecutor;

impl QueryExecutor {
    pub fn new() -> Self {
        QueryExecutor
    }

    /// SQL string'ini parse edip çalıştırır
    pub fn execute_sql(
        &self,
        sql: &str,
        tables: &mut HashMap<String, Table>,
    ) -> Result<QueryResult, DbError> {
        let start_time = Instant::now();
        let query = parse_sql(sql)?;
        let mut result = self.execute_statement(query, tables)?;
        result.execution_time_us = start_time.elapsed().as_micros() as u64;
        Ok(result)
    }

    /// Parse edilmiş sorguyu çalıştırır
    pub fn execute_statement(
        &self,
        query: Query,
        tables: &mut HashMap<String, Table>,
    ) -> Result<QueryResult, DbError> {
        debug!("Executing {} statement", query.query_type());
        match query {
            Query::CreateTable {
                table_name,
                columns,
            } => self.execute_create_table(table_name, columns, tables),
            Query::Insert {
                table_name,
                columns,
                rows,
            } => self.execute_insert(&table_name, columns, rows, tables),
            Query::Select(select) => self.execute_select(&select, tables),
            Query::Update {
                table_name,
                assignments,
                filter,
            } => {
                let table = get_table_mut(tables, &table_name)?;
                let updated = table.update(&assignments, filter.as_ref())?;
                Ok(QueryResult::with_message(
                    format!("Updated {} row(s) in '{}'", updated, table_name),
                    updated,
                ))
            }
            Query::Delete { table_name, filter } => {
                let table = get_table_mut(tables, &table_name)?;
                let deleted = table.delete(filter.as_ref())?;
                Ok(QueryResult::with_message(
                    format!("Deleted {} row(s) from '{}'", deleted, table_name),
                    deleted,
                ))
            }
            Query::DropTable { table_name } => {
                if tables.remove(&table_name).is_none() {
                    return Err(DbError::table_not_found(&table_name));
                }
                Ok(QueryResult::with_message(
                    format!("Table '{}' dropped successfully", table_name),
                    0,
                ))
            }
            Query::ShowTables => Ok(self.execute_show_tables(tables)),
            Query::Describe { table_name } => {
                let table = get_table(tables, &table_name)?;
                Ok(describe(table))
            }
        }
    }

    /// CREATE TABLE işlemini çalıştırır
    fn execute_create_table(
        &self,
        table_name: String,
        columns: Vec<ColumnDefinition>,
        tables: &mut HashMap<String, Table>,
    ) -> Result<QueryResult, DbError> {
        if tables.contains_key(&table_name) {
            return Err(DbError::table_already_exists(&table_name));
        }

        let columns = columns
            .into_iter()
            .map(|def| {
                Column::with_constraints(
                    def.name,
                    def.data_type,
                    def.primary_key,
                    def.unique,
                    def.nullable,
                )
            })
            .collect();
        let table = Table::new(table_name.clone(), columns)?;
        tables.insert(table_name.clone(), table);

        Ok(QueryResult::with_message(
            format!("Table '{}' created successfully", table_name),
            0,
        ))
    }

    /// INSERT işlemini çalıştırır; bir satır hata verirse hiçbiri eklenmez
    fn execute_insert(
        &self,
        table_name: &str,
        columns: Option<Vec<String>>,
        rows: Vec<Vec<TypedValue>>,
        tables: &mut HashMap<String, Table>,
    ) -> Result<QueryResult, DbError> {
        let table = get_table_mut(tables, table_name)?;
        // Value-only rows are zipped positionally against the declared order
        let labels = match columns {
            Some(columns) => columns,
            None => table.column_order(),
        };

        let mut mapped = Vec::with_capacity(rows.len());
        for values in rows {
            if values.len() > labels.len() {
                return Err(DbError::column_count_mismatch(labels.len(), values.len()));
            }
            mapped.push(labels.iter().cloned().zip(values).collect::<Row>());
        }

        let inserted = table.insert_many(mapped)?;
        Ok(QueryResult::with_message(
            format!("Inserted {} row(s) into '{}'", inserted, table_name),
            inserted,
        ))
    }

    fn execute_select(
        &self,
        select: &SelectQuery,
        tables: &HashMap<String, Table>,
    ) -> Result<QueryResult, DbError> {
        let table = get_table(tables, &select.table_name)?;
        if let Some(join) = &select.join {
            let right = get_table(tables, &join.table_name)?;
            // Both sides would share one qualifier, so `t.col` could not pick a side
            if right.name == table.name {
                return Err(DbError::Schema(format!(
                    "Cannot join table '{}' with itself",
                    table.name
                )));
            }
            return execute_join(select, join, table, right);
        }

        // Column references may carry this table's own name as qualifier
        let unqualify = |column: &str| -> String {
            match column.split_once('.') {
                Some((qualifier, name)) if qualifier == table.name => name.to_string(),
                _ => column.to_string(),
            }
        };

        let requested: Vec<String> = select.columns.iter().map(|c| unqualify(c.as_str())).collect();
        let projection = table.resolve_columns(&requested)?;
        let filter = select.filter.as_ref().map(|f| {
            Filter::new(
                f.iter()
                    .map(|c| Condition {
                        column: unqualify(c.column.as_str()),
                        value: c.value.clone(),
                    })
                    .collect(),
            )
        });
        let order_by: Vec<OrderBy> = select
            .order_by
            .iter()
            .map(|o| OrderBy {
                column: unqualify(o.column.as_str()),
                descending: o.descending,
            })
            .collect();
        for order in &order_by {
            if !table.has_column(&order.column) {
                return Err(DbError::unknown_column(&order.column));
            }
        }

        let mut rows: Vec<&Row> = table.find_rows(filter.as_ref())?;
        sort_rows(&mut rows, &order_by, |row, column| row.value(column));
        if let Some(limit) = select.limit {
            rows.truncate(limit);
        }

        let data = rows.into_iter().map(|row| project(row, &projection)).collect();
        Ok(QueryResult::with_rows(projection, data))
    }

    fn execute_show_tables(&self, tables: &HashMap<String, Table>) -> QueryResult {
        let mut names: Vec<&String> = tables.keys().collect();
        names.sort();
        let data = names
            .into_iter()
            .map(|name| {
                Row::from_iter([
                    ("table_name", TypedValue::text(name.as_str())),
                    ("row_count", TypedValue::Integer(tables[name].row_count() as i64)),
                ])
            })
            .collect();
        QueryResult::with_rows(vec!["table_name".to_string(), "row_count".to_string()], data)
    }
}

fn get_table<'a>(tables: &'a HashMap<String, Table>, name: &str) -> Result<&'a Table, DbError> {
    tables.get(name).ok_or_else(|| DbError::table_not_found(name))
}

fn get_table_mut<'a>(
    tables: &'a mut HashMap<String, Table>,
    name: &str,
) -> Result<&'a mut Table, DbError> {
    tables
        .get_mut(name)
        .ok_or_else(|| DbError::table_not_found(name))
}

fn describe(table: &Table) -> QueryResult {
    let data = table
        .columns()
        .iter()
        .map(|column| {
            let key = if column.primary_key {
                "PRI"
            } else if column.unique {
                "UNI"
            } else {
                ""
            };
            Row::from_iter([
                ("column_name", TypedValue::text(column.name.as_str())),
                ("data_type", TypedValue::text(column.data_type.as_str())),
                ("nullable", TypedValue::text(if column.nullable { "YES" } else { "NO" })),
                ("key", TypedValue::text(key)),
                ("default", TypedValue::Null),
            ])
        })
        .collect();
    QueryResult::with_rows(
        ["column_name", "data_type", "nullable", "key", "default"]
            .iter()
            .map(|c| c.to_string())
            .collect(),
        data,
    )
}

/// Stable sort; NULL sorts first ascending and last descending.
fn sort_rows<'r, F>(rows: &mut [&'r Row], order_by: &[OrderBy], value_of: F)
where
    F: Fn(&'r Row, &str) -> &'r TypedValue,
{
    if order_by.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        let (a, b) = (*a, *b);
        order_by
            .iter()
            .map(|order| {
                let ordering = value_of(a, &order.column).cmp(value_of(b, &order.column));
                if order.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Side {
    Left,
    Right,
}

/// Resolves one operand of `ON`. A qualifier picks the table; a bare name
/// belongs to the table on the same side of `=`.
fn resolve_join_operand(
    reference: &str,
    default_side: Side,
    left: &Table,
    right: &Table,
) -> Result<(Side, String), DbError> {
    let (side, column) = match reference.split_once('.') {
        Some((qualifier, column)) if qualifier == left.name => (Side::Left, column),
        Some((qualifier, column)) if qualifier == right.name => (Side::Right, column),
        Some(_) => return Err(DbError::unknown_column(reference)),
        None => (default_side, reference),
    };
    let table = match side {
        Side::Left => left,
        Side::Right => right,
    };
    if !table.has_column(column) {
        return Err(DbError::unknown_column(reference));
    }
    Ok((side, column.to_string()))
}

fn join_pair_matches(
    condition: &Option<((Side, String), (Side, String))>,
    left_row: &Row,
    right_row: &Row,
) -> bool {
    let Some((a, b)) = condition else {
        return true; // cross join
    };
    let value = |(side, column): &(Side, String)| match side {
        Side::Left => left_row.value(column),
        Side::Right => right_row.value(column),
    };
    value(a).matches(value(b))
}

/// Exact combined key, or else the first key (in combined column order)
/// ending in `.<key>`.
fn resolve_combined<'a>(combined_columns: &'a [String], row: &Row, key: &str) -> Option<&'a str> {
    if row.contains(key) {
        return combined_columns
            .iter()
            .find(|c| c.as_str() == key)
            .map(String::as_str);
    }
    let suffix = format!(".{}", key);
    combined_columns
        .iter()
        .find(|c| c.ends_with(&suffix))
        .map(String::as_str)
}

fn execute_join(
    select: &SelectQuery,
    join: &JoinClause,
    left: &Table,
    right: &Table,
) -> Result<QueryResult, DbError> {
    let condition = match &join.condition {
        Some(JoinCondition { left: l, right: r }) => Some((
            resolve_join_operand(l, Side::Left, left, right)?,
            resolve_join_operand(r, Side::Right, left, right)?,
        )),
        None => None,
    };

    let combined_columns: Vec<String> = left
        .column_order()
        .iter()
        .map(|c| format!("{}.{}", left.name, c))
        .chain(
            right
                .column_order()
                .iter()
                .map(|c| format!("{}.{}", right.name, c)),
        )
        .collect();

    let mut joined = Vec::new();
    for left_row in left.rows() {
        for right_row in right.rows() {
            if !join_pair_matches(&condition, left_row, right_row) {
                continue;
            }
            let combined: Row = left_row
                .get_all()
                .iter()
                .map(|(c, v)| (format!("{}.{}", left.name, c), v.clone()))
                .chain(
                    right_row
                        .get_all()
                        .iter()
                        .map(|(c, v)| (format!("{}.{}", right.name, c), v.clone())),
                )
                .collect();
            joined.push(combined);
        }
    }

    // WHERE on combined rows: an unresolvable column excludes the row
    if let Some(filter) = &select.filter {
        joined.retain(|row| {
            filter.iter().all(|condition| {
                resolve_combined(&combined_columns, row, &condition.column)
                    .map_or(false, |key| row.value(key).matches(&condition.value))
            })
        });
    }

    let mut rows: Vec<&Row> = joined.iter().collect();
    sort_rows(&mut rows, &select.order_by, |row, column| {
        resolve_combined(&combined_columns, row, column)
            .map_or(&NULL, |key| row.value(key))
    });
    if let Some(limit) = select.limit {
        rows.truncate(limit);
    }

    if select.columns.is_empty() || select.columns.iter().any(|c| c == "*") {
        let data = rows.into_iter().cloned().collect();
        return Ok(QueryResult::with_rows(combined_columns, data));
    }

    // Projection keeps the requested names; unresolvable columns read NULL
    let data = rows
        .into_iter()
        .map(|row| {
            select
                .columns
                .iter()
                .map(|requested| {
                    let value = resolve_combined(&combined_columns, row, requested)
                        .map_or(TypedValue::Null, |key| row.value(key).clone());
                    (requested.clone(), value)
                })
                .collect::<Row>()
        })
        .collect();
    Ok(QueryResult::with_rows(select.columns.clone(), data))
}
