//! Statement builders
//!
//! Composes SELECT/INSERT/UPDATE/DELETE text from a registry entry plus an
//! already-parameterized criterion. Every mutating statement asks for the
//! resulting rows back, so callers always observe the authoritative
//! post-write state, database-generated values included.

use std::fmt;

use crate::conditions::{parameterize, Criterion};
use crate::error::{OrmError, OrmResult};
use crate::schema::TableEntry;
use crate::value::SqlValue;

/// One executable statement: SQL text plus its positional arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<SqlValue>,
}

/// Sort direction for ORDER BY clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl fmt::Display for OrderDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderDirection::Asc => write!(f, "ASC"),
            OrderDirection::Desc => write!(f, "DESC"),
        }
    }
}

/// Ordering, pagination, and distinctness for a select
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    pub order_by: Vec<(String, OrderDirection)>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub distinct: bool,
}

impl FetchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ascending sort on the given column
    pub fn order_by(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Asc));
        self
    }

    /// Descending sort on the given column
    pub fn order_by_desc(mut self, column: &str) -> Self {
        self.order_by.push((column.to_string(), OrderDirection::Desc));
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }
}

fn column_list(entry: &TableEntry) -> String {
    entry.columns().collect::<Vec<_>>().join(", ")
}

fn returning_clause(entry: &TableEntry) -> String {
    format!(" RETURNING {}", column_list(entry))
}

/// Build a SELECT over the entry's declared columns
pub fn select(entry: &TableEntry, criterion: Option<&Criterion>, options: &FetchOptions) -> Statement {
    let mut sql = String::from("SELECT ");
    if options.distinct {
        sql.push_str("DISTINCT ");
    }
    sql.push_str(&column_list(entry));
    sql.push_str(" FROM ");
    sql.push_str(&entry.table);

    let mut args = Vec::new();
    if let Some(criterion) = criterion {
        let parameterized = parameterize(criterion);
        sql.push_str(" WHERE ");
        sql.push_str(&parameterized.sql);
        args = parameterized.args;
    }

    if !options.order_by.is_empty() {
        sql.push_str(" ORDER BY ");
        let clauses: Vec<String> = options
            .order_by
            .iter()
            .map(|(column, direction)| format!("{column} {direction}"))
            .collect();
        sql.push_str(&clauses.join(", "));
    }

    if let Some(limit) = options.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }

    if let Some(offset) = options.offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }

    Statement { sql, args }
}

/// Build a COUNT(*) over the entry's table
pub fn count(entry: &TableEntry, criterion: Option<&Criterion>) -> Statement {
    let mut sql = format!("SELECT COUNT(*) AS count FROM {}", entry.table);
    let mut args = Vec::new();
    if let Some(criterion) = criterion {
        let parameterized = parameterize(criterion);
        sql.push_str(" WHERE ");
        sql.push_str(&parameterized.sql);
        args = parameterized.args;
    }
    Statement { sql, args }
}

/// Build an INSERT for one or more rows
///
/// `rows` carries one value per insertable (non-generated) field, in
/// declaration order. Each tuple's placeholder block starts where the
/// previous tuple's ended. NULL values are rendered inline so the server
/// infers parameter types from the remaining placeholders.
pub fn insert(entry: &TableEntry, rows: Vec<Vec<SqlValue>>) -> OrmResult<Statement> {
    let columns: Vec<&str> = entry
        .insertable_fields()
        .map(|(_, f)| f.column_name.as_str())
        .collect();

    let mut args = Vec::with_capacity(rows.len() * columns.len());
    let mut tuples = Vec::with_capacity(rows.len());
    for row in rows {
        if row.len() != columns.len() {
            return Err(OrmError::schema(
                entry.type_name,
                format!(
                    "insert expects {} values per row, got {}",
                    columns.len(),
                    row.len()
                ),
            ));
        }
        let placeholders: Vec<String> = row
            .into_iter()
            .map(|value| {
                if value.is_null() {
                    "NULL".to_string()
                } else {
                    args.push(value);
                    format!("${}", args.len())
                }
            })
            .collect();
        tuples.push(format!("({})", placeholders.join(", ")));
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES {}{}",
        entry.table,
        columns.join(", "),
        tuples.join(", "),
        returning_clause(entry)
    );
    Ok(Statement { sql, args })
}

/// Build an UPDATE keyed on the instance's current primary key value
///
/// `values` carries one value per declared field. Every column is SET,
/// the primary key included (a no-op that keeps the statement shape uniform).
pub fn update_by_primary_key(entry: &TableEntry, values: Vec<SqlValue>) -> OrmResult<Statement> {
    if values.len() != entry.fields.len() {
        return Err(OrmError::schema(
            entry.type_name,
            format!(
                "update expects {} values, got {}",
                entry.fields.len(),
                values.len()
            ),
        ));
    }

    let primary_key_value = values[entry.primary_key_index()].clone();
    if primary_key_value.is_null() {
        return Err(OrmError::MissingPrimaryKey {
            table: entry.table.clone(),
        });
    }

    let mut args = Vec::with_capacity(values.len() + 1);
    let assignments: Vec<String> = entry
        .fields
        .iter()
        .zip(values)
        .map(|(field, value)| {
            if value.is_null() {
                format!("{} = NULL", field.column_name)
            } else {
                args.push(value);
                format!("{} = ${}", field.column_name, args.len())
            }
        })
        .collect();

    args.push(primary_key_value);
    let sql = format!(
        "UPDATE {} SET {} WHERE {} = ${}{}",
        entry.table,
        assignments.join(", "),
        entry.primary_key().column_name,
        args.len(),
        returning_clause(entry)
    );
    Ok(Statement { sql, args })
}

/// Build a DELETE for every row matching the criterion
pub fn delete(entry: &TableEntry, criterion: &Criterion) -> Statement {
    let parameterized = parameterize(criterion);
    let sql = format!(
        "DELETE FROM {} WHERE {}{}",
        entry.table,
        parameterized.sql,
        returning_clause(entry)
    );
    Statement {
        sql,
        args: parameterized.args,
    }
}
