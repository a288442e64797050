//! Statement builder
//!
//! Turns table names and field maps into parameterized statements for a
//! given dialect. Table names are always quoted; column names come from
//! validated schema declarations or from rows the engine returned.

use std::collections::BTreeMap;

use crate::backends::{DatabaseValue, SqlDialect};

/// A parameterized SQL statement ready to execute
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<DatabaseValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<DatabaseValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

fn quote(dialect: SqlDialect, identifier: &str) -> String {
    let q = dialect.identifier_quote();
    let escaped = identifier.replace(q, &format!("{}{}", q, q));
    format!("{}{}{}", q, escaped, q)
}

/// `SELECT * FROM <table>`
pub fn select_all(dialect: SqlDialect, table: &str) -> Statement {
    Statement::new(format!("SELECT * FROM {}", quote(dialect, table)), Vec::new())
}

/// `SELECT * FROM <table> WHERE <table>_id = ?`
pub fn select_by_id(dialect: SqlDialect, table: &str, id: i64) -> Statement {
    Statement::new(
        format!(
            "SELECT * FROM {} WHERE {}_id = {}",
            quote(dialect, table),
            table,
            dialect.parameter_placeholder(0)
        ),
        vec![DatabaseValue::Int64(id)],
    )
}

/// `DELETE FROM <table> WHERE <table>_id = ?`
pub fn delete_by_id(dialect: SqlDialect, table: &str, id: i64) -> Statement {
    Statement::new(
        format!(
            "DELETE FROM {} WHERE {}_id = {}",
            quote(dialect, table),
            table,
            dialect.parameter_placeholder(0)
        ),
        vec![DatabaseValue::Int64(id)],
    )
}

/// Placeholder for one value, or a literal `NULL`
///
/// NULL is never bound: a typed NULL parameter does not coerce to every
/// column type in PostgreSQL.
fn value_slot(dialect: SqlDialect, value: &DatabaseValue, params: &mut Vec<DatabaseValue>) -> String {
    if value.is_null() {
        return "NULL".to_string();
    }
    let placeholder = dialect.parameter_placeholder(params.len());
    params.push(value.clone());
    placeholder
}

/// `INSERT INTO <table> (<cols>) VALUES (<vals>) RETURNING <table>_id`
///
/// An empty field map inserts a row of defaults.
pub fn insert(dialect: SqlDialect, table: &str, fields: &BTreeMap<String, DatabaseValue>) -> Statement {
    if fields.is_empty() {
        return Statement::new(
            format!("INSERT INTO {} DEFAULT VALUES RETURNING {}_id", quote(dialect, table), table),
            Vec::new(),
        );
    }

    let mut params = Vec::with_capacity(fields.len());
    let columns: Vec<&str> = fields.keys().map(String::as_str).collect();
    let values: Vec<String> = fields.values().map(|value| value_slot(dialect, value, &mut params)).collect();

    Statement::new(
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}_id",
            quote(dialect, table),
            columns.join(", "),
            values.join(", "),
            table
        ),
        params,
    )
}

/// `UPDATE <table> SET <col> = ?, ... WHERE <table>_id = ?`
///
/// The primary key column is never rewritten. Returns `None` when nothing
/// is left to set.
pub fn update(
    dialect: SqlDialect,
    table: &str,
    fields: &BTreeMap<String, DatabaseValue>,
    id: i64,
) -> Option<Statement> {
    let primary_key = format!("{}_id", table);
    let assignments: Vec<(&String, &DatabaseValue)> =
        fields.iter().filter(|(column, _)| **column != primary_key).collect();

    if assignments.is_empty() {
        return None;
    }

    let mut params = Vec::with_capacity(assignments.len() + 1);
    let set_clause: Vec<String> = assignments
        .iter()
        .map(|(column, value)| format!("{} = {}", column, value_slot(dialect, value, &mut params)))
        .collect();
    let key_placeholder = dialect.parameter_placeholder(params.len());
    params.push(DatabaseValue::Int64(id));

    Some(Statement::new(
        format!(
            "UPDATE {} SET {} WHERE {} = {}",
            quote(dialect, table),
            set_clause.join(", "),
            primary_key,
            key_placeholder
        ),
        params,
    ))
}

/// `SELECT * FROM <child_table> WHERE <parent_table>_id = ?`
pub fn select_children(dialect: SqlDialect, child_table: &str, parent_table: &str, parent_id: i64) -> Statement {
    Statement::new(
        format!(
            "SELECT * FROM {} WHERE {}_id = {}",
            quote(dialect, child_table),
            parent_table,
            dialect.parameter_placeholder(0)
        ),
        vec![DatabaseValue::Int64(parent_id)],
    )
}

/// `SELECT * FROM <sibling_table> NATURAL JOIN <join_table> WHERE <table>_id = ?`
pub fn select_siblings(
    dialect: SqlDialect,
    sibling_table: &str,
    join_table: &str,
    table: &str,
    id: i64,
) -> Statement {
    Statement::new(
        format!(
            "SELECT * FROM {} NATURAL JOIN {} WHERE {}_id = {}",
            quote(dialect, sibling_table),
            quote(dialect, join_table),
            table,
            dialect.parameter_placeholder(0)
        ),
        vec![DatabaseValue::Int64(id)],
    )
}

/// `UPDATE <child_table> SET <parent>_id = ? WHERE <child_table>_id IN (...)`
///
/// Returns `None` for an empty child list.
pub fn adopt_children(
    dialect: SqlDialect,
    child_table: &str,
    parent_table: &str,
    parent_id: i64,
    child_ids: &[i64],
) -> Option<Statement> {
    if child_ids.is_empty() {
        return None;
    }

    let placeholders: Vec<String> = (1..=child_ids.len()).map(|i| dialect.parameter_placeholder(i)).collect();
    let mut params = vec![DatabaseValue::Int64(parent_id)];
    params.extend(child_ids.iter().map(|id| DatabaseValue::Int64(*id)));

    Some(Statement::new(
        format!(
            "UPDATE {} SET {}_id = {} WHERE {}_id IN ({})",
            quote(dialect, child_table),
            parent_table,
            dialect.parameter_placeholder(0),
            child_table,
            placeholders.join(", ")
        ),
        params,
    ))
}
