//! SQLite Backend Implementation
//!
//! Mirrors the PostgreSQL backend for SQLite files and `sqlite::memory:`
//! databases. The single pooled connection never expires, so an in-memory
//! database lives exactly as long as the connection handle.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Pool, Row as SqlxRow, Sqlite, TypeInfo, ValueRef};

use super::core::*;
use crate::config::DatabaseConfig;
use crate::error::{OrmError, OrmResult};
use crate::sql::Statement;

/// SQLite connection capped at a single underlying session
pub struct SqliteConnection {
    pool: Pool<Sqlite>,
}

impl SqliteConnection {
    /// Open the connection described by `config`
    pub async fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(|e| OrmError::Configuration(format!("Invalid SQLite URL: {}", e)))?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| OrmError::Configuration(format!("Failed to open SQLite database: {}", e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseConnection for SqliteConnection {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::SQLite
    }

    async fn run(&self, statement: &Statement) -> OrmResult<Vec<Row>> {
        let mut tx = self.pool.begin().await?;

        let mut query = sqlx::query(&statement.sql);
        for param in &statement.params {
            query = bind_database_value(query, param);
        }

        match query.fetch_all(&mut *tx).await {
            Ok(rows) => {
                tx.commit().await?;
                rows.iter().map(sqlite_row_to_row).collect()
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!("Rollback failed after statement error: {}", rollback_err);
                }
                tracing::error!(sql = %statement.sql, "Statement rolled back: {}", e);
                Err(OrmError::Storage(e.to_string()))
            }
        }
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }
}

/// Bind a DatabaseValue to a sqlx query
fn bind_database_value<'a>(
    query: sqlx::query::Query<'a, Sqlite, SqliteArguments<'a>>,
    value: &DatabaseValue,
) -> sqlx::query::Query<'a, Sqlite, SqliteArguments<'a>> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        // no native decimal type; column affinity decides how it is stored
        DatabaseValue::Decimal(d) => query.bind(d.to_string()),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::Uuid(u) => query.bind(*u),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Date(d) => query.bind(*d),
        DatabaseValue::Time(t) => query.bind(*t),
        DatabaseValue::Json(j) => query.bind(sqlx::types::Json(j.clone())),
    }
}

fn sqlite_row_to_row(row: &SqliteRow) -> OrmResult<Row> {
    let mut map = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), sqlite_value_to_database_value(row, index)?);
    }
    Ok(map)
}

/// Convert a SQLite cell to DatabaseValue using its storage class
///
/// SQLite is dynamically typed, so the declared column type is ignored and
/// the value's own storage class (INTEGER, REAL, TEXT, BLOB) decides.
fn sqlite_value_to_database_value(row: &SqliteRow, index: usize) -> OrmResult<DatabaseValue> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(DatabaseValue::Null);
    }
    let storage_class = raw.type_info().name().to_string();

    let decode_err =
        |e: sqlx::Error| OrmError::Storage(format!("Failed to decode {} column {}: {}", storage_class, index, e));

    let value = match storage_class.as_str() {
        "INTEGER" | "BOOLEAN" => DatabaseValue::Int64(row.try_get_unchecked(index).map_err(decode_err)?),
        "REAL" | "NUMERIC" => DatabaseValue::Float64(row.try_get_unchecked(index).map_err(decode_err)?),
        "BLOB" => DatabaseValue::Bytes(row.try_get_unchecked(index).map_err(decode_err)?),
        _ => DatabaseValue::String(row.try_get_unchecked(index).map_err(decode_err)?),
    };

    Ok(value)
}
