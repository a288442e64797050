//! PostgreSQL Backend Implementation
//!
//! This module provides the PostgreSQL-specific implementation of the database
//! backend traits using sqlx as the underlying database driver.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow, PgTypeKind};
use sqlx::{Column, Pool, Postgres, Row as SqlxRow, TypeInfo, ValueRef};

use super::core::*;
use crate::config::DatabaseConfig;
use crate::error::{OrmError, OrmResult};
use crate::sql::Statement;

/// PostgreSQL connection capped at a single underlying session
pub struct PostgresConnection {
    pool: Pool<Postgres>,
}

impl PostgresConnection {
    /// Open the connection described by `config`
    pub async fn connect(config: &DatabaseConfig) -> OrmResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(&config.database_url)
            .await
            .map_err(|e| OrmError::Configuration(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    fn dialect(&self) -> SqlDialect {
        SqlDialect::PostgreSQL
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
                rows.iter().map(postgres_row_to_row).collect()
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
    query: sqlx::query::Query<'a, Postgres, PgArguments>,
    value: &DatabaseValue,
) -> sqlx::query::Query<'a, Postgres, PgArguments> {
    match value {
        DatabaseValue::Null => query.bind(Option::<String>::None),
        DatabaseValue::Bool(b) => query.bind(*b),
        DatabaseValue::Int32(i) => query.bind(*i),
        DatabaseValue::Int64(i) => query.bind(*i),
        DatabaseValue::Float64(f) => query.bind(*f),
        DatabaseValue::Decimal(d) => query.bind(*d),
        DatabaseValue::String(s) => query.bind(s.clone()),
        DatabaseValue::Bytes(b) => query.bind(b.clone()),
        DatabaseValue::Uuid(u) => query.bind(*u),
        DatabaseValue::DateTime(dt) => query.bind(*dt),
        DatabaseValue::Date(d) => query.bind(*d),
        DatabaseValue::Time(t) => query.bind(*t),
        DatabaseValue::Json(j) => query.bind(j.clone()),
    }
}

fn postgres_row_to_row(row: &PgRow) -> OrmResult<Row> {
    let mut map = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), postgres_value_to_database_value(row, index)?);
    }
    Ok(map)
}

/// Convert a PostgreSQL column value to DatabaseValue
///
/// Enum columns read as their label. Column types without a `DatabaseValue`
/// counterpart (INTERVAL, MONEY, arrays, ranges, geometric and network
/// types) are reported as a storage error naming the type; cast them to
/// TEXT in a view to read them.
fn postgres_value_to_database_value(row: &PgRow, index: usize) -> OrmResult<DatabaseValue> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(DatabaseValue::Null);
    }

    let type_name = row.columns()[index].type_info().name().to_string();
    let decode_err =
        |e: sqlx::Error| OrmError::Storage(format!("Failed to decode {} column {}: {}", type_name, index, e));

    let value = match type_name.as_str() {
        "BOOL" => DatabaseValue::Bool(row.try_get(index).map_err(decode_err)?),
        "INT2" => DatabaseValue::Int32(i32::from(row.try_get::<i16, _>(index).map_err(decode_err)?)),
        "INT4" => DatabaseValue::Int32(row.try_get(index).map_err(decode_err)?),
        "INT8" => DatabaseValue::Int64(row.try_get(index).map_err(decode_err)?),
        "FLOAT4" => DatabaseValue::Float64(f64::from(row.try_get::<f32, _>(index).map_err(decode_err)?)),
        "FLOAT8" => DatabaseValue::Float64(row.try_get(index).map_err(decode_err)?),
        "NUMERIC" => DatabaseValue::Decimal(row.try_get(index).map_err(decode_err)?),
        "BYTEA" => DatabaseValue::Bytes(row.try_get(index).map_err(decode_err)?),
        "UUID" => DatabaseValue::Uuid(row.try_get(index).map_err(decode_err)?),
        "TIMESTAMPTZ" => DatabaseValue::DateTime(row.try_get(index).map_err(decode_err)?),
        "TIMESTAMP" => {
            let naive: chrono::NaiveDateTime = row.try_get(index).map_err(decode_err)?;
            DatabaseValue::DateTime(naive.and_utc())
        }
        "DATE" => DatabaseValue::Date(row.try_get(index).map_err(decode_err)?),
        "TIME" => DatabaseValue::Time(row.try_get(index).map_err(decode_err)?),
        "JSON" | "JSONB" => DatabaseValue::Json(row.try_get::<JsonValue, _>(index).map_err(decode_err)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" | "CITEXT" | "citext" => {
            DatabaseValue::String(row.try_get(index).map_err(decode_err)?)
        }
        // enum labels travel as text in both wire formats
        _ if matches!(row.columns()[index].type_info().kind(), PgTypeKind::Enum(_)) => {
            DatabaseValue::String(row.try_get_unchecked(index).map_err(decode_err)?)
        }
        other => {
            return Err(OrmError::Storage(format!(
                "Column {} has unsupported type {}",
                row.columns()[index].name(),
                other
            )))
        }
    };

    Ok(value)
}
