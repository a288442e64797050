//! Database handle
//!
//! A `Database` wraps the single storage connection together with the schema
//! registry. It is cheap to clone; every entity carries a clone and issues
//! its statements through it. Opening and closing the connection is the
//! caller's job, either explicitly (`connect` / `close`) or through
//! `scoped`, which closes on every exit path.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::backends::{
    DatabaseBackendType, DatabaseConnection, PostgresConnection, Row, SqlDialect, SqliteConnection,
};
use crate::config::DatabaseConfig;
use crate::entity::Entity;
use crate::error::{OrmError, OrmResult};
use crate::registry::SchemaRegistry;
use crate::schema::{EntitySchema, EntityType};
use crate::sql::{self, Statement};

/// Statement counters for one database handle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatementStats {
    /// Statements handed to the engine
    pub executed: u64,
    /// Statements that failed and were rolled back
    pub failed: u64,
}

struct DatabaseInner {
    connection: Box<dyn DatabaseConnection>,
    registry: SchemaRegistry,
    executed: AtomicU64,
    failed: AtomicU64,
}

/// Shared handle to the storage connection and schema registry
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Open the connection described by `config`
    pub async fn connect(config: &DatabaseConfig, registry: SchemaRegistry) -> OrmResult<Self> {
        config.validate()?;

        let backend = DatabaseBackendType::from_url(&config.database_url).ok_or_else(|| {
            OrmError::Configuration(format!(
                "Unable to detect database backend from URL: {}",
                config.redacted_url()
            ))
        })?;

        let connection: Box<dyn DatabaseConnection> = match backend {
            DatabaseBackendType::PostgreSQL => Box::new(PostgresConnection::connect(config).await?),
            DatabaseBackendType::SQLite => Box::new(SqliteConnection::connect(config).await?),
        };

        tracing::info!(
            "Connected to {} at {} with {} entity types",
            backend,
            config.redacted_url(),
            registry.len()
        );
        Ok(Self::with_connection(connection, registry))
    }

    /// Wrap an already open connection
    pub fn with_connection(connection: Box<dyn DatabaseConnection>, registry: SchemaRegistry) -> Self {
        Self {
            inner: Arc::new(DatabaseInner {
                connection,
                registry,
                executed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
        }
    }

    /// Connect, run `body`, and close the connection whatever the outcome
    pub async fn scoped<F, Fut, T>(config: &DatabaseConfig, registry: SchemaRegistry, body: F) -> OrmResult<T>
    where
        F: FnOnce(Database) -> Fut,
        Fut: Future<Output = OrmResult<T>>,
    {
        let db = Self::connect(config, registry).await?;
        let result = body(db.clone()).await;
        db.close().await;
        result
    }

    /// Close the connection. Later entity construction and statements fail
    /// with a configuration error.
    pub async fn close(&self) {
        if !self.is_closed() {
            self.inner.connection.close().await;
            tracing::info!("Database connection closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.connection.is_closed()
    }

    pub fn dialect(&self) -> SqlDialect {
        self.inner.connection.dialect()
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.inner.registry
    }

    pub fn stats(&self) -> StatementStats {
        StatementStats {
            executed: self.inner.executed.load(Ordering::Relaxed),
            failed: self.inner.failed.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn ensure_open(&self) -> OrmResult<()> {
        if self.is_closed() {
            return Err(OrmError::Configuration("Database connection is closed".to_string()));
        }
        Ok(())
    }

    /// Execute one statement in its own transaction and return its rows
    pub async fn run(&self, statement: &Statement) -> OrmResult<Vec<Row>> {
        self.ensure_open()?;

        tracing::debug!(sql = %statement.sql, params = statement.params.len(), "Executing statement");
        self.inner.executed.fetch_add(1, Ordering::Relaxed);

        let result = self.inner.connection.run(statement).await;
        if result.is_err() {
            self.inner.failed.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Execute raw SQL without parameters, e.g. DDL
    pub async fn execute_raw(&self, sql: &str) -> OrmResult<Vec<Row>> {
        self.run(&Statement::new(sql, Vec::new())).await
    }

    fn registered<T: EntityType>(&self) -> OrmResult<&'static EntitySchema> {
        let schema = T::schema();
        if !self.inner.registry.contains(schema) {
            return Err(OrmError::Configuration(format!(
                "Entity type '{}' is not registered",
                schema.name
            )));
        }
        Ok(schema)
    }

    /// A new, unsaved instance of `T`
    pub fn new_entity<T: EntityType>(&self) -> OrmResult<Entity> {
        Entity::new(self.clone(), self.registered::<T>()?)
    }

    /// A handle to the stored `T` with the given id, loaded on first read
    pub fn entity<T: EntityType>(&self, id: i64) -> OrmResult<Entity> {
        Entity::bound(self.clone(), self.registered::<T>()?, id)
    }

    /// Same as `new_entity` / `entity`, looking the type up by name
    pub fn entity_by_name(&self, name: &str, id: Option<i64>) -> OrmResult<Entity> {
        let schema = self.inner.registry.resolve(name)?;
        match id {
            Some(id) => Entity::bound(self.clone(), schema, id),
            None => Entity::new(self.clone(), schema),
        }
    }

    /// Every stored row of `T`, each fully populated
    pub async fn all<T: EntityType>(&self) -> OrmResult<Vec<Entity>> {
        let schema = self.registered::<T>()?;
        self.fetch_all(schema).await
    }

    /// Same as `all`, looking the type up by name
    pub async fn all_by_name(&self, name: &str) -> OrmResult<Vec<Entity>> {
        let schema = self.inner.registry.resolve(name)?;
        self.fetch_all(schema).await
    }

    async fn fetch_all(&self, schema: &'static EntitySchema) -> OrmResult<Vec<Entity>> {
        let rows = self.run(&sql::select_all(self.dialect(), &schema.table_name())).await?;
        rows.into_iter()
            .map(|row| Entity::from_row(self.clone(), schema, row))
            .collect()
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("dialect", &self.dialect())
            .field("closed", &self.is_closed())
            .field("entities", &self.inner.registry.names())
            .field("stats", &self.stats())
            .finish()
    }
}
