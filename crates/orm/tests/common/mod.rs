//! Shared fixtures: an in-memory SQLite database with the blog schema

#![allow(dead_code)]

use lazy_orm::models::{self, SQLITE_SCHEMA};
use lazy_orm::{Database, DatabaseConfig, Entity, EntityType, SchemaRegistry};
use tracing_subscriber::EnvFilter;

pub const MEMORY_URL: &str = "sqlite::memory:";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn memory_config() -> DatabaseConfig {
    DatabaseConfig::new(MEMORY_URL)
}

/// Fresh database with every blog table created
pub async fn blog_db() -> Database {
    init_tracing();
    let db = Database::connect(&memory_config(), models::blog_registry().unwrap())
        .await
        .unwrap();
    for ddl in SQLITE_SCHEMA {
        db.execute_raw(ddl).await.unwrap();
    }
    db
}

/// Database for a custom registry; the caller creates the tables
pub async fn db_with(registry: SchemaRegistry) -> Database {
    init_tracing();
    Database::connect(&memory_config(), registry).await.unwrap()
}

/// Statements executed by `db` so far
pub fn executed(db: &Database) -> u64 {
    db.stats().executed
}

/// Insert a new `T` with the given column values and return it saved
pub async fn create<T: EntityType>(db: &Database, columns: &[(&str, &str)]) -> Entity {
    let mut entity = db.new_entity::<T>().unwrap();
    for (name, value) in columns {
        entity.set(name, *value).unwrap();
    }
    entity.save().await.unwrap();
    entity
}

/// Link two rows through a join table
pub async fn link(db: &Database, join_table: &str, left: (&str, i64), right: (&str, i64)) {
    db.execute_raw(&format!(
        r#"INSERT INTO "{}" ({}, {}) VALUES ({}, {})"#,
        join_table, left.0, right.0, left.1, right.1
    ))
    .await
    .unwrap();
}
