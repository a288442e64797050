//! # lazy-orm: lazily loaded entities with relationship resolution
//!
//! Maps rows of a relational schema to in-memory [`Entity`] instances. Each
//! entity type declares its columns, parent references, child collections
//! and many-to-many sibling collections once, as a static [`EntitySchema`];
//! attribute reads are routed by that declaration to a column lookup or to
//! a relationship query, and rows are fetched only when first needed.
//!
//! ```no_run
//! use lazy_orm::{models, Database, DatabaseConfig, OrmError, OrmResult};
//!
//! # async fn demo() -> OrmResult<()> {
//! let config = DatabaseConfig::from_env()?;
//! Database::scoped(&config, models::blog_registry()?, |db| async move {
//!     let mut section = db.new_entity::<models::Section>()?;
//!     section.set("title", "News")?;
//!     section.save().await?;
//!
//!     for category in section.children("categories").await? {
//!         println!("{:?}", category.id());
//!     }
//!     Ok::<_, OrmError>(())
//! })
//! .await
//! # }
//! ```

pub mod backends;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod models;
pub mod registry;
pub mod schema;
pub mod sql;

pub use backends::{DatabaseBackendType, DatabaseConnection, DatabaseValue, Row, SqlDialect};
pub use config::{ConfigError, DatabaseConfig};
pub use database::{Database, StatementStats};
pub use entity::{Attribute, Entity, EntityState};
pub use error::{OrmError, OrmResult};
pub use registry::{SchemaRegistry, SchemaRegistryBuilder};
pub use schema::{join_table, AttributeKind, EntitySchema, EntityType, Relation};
pub use sql::Statement;
