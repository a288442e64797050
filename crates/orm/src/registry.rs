//! Schema Registry - explicit mapping from type name to schema declaration
//!
//! Relationship targets are resolved through this registry, never through a
//! global namespace. The registry is built and validated once at startup.

use std::collections::HashMap;

use crate::error::{OrmError, OrmResult};
use crate::schema::{EntitySchema, EntityType};

/// Immutable set of registered entity schemas
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<&'static str, &'static EntitySchema>,
}

impl SchemaRegistry {
    /// Start building a registry
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Look up a schema by type name
    pub fn get(&self, name: &str) -> Option<&'static EntitySchema> {
        self.schemas.get(name).copied()
    }

    /// Look up a schema by type name, failing with a configuration error
    pub fn resolve(&self, name: &str) -> OrmResult<&'static EntitySchema> {
        self.get(name)
            .ok_or_else(|| OrmError::Configuration(format!("Entity type '{}' is not registered", name)))
    }

    /// Whether the given schema is the one registered under its name
    pub fn contains(&self, schema: &EntitySchema) -> bool {
        self.get(schema.name).map(|registered| registered == schema).unwrap_or(false)
    }

    /// Registered type names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.schemas.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

/// Collects schemas, then validates them as a whole in `build`
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    schemas: Vec<&'static EntitySchema>,
}

impl SchemaRegistryBuilder {
    /// Register a typed entity
    pub fn register<T: EntityType>(self) -> Self {
        self.register_schema(T::schema())
    }

    /// Register a schema declaration directly
    pub fn register_schema(mut self, schema: &'static EntitySchema) -> Self {
        self.schemas.push(schema);
        self
    }

    /// Validate every declaration and produce the registry
    ///
    /// Fails on duplicate type names, duplicate table names, invalid
    /// identifiers, and relations whose target type is not registered.
    pub fn build(self) -> OrmResult<SchemaRegistry> {
        let mut schemas: HashMap<&'static str, &'static EntitySchema> = HashMap::new();
        let mut tables: HashMap<String, &'static str> = HashMap::new();

        for &schema in &self.schemas {
            schema.validate()?;

            if schemas.insert(schema.name, schema).is_some() {
                return Err(OrmError::Configuration(format!(
                    "Entity type '{}' is registered twice",
                    schema.name
                )));
            }
            if let Some(other) = tables.insert(schema.table_name(), schema.name) {
                return Err(OrmError::Configuration(format!(
                    "Entity types '{}' and '{}' map to the same table '{}'",
                    other,
                    schema.name,
                    schema.table_name()
                )));
            }
        }

        for &schema in &self.schemas {
            for relation in schema.relations() {
                if !schemas.contains_key(relation.target) {
                    return Err(OrmError::Configuration(format!(
                        "{}.{} refers to unregistered entity type '{}'",
                        schema.name, relation.name, relation.target
                    )));
                }
            }
        }

        tracing::debug!("Schema registry built with {} entity types", schemas.len());
        Ok(SchemaRegistry { schemas })
    }
}
