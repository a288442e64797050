//! Entity - lazily loaded row with relationship resolution
//!
//! An `Entity` is the in-memory representative of one row. Attribute reads
//! are classified against the type's schema and routed to one of four
//! resolvers:
//!
//! - column: served from the field map under `<table>_<name>`
//! - parent: a handle to the referenced row, built from `<name>_id`
//! - children: `SELECT * FROM <child> WHERE <table>_id = ?`
//! - siblings: `SELECT * FROM <sibling> NATURAL JOIN <join> WHERE <table>_id = ?`
//!
//! Lifecycle:
//!
//! ```text
//! New --save--> Bound --first read--> Loaded
//!  (no id)      (id, not fetched)     (field map reflects storage)
//!
//! Bound | Loaded --delete--> Deleted
//! ```
//!
//! Reads are allowed in `New` (field map only), `Bound` (one load, then
//! `Loaded`) and `Loaded`; everything fails with `OrmError::State` once an
//! instance is `Deleted`.
//!
//! An entity has exactly one logical owner. Every read or write takes
//! `&mut self`; nothing inside is locked, and sharing one instance between
//! tasks requires the caller's own synchronization.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde_json::Value as JsonValue;

use crate::backends::{DatabaseValue, Row};
use crate::database::Database;
use crate::error::{OrmError, OrmResult};
use crate::schema::{join_table, AttributeKind, EntitySchema, Relation};
use crate::sql;

/// Lifecycle state of an entity instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityState {
    /// Constructed without an id, not yet persisted
    New,
    /// Has an id, field map not fetched yet
    Bound,
    /// Field map reflects the stored row
    Loaded,
    /// Row deleted from storage through this instance
    Deleted,
}

impl fmt::Display for EntityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityState::New => write!(f, "new"),
            EntityState::Bound => write!(f, "bound"),
            EntityState::Loaded => write!(f, "loaded"),
            EntityState::Deleted => write!(f, "deleted"),
        }
    }
}

/// Result of a generic attribute read
#[derive(Debug, Clone)]
pub enum Attribute {
    /// A column value, or an undeclared in-memory attribute
    Value(DatabaseValue),
    /// The referenced parent, `None` when the foreign key is NULL
    Parent(Option<Entity>),
    Children(Vec<Entity>),
    Siblings(Vec<Entity>),
}

impl Attribute {
    pub fn into_value(self) -> Option<DatabaseValue> {
        match self {
            Attribute::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_parent(self) -> Option<Entity> {
        match self {
            Attribute::Parent(parent) => parent,
            _ => None,
        }
    }

    /// The related instances of a children or siblings read
    pub fn into_entities(self) -> Option<Vec<Entity>> {
        match self {
            Attribute::Children(entities) | Attribute::Siblings(entities) => Some(entities),
            _ => None,
        }
    }
}

/// One row of one entity type
#[derive(Debug, Clone)]
pub struct Entity {
    db: Database,
    schema: &'static EntitySchema,
    id: Option<i64>,
    fields: Row,
    dirty: BTreeSet<String>,
    extra: HashMap<String, DatabaseValue>,
    state: EntityState,
}

impl Entity {
    pub(crate) fn new(db: Database, schema: &'static EntitySchema) -> OrmResult<Self> {
        db.ensure_open()?;
        Ok(Self {
            db,
            schema,
            id: None,
            fields: Row::new(),
            dirty: BTreeSet::new(),
            extra: HashMap::new(),
            state: EntityState::New,
        })
    }

    pub(crate) fn bound(db: Database, schema: &'static EntitySchema, id: i64) -> OrmResult<Self> {
        let mut entity = Self::new(db, schema)?;
        entity.id = Some(id);
        entity.state = EntityState::Bound;
        Ok(entity)
    }

    /// Build a fully populated instance from a result row
    pub(crate) fn from_row(db: Database, schema: &'static EntitySchema, row: Row) -> OrmResult<Self> {
        let primary_key = schema.primary_key();
        let id = row.get(&primary_key).and_then(DatabaseValue::as_i64).ok_or_else(|| {
            OrmError::Storage(format!("Row of '{}' has no integer '{}'", schema.table_name(), primary_key))
        })?;

        let mut entity = Self::bound(db, schema, id)?;
        entity.fields = row;
        entity.state = EntityState::Loaded;
        Ok(entity)
    }

    /// Primary key, `None` until the instance is saved
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub fn state(&self) -> EntityState {
        self.state
    }

    pub fn schema(&self) -> &'static EntitySchema {
        self.schema
    }

    pub fn type_name(&self) -> &'static str {
        self.schema.name
    }

    pub fn is_loaded(&self) -> bool {
        self.state == EntityState::Loaded
    }

    /// Whether any column or parent was written since the last save
    pub fn is_modified(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// The raw field map, keyed by qualified column name
    pub fn fields(&self) -> &Row {
        &self.fields
    }

    /// Field map as a JSON object
    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.fields
                .iter()
                .map(|(key, value)| (key.clone(), value.to_json()))
                .collect(),
        )
    }

    fn state_error(&self) -> OrmError {
        OrmError::State {
            entity: self.describe(),
            state: self.state.to_string(),
        }
    }

    fn unknown(&self, name: &str) -> OrmError {
        OrmError::UnknownAttribute {
            entity: self.schema.name.to_string(),
            attribute: name.to_string(),
        }
    }

    fn invalid_assignment(&self, name: &str, reason: impl Into<String>) -> OrmError {
        OrmError::InvalidAssignment {
            entity: self.schema.name.to_string(),
            attribute: name.to_string(),
            reason: reason.into(),
        }
    }

    fn describe(&self) -> String {
        match self.id {
            Some(id) => format!("{}({})", self.schema.name, id),
            None => format!("{}(new)", self.schema.name),
        }
    }

    fn ensure_not_deleted(&self) -> OrmResult<()> {
        if self.state == EntityState::Deleted {
            return Err(self.state_error());
        }
        Ok(())
    }

    /// Id of a persisted instance; relationship queries need one
    fn persisted_id(&self) -> OrmResult<i64> {
        match (self.state, self.id) {
            (EntityState::Bound | EntityState::Loaded, Some(id)) => Ok(id),
            _ => Err(self.state_error()),
        }
    }

    /// Fetch the stored row if not done yet
    ///
    /// Values written before the first load are kept on top of the fetched
    /// row. A missing row is `NotFound`; more than one row violates the
    /// primary key and is reported rather than silently collapsed.
    pub async fn load(&mut self) -> OrmResult<()> {
        self.ensure_not_deleted()?;
        if self.state != EntityState::Bound {
            return Ok(());
        }
        let id = self.persisted_id()?;
        let table = self.schema.table_name();

        tracing::debug!("Lazy loading {}", self.describe());
        let mut rows = self.db.run(&sql::select_by_id(self.db.dialect(), &table, id)).await?;

        let row = match rows.len() {
            0 => return Err(OrmError::NotFound { table, id }),
            1 => rows.remove(0),
            count => return Err(OrmError::MultipleRows { table, id, count }),
        };

        let pending: Vec<(String, DatabaseValue)> = self
            .dirty
            .iter()
            .filter_map(|key| self.fields.get(key).map(|value| (key.clone(), value.clone())))
            .collect();

        self.fields = row;
        self.fields.extend(pending);
        self.state = EntityState::Loaded;
        Ok(())
    }

    async fn prepare_read(&mut self) -> OrmResult<()> {
        self.ensure_not_deleted()?;
        self.load().await
    }

    /// Read any attribute by name
    ///
    /// Declared names are tried as column, parent, children and siblings in
    /// that order; undeclared names fall back to in-memory attributes set
    /// through `set`.
    pub async fn get(&mut self, name: &str) -> OrmResult<Attribute> {
        self.prepare_read().await?;

        match self.schema.classify(name) {
            Some(AttributeKind::Column) => self.read_column(name).map(Attribute::Value),
            Some(AttributeKind::Parent(relation)) => self.resolve_parent(relation).map(Attribute::Parent),
            Some(AttributeKind::Children(relation)) => {
                self.resolve_children(relation).await.map(Attribute::Children)
            }
            Some(AttributeKind::Siblings(relation)) => {
                self.resolve_siblings(relation).await.map(Attribute::Siblings)
            }
            None => self
                .extra
                .get(name)
                .cloned()
                .map(Attribute::Value)
                .ok_or_else(|| self.unknown(name)),
        }
    }

    /// Read a declared column
    pub async fn column(&mut self, name: &str) -> OrmResult<DatabaseValue> {
        self.prepare_read().await?;
        match self.schema.classify(name) {
            Some(AttributeKind::Column) => self.read_column(name),
            _ => Err(self.unknown(name)),
        }
    }

    /// Read a declared parent as an unloaded handle
    pub async fn parent(&mut self, name: &str) -> OrmResult<Option<Entity>> {
        self.prepare_read().await?;
        match self.schema.classify(name) {
            Some(AttributeKind::Parent(relation)) => self.resolve_parent(relation),
            _ => Err(self.unknown(name)),
        }
    }

    /// Read a declared child collection
    pub async fn children(&mut self, name: &str) -> OrmResult<Vec<Entity>> {
        self.prepare_read().await?;
        match self.schema.classify(name) {
            Some(AttributeKind::Children(relation)) => self.resolve_children(relation).await,
            _ => Err(self.unknown(name)),
        }
    }

    /// Read a declared sibling collection
    pub async fn siblings(&mut self, name: &str) -> OrmResult<Vec<Entity>> {
        self.prepare_read().await?;
        match self.schema.classify(name) {
            Some(AttributeKind::Siblings(relation)) => self.resolve_siblings(relation).await,
            _ => Err(self.unknown(name)),
        }
    }

    /// `<table>_created`, loading the row if needed
    pub async fn created(&mut self) -> OrmResult<DatabaseValue> {
        self.prepare_read().await?;
        self.read_field(&self.schema.created_column())
    }

    /// `<table>_updated`, loading the row if needed
    pub async fn updated(&mut self) -> OrmResult<DatabaseValue> {
        self.prepare_read().await?;
        self.read_field(&self.schema.updated_column())
    }

    fn read_field(&self, key: &str) -> OrmResult<DatabaseValue> {
        self.fields
            .get(key)
            .cloned()
            .ok_or_else(|| OrmError::MissingField(key.to_string()))
    }

    fn read_column(&self, name: &str) -> OrmResult<DatabaseValue> {
        self.read_field(&self.schema.column_key(name))
    }

    fn resolve_parent(&self, relation: Relation) -> OrmResult<Option<Entity>> {
        let key = EntitySchema::foreign_key(relation.name);
        let parent_id = match self.read_field(&key)? {
            DatabaseValue::Null => return Ok(None),
            value => value.as_i64().ok_or_else(|| {
                OrmError::Storage(format!("Foreign key '{}' holds a {} value", key, value.type_name()))
            })?,
        };

        let schema = self.db.registry().resolve(relation.target)?;
        Entity::bound(self.db.clone(), schema, parent_id).map(Some)
    }

    async fn resolve_children(&self, relation: Relation) -> OrmResult<Vec<Entity>> {
        let id = self.persisted_id()?;
        let child_schema = self.db.registry().resolve(relation.target)?;
        let statement = sql::select_children(
            self.db.dialect(),
            &child_schema.table_name(),
            &self.schema.table_name(),
            id,
        );

        tracing::debug!("Resolving {}.{}", self.describe(), relation.name);
        let rows = self.db.run(&statement).await?;
        rows.into_iter()
            .map(|row| Entity::from_row(self.db.clone(), child_schema, row))
            .collect()
    }

    async fn resolve_siblings(&self, relation: Relation) -> OrmResult<Vec<Entity>> {
        let id = self.persisted_id()?;
        let sibling_schema = self.db.registry().resolve(relation.target)?;
        let table = self.schema.table_name();
        let sibling_table = sibling_schema.table_name();
        let statement = sql::select_siblings(
            self.db.dialect(),
            &sibling_table,
            &join_table(&table, &sibling_table),
            &table,
            id,
        );

        tracing::debug!("Resolving {}.{}", self.describe(), relation.name);
        let rows = self.db.run(&statement).await?;

        // The join table's key back to this side is not a sibling column
        let link_key = self.schema.primary_key();
        rows.into_iter()
            .map(|mut row| {
                row.remove(&link_key);
                Entity::from_row(self.db.clone(), sibling_schema, row)
            })
            .collect()
    }

    /// Write an attribute
    ///
    /// Columns store the value under `<table>_<name>`; parents accept an
    /// integer id or NULL under `<name>_id`. Child and sibling collections
    /// cannot be assigned. Any other name becomes an in-memory attribute
    /// that is never persisted. No statement is issued.
    pub fn set(&mut self, name: &str, value: impl Into<DatabaseValue>) -> OrmResult<()> {
        self.ensure_not_deleted()?;
        let value = value.into();

        match self.schema.classify(name) {
            Some(AttributeKind::Column) => {
                let key = self.schema.column_key(name);
                self.write_field(key, value);
            }
            Some(AttributeKind::Parent(relation)) => {
                let value = match value {
                    DatabaseValue::Null => DatabaseValue::Null,
                    other => DatabaseValue::Int64(other.as_i64().ok_or_else(|| {
                        self.invalid_assignment(
                            name,
                            format!("expected an id or an entity, got {}", other.type_name()),
                        )
                    })?),
                };
                self.write_field(EntitySchema::foreign_key(relation.name), value);
            }
            Some(AttributeKind::Children(_)) | Some(AttributeKind::Siblings(_)) => {
                return Err(self.invalid_assignment(name, "relationship collections are read-only"));
            }
            None => {
                self.extra.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Point a parent reference at another entity, storing its id
    ///
    /// An unsaved parent has no id, so the foreign key becomes NULL.
    pub fn set_parent(&mut self, name: &str, parent: &Entity) -> OrmResult<()> {
        self.ensure_not_deleted()?;

        let relation = match self.schema.classify(name) {
            Some(AttributeKind::Parent(relation)) => relation,
            Some(_) => return Err(self.invalid_assignment(name, "not a parent reference")),
            None => return Err(self.unknown(name)),
        };

        if parent.schema.name != relation.target {
            return Err(self.invalid_assignment(
                name,
                format!("expected {}, got {}", relation.target, parent.schema.name),
            ));
        }

        self.write_field(EntitySchema::foreign_key(relation.name), DatabaseValue::from(parent.id));
        Ok(())
    }

    fn write_field(&mut self, key: String, value: DatabaseValue) {
        self.fields.insert(key.clone(), value);
        self.dirty.insert(key);
    }

    /// Persist the field map: insert when new, update otherwise
    ///
    /// An insert adopts the returned id and leaves the instance `Bound`, so
    /// the next read picks up columns filled in by storage defaults.
    pub async fn save(&mut self) -> OrmResult<()> {
        self.ensure_not_deleted()?;
        let table = self.schema.table_name();
        let dialect = self.db.dialect();

        match self.id {
            Some(id) => {
                if let Some(statement) = sql::update(dialect, &table, &self.fields, id) {
                    self.db.run(&statement).await?;
                }
                tracing::debug!("Updated {}", self.describe());
            }
            None => {
                let rows = self.db.run(&sql::insert(dialect, &table, &self.fields)).await?;
                let primary_key = self.schema.primary_key();
                let id = rows
                    .first()
                    .and_then(|row| row.get(&primary_key))
                    .and_then(DatabaseValue::as_i64)
                    .ok_or_else(|| OrmError::Storage(format!("Insert into '{}' returned no {}", table, primary_key)))?;

                self.id = Some(id);
                self.state = EntityState::Bound;
                tracing::debug!("Inserted {}", self.describe());
            }
        }

        self.dirty.clear();
        Ok(())
    }

    /// Delete the stored row; the instance becomes unusable
    ///
    /// Related rows are left untouched.
    pub async fn delete(&mut self) -> OrmResult<()> {
        self.ensure_not_deleted()?;
        let id = self.id.ok_or_else(|| OrmError::MissingPrimaryKey(self.describe()))?;

        let statement = sql::delete_by_id(self.db.dialect(), &self.schema.table_name(), id);
        self.db.run(&statement).await?;

        tracing::debug!("Deleted {}", self.describe());
        self.state = EntityState::Deleted;
        Ok(())
    }

    /// Re-parent existing rows of a child collection onto this instance
    ///
    /// Issues a single `UPDATE ... WHERE <child>_id IN (...)` and mirrors the
    /// new foreign key into each child's field map.
    pub async fn adopt(&mut self, name: &str, children: &mut [Entity]) -> OrmResult<()> {
        self.ensure_not_deleted()?;
        let relation = match self.schema.classify(name) {
            Some(AttributeKind::Children(relation)) => relation,
            _ => return Err(self.unknown(name)),
        };
        let id = self.persisted_id()?;

        let mut child_ids = Vec::with_capacity(children.len());
        for child in children.iter() {
            if child.schema.name != relation.target {
                return Err(self.invalid_assignment(
                    name,
                    format!("expected {}, got {}", relation.target, child.schema.name),
                ));
            }
            child_ids.push(child.id.ok_or_else(|| OrmError::MissingPrimaryKey(child.describe()))?);
        }

        let child_schema = self.db.registry().resolve(relation.target)?;
        let table = self.schema.table_name();
        let Some(statement) =
            sql::adopt_children(self.db.dialect(), &child_schema.table_name(), &table, id, &child_ids)
        else {
            return Ok(());
        };
        self.db.run(&statement).await?;

        let foreign_key = format!("{}_id", table);
        for child in children.iter_mut() {
            child.fields.insert(foreign_key.clone(), DatabaseValue::Int64(id));
        }
        Ok(())
    }
}
