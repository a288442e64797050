//! Schema declarations and naming conventions
//!
//! Each entity type declares, once and statically, which attribute names are
//! plain columns, parent references, child collections and sibling
//! collections. Every table, key and join-table name is derived from those
//! declarations:
//!
//! - table name: lowercased type name (`Post` -> `post`)
//! - primary key: `<table>_id`
//! - column key: `<table>_<column>`
//! - parent foreign key: `<parent>_id`
//! - timestamps: `<table>_created`, `<table>_updated`
//! - join table: both table names sorted and joined with `__`

use crate::error::{OrmError, OrmResult};

/// Separator between the two table names of a join table
pub const JOIN_TABLE_SEPARATOR: &str = "__";

/// A named relationship to another entity type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relation {
    /// Attribute name on the declaring type
    pub name: &'static str,
    /// Type name of the related entity, as registered
    pub target: &'static str,
}

impl Relation {
    pub const fn new(name: &'static str, target: &'static str) -> Self {
        Self { name, target }
    }
}

/// Static per-type metadata
#[derive(Debug, PartialEq, Eq)]
pub struct EntitySchema {
    /// Type name, e.g. `Post`
    pub name: &'static str,
    /// Attributes stored directly on the row
    pub columns: &'static [&'static str],
    /// Many-to-one references stored as `<name>_id` on this table
    pub parents: &'static [Relation],
    /// One-to-many collections; the related table holds `<this table>_id`
    pub children: &'static [Relation],
    /// Many-to-many collections through a join table
    pub siblings: &'static [Relation],
}

/// Classification of an attribute name against a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeKind {
    Column,
    Parent(Relation),
    Children(Relation),
    Siblings(Relation),
}

impl EntitySchema {
    /// Table name for this type
    pub fn table_name(&self) -> String {
        self.name.to_lowercase()
    }

    /// Primary key column name
    pub fn primary_key(&self) -> String {
        format!("{}_id", self.table_name())
    }

    /// Field map key of a declared column
    pub fn column_key(&self, column: &str) -> String {
        format!("{}_{}", self.table_name(), column)
    }

    /// Field map key of a declared parent
    pub fn foreign_key(parent: &str) -> String {
        format!("{}_id", parent)
    }

    /// Creation timestamp column
    pub fn created_column(&self) -> String {
        format!("{}_created", self.table_name())
    }

    /// Update timestamp column
    pub fn updated_column(&self) -> String {
        format!("{}_updated", self.table_name())
    }

    /// Classify an attribute name; columns win over parents, parents over
    /// children, children over siblings.
    pub fn classify(&self, name: &str) -> Option<AttributeKind> {
        if self.columns.contains(&name) {
            return Some(AttributeKind::Column);
        }
        if let Some(relation) = self.parents.iter().find(|r| r.name == name) {
            return Some(AttributeKind::Parent(*relation));
        }
        if let Some(relation) = self.children.iter().find(|r| r.name == name) {
            return Some(AttributeKind::Children(*relation));
        }
        if let Some(relation) = self.siblings.iter().find(|r| r.name == name) {
            return Some(AttributeKind::Siblings(*relation));
        }
        None
    }

    /// Every relation this type declares
    pub fn relations(&self) -> impl Iterator<Item = &'static Relation> {
        self.parents.iter().chain(self.children).chain(self.siblings)
    }

    /// Check that every derived identifier is safe to splice into SQL
    pub fn validate(&self) -> OrmResult<()> {
        validate_identifier(&self.table_name())?;
        for column in self.columns {
            validate_identifier(&self.column_key(column))?;
        }
        for relation in self.relations() {
            validate_identifier(relation.name)?;
        }
        Ok(())
    }
}

/// Implemented by marker types that carry a schema declaration
pub trait EntityType {
    fn schema() -> &'static EntitySchema;
}

/// Join table name for a sibling relation; independent of argument order
pub fn join_table(a: &str, b: &str) -> String {
    let (first, second) = if a <= b { (a, b) } else { (b, a) };
    format!("{}{}{}", first, JOIN_TABLE_SEPARATOR, second)
}

/// Validate that an identifier is `[A-Za-z_][A-Za-z0-9_]*`
pub fn validate_identifier(identifier: &str) -> OrmResult<()> {
    let mut chars = identifier.chars();
    let valid_start = chars
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);

    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(OrmError::Configuration(format!(
            "'{}' is not a valid SQL identifier",
            identifier
        )));
    }

    // PostgreSQL truncates identifiers beyond 63 bytes
    if identifier.len() > 63 {
        return Err(OrmError::Configuration(format!(
            "Identifier '{}' is too long (max 63 characters)",
            identifier
        )));
    }

    Ok(())
}
