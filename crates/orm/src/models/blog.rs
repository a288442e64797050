//! Blog schema
//!
//! ```text
//! Section 1--* Category 1--* Post 1--* Comment *--1 User
//!                  |           *
//!                  |           |  post__tag
//!                  |           *
//!                  +--* Article *--* Tag   (article__tag)
//! ```

use crate::backends::SqlDialect;
use crate::error::OrmResult;
use crate::registry::SchemaRegistry;
use crate::schema::{EntitySchema, EntityType, Relation};

macro_rules! entity_type {
    ($marker:ident, $schema:ident) => {
        #[derive(Debug, Clone, Copy)]
        pub struct $marker;

        impl EntityType for $marker {
            fn schema() -> &'static EntitySchema {
                &$schema
            }
        }
    };
}

pub static SECTION: EntitySchema = EntitySchema {
    name: "Section",
    columns: &["title"],
    parents: &[],
    children: &[Relation::new("categories", "Category")],
    siblings: &[],
};

pub static CATEGORY: EntitySchema = EntitySchema {
    name: "Category",
    columns: &["title"],
    parents: &[Relation::new("section", "Section")],
    children: &[
        Relation::new("posts", "Post"),
        Relation::new("articles", "Article"),
    ],
    siblings: &[],
};

pub static POST: EntitySchema = EntitySchema {
    name: "Post",
    columns: &["content", "title"],
    parents: &[Relation::new("category", "Category")],
    children: &[Relation::new("comments", "Comment")],
    siblings: &[Relation::new("tags", "Tag")],
};

pub static COMMENT: EntitySchema = EntitySchema {
    name: "Comment",
    columns: &["text"],
    parents: &[Relation::new("post", "Post"), Relation::new("user", "User")],
    children: &[],
    siblings: &[],
};

pub static TAG: EntitySchema = EntitySchema {
    name: "Tag",
    columns: &["name"],
    parents: &[],
    children: &[],
    siblings: &[
        Relation::new("posts", "Post"),
        Relation::new("articles", "Article"),
    ],
};

pub static USER: EntitySchema = EntitySchema {
    name: "User",
    columns: &["name", "email", "age"],
    parents: &[],
    children: &[Relation::new("comments", "Comment")],
    siblings: &[],
};

pub static ARTICLE: EntitySchema = EntitySchema {
    name: "Article",
    columns: &["title", "text"],
    parents: &[Relation::new("category", "Category")],
    children: &[],
    siblings: &[Relation::new("tags", "Tag")],
};

entity_type!(Section, SECTION);
entity_type!(Category, CATEGORY);
entity_type!(Post, POST);
entity_type!(Comment, COMMENT);
entity_type!(Tag, TAG);
entity_type!(User, USER);
entity_type!(Article, ARTICLE);

/// Registry holding every blog entity type
pub fn blog_registry() -> OrmResult<SchemaRegistry> {
    SchemaRegistry::builder()
        .register::<Section>()
        .register::<Category>()
        .register::<Post>()
        .register::<Comment>()
        .register::<Tag>()
        .register::<User>()
        .register::<Article>()
        .build()
}

/// Blog table definitions for the given dialect, one statement per entry
pub fn blog_schema(dialect: SqlDialect) -> &'static [&'static str] {
    match dialect {
        SqlDialect::PostgreSQL => POSTGRES_SCHEMA,
        SqlDialect::SQLite => SQLITE_SCHEMA,
    }
}

/// SQLite DDL for the blog schema
///
/// Join tables carry no key of their own so a natural join only matches on
/// the two foreign keys. Deleting a row never removes other rows: parent
/// references fall back to NULL and join-table links block the delete.
pub const SQLITE_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "section" (
        section_id INTEGER PRIMARY KEY AUTOINCREMENT,
        section_title TEXT,
        section_created TEXT DEFAULT CURRENT_TIMESTAMP,
        section_updated TEXT DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "category" (
        category_id INTEGER PRIMARY KEY AUTOINCREMENT,
        category_title TEXT,
        section_id INTEGER REFERENCES "section" (section_id) ON DELETE SET NULL,
        category_created TEXT DEFAULT CURRENT_TIMESTAMP,
        category_updated TEXT DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "post" (
        post_id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_title TEXT,
        post_content TEXT,
        category_id INTEGER REFERENCES "category" (category_id) ON DELETE SET NULL,
        post_created TEXT DEFAULT CURRENT_TIMESTAMP,
        post_updated TEXT DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "user" (
        user_id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_name TEXT,
        user_email TEXT,
        user_age INTEGER,
        user_created TEXT DEFAULT CURRENT_TIMESTAMP,
        user_updated TEXT DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "comment" (
        comment_id INTEGER PRIMARY KEY AUTOINCREMENT,
        comment_text TEXT,
        post_id INTEGER REFERENCES "post" (post_id) ON DELETE SET NULL,
        user_id INTEGER REFERENCES "user" (user_id) ON DELETE SET NULL,
        comment_created TEXT DEFAULT CURRENT_TIMESTAMP,
        comment_updated TEXT DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "tag" (
        tag_id INTEGER PRIMARY KEY AUTOINCREMENT,
        tag_name TEXT,
        tag_created TEXT DEFAULT CURRENT_TIMESTAMP,
        tag_updated TEXT DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "article" (
        article_id INTEGER PRIMARY KEY AUTOINCREMENT,
        article_title TEXT,
        article_text TEXT,
        category_id INTEGER REFERENCES "category" (category_id) ON DELETE SET NULL,
        article_created TEXT DEFAULT CURRENT_TIMESTAMP,
        article_updated TEXT DEFAULT CURRENT_TIMESTAMP
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "post__tag" (
        post_id INTEGER NOT NULL REFERENCES "post" (post_id) ON DELETE RESTRICT,
        tag_id INTEGER NOT NULL REFERENCES "tag" (tag_id) ON DELETE RESTRICT,
        PRIMARY KEY (post_id, tag_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "article__tag" (
        article_id INTEGER NOT NULL REFERENCES "article" (article_id) ON DELETE RESTRICT,
        tag_id INTEGER NOT NULL REFERENCES "tag" (tag_id) ON DELETE RESTRICT,
        PRIMARY KEY (article_id, tag_id)
    )"#,
];

/// PostgreSQL DDL for the blog schema, same shape and delete rules as
/// [`SQLITE_SCHEMA`]
pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS "section" (
        section_id SERIAL PRIMARY KEY,
        section_title TEXT,
        section_created TIMESTAMPTZ NOT NULL DEFAULT now(),
        section_updated TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "category" (
        category_id SERIAL PRIMARY KEY,
        category_title TEXT,
        section_id INTEGER REFERENCES "section" (section_id) ON DELETE SET NULL,
        category_created TIMESTAMPTZ NOT NULL DEFAULT now(),
        category_updated TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "post" (
        post_id SERIAL PRIMARY KEY,
        post_title TEXT,
        post_content TEXT,
        category_id INTEGER REFERENCES "category" (category_id) ON DELETE SET NULL,
        post_created TIMESTAMPTZ NOT NULL DEFAULT now(),
        post_updated TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "user" (
        user_id SERIAL PRIMARY KEY,
        user_name TEXT,
        user_email TEXT,
        user_age INTEGER,
        user_created TIMESTAMPTZ NOT NULL DEFAULT now(),
        user_updated TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "comment" (
        comment_id SERIAL PRIMARY KEY,
        comment_text TEXT,
        post_id INTEGER REFERENCES "post" (post_id) ON DELETE SET NULL,
        user_id INTEGER REFERENCES "user" (user_id) ON DELETE SET NULL,
        comment_created TIMESTAMPTZ NOT NULL DEFAULT now(),
        comment_updated TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "tag" (
        tag_id SERIAL PRIMARY KEY,
        tag_name TEXT,
        tag_created TIMESTAMPTZ NOT NULL DEFAULT now(),
        tag_updated TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "article" (
        article_id SERIAL PRIMARY KEY,
        article_title TEXT,
        article_text TEXT,
        category_id INTEGER REFERENCES "category" (category_id) ON DELETE SET NULL,
        article_created TIMESTAMPTZ NOT NULL DEFAULT now(),
        article_updated TIMESTAMPTZ NOT NULL DEFAULT now()
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "post__tag" (
        post_id INTEGER NOT NULL REFERENCES "post" (post_id) ON DELETE RESTRICT,
        tag_id INTEGER NOT NULL REFERENCES "tag" (tag_id) ON DELETE RESTRICT,
        PRIMARY KEY (post_id, tag_id)
    )"#,
    r#"CREATE TABLE IF NOT EXISTS "article__tag" (
        article_id INTEGER NOT NULL REFERENCES "article" (article_id) ON DELETE RESTRICT,
        tag_id INTEGER NOT NULL REFERENCES "tag" (tag_id) ON DELETE RESTRICT,
        PRIMARY KEY (article_id, tag_id)
    )"#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::join_table;

    #[test]
    fn test_blog_registry_builds() {
        let registry = blog_registry().unwrap();
        assert_eq!(
            registry.names(),
            vec!["Article", "Category", "Comment", "Post", "Section", "Tag", "User"]
        );
    }

    #[test]
    fn test_blog_join_tables() {
        assert_eq!(join_table(&POST.table_name(), &TAG.table_name()), "post__tag");
        assert_eq!(join_table(&TAG.table_name(), &ARTICLE.table_name()), "article__tag");
    }

    #[test]
    fn test_schemas_cover_the_same_tables() {
        let sqlite = blog_schema(SqlDialect::SQLite);
        let postgres = blog_schema(SqlDialect::PostgreSQL);
        assert_eq!(sqlite.len(), postgres.len());

        for (lite, pg) in sqlite.iter().zip(postgres) {
            let header = |ddl: &str| ddl.lines().next().unwrap_or_default().to_string();
            assert_eq!(header(*lite), header(*pg));
        }
        assert!(postgres.iter().all(|ddl| !ddl.contains("CASCADE")));
        assert!(sqlite.iter().all(|ddl| !ddl.contains("CASCADE")));
    }
}
