//! Connection lifecycle, factories and statement execution

mod common;

use std::sync::Mutex;

use common::{blog_db, create, db_with, memory_config};
use lazy_orm::models::{self, Section, Tag};
use lazy_orm::{
    Database, DatabaseConfig, DatabaseValue, EntitySchema, EntityState, OrmError, SchemaRegistry, SqlDialect,
};

#[tokio::test]
async fn test_connect_picks_backend_from_url() {
    let db = blog_db().await;
    assert_eq!(db.dialect(), SqlDialect::SQLite);
    assert!(!db.is_closed());

    let err = Database::connect(&DatabaseConfig::new("mysql://localhost/blog"), models::blog_registry().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Configuration(msg) if msg.contains("backend")));

    let err = Database::connect(&DatabaseConfig::new("  "), models::blog_registry().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, OrmError::Configuration(_)));
}

#[tokio::test]
async fn test_closed_database_rejects_everything() {
    let db = blog_db().await;
    let saved = create::<Section>(&db, &[("title", "News")]).await;
    let mut bound = db.entity::<Section>(saved.id().unwrap()).unwrap();

    db.close().await;
    assert!(db.is_closed());

    assert!(matches!(db.new_entity::<Section>(), Err(OrmError::Configuration(_))));
    assert!(matches!(db.entity::<Section>(1), Err(OrmError::Configuration(_))));
    assert!(matches!(bound.load().await, Err(OrmError::Configuration(_))));
    assert!(matches!(db.all::<Section>().await, Err(OrmError::Configuration(_))));

    // closing twice is harmless
    db.close().await;
}

#[tokio::test]
async fn test_scoped_closes_on_success_and_failure() {
    let slot: Mutex<Option<Database>> = Mutex::new(None);

    let value = Database::scoped(&memory_config(), models::blog_registry().unwrap(), |db| {
        *slot.lock().unwrap() = Some(db.clone());
        async move {
            db.execute_raw("CREATE TABLE probe (probe_id INTEGER PRIMARY KEY)").await?;
            Ok::<_, OrmError>(7)
        }
    })
    .await
    .unwrap();
    assert_eq!(value, 7);
    assert!(slot.lock().unwrap().take().unwrap().is_closed());

    let result: Result<(), OrmError> = Database::scoped(&memory_config(), models::blog_registry().unwrap(), |db| {
        *slot.lock().unwrap() = Some(db.clone());
        async move {
            db.execute_raw("SELECT * FROM missing_table").await?;
            Ok::<_, OrmError>(())
        }
    })
    .await;
    assert!(matches!(result, Err(OrmError::Storage(_))));
    assert!(slot.lock().unwrap().take().unwrap().is_closed());
}

#[tokio::test]
async fn test_storage_errors_are_counted() {
    let db = blog_db().await;
    let before = db.stats();

    let err = db.execute_raw("SELECT * FROM nowhere").await.unwrap_err();
    assert!(matches!(err, OrmError::Storage(_)));

    let after = db.stats();
    assert_eq!(after.executed, before.executed + 1);
    assert_eq!(after.failed, before.failed + 1);

    // the connection is still usable after a rollback
    assert!(db.all::<Section>().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unregistered_types_rejected() {
    static WIDGET: EntitySchema = EntitySchema {
        name: "Widget",
        columns: &["label"],
        parents: &[],
        children: &[],
        siblings: &[],
    };

    let registry = SchemaRegistry::builder().register_schema(&WIDGET).build().unwrap();
    let db = db_with(registry).await;

    assert!(db.entity_by_name("Widget", None).is_ok());
    assert!(matches!(db.new_entity::<Tag>(), Err(OrmError::Configuration(_))));
    assert!(matches!(db.entity::<Section>(1), Err(OrmError::Configuration(_))));
    assert!(matches!(db.entity_by_name("Tag", Some(1)), Err(OrmError::Configuration(_))));
    assert!(matches!(db.all_by_name("Tag").await, Err(OrmError::Configuration(_))));
}

#[tokio::test]
async fn test_fetch_all_returns_populated_instances() {
    let db = blog_db().await;
    for name in ["rust", "sql", "go"] {
        create::<Tag>(&db, &[("name", name)]).await;
    }

    let tags = db.all::<Tag>().await.unwrap();
    assert_eq!(tags.len(), 3);
    assert!(tags.iter().all(|tag| tag.state() == EntityState::Loaded));

    let by_name = db.all_by_name("Tag").await.unwrap();
    let mut names: Vec<DatabaseValue> = by_name
        .iter()
        .map(|tag| tag.fields()["tag_name"].clone())
        .collect();
    names.sort_by_key(|n| n.as_str().map(str::to_string));
    assert_eq!(
        names,
        vec![DatabaseValue::from("go"), DatabaseValue::from("rust"), DatabaseValue::from("sql")]
    );
}

#[tokio::test]
async fn test_entity_by_name() {
    let db = blog_db().await;
    let saved = create::<Tag>(&db, &[("name", "rust")]).await;

    let mut tag = db.entity_by_name("Tag", saved.id()).unwrap();
    assert_eq!(tag.state(), EntityState::Bound);
    assert_eq!(tag.column("name").await.unwrap(), DatabaseValue::from("rust"));

    let fresh = db.entity_by_name("Tag", None).unwrap();
    assert_eq!(fresh.state(), EntityState::New);
    assert_eq!(fresh.id(), None);
}
