//! Blog walkthrough
//!
//! Builds a small section/category/post/comment/tag graph and walks it back
//! through lazily loaded relationships.
//!
//! ```text
//! DATABASE_URL=sqlite::memory: RUST_LOG=lazy_orm=debug cargo run --example blog
//! DATABASE_URL=postgres://localhost/blog cargo run --example blog
//! ```
//!
//! The blog tables are created on the fly when missing, on SQLite and on
//! PostgreSQL alike.

use lazy_orm::models::{self, Category, Comment, Post, Section, Tag, User};
use lazy_orm::{Database, DatabaseConfig, DatabaseValue, Entity, OrmError, OrmResult};
use tracing_subscriber::EnvFilter;

async fn create(mut entity: Entity, columns: &[(&str, DatabaseValue)]) -> OrmResult<Entity> {
    for (name, value) in columns {
        entity.set(name, value.clone())?;
    }
    entity.save().await?;
    Ok(entity)
}

async fn populate(db: &Database) -> OrmResult<Entity> {
    let section = create(db.new_entity::<Section>()?, &[("title", "News".into())]).await?;

    let mut category = db.new_entity::<Category>()?;
    category.set_parent("section", &section)?;
    let category = create(category, &[("title", "Tech".into())]).await?;

    let user = create(
        db.new_entity::<User>()?,
        &[
            ("name", "Ada".into()),
            ("email", "ada@example.com".into()),
            ("age", 36i64.into()),
        ],
    )
    .await?;

    let mut posts = Vec::new();
    for (title, content) in [("Lazy rows", "Loaded on first read"), ("Join tables", "Sorted names")] {
        let mut post = db.new_entity::<Post>()?;
        post.set_parent("category", &category)?;
        let post = create(post, &[("title", title.into()), ("content", content.into())]).await?;

        let mut comment = db.new_entity::<Comment>()?;
        comment.set_parent("post", &post)?;
        comment.set_parent("user", &user)?;
        create(comment, &[("text", format!("Nice post about {}", title).into())]).await?;
        posts.push(post);
    }

    let rust = create(db.new_entity::<Tag>()?, &[("name", "rust".into())]).await?;
    let sql = create(db.new_entity::<Tag>()?, &[("name", "sql".into())]).await?;

    let links = [(&posts[0], &rust), (&posts[0], &sql), (&posts[1], &sql)];
    for (post, tag) in links {
        if let (Some(post_id), Some(tag_id)) = (post.id(), tag.id()) {
            db.execute_raw(&format!(
                r#"INSERT INTO "post__tag" (post_id, tag_id) VALUES ({}, {})"#,
                post_id, tag_id
            ))
            .await?;
        }
    }

    Ok(section)
}

async fn walk(mut section: Entity) -> OrmResult<()> {
    println!("Section {}", section.column("title").await?.to_json());

    for mut category in section.children("categories").await? {
        println!("  Category {}", category.column("title").await?.to_json());

        for mut post in category.children("posts").await? {
            let tags: Vec<String> = post
                .siblings("tags")
                .await?
                .iter()
                .map(|tag| tag.to_json()["tag_name"].to_string())
                .collect();
            println!("    Post {} [{}]", post.column("title").await?.to_json(), tags.join(", "));

            for mut comment in post.children("comments").await? {
                let author = match comment.parent("user").await? {
                    Some(mut user) => user.column("name").await?.to_json().to_string(),
                    None => "anonymous".to_string(),
                };
                println!("      {} says {}", author, comment.column("text").await?.to_json());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> OrmResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = DatabaseConfig::from_env()?;

    Database::scoped(&config, models::blog_registry()?, |db| async move {
        for ddl in models::blog_schema(db.dialect()) {
            db.execute_raw(ddl).await?;
        }

        let section = populate(&db).await?;
        walk(section).await?;

        for mut tag in db.all::<Tag>().await? {
            let posts = tag.siblings("posts").await?;
            println!("Tag {} is on {} post(s)", tag.column("name").await?.to_json(), posts.len());
        }

        let stats = db.stats();
        println!("{} statements executed, {} failed", stats.executed, stats.failed);
        Ok::<_, OrmError>(())
    })
    .await
}
