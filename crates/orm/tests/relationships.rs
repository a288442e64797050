//! Parent, children and sibling resolution over the blog schema

mod common;

use common::{blog_db, create, executed, link};
use lazy_orm::models::{Article, Category, Comment, Post, Section, Tag, User};
use lazy_orm::{DatabaseValue, EntityState, OrmError};

#[tokio::test]
async fn test_section_category_scenario() {
    let db = blog_db().await;
    let section = create::<Section>(&db, &[("title", "News")]).await;
    assert_eq!(section.id(), Some(1));

    let mut category = db.new_entity::<Category>().unwrap();
    category.set("title", "Tech").unwrap();
    category.set_parent("section", &section).unwrap();
    category.save().await.unwrap();

    let before = executed(&db);
    let parent = category.parent("section").await.unwrap().unwrap();

    assert_eq!(parent.id(), Some(1));
    assert_eq!(parent.state(), EntityState::Bound);
    assert_eq!(parent.type_name(), "Section");
    // only the category's own lazy load
    assert_eq!(executed(&db), before + 1);
}

#[tokio::test]
async fn test_parent_by_entity_equals_parent_by_id() {
    let db = blog_db().await;
    let section = create::<Section>(&db, &[("title", "News")]).await;

    let mut by_entity = db.new_entity::<Category>().unwrap();
    by_entity.set_parent("section", &section).unwrap();

    let mut by_id = db.new_entity::<Category>().unwrap();
    by_id.set("section", section.id().unwrap()).unwrap();

    assert_eq!(by_entity.fields().get("section_id"), Some(&DatabaseValue::Int64(1)));
    assert_eq!(by_entity.fields(), by_id.fields());
}

#[tokio::test]
async fn test_parent_handle_loads_on_first_read() {
    let db = blog_db().await;
    let section = create::<Section>(&db, &[("title", "News")]).await;
    let mut category = db.new_entity::<Category>().unwrap();
    category.set("title", "Tech").unwrap();
    category.set_parent("section", &section).unwrap();
    category.save().await.unwrap();

    let mut parent = category.parent("section").await.unwrap().unwrap();
    let before = executed(&db);
    assert_eq!(parent.column("title").await.unwrap(), DatabaseValue::from("News"));
    assert_eq!(executed(&db), before + 1);
}

#[tokio::test]
async fn test_unsaved_or_cleared_parent() {
    let db = blog_db().await;
    let unsaved = db.new_entity::<Section>().unwrap();

    let mut category = db.new_entity::<Category>().unwrap();
    category.set_parent("section", &unsaved).unwrap();
    assert_eq!(category.fields().get("section_id"), Some(&DatabaseValue::Null));
    assert!(category.parent("section").await.unwrap().is_none());

    category.set("section", DatabaseValue::Null).unwrap();
    assert!(category.parent("section").await.unwrap().is_none());
}

#[tokio::test]
async fn test_parent_missing_from_field_map() {
    let db = blog_db().await;
    let mut category = db.new_entity::<Category>().unwrap();

    let err = category.parent("section").await.unwrap_err();
    assert_eq!(err, OrmError::MissingField("section_id".to_string()));
}

#[tokio::test]
async fn test_invalid_parent_assignments() {
    let db = blog_db().await;
    let tag = create::<Tag>(&db, &[("name", "rust")]).await;
    let mut post = db.new_entity::<Post>().unwrap();

    assert!(matches!(post.set("category", "seven"), Err(OrmError::InvalidAssignment { .. })));
    assert!(matches!(
        post.set_parent("category", &tag),
        Err(OrmError::InvalidAssignment { .. })
    ));
    assert!(matches!(
        post.set_parent("title", &tag),
        Err(OrmError::InvalidAssignment { .. })
    ));
    assert!(matches!(
        post.set_parent("author", &tag),
        Err(OrmError::UnknownAttribute { .. })
    ));
    assert!(!post.is_modified());
}

#[tokio::test]
async fn test_collections_are_read_only() {
    let db = blog_db().await;
    let mut post = db.new_entity::<Post>().unwrap();

    assert!(matches!(post.set("comments", 1i64), Err(OrmError::InvalidAssignment { .. })));
    assert!(matches!(post.set("tags", 1i64), Err(OrmError::InvalidAssignment { .. })));
}

#[tokio::test]
async fn test_children_are_fully_populated() {
    let db = blog_db().await;
    let post = create::<Post>(&db, &[("title", "Wind")]).await;
    let other = create::<Post>(&db, &[("title", "Rain")]).await;

    for (target, text) in [(&post, "first"), (&post, "second"), (&post, "third"), (&other, "elsewhere")] {
        let mut comment = db.new_entity::<Comment>().unwrap();
        comment.set("text", text).unwrap();
        comment.set_parent("post", target).unwrap();
        comment.save().await.unwrap();
    }

    let mut post = db.entity::<Post>(post.id().unwrap()).unwrap();
    post.load().await.unwrap();

    let before = executed(&db);
    let mut comments = post.children("comments").await.unwrap();
    assert_eq!(executed(&db), before + 1);
    assert_eq!(comments.len(), 3);

    let mut texts = Vec::new();
    for comment in comments.iter_mut() {
        assert_eq!(comment.state(), EntityState::Loaded);
        assert_eq!(
            comment.fields().get("comment_id").and_then(DatabaseValue::as_i64),
            comment.id()
        );
        texts.push(comment.column("text").await.unwrap());
        comment.created().await.unwrap();
    }
    assert_eq!(executed(&db), before + 1);

    texts.sort_by_key(|t| t.as_str().map(str::to_string));
    assert_eq!(
        texts,
        vec![
            DatabaseValue::from("first"),
            DatabaseValue::from("second"),
            DatabaseValue::from("third")
        ]
    );
}

#[tokio::test]
async fn test_children_query_every_call() {
    let db = blog_db().await;
    let mut user = create::<User>(&db, &[("name", "Ada")]).await;
    assert!(user.children("comments").await.unwrap().is_empty());

    let mut comment = db.new_entity::<Comment>().unwrap();
    comment.set("text", "hello").unwrap();
    comment.set_parent("user", &user).unwrap();
    comment.save().await.unwrap();

    let comments = user.children("comments").await.unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].id(), comment.id());
}

#[tokio::test]
async fn test_collections_need_persisted_instance() {
    let db = blog_db().await;
    let mut post = db.new_entity::<Post>().unwrap();

    assert!(matches!(post.children("comments").await, Err(OrmError::State { .. })));
    assert!(matches!(post.siblings("tags").await, Err(OrmError::State { .. })));
}

#[tokio::test]
async fn test_siblings_through_join_table() {
    let db = blog_db().await;
    let mut post = create::<Post>(&db, &[("title", "Wind")]).await;
    let lonely = create::<Post>(&db, &[("title", "Rain")]).await;
    let rust = create::<Tag>(&db, &[("name", "rust")]).await;
    let sql = create::<Tag>(&db, &[("name", "sql")]).await;
    let _unused = create::<Tag>(&db, &[("name", "go")]).await;

    let post_id = post.id().unwrap();
    link(&db, "post__tag", ("post_id", post_id), ("tag_id", rust.id().unwrap())).await;
    link(&db, "post__tag", ("post_id", post_id), ("tag_id", sql.id().unwrap())).await;

    let tags = post.siblings("tags").await.unwrap();
    let mut names: Vec<String> = tags
        .iter()
        .map(|tag| {
            assert_eq!(tag.state(), EntityState::Loaded);
            assert!(!tag.fields().contains_key("post_id"));
            tag.fields()["tag_name"].as_str().unwrap().to_string()
        })
        .collect();
    names.sort();
    assert_eq!(names, vec!["rust", "sql"]);

    let mut rust = db.entity::<Tag>(rust.id().unwrap()).unwrap();
    let posts = rust.siblings("posts").await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].id(), Some(post_id));
    assert!(!posts[0].fields().contains_key("tag_id"));

    let mut lonely = db.entity::<Post>(lonely.id().unwrap()).unwrap();
    assert!(lonely.siblings("tags").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_siblings_use_their_own_join_table() {
    let db = blog_db().await;
    let mut article = create::<Article>(&db, &[("title", "Guide")]).await;
    let post = create::<Post>(&db, &[("title", "Wind")]).await;
    let tag = create::<Tag>(&db, &[("name", "rust")]).await;

    link(&db, "post__tag", ("post_id", post.id().unwrap()), ("tag_id", tag.id().unwrap())).await;
    assert!(article.siblings("tags").await.unwrap().is_empty());

    link(
        &db,
        "article__tag",
        ("article_id", article.id().unwrap()),
        ("tag_id", tag.id().unwrap()),
    )
    .await;
    let tags = article.siblings("tags").await.unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].id(), tag.id());
}

#[tokio::test]
async fn test_adopt_reparents_children() {
    let db = blog_db().await;
    let mut old_post = create::<Post>(&db, &[("title", "Old")]).await;
    let mut new_post = create::<Post>(&db, &[("title", "New")]).await;

    for text in ["a", "b"] {
        let mut comment = db.new_entity::<Comment>().unwrap();
        comment.set("text", text).unwrap();
        comment.set_parent("post", &old_post).unwrap();
        comment.save().await.unwrap();
    }

    let mut comments = old_post.children("comments").await.unwrap();
    let before = executed(&db);
    new_post.adopt("comments", &mut comments).await.unwrap();
    assert_eq!(executed(&db), before + 1);

    for comment in &comments {
        assert_eq!(comment.fields().get("post_id"), Some(&DatabaseValue::from(new_post.id())));
    }
    assert!(old_post.children("comments").await.unwrap().is_empty());
    assert_eq!(new_post.children("comments").await.unwrap().len(), 2);

    let before = executed(&db);
    new_post.adopt("comments", &mut []).await.unwrap();
    assert_eq!(executed(&db), before);
}

#[tokio::test]
async fn test_adopt_rejects_foreign_types() {
    let db = blog_db().await;
    let mut post = create::<Post>(&db, &[("title", "Wind")]).await;
    let mut tags = vec![create::<Tag>(&db, &[("name", "rust")]).await];
    let mut unsaved = vec![db.new_entity::<Comment>().unwrap()];

    assert!(matches!(
        post.adopt("comments", &mut tags).await,
        Err(OrmError::InvalidAssignment { .. })
    ));
    assert!(matches!(
        post.adopt("comments", &mut unsaved).await,
        Err(OrmError::MissingPrimaryKey(_))
    ));
    assert!(matches!(
        post.adopt("tags", &mut tags).await,
        Err(OrmError::UnknownAttribute { .. })
    ));
}

#[tokio::test]
async fn test_delete_leaves_related_rows() {
    let db = blog_db().await;
    let mut post = create::<Post>(&db, &[("title", "Wind")]).await;
    let mut tagged = create::<Post>(&db, &[("title", "Rain")]).await;
    let tag = create::<Tag>(&db, &[("name", "rust")]).await;
    link(&db, "post__tag", ("post_id", tagged.id().unwrap()), ("tag_id", tag.id().unwrap())).await;

    let mut comment = db.new_entity::<Comment>().unwrap();
    comment.set("text", "still here").unwrap();
    comment.set_parent("post", &post).unwrap();
    comment.save().await.unwrap();

    post.delete().await.unwrap();

    let mut comment = db.entity::<Comment>(comment.id().unwrap()).unwrap();
    assert_eq!(comment.column("text").await.unwrap(), DatabaseValue::from("still here"));
    assert!(comment.parent("post").await.unwrap().is_none());

    // a join-table link blocks the delete instead of disappearing with it
    assert!(matches!(tagged.delete().await, Err(OrmError::Storage(_))));
    assert_eq!(tagged.state(), EntityState::Bound);
    let mut tag = db.entity::<Tag>(tag.id().unwrap()).unwrap();
    assert_eq!(tag.siblings("posts").await.unwrap().len(), 1);
}
