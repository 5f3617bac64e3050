//! Shared test harness: the blog fixture and a seeded in-memory source
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! mod common;
//! use common::*;
//! ```

#![allow(dead_code)]

use serde_json::{Value, json};
use std::sync::Arc;
use this_loader::prelude::*;

pub const BLOG_FIXTURE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/fixtures/blog.yaml");

/// The blog configuration
pub fn blog_config() -> LoaderConfig {
    LoaderConfig::from_yaml_file(BLOG_FIXTURE).expect("blog fixture should load")
}

/// Planner over the blog registries
pub fn blog_planner() -> SelectionPlanner {
    let config = blog_config();
    SelectionPlanner::new(
        Arc::new(config.schema_registry()),
        Arc::new(config.model_catalog().expect("blog models should resolve")),
    )
}

/// Seeded blog data
///
/// - users 1..=3
/// - posts 1..=5, post `n` written by user `((n - 1) % 3) + 1`, odd posts published
/// - comments: two on post 1 (5 and 2 votes), one on post 2 (1 vote), none on the others
/// - tags: post 1 is tagged `rust` and `databases`, post 3 `rust`
/// - images: one on post 2, one avatar for user 1, one more image of user 1
pub fn blog_source() -> InMemoryDataSource {
    let source = InMemoryDataSource::new();

    source
        .insert_many(
            "User",
            vec![
                json!({"id": 1, "name": "Ada", "email": "ada@example.com"}),
                json!({"id": 2, "name": "Grace", "email": "grace@example.com"}),
                json!({"id": 3, "name": "Linus", "email": "linus@example.com"}),
            ],
        )
        .expect("users");

    source
        .insert_many(
            "Post",
            (1..=5).map(|id: i64| {
                json!({
                    "id": id,
                    "title": format!("Post {}", id),
                    "body": format!("Body of post {}", id),
                    "author_id": ((id - 1) % 3) + 1,
                    "published": id % 2 == 1,
                })
            }),
        )
        .expect("posts");

    source
        .insert_many(
            "Comment",
            vec![
                json!({"id": 101, "body": "First!", "votes": 5, "post_id": 1, "user_id": 2}),
                json!({"id": 102, "body": "Nice", "votes": 2, "post_id": 1, "user_id": 3}),
                json!({"id": 103, "body": "Hmm", "votes": 1, "post_id": 2, "user_id": 1}),
            ],
        )
        .expect("comments");

    source
        .insert_many(
            "Tag",
            vec![
                json!({"id": 1, "label": "rust"}),
                json!({"id": 2, "label": "databases"}),
            ],
        )
        .expect("tags");

    source
        .insert_many(
            "PostTag",
            vec![
                json!({"post_id": 1, "tag_id": 1}),
                json!({"post_id": 1, "tag_id": 2}),
                json!({"post_id": 3, "tag_id": 1}),
            ],
        )
        .expect("post tags");

    source
        .insert_many(
            "Image",
            vec![
                json!({"id": 1, "url": "cover.png", "imageable_id": 2, "imageable_type": "Post"}),
                json!({"id": 2, "url": "ada.png", "imageable_id": 1, "imageable_type": "User"}),
                json!({"id": 3, "url": "ada-desk.png", "imageable_id": 1, "imageable_type": "User"}),
            ],
        )
        .expect("images");

    source
        .add_scope("published", |row| row.get("published") == Some(&json!(true)))
        .expect("scope");
    source
        .add_accessor("Post", "excerpt", |row| {
            row.get("body")
                .and_then(Value::as_str)
                .map(|body| json!(body.chars().take(7).collect::<String>()))
                .unwrap_or(Value::Null)
        })
        .expect("excerpt accessor");

    source
}

/// Executor over the blog fixture and `source`
pub fn blog_executor(source: &InMemoryDataSource) -> Executor {
    executor_with(blog_config(), source)
}

pub fn executor_with(config: LoaderConfig, source: &InMemoryDataSource) -> Executor {
    let host = LoaderHost::from_config(&config, Arc::new(source.clone()))
        .expect("host should build");
    Executor::new(Arc::new(host))
}

/// Plan as a sorted column list, `None` for `SelectAll`
pub fn sorted_columns(plan: &ProjectionPlan) -> Option<Vec<String>> {
    match plan {
        ProjectionPlan::Columns(columns) => {
            let mut columns: Vec<String> = columns.iter().cloned().collect();
            columns.sort();
            Some(columns)
        }
        ProjectionPlan::SelectAll => None,
    }
}
