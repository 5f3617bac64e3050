//! Blog Example
//!
//! Resolves a nested query over an in-memory blog and prints the response
//! together with every fetch the data source performed:
//! - one base fetch per root field, projecting only the selected columns
//! - one bulk fetch per relation path, whatever the number of parents
//!
//! Run with `RUST_LOG=this_loader=debug` to see the planned projections.

use anyhow::Result;
use this_loader::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = LoaderConfig::from_yaml_file(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/fixtures/blog.yaml"
    ))?;

    let source = InMemoryDataSource::new();
    populate_test_data(&source)?;

    let host = LoaderHost::from_config(&config, Arc::new(source.clone()))?;
    let executor = Executor::new(Arc::new(host));

    let operation = Operation::new().select(
        FieldNode::new("posts")
            .fields(["title", "excerpt"])
            .select(FieldNode::new("author").fields(["name"]))
            .select(
                FieldNode::new("comments")
                    .fields(["body"])
                    .select(FieldNode::new("author").fields(["display_name"])),
            )
            .select(FieldNode::new("tags").fields(["label"])),
    );

    let response = executor.execute(&operation).await;

    println!("📦 Response:");
    println!("{}", serde_json::to_string_pretty(&response.to_json())?);

    println!("\n🔎 Fetches:");
    for record in source.fetch_log() {
        match record {
            FetchRecord::Many { model, plan } => {
                println!("  fetch_many    {:<16} {:?}", model, plan);
            }
            FetchRecord::ByKeys {
                relation,
                keys,
                plan,
            } => {
                println!(
                    "  fetch_by_keys {:<16} {} keys {:?}",
                    relation,
                    keys.len(),
                    plan
                );
            }
        }
    }

    Ok(())
}

fn populate_test_data(source: &InMemoryDataSource) -> Result<()> {
    source.insert_many(
        "User",
        vec![
            json!({"id": 1, "name": "Ada", "email": "ada@example.com"}),
            json!({"id": 2, "name": "Grace", "email": "grace@example.com"}),
            json!({"id": 3, "name": "Linus", "email": "linus@example.com"}),
        ],
    )?;

    source.insert_many(
        "Post",
        (1..=5).map(|id| {
            json!({
                "id": id,
                "title": format!("Post #{}", id),
                "body": format!("Body of post number {}, long enough to be cut short.", id),
                "author_id": (id % 3) + 1,
                "published": id % 2 == 1,
            })
        }),
    )?;

    source.insert_many(
        "Comment",
        (1..=8).map(|id| {
            json!({
                "id": 100 + id,
                "body": format!("Comment {}", id),
                "post_id": (id % 5) + 1,
                "user_id": (id % 3) + 1,
            })
        }),
    )?;

    source.insert_many(
        "Tag",
        vec![
            json!({"id": 1, "label": "rust"}),
            json!({"id": 2, "label": "databases"}),
        ],
    )?;
    source.insert_many(
        "PostTag",
        vec![
            json!({"post_id": 1, "tag_id": 1}),
            json!({"post_id": 1, "tag_id": 2}),
            json!({"post_id": 3, "tag_id": 1}),
        ],
    )?;

    source.add_scope("published", |row| row.get("published") == Some(&json!(true)))?;
    source.add_accessor("Post", "excerpt", |row| {
        row.get("body")
            .and_then(Value::as_str)
            .map(|body| json!(body.chars().take(20).collect::<String>()))
            .unwrap_or(Value::Null)
    })?;
    source.add_accessor("User", "display_name", |row| {
        match (
            row.get("name").and_then(Value::as_str),
            row.get("email").and_then(Value::as_str),
        ) {
            (Some(name), Some(email)) => json!(format!("{} <{}>", name, email)),
            _ => Value::Null,
        }
    })?;

    Ok(())
}
