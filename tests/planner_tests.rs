//! Projection planning against the blog fixture

mod common;

use common::*;
use std::sync::Arc;
use this_loader::prelude::*;

fn plan(type_name: &str, fields: &[&str], model: &str) -> Option<Vec<String>> {
    let plan = blog_planner()
        .plan(type_name, fields, model)
        .expect("plan should succeed");
    sorted_columns(&plan)
}

#[test]
fn test_plain_columns_are_deduplicated() {
    assert_eq!(
        plan("Post", &["title", "body", "title"], "Post"),
        Some(vec!["body".to_string(), "title".to_string()])
    );
}

#[test]
fn test_foreign_key_relation_contributes_its_key() {
    assert_eq!(
        plan("Post", &["title", "author"], "Post"),
        Some(vec!["author_id".to_string(), "title".to_string()])
    );
}

#[test]
fn test_local_key_relations_contribute_the_local_key() {
    for field in ["comments", "commentCount", "images"] {
        assert_eq!(
            plan("Post", &[field], "Post"),
            Some(vec!["id".to_string()]),
            "field {}",
            field
        );
    }
}

#[test]
fn test_ignored_relations_contribute_nothing() {
    let plan = blog_planner()
        .plan("Post", &["tags", "comments_count"], "Post")
        .unwrap();

    assert_eq!(plan, ProjectionPlan::Columns(Default::default()));
    assert!(!plan.is_select_all());
}

#[test]
fn test_polymorphic_relation_selects_all() {
    assert_eq!(plan("Image", &["url", "imageable"], "Image"), None);
}

#[test]
fn test_select_and_rename_directives() {
    assert_eq!(
        plan("Post", &["headline", "excerpt"], "Post"),
        Some(vec!["body".to_string(), "title".to_string()])
    );
    assert_eq!(
        plan("User", &["display_name"], "User"),
        Some(vec!["email".to_string(), "name".to_string()])
    );
}

#[test]
fn test_unknown_fields_are_skipped() {
    assert_eq!(
        plan("Post", &["__typename", "nope", "title"], "Post"),
        Some(vec!["title".to_string()])
    );
}

#[test]
fn test_wrapper_and_union_types() {
    assert_eq!(
        plan("PostPaginator", &["title"], "Post"),
        Some(vec!["title".to_string()])
    );
    // Unions plan with their first member's fields
    assert_eq!(
        plan("Imageable", &["title"], "Post"),
        Some(vec!["title".to_string()])
    );
}

#[test]
fn test_unknown_type_is_a_schema_inconsistency() {
    let err = blog_planner().plan("Ghost", &["id"], "Post").unwrap_err();
    assert_eq!(err.error_code(), "SCHEMA_INCONSISTENCY");
}

const DERIVED: &str = r#"
types:
  - kind: object
    name: Post
    fields:
      - { name: title, type: String }
      - { name: isPublished, type: Boolean }
      - { name: word_count, type: Int }
      - name: editor
        type: User
        directives: [{ name: hasOne }]
models:
  - name: Post
    columns: [id, title]
    computed: [word_count]
    methods: [isPublished]
"#;

fn derived_planner(strict: bool) -> SelectionPlanner {
    let config = LoaderConfig::from_yaml_str(DERIVED).unwrap();
    SelectionPlanner::new(
        Arc::new(config.schema_registry()),
        Arc::new(config.model_catalog().unwrap()),
    )
    .strict_relations(strict)
}

#[test]
fn test_derived_attributes_never_projected() {
    let plan = derived_planner(false)
        .plan("Post", &["title", "isPublished", "word_count"], "Post")
        .unwrap();

    assert_eq!(sorted_columns(&plan), Some(vec!["title".to_string()]));
}

#[test]
fn test_missing_relation_is_lenient_by_default() {
    let plan = derived_planner(false)
        .plan("Post", &["title", "editor"], "Post")
        .unwrap();

    assert_eq!(sorted_columns(&plan), Some(vec!["title".to_string()]));
}

#[test]
fn test_missing_relation_fails_in_strict_mode() {
    let err = derived_planner(true)
        .plan("Post", &["title", "editor"], "Post")
        .unwrap_err();

    assert_eq!(err.error_code(), "RELATION_NOT_FOUND");
}
