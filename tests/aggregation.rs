//! Lifecycle and query scenarios run against the SQLite stores, once per
//! aggregation strategy.

use std::sync::Arc;

use serde_json::json;
use sqlx::SqlitePool;
use tempfile::TempDir;

use tagweight::config::Config;
use tagweight::sqlite_store::{SqliteAggregationStore, SqliteDocumentStore};
use tagweight::{db, migrate};
use tagweight_core::store::CounterKey;
use tagweight_core::{
    AggregationStore, ContextOptions, Document, DocumentStore, GroupScope, StrategyKind, TagError,
    TaggableSchema, TaggedCollection,
};

const ALL_KINDS: [StrategyKind; 3] = [
    StrategyKind::BatchRecompute,
    StrategyKind::IncrementalCounter,
    StrategyKind::IncrementalGroupedCounter,
];

async fn setup_pool() -> (TempDir, SqlitePool) {
    let tmp = TempDir::new().unwrap();
    let config: Config = toml::from_str(&format!(
        r#"
        [db]
        path = "{}/data/tagw.sqlite"
        [[types]]
        name = "Unused"
        "#,
        tmp.path().display()
    ))
    .unwrap();
    let pool = db::connect(&config).await.unwrap();
    migrate::migrate(&pool).await.unwrap();
    (tmp, pool)
}

fn stores(pool: &SqlitePool) -> (Arc<dyn DocumentStore>, Arc<dyn AggregationStore>) {
    (
        Arc::new(SqliteDocumentStore::new(pool.clone())),
        Arc::new(SqliteAggregationStore::new(pool.clone())),
    )
}

/// A `MyModel` type with `tags` aggregated by `kind`, plus an `artists`
/// context grouped by `user` for the grouped strategies.
fn collection(pool: &SqlitePool, kind: StrategyKind) -> TaggedCollection {
    let (documents, records) = stores(pool);
    let mut schema = TaggableSchema::new("MyModel");
    schema
        .register(
            "tags",
            &ContextOptions::new(),
            Some(kind.build(records.clone(), documents.clone())),
        )
        .unwrap();
    let artists_kind = match kind {
        StrategyKind::IncrementalCounter => StrategyKind::IncrementalGroupedCounter,
        other => other,
    };
    schema
        .register(
            "artists",
            &ContextOptions::new().group_by_field("user"),
            Some(artists_kind.build(records.clone(), documents.clone())),
        )
        .unwrap();
    TaggedCollection::new(Arc::new(schema), documents, records)
}

fn fields(value: serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn weights(pairs: &[(&str, i64)]) -> Vec<(String, i64)> {
    pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
}

async fn create_three(c: &TaggedCollection) -> Vec<String> {
    let mut ids = Vec::new();
    for tags in ["food ant bee", "juice food bee zip", "honey strip food"] {
        let doc = c.create(fields(json!({ "tags": tags }))).await.unwrap();
        ids.push(doc.id);
    }
    ids
}

#[tokio::test]
async fn test_create_aggregates_every_strategy() {
    for kind in ALL_KINDS {
        let (_tmp, pool) = setup_pool().await;
        let c = collection(&pool, kind);
        create_three(&c).await;

        assert_eq!(
            c.tags_for("tags", None).await.unwrap(),
            vec!["ant", "bee", "food", "honey", "juice", "strip", "zip"],
            "strategy {}",
            kind
        );
        assert_eq!(
            c.tags_with_weight_for("tags", None).await.unwrap(),
            weights(&[
                ("ant", 1),
                ("bee", 2),
                ("food", 3),
                ("honey", 1),
                ("juice", 1),
                ("strip", 1),
                ("zip", 1),
            ]),
            "strategy {}",
            kind
        );
    }
}

#[tokio::test]
async fn test_update_moves_weights_every_strategy() {
    for kind in ALL_KINDS {
        let (_tmp, pool) = setup_pool().await;
        let c = collection(&pool, kind);
        let ids = create_three(&c).await;

        let mut doc = c.find(&ids[0]).await.unwrap().unwrap();
        c.set_tag_string(&mut doc, "tags", "ant bee honey strip shoe")
            .unwrap();
        c.save(&mut doc).await.unwrap();

        assert_eq!(
            c.tags_with_weight_for("tags", None).await.unwrap(),
            weights(&[
                ("ant", 1),
                ("bee", 2),
                ("food", 2),
                ("honey", 2),
                ("juice", 1),
                ("shoe", 1),
                ("strip", 2),
                ("zip", 1),
            ]),
            "strategy {}",
            kind
        );
    }
}

#[tokio::test]
async fn test_destroy_drops_zero_counts_every_strategy() {
    for kind in ALL_KINDS {
        let (_tmp, pool) = setup_pool().await;
        let c = collection(&pool, kind);
        let ids = create_three(&c).await;

        assert!(c.destroy(&ids[1]).await.unwrap());
        assert!(!c.destroy(&ids[1]).await.unwrap());

        assert_eq!(
            c.tags_with_weight_for("tags", None).await.unwrap(),
            weights(&[
                ("ant", 1),
                ("bee", 1),
                ("food", 2),
                ("honey", 1),
                ("strip", 1),
            ]),
            "strategy {}",
            kind
        );
    }
}

#[tokio::test]
async fn test_grouped_queries() {
    for kind in [
        StrategyKind::BatchRecompute,
        StrategyKind::IncrementalGroupedCounter,
    ] {
        let (_tmp, pool) = setup_pool().await;
        let c = collection(&pool, kind);
        c.create(fields(json!({ "user": "user1", "artists": ["jeff", "greg"] })))
            .await
            .unwrap();
        c.create(fields(json!({ "user": "user1", "artists": "jeff" })))
            .await
            .unwrap();
        c.create(fields(json!({ "user": "user2", "artists": ["jeff", "ann"] })))
            .await
            .unwrap();

        assert_eq!(
            c.tags_for("artists", Some("user1")).await.unwrap(),
            vec!["greg", "jeff"],
            "strategy {}",
            kind
        );
        assert_eq!(
            c.tags_with_weight_for("artists", Some("user2")).await.unwrap(),
            weights(&[("ann", 1), ("jeff", 1)]),
            "strategy {}",
            kind
        );
        assert_eq!(
            c.tags_with_weight_for("artists", None).await.unwrap(),
            weights(&[("ann", 1), ("greg", 1), ("jeff", 3)]),
            "strategy {}",
            kind
        );
        assert!(c.tags_for("artists", Some("user3")).await.unwrap().is_empty());
    }
}

#[tokio::test]
async fn test_group_change_moves_counts() {
    let (_tmp, pool) = setup_pool().await;
    let c = collection(&pool, StrategyKind::IncrementalGroupedCounter);
    let mut doc = c
        .create(fields(json!({ "user": "user1", "artists": ["jeff", "greg"] })))
        .await
        .unwrap();

    doc.set("user", "user2");
    c.set_tags(&mut doc, "artists", vec!["jeff"]).unwrap();
    c.save(&mut doc).await.unwrap();

    assert!(c.tags_for("artists", Some("user1")).await.unwrap().is_empty());
    assert_eq!(
        c.tags_with_weight_for("artists", Some("user2")).await.unwrap(),
        weights(&[("jeff", 1)])
    );
}

#[tokio::test]
async fn test_ungrouped_counter_rejects_group_argument() {
    let (_tmp, pool) = setup_pool().await;
    let c = collection(&pool, StrategyKind::IncrementalCounter);
    let err = c.tags_for("tags", Some("user1")).await.unwrap_err();
    assert!(matches!(err, TagError::NotGrouped { .. }));
}

#[tokio::test]
async fn test_missing_strategy_is_not_empty() {
    let (_tmp, pool) = setup_pool().await;
    let (documents, records) = stores(&pool);
    let mut schema = TaggableSchema::new("MyModel");
    schema.register("tags", &ContextOptions::new(), None).unwrap();
    let c = TaggedCollection::new(Arc::new(schema), documents, records);
    c.create(fields(json!({ "tags": "food" }))).await.unwrap();

    let err = c.tags_for("tags", None).await.unwrap_err();
    assert!(matches!(err, TagError::AggregationStrategyMissing { .. }));
    let err = c.tags_with_weight_for("tags", None).await.unwrap_err();
    assert!(matches!(err, TagError::AggregationStrategyMissing { .. }));
}

#[tokio::test]
async fn test_aggregation_collection_names() {
    let (_tmp, pool) = setup_pool().await;
    let (documents, records) = stores(&pool);
    for (type_name, expected) in [
        ("M1", "m1s_tags_aggregation"),
        ("M2", "m2s_tags_aggregation"),
        ("M3", "m3s_tags_aggregation"),
    ] {
        let mut schema = TaggableSchema::new(type_name);
        schema
            .register(
                "tags",
                &ContextOptions::new(),
                Some(StrategyKind::BatchRecompute.build(records.clone(), documents.clone())),
            )
            .unwrap();
        assert_eq!(schema.aggregation_collection_for("tags").unwrap(), expected);
    }
}

#[tokio::test]
async fn test_batch_refreshes_cache_table() {
    let (_tmp, pool) = setup_pool().await;
    let c = collection(&pool, StrategyKind::BatchRecompute);
    create_three(&c).await;
    c.tags_for("tags", None).await.unwrap();

    let (_, records) = stores(&pool);
    let rows = records
        .records("mymodels_tags_aggregation", GroupScope::All)
        .await
        .unwrap();
    assert_eq!(rows.len(), 7);
    assert_eq!(rows.iter().map(|r| r.count).sum::<i64>(), 10);
}

#[tokio::test]
async fn test_reconcile_repairs_drift() {
    let (_tmp, pool) = setup_pool().await;
    let c = collection(&pool, StrategyKind::IncrementalCounter);
    create_three(&c).await;

    let (_, records) = stores(&pool);
    let table = "mymodels_tags_aggregation";
    records
        .increment(CounterKey { table, tag: "ghost", group: None })
        .await
        .unwrap();
    records
        .decrement(CounterKey { table, tag: "food", group: None })
        .await
        .unwrap();

    assert_eq!(c.reconcile("tags").await.unwrap(), 7);
    assert_eq!(
        c.tags_with_weight_for("tags", None).await.unwrap(),
        weights(&[
            ("ant", 1),
            ("bee", 2),
            ("food", 3),
            ("honey", 1),
            ("juice", 1),
            ("strip", 1),
            ("zip", 1),
        ])
    );
}

#[tokio::test]
async fn test_concurrent_increments_are_not_lost() {
    let (_tmp, pool) = setup_pool().await;
    let records = Arc::new(SqliteAggregationStore::new(pool.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let records = records.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..25 {
                records
                    .increment(CounterKey {
                        table: "mymodels_tags_aggregation",
                        tag: "food",
                        group: None,
                    })
                    .await
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let rows = records
        .records("mymodels_tags_aggregation", GroupScope::Ungrouped)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].count, 200);
}

#[tokio::test]
async fn test_tagged_with_requires_every_tag() {
    let (_tmp, pool) = setup_pool().await;
    let c = collection(&pool, StrategyKind::IncrementalCounter);
    let ids = create_three(&c).await;

    let docs = c.tagged_with("tags", "food bee").await.unwrap();
    let mut found: Vec<String> = docs.into_iter().map(|d| d.id).collect();
    found.sort();
    let mut expected = vec![ids[0].clone(), ids[1].clone()];
    expected.sort();
    assert_eq!(found, expected);

    assert!(c.tagged_with("tags", "food zip ant").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unnormalized_stored_tags_agree_across_scans() {
    for kind in ALL_KINDS {
        let (_tmp, pool) = setup_pool().await;
        let c = collection(&pool, kind);

        let mut listed = Document::with_id("d1");
        listed.set("tags", json!(["a", " a ", "b", ""]));
        c.save(&mut listed).await.unwrap();
        let mut text = Document::with_id("d2");
        text.set("tags", "x  y");
        c.save(&mut text).await.unwrap();

        let expected = weights(&[("a", 1), ("b", 1), ("x", 1), ("y", 1)]);
        assert_eq!(
            c.tags_with_weight_for("tags", None).await.unwrap(),
            expected,
            "strategy {}",
            kind
        );

        c.reconcile("tags").await.unwrap();
        assert_eq!(
            c.tags_with_weight_for("tags", None).await.unwrap(),
            expected,
            "strategy {} after reconcile",
            kind
        );

        let found: Vec<String> = c
            .tagged_with("tags", "a b")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(found, vec!["d1"]);
        let found: Vec<String> = c
            .tagged_with("tags", "y")
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(found, vec!["d2"]);
    }
}

#[tokio::test]
async fn test_non_string_group_values_share_keys() {
    for kind in [
        StrategyKind::BatchRecompute,
        StrategyKind::IncrementalGroupedCounter,
    ] {
        let (_tmp, pool) = setup_pool().await;
        let c = collection(&pool, kind);
        c.create(fields(json!({ "user": 3, "artists": ["jeff"] })))
            .await
            .unwrap();
        c.create(fields(json!({ "user": true, "artists": ["jeff", "greg"] })))
            .await
            .unwrap();
        c.create(fields(json!({ "user": 2.5, "artists": ["ann"] })))
            .await
            .unwrap();

        for _ in 0..2 {
            assert_eq!(
                c.tags_for("artists", Some("3")).await.unwrap(),
                vec!["jeff"],
                "strategy {}",
                kind
            );
            assert_eq!(
                c.tags_for("artists", Some("true")).await.unwrap(),
                vec!["greg", "jeff"],
                "strategy {}",
                kind
            );
            assert_eq!(
                c.tags_for("artists", Some("2.5")).await.unwrap(),
                vec!["ann"],
                "strategy {}",
                kind
            );
            c.reconcile("artists").await.unwrap();
        }
    }
}

#[tokio::test]
async fn test_decrement_below_zero_removes_row() {
    let (_tmp, pool) = setup_pool().await;
    let table = "mymodels_tags_aggregation";
    sqlx::query(
        "INSERT INTO tag_aggregations (aggregation, tag, grouped, group_key, count) VALUES (?, 'food', 0, '', 0)",
    )
    .bind(table)
    .execute(&pool)
    .await
    .unwrap();

    let (_, records) = stores(&pool);
    let remaining = records
        .decrement(CounterKey { table, tag: "food", group: None })
        .await
        .unwrap();
    assert_eq!(remaining, Some(-1));

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag_aggregations WHERE aggregation = ?")
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 0);
}

#[tokio::test]
async fn test_destroy_survives_drifted_counter() {
    let (_tmp, pool) = setup_pool().await;
    let c = collection(&pool, StrategyKind::IncrementalCounter);
    let doc = c.create(fields(json!({ "tags": "food bee" }))).await.unwrap();

    sqlx::query("UPDATE tag_aggregations SET count = 0 WHERE tag = 'food'")
        .execute(&pool)
        .await
        .unwrap();

    assert!(c.destroy(&doc.id).await.unwrap());
    assert!(c.tags_with_weight_for("tags", None).await.unwrap().is_empty());
}
