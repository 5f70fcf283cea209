//! Document commands: `put`, `delete`, and `tagged`.
//!
//! Every write goes through [`TaggedCollection`] so the lifecycle hooks keep
//! the aggregation tables current.

use anyhow::{bail, Result};
use serde::Serialize;
use serde_json::{Map, Value};

use tagweight_core::{Document, TaggedCollection};

use crate::catalog::Catalog;
use crate::config::Config;

/// JSON shape of a document in command output.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentView {
    pub id: String,
    pub fields: Map<String, Value>,
    pub created_at: String, // ISO8601
    pub updated_at: String, // ISO8601
}

impl From<&Document> for DocumentView {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            fields: doc.fields.clone(),
            created_at: format_ts_iso(doc.created_at),
            updated_at: format_ts_iso(doc.updated_at),
        }
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Parse a `--field` value: JSON when it parses, a plain string otherwise.
fn parse_field_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Apply `ctx=value` tag assignments and `key=value` fields, then save.
pub async fn put_document(
    collection: &TaggedCollection,
    id: Option<&str>,
    tags: &[(String, String)],
    fields: &[(String, String)],
) -> Result<Document> {
    let mut doc = match id {
        Some(id) => match collection.find(id).await? {
            Some(existing) => existing,
            None => collection.new_document_with_id(id),
        },
        None => collection.new_document(),
    };

    for (key, raw) in fields {
        if collection.schema().context(key).is_ok() {
            bail!("'{}' is a tag context; use --tags {}=...", key, key);
        }
        doc.set(key.as_str(), parse_field_value(raw));
    }
    for (context, value) in tags {
        collection.set_tag_string(&mut doc, context, value)?;
    }

    collection.save(&mut doc).await?;
    Ok(doc)
}

pub async fn run_put(
    config: &Config,
    type_name: &str,
    id: Option<String>,
    tags: Vec<(String, String)>,
    fields: Vec<(String, String)>,
) -> Result<()> {
    let (pool, catalog) = Catalog::open(config).await?;
    let collection = catalog.get(type_name)?;

    let doc = put_document(collection, id.as_deref(), &tags, &fields).await?;

    println!("Saved {} {}", type_name, doc.id);
    for context in collection.schema().tag_contexts() {
        println!("  {:<16} {}", context, collection.tag_string(&doc, context)?);
    }

    pool.close().await;
    Ok(())
}

pub async fn run_delete(config: &Config, type_name: &str, id: &str) -> Result<()> {
    let (pool, catalog) = Catalog::open(config).await?;
    let collection = catalog.get(type_name)?;

    let existed = collection.destroy(id).await?;
    pool.close().await;

    if !existed {
        bail!("document not found: {} {}", type_name, id);
    }
    println!("Deleted {} {}", type_name, id);
    Ok(())
}

pub async fn run_tagged(
    config: &Config,
    type_name: &str,
    context: &str,
    tags: &str,
    json: bool,
) -> Result<()> {
    let (pool, catalog) = Catalog::open(config).await?;
    let collection = catalog.get(type_name)?;

    let docs = collection.tagged_with(context, tags).await?;

    if json {
        let views: Vec<DocumentView> = docs.iter().map(DocumentView::from).collect();
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else if docs.is_empty() {
        println!("No documents.");
    } else {
        for doc in &docs {
            println!("{}  [{}]", doc.id, collection.tag_string(doc, context)?);
        }
    }

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tagweight_core::store::memory::{InMemoryAggregationStore, InMemoryDocumentStore};

    fn catalog() -> Catalog {
        let config: Config = toml::from_str(
            r#"
            [db]
            path = "x.sqlite"
            [[types]]
            name = "Track"
            strategy = "incremental"
            [[types.contexts]]
            name = "tags"
            [[types.contexts]]
            name = "moods"
            separator = ","
            "#,
        )
        .unwrap();
        Catalog::build(
            &config,
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryAggregationStore::new()),
        )
        .unwrap()
    }

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[tokio::test]
    async fn test_put_creates_then_updates() {
        let catalog = catalog();
        let tracks = catalog.get("Track").unwrap();

        let doc = put_document(
            tracks,
            Some("t1"),
            &[pair("tags", "rock live"), pair("moods", "calm, happy")],
            &[pair("year", "1999"), pair("title", "Intro")],
        )
        .await
        .unwrap();
        assert_eq!(doc.get("year"), Some(&Value::from(1999)));
        assert_eq!(doc.get("title"), Some(&Value::from("Intro")));
        assert_eq!(tracks.tag_string(&doc, "moods").unwrap(), "calm,happy");

        put_document(tracks, Some("t1"), &[pair("tags", "rock")], &[])
            .await
            .unwrap();
        let stored = tracks.find("t1").await.unwrap().unwrap();
        assert_eq!(stored.get("year"), Some(&Value::from(1999)));
        assert_eq!(
            tracks.tags_with_weight_for("tags", None).await.unwrap(),
            vec![("rock".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_put_rejects_context_as_field() {
        let catalog = catalog();
        let tracks = catalog.get("Track").unwrap();
        let err = put_document(tracks, None, &[], &[pair("tags", "x")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("tag context"));
    }
}
