//! SQLite-backed [`AggregationStore`] and [`DocumentStore`] implementations.
//!
//! Every aggregation table lives as rows of `tag_aggregations`, keyed by
//! `(aggregation, tag, grouped, group_key)`. Counter updates are single
//! statements so concurrent writers never lose an update. Documents are
//! stored as one JSON object per row. Full scans prefilter in SQL and read
//! tag lists through the same normalization as the save path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use tagweight_core::store::{has_all_tags, tally_documents, CounterKey, TableSummary};
use tagweight_core::{
    AggregationRecord, AggregationStore, Document, DocumentStore, GroupScope, TagContext,
};

/// Split an optional group into the `(grouped, group_key)` column pair.
fn group_columns(group: Option<&str>) -> (i64, &str) {
    match group {
        Some(g) => (1, g),
        None => (0, ""),
    }
}

/// JSON path addressing a top-level field, quoted so any field name works.
fn field_path(field: &str) -> String {
    format!("$.\"{}\"", field.replace('\\', "\\\\").replace('"', "\\\""))
}

fn record_from_row(row: &SqliteRow) -> AggregationRecord {
    let grouped: i64 = row.get("grouped");
    AggregationRecord {
        tag: row.get("tag"),
        group: (grouped != 0).then(|| row.get("group_key")),
        count: row.get("count"),
    }
}

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let id: String = row.get("id");
    let fields_json: String = row.get("fields_json");
    let fields: Map<String, Value> = serde_json::from_str(&fields_json)
        .with_context(|| format!("Corrupt fields_json for document '{}'", id))?;
    Ok(Document {
        id,
        fields,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// SQLite implementation of [`AggregationStore`].
pub struct SqliteAggregationStore {
    pool: SqlitePool,
}

impl SqliteAggregationStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AggregationStore for SqliteAggregationStore {
    async fn increment(&self, key: CounterKey<'_>) -> Result<i64> {
        let (grouped, group_key) = group_columns(key.group);
        let count: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO tag_aggregations (aggregation, tag, grouped, group_key, count)
            VALUES (?, ?, ?, ?, 1)
            ON CONFLICT(aggregation, tag, grouped, group_key) DO UPDATE SET
                count = count + 1
            RETURNING count
            "#,
        )
        .bind(key.table)
        .bind(key.tag)
        .bind(grouped)
        .bind(group_key)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn decrement(&self, key: CounterKey<'_>) -> Result<Option<i64>> {
        let (grouped, group_key) = group_columns(key.group);
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE tag_aggregations SET count = count - 1
            WHERE aggregation = ? AND tag = ? AND grouped = ? AND group_key = ?
            RETURNING count
            "#,
        )
        .bind(key.table)
        .bind(key.tag)
        .bind(grouped)
        .bind(group_key)
        .fetch_optional(&self.pool)
        .await?;

        let Some(remaining) = remaining else {
            return Ok(None);
        };

        if remaining <= 0 {
            // Conditional: a concurrent increment may already have revived it.
            sqlx::query(
                r#"
                DELETE FROM tag_aggregations
                WHERE aggregation = ? AND tag = ? AND grouped = ? AND group_key = ?
                  AND count <= 0
                "#,
            )
            .bind(key.table)
            .bind(key.tag)
            .bind(grouped)
            .bind(group_key)
            .execute(&self.pool)
            .await?;
        }

        Ok(Some(remaining))
    }

    async fn records(&self, table: &str, scope: GroupScope<'_>) -> Result<Vec<AggregationRecord>> {
        let rows = match scope {
            GroupScope::Ungrouped => {
                sqlx::query(
                    r#"
                    SELECT tag, grouped, group_key, count FROM tag_aggregations
                    WHERE aggregation = ? AND grouped = 0 AND count > 0
                    ORDER BY tag
                    "#,
                )
                .bind(table)
                .fetch_all(&self.pool)
                .await?
            }
            GroupScope::Group(group) => {
                sqlx::query(
                    r#"
                    SELECT tag, grouped, group_key, count FROM tag_aggregations
                    WHERE aggregation = ? AND grouped = 1 AND group_key = ? AND count > 0
                    ORDER BY tag
                    "#,
                )
                .bind(table)
                .bind(group)
                .fetch_all(&self.pool)
                .await?
            }
            GroupScope::All => {
                sqlx::query(
                    r#"
                    SELECT tag, grouped, group_key, count FROM tag_aggregations
                    WHERE aggregation = ? AND count > 0
                    ORDER BY tag, grouped, group_key
                    "#,
                )
                .bind(table)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(record_from_row).collect())
    }

    async fn replace_all(&self, table: &str, records: &[AggregationRecord]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM tag_aggregations WHERE aggregation = ?")
            .bind(table)
            .execute(&mut *tx)
            .await?;

        for record in records.iter().filter(|r| r.count > 0) {
            let (grouped, group_key) = group_columns(record.group.as_deref());
            sqlx::query(
                r#"
                INSERT INTO tag_aggregations (aggregation, tag, grouped, group_key, count)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(aggregation, tag, grouped, group_key) DO UPDATE SET
                    count = count + excluded.count
                "#,
            )
            .bind(table)
            .bind(&record.tag)
            .bind(grouped)
            .bind(group_key)
            .bind(record.count)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(table, rows = records.len(), "replaced aggregation table");
        Ok(())
    }

    async fn summaries(&self) -> Result<Vec<TableSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT aggregation,
                   COUNT(*) AS row_count,
                   CAST(COALESCE(SUM(count), 0) AS INTEGER) AS total_weight
            FROM tag_aggregations
            WHERE count > 0
            GROUP BY aggregation
            ORDER BY aggregation
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| TableSummary {
                table: row.get("aggregation"),
                rows: row.get("row_count"),
                total_weight: row.get("total_weight"),
            })
            .collect())
    }
}

/// SQLite implementation of [`DocumentStore`].
pub struct SqliteDocumentStore {
    pool: SqlitePool,
}

impl SqliteDocumentStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Documents whose tag field holds a string or an array. Tag lists are
    /// then read through [`Document::tag_list`], so the scan trims, splits,
    /// and dedups exactly as the save path does.
    async fn tagged_candidates(
        &self,
        collection: &str,
        context: &TagContext,
    ) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, fields_json, created_at, updated_at
            FROM documents
            WHERE collection = ?1
              AND json_type(fields_json, ?2) IN ('text', 'array')
            ORDER BY id
            "#,
        )
        .bind(collection)
        .bind(field_path(&context.db_field))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, fields_json, created_at, updated_at FROM documents WHERE collection = ? AND id = ?",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(document_from_row).transpose()
    }

    async fn put(&self, collection: &str, document: &Document) -> Result<()> {
        let fields_json = serde_json::to_string(&document.fields)?;
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, fields_json, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(collection, id) DO UPDATE SET
                fields_json = excluded.fields_json,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(collection)
        .bind(&document.id)
        .bind(&fields_json)
        .bind(document.created_at)
        .bind(document.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn all(&self, collection: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            "SELECT id, fields_json, created_at, updated_at FROM documents WHERE collection = ? ORDER BY id",
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn tagged_with(
        &self,
        collection: &str,
        context: &TagContext,
        tags: &[String],
    ) -> Result<Vec<Document>> {
        let docs = self.tagged_candidates(collection, context).await?;
        Ok(docs
            .into_iter()
            .filter(|doc| has_all_tags(doc, context, tags))
            .collect())
    }

    async fn tally(
        &self,
        collection: &str,
        context: &TagContext,
    ) -> Result<Vec<AggregationRecord>> {
        let docs = self.tagged_candidates(collection, context).await?;
        let records = tally_documents(&docs, context);
        debug!(
            collection,
            context = %context.name,
            documents = docs.len(),
            rows = records.len(),
            "tallied tags"
        );
        Ok(records)
    }
}
