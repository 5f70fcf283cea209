//! Storage abstraction for tag aggregation.
//!
//! Two traits define the durable state the engine touches:
//!
//! | Trait | Holds |
//! |-------|-------|
//! | [`AggregationStore`] | Keyed counters, one logical table per `(collection, context)` |
//! | [`DocumentStore`] | Documents and their tag lists, plus the full-scan reduction |
//!
//! Counter updates must be atomic per key. Implementations must never
//! increment or decrement a counter as a separate read and write; the
//! engine itself takes no locks and relies on the store for this.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::context::TagContext;
use crate::document::Document;

/// One counter row in an aggregation table.
///
/// The table (named `"{collection}_{context}_aggregation"`) identifies the
/// context; within it the row is keyed by `(tag, group)`. A row whose count
/// drops to zero is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregationRecord {
    pub tag: String,
    pub group: Option<String>,
    pub count: i64,
}

/// Key of a single counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterKey<'a> {
    pub table: &'a str,
    pub tag: &'a str,
    pub group: Option<&'a str>,
}

/// Which rows of an aggregation table a read selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupScope<'a> {
    /// Rows without a group.
    Ungrouped,
    /// Rows for exactly this group.
    Group(&'a str),
    /// Every row regardless of group.
    All,
}

impl GroupScope<'_> {
    pub fn matches(&self, group: Option<&str>) -> bool {
        match self {
            GroupScope::Ungrouped => group.is_none(),
            GroupScope::Group(g) => group == Some(*g),
            GroupScope::All => true,
        }
    }
}

/// Row and weight totals for one aggregation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub rows: i64,
    pub total_weight: i64,
}

/// Counter table backend.
#[async_trait]
pub trait AggregationStore: Send + Sync {
    /// Atomically add one to a counter, creating it at 1 when absent.
    /// Returns the new count.
    async fn increment(&self, key: CounterKey<'_>) -> Result<i64>;

    /// Atomically subtract one from a counter and delete it once it reaches
    /// zero. Returns the count the decrement produced, or `None` if the
    /// counter was absent. A negative result means the row was already at or
    /// below zero; it is deleted all the same.
    async fn decrement(&self, key: CounterKey<'_>) -> Result<Option<i64>>;

    /// Rows of a table matching `scope`, sorted by tag then group.
    async fn records(&self, table: &str, scope: GroupScope<'_>) -> Result<Vec<AggregationRecord>>;

    /// Overwrite a whole table with `records`. Rows with non-positive counts
    /// are not written.
    async fn replace_all(&self, table: &str, records: &[AggregationRecord]) -> Result<()>;

    /// Per-table totals, sorted by table name.
    async fn summaries(&self) -> Result<Vec<TableSummary>>;
}

/// Document collection backend.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch the persisted state of a document.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Insert or replace a document.
    async fn put(&self, collection: &str, document: &Document) -> Result<()>;

    /// Delete a document. Returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;

    /// All documents in a collection, ordered by id.
    async fn all(&self, collection: &str) -> Result<Vec<Document>>;

    /// Documents whose tag list for `context` contains every tag in `tags`.
    async fn tagged_with(
        &self,
        collection: &str,
        context: &TagContext,
        tags: &[String],
    ) -> Result<Vec<Document>>;

    /// Full reduction over the collection: count documents per
    /// `(group, tag)` for `context`, sorted by tag then group.
    async fn tally(&self, collection: &str, context: &TagContext)
        -> Result<Vec<AggregationRecord>>;
}

/// Count documents per `(tag, group)` over each document's normalized tag
/// list, sorted by tag then group. Shared by every [`DocumentStore::tally`]
/// so full scans agree with what the lifecycle hooks count.
pub fn tally_documents<'a>(
    documents: impl IntoIterator<Item = &'a Document>,
    context: &TagContext,
) -> Vec<AggregationRecord> {
    let mut counts: BTreeMap<(String, Option<String>), i64> = BTreeMap::new();
    for doc in documents {
        let Some(list) = doc.tag_list(context) else {
            continue;
        };
        let group = doc.group_value(context);
        for tag in list.iter() {
            *counts.entry((tag.to_string(), group.clone())).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .map(|((tag, group), count)| AggregationRecord { tag, group, count })
        .collect()
}

/// Whether a document's normalized tag list holds every tag in `tags`.
pub fn has_all_tags(document: &Document, context: &TagContext, tags: &[String]) -> bool {
    document
        .tag_list(context)
        .map(|list| tags.iter().all(|t| list.contains(t)))
        .unwrap_or(false)
}
