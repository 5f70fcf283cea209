//! In-memory store implementations for testing and embedding.
//!
//! Uses `BTreeMap` behind `std::sync::RwLock`. Each counter update runs
//! under the write lock, which gives the per-key atomicity the
//! [`AggregationStore`] contract asks for.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::context::TagContext;
use crate::document::Document;

use super::{
    has_all_tags, tally_documents, AggregationRecord, AggregationStore, CounterKey, DocumentStore,
    GroupScope, TableSummary,
};

type Counters = BTreeMap<(String, Option<String>), i64>;

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("in-memory store lock poisoned")
}

/// In-memory counter tables.
pub struct InMemoryAggregationStore {
    tables: RwLock<BTreeMap<String, Counters>>,
}

impl InMemoryAggregationStore {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for InMemoryAggregationStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AggregationStore for InMemoryAggregationStore {
    async fn increment(&self, key: CounterKey<'_>) -> Result<i64> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let count = tables
            .entry(key.table.to_string())
            .or_default()
            .entry((key.tag.to_string(), key.group.map(str::to_string)))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn decrement(&self, key: CounterKey<'_>) -> Result<Option<i64>> {
        let mut tables = self.tables.write().map_err(poisoned)?;
        let Some(table) = tables.get_mut(key.table) else {
            return Ok(None);
        };
        let row = (key.tag.to_string(), key.group.map(str::to_string));
        let Some(count) = table.get_mut(&row) else {
            return Ok(None);
        };
        *count -= 1;
        let remaining = *count;
        if remaining <= 0 {
            table.remove(&row);
        }
        Ok(Some(remaining))
    }

    async fn records(&self, table: &str, scope: GroupScope<'_>) -> Result<Vec<AggregationRecord>> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .get(table)
            .map(|rows| {
                rows.iter()
                    .filter(|((_, group), _)| scope.matches(group.as_deref()))
                    .map(|((tag, group), count)| AggregationRecord {
                        tag: tag.clone(),
                        group: group.clone(),
                        count: *count,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn replace_all(&self, table: &str, records: &[AggregationRecord]) -> Result<()> {
        let rows: Counters = records
            .iter()
            .filter(|r| r.count > 0)
            .map(|r| ((r.tag.clone(), r.group.clone()), r.count))
            .collect();
        let mut tables = self.tables.write().map_err(poisoned)?;
        tables.insert(table.to_string(), rows);
        Ok(())
    }

    async fn summaries(&self) -> Result<Vec<TableSummary>> {
        let tables = self.tables.read().map_err(poisoned)?;
        Ok(tables
            .iter()
            .filter(|(_, rows)| !rows.is_empty())
            .map(|(name, rows)| TableSummary {
                table: name.clone(),
                rows: rows.len() as i64,
                total_weight: rows.values().sum(),
            })
            .collect())
    }
}

/// In-memory document collections.
pub struct InMemoryDocumentStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections.get(collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn put(&self, collection: &str, document: &Document) -> Result<()> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(document.id.clone(), document.clone());
        Ok(())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        let mut collections = self.collections.write().map_err(poisoned)?;
        Ok(collections
            .get_mut(collection)
            .map(|docs| docs.remove(id).is_some())
            .unwrap_or(false))
    }

    async fn all(&self, collection: &str) -> Result<Vec<Document>> {
        let collections = self.collections.read().map_err(poisoned)?;
        Ok(collections
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn tagged_with(
        &self,
        collection: &str,
        context: &TagContext,
        tags: &[String],
    ) -> Result<Vec<Document>> {
        let docs = self.all(collection).await?;
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
        let docs = self.all(collection).await?;
        Ok(tally_documents(&docs, context))
    }
}
