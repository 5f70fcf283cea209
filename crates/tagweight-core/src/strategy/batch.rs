//! On-demand recomputation by full reduction over the collection.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::delta::Delta;
use crate::error::TagResult;
use crate::store::{AggregationRecord, AggregationStore, DocumentStore, GroupScope};

use super::{sum_by_tag, AggregationStrategy, AggregationTarget, StrategyKind, TagWeight};

/// Re-derives aggregates on every read; keeps no live counters.
///
/// Suited to write-heavy collections that are rarely queried. When a cache
/// store is attached, each computation overwrites the context's aggregation
/// table with its result. That table is a snapshot for outside readers and
/// is never consulted by this strategy.
pub struct BatchRecompute {
    documents: Arc<dyn DocumentStore>,
    cache: Option<Arc<dyn AggregationStore>>,
}

impl BatchRecompute {
    pub fn new(documents: Arc<dyn DocumentStore>) -> Self {
        Self {
            documents,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn AggregationStore>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Run the reduction and refresh the cache table, if any.
    pub async fn recompute(
        &self,
        target: &AggregationTarget<'_>,
    ) -> TagResult<Vec<AggregationRecord>> {
        let records = self
            .documents
            .tally(target.collection, target.context)
            .await?;
        if let Some(cache) = &self.cache {
            let table = target.table();
            cache.replace_all(&table, &records).await?;
            debug!(table = table.as_str(), rows = records.len(), "refreshed aggregation cache");
        }
        Ok(records)
    }
}

#[async_trait]
impl AggregationStrategy for BatchRecompute {
    fn kind(&self) -> StrategyKind {
        StrategyKind::BatchRecompute
    }

    async fn tags_with_weight_for(
        &self,
        target: &AggregationTarget<'_>,
        group: Option<&str>,
    ) -> TagResult<Vec<TagWeight>> {
        target.check_group(group)?;
        let records = self.recompute(target).await?;
        let scope = match group {
            Some(g) => GroupScope::Group(g),
            None => GroupScope::All,
        };
        let selected: Vec<AggregationRecord> = records
            .into_iter()
            .filter(|r| scope.matches(r.group.as_deref()))
            .collect();
        Ok(sum_by_tag(&selected))
    }

    async fn on_save(&self, _target: &AggregationTarget<'_>, _delta: &Delta) -> TagResult<()> {
        Ok(())
    }
}
