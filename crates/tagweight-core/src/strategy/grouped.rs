//! Live per-tag counters partitioned by the document's grouping value.

use std::sync::Arc;

use async_trait::async_trait;

use crate::delta::Delta;
use crate::error::TagResult;
use crate::store::{AggregationStore, GroupScope};

use super::{apply_delta, sum_by_tag, AggregationStrategy, AggregationTarget, StrategyKind, TagWeight};

/// Same update path as [`IncrementalCounter`](super::IncrementalCounter),
/// with every counter keyed by `(tag, group)`.
///
/// A query for one group reads that partition. A query without a group
/// sums the partitions, which yields the same aggregate an ungrouped
/// deployment would show.
pub struct IncrementalGroupedCounter {
    store: Arc<dyn AggregationStore>,
}

impl IncrementalGroupedCounter {
    pub fn new(store: Arc<dyn AggregationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AggregationStrategy for IncrementalGroupedCounter {
    fn kind(&self) -> StrategyKind {
        StrategyKind::IncrementalGroupedCounter
    }

    async fn tags_with_weight_for(
        &self,
        target: &AggregationTarget<'_>,
        group: Option<&str>,
    ) -> TagResult<Vec<TagWeight>> {
        target.check_group(group)?;
        let scope = match group {
            Some(g) => GroupScope::Group(g),
            None => GroupScope::All,
        };
        let records = self.store.records(&target.table(), scope).await?;
        Ok(sum_by_tag(&records))
    }

    async fn on_save(&self, target: &AggregationTarget<'_>, delta: &Delta) -> TagResult<()> {
        apply_delta(
            self.store.as_ref(),
            &target.table(),
            delta.group.as_deref(),
            delta,
        )
        .await
    }
}
