//! Aggregation strategies.
//!
//! A strategy answers the two per-context queries (distinct tags, tags with
//! weight) and receives the lifecycle deltas for the contexts it serves.
//!
//! | Strategy | Read path | Write path |
//! |----------|-----------|------------|
//! | [`BatchRecompute`] | Full reduction over the collection | None |
//! | [`IncrementalCounter`] | Counter table lookup | One atomic update per changed tag |
//! | [`IncrementalGroupedCounter`] | Counter table lookup, per group or summed | Same, keyed by group |
//!
//! Strategies are selected per context at registration time and held next
//! to the [`TagContext`] they serve.

mod batch;
mod counter;
mod grouped;

pub use batch::BatchRecompute;
pub use counter::IncrementalCounter;
pub use grouped::IncrementalGroupedCounter;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::{aggregation_name, TagContext};
use crate::delta::Delta;
use crate::error::{TagError, TagResult};
use crate::store::{AggregationRecord, AggregationStore, CounterKey, DocumentStore, GroupScope};

/// A tag paired with its weight.
pub type TagWeight = (String, i64);

/// Which strategy a context uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StrategyKind {
    BatchRecompute,
    IncrementalCounter,
    IncrementalGroupedCounter,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::BatchRecompute => "batch",
            StrategyKind::IncrementalCounter => "incremental",
            StrategyKind::IncrementalGroupedCounter => "incremental_grouped",
        }
    }

    /// Instantiate the strategy over the given stores.
    pub fn build(
        self,
        records: Arc<dyn AggregationStore>,
        documents: Arc<dyn DocumentStore>,
    ) -> Arc<dyn AggregationStrategy> {
        match self {
            StrategyKind::BatchRecompute => {
                Arc::new(BatchRecompute::new(documents).with_cache(records))
            }
            StrategyKind::IncrementalCounter => Arc::new(IncrementalCounter::new(records)),
            StrategyKind::IncrementalGroupedCounter => {
                Arc::new(IncrementalGroupedCounter::new(records))
            }
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = TagError;

    fn from_str(s: &str) -> TagResult<Self> {
        match s {
            "batch" | "map_reduce" => Ok(StrategyKind::BatchRecompute),
            "incremental" | "real_time" => Ok(StrategyKind::IncrementalCounter),
            "incremental_grouped" | "real_time_group_by" => {
                Ok(StrategyKind::IncrementalGroupedCounter)
            }
            "group_by_real_time" | "group_by_taggable" => Err(TagError::RemovedOption {
                option: s.to_string(),
                hint: "Use strategy \"incremental_grouped\" together with group_by_field."
                    .to_string(),
            }),
            other => Err(TagError::UnknownStrategy {
                name: other.to_string(),
            }),
        }
    }
}

impl TryFrom<String> for StrategyKind {
    type Error = TagError;

    fn try_from(s: String) -> TagResult<Self> {
        s.parse()
    }
}

impl From<StrategyKind> for String {
    fn from(kind: StrategyKind) -> Self {
        kind.as_str().to_string()
    }
}

/// The `(collection, context)` pair a strategy call operates on.
#[derive(Debug, Clone, Copy)]
pub struct AggregationTarget<'a> {
    pub collection: &'a str,
    pub context: &'a TagContext,
}

impl<'a> AggregationTarget<'a> {
    pub fn new(collection: &'a str, context: &'a TagContext) -> Self {
        Self {
            collection,
            context,
        }
    }

    /// `"{collection}_{context}_aggregation"`.
    pub fn table(&self) -> String {
        aggregation_name(self.collection, &self.context.name)
    }

    /// Reject a group argument on a context that does not group.
    pub fn check_group(&self, group: Option<&str>) -> TagResult<()> {
        if group.is_some() && !self.context.is_grouped() {
            return Err(TagError::NotGrouped {
                context: self.context.name.clone(),
            });
        }
        Ok(())
    }
}

/// Query and update contract shared by every strategy.
#[async_trait]
pub trait AggregationStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Tags with their weights, ascending by tag. Empty when none exist.
    async fn tags_with_weight_for(
        &self,
        target: &AggregationTarget<'_>,
        group: Option<&str>,
    ) -> TagResult<Vec<TagWeight>>;

    /// Distinct tags, ascending. Empty when none exist.
    async fn tags_for(
        &self,
        target: &AggregationTarget<'_>,
        group: Option<&str>,
    ) -> TagResult<Vec<String>> {
        let weighted = self.tags_with_weight_for(target, group).await?;
        Ok(weighted.into_iter().map(|(tag, _)| tag).collect())
    }

    /// Apply one save delta.
    async fn on_save(&self, target: &AggregationTarget<'_>, delta: &Delta) -> TagResult<()>;

    /// Apply a destroy: every tag the document held leaves its group.
    async fn on_destroy(
        &self,
        target: &AggregationTarget<'_>,
        tags: &BTreeSet<String>,
        group: Option<&str>,
    ) -> TagResult<()> {
        let delta = Delta::removal(&target.context.name, tags, group);
        self.on_save(target, &delta).await
    }
}

/// Collapse records onto tags, summing weights across groups.
pub(crate) fn sum_by_tag(records: &[AggregationRecord]) -> Vec<TagWeight> {
    let mut totals: BTreeMap<&str, i64> = BTreeMap::new();
    for r in records {
        *totals.entry(r.tag.as_str()).or_insert(0) += r.count;
    }
    totals
        .into_iter()
        .filter(|(_, count)| *count > 0)
        .map(|(tag, count)| (tag.to_string(), count))
        .collect()
}

/// Apply a delta to a counter table, one atomic update per tag.
///
/// Updates are independent: a failure stops the loop and leaves earlier
/// counters applied.
pub(crate) async fn apply_delta(
    store: &dyn AggregationStore,
    table: &str,
    group: Option<&str>,
    delta: &Delta,
) -> TagResult<()> {
    for tag in &delta.added {
        let count = store.increment(CounterKey { table, tag: tag.as_str(), group }).await?;
        debug!(table, tag = tag.as_str(), ?group, count, "incremented tag counter");
    }
    for tag in &delta.removed {
        match store.decrement(CounterKey { table, tag: tag.as_str(), group }).await? {
            None => warn!(table, tag = tag.as_str(), ?group, "decrement of absent tag counter"),
            Some(count) if count < 0 => warn!(
                table,
                tag = tag.as_str(),
                ?group,
                count,
                "tag counter went negative; row removed"
            ),
            Some(0) => debug!(table, tag = tag.as_str(), ?group, "removed tag counter"),
            Some(count) => {
                debug!(table, tag = tag.as_str(), ?group, count, "decremented tag counter")
            }
        }
    }
    Ok(())
}

/// Overwrite a counter table with an exact reduction over the collection.
///
/// This is the drift-recovery pass for the incremental strategies. With
/// `keep_groups` unset the reduction is collapsed onto ungrouped rows, the
/// shape [`IncrementalCounter`] maintains.
pub async fn reconcile(
    target: &AggregationTarget<'_>,
    documents: &dyn DocumentStore,
    records: &dyn AggregationStore,
    keep_groups: bool,
) -> TagResult<usize> {
    let tally = documents.tally(target.collection, target.context).await?;
    let exact: Vec<AggregationRecord> = if keep_groups {
        tally
    } else {
        sum_by_tag(&tally)
            .into_iter()
            .map(|(tag, count)| AggregationRecord {
                tag,
                group: None,
                count,
            })
            .collect()
    };
    let table = target.table();
    let before = records.records(&table, GroupScope::All).await?;
    if before != exact {
        warn!(
            table = table.as_str(),
            stored_rows = before.len(),
            exact_rows = exact.len(),
            "aggregation drift detected, rewriting table"
        );
    }
    records.replace_all(&table, &exact).await?;
    Ok(exact.len())
}
