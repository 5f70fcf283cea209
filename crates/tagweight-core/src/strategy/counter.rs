//! Live per-tag counters, updated on every save and destroy.

use std::sync::Arc;

use async_trait::async_trait;

use crate::delta::Delta;
use crate::error::{TagError, TagResult};
use crate::store::{AggregationStore, GroupScope};

use super::{apply_delta, AggregationStrategy, AggregationTarget, StrategyKind, TagWeight};

/// Maintains one counter per tag in the context's aggregation table.
///
/// Reads are a direct table lookup. Each save performs one atomic
/// increment per added tag and one atomic decrement per removed tag; there
/// is no transaction across tags.
pub struct IncrementalCounter {
    store: Arc<dyn AggregationStore>,
}

impl IncrementalCounter {
    pub fn new(store: Arc<dyn AggregationStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AggregationStrategy for IncrementalCounter {
    fn kind(&self) -> StrategyKind {
        StrategyKind::IncrementalCounter
    }

    async fn tags_with_weight_for(
        &self,
        target: &AggregationTarget<'_>,
        group: Option<&str>,
    ) -> TagResult<Vec<TagWeight>> {
        if group.is_some() {
            return Err(TagError::NotGrouped {
                context: target.context.name.clone(),
            });
        }
        let records = self
            .store
            .records(&target.table(), GroupScope::Ungrouped)
            .await?;
        Ok(records
            .into_iter()
            .filter(|r| r.count > 0)
            .map(|r| (r.tag, r.count))
            .collect())
    }

    async fn on_save(&self, target: &AggregationTarget<'_>, delta: &Delta) -> TagResult<()> {
        // Counters are never partitioned here, whatever group the delta carries.
        apply_delta(self.store.as_ref(), &target.table(), None, delta).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ContextOptions, TagContext};
    use crate::store::memory::InMemoryAggregationStore;
    use std::collections::BTreeSet;

    fn set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|t| t.to_string()).collect()
    }

    fn added(tags: &[&str]) -> Delta {
        Delta {
            context: "tags".into(),
            group: None,
            added: set(tags),
            removed: BTreeSet::new(),
        }
    }

    #[tokio::test]
    async fn test_empty_returns_empty() {
        let strategy = IncrementalCounter::new(Arc::new(InMemoryAggregationStore::new()));
        let ctx = TagContext::from_options("tags", &ContextOptions::new()).unwrap();
        let target = AggregationTarget::new("docs", &ctx);
        assert!(strategy.tags_for(&target, None).await.unwrap().is_empty());
        assert!(strategy.tags_with_weight_for(&target, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_counts_and_update() {
        let strategy = IncrementalCounter::new(Arc::new(InMemoryAggregationStore::new()));
        let ctx = TagContext::from_options("tags", &ContextOptions::new()).unwrap();
        let target = AggregationTarget::new("docs", &ctx);

        strategy.on_save(&target, &added(&["food", "ant", "bee"])).await.unwrap();
        strategy.on_save(&target, &added(&["juice", "food", "bee", "zip"])).await.unwrap();
        strategy.on_save(&target, &added(&["honey", "strip", "food"])).await.unwrap();

        assert_eq!(
            strategy.tags_for(&target, None).await.unwrap(),
            vec!["ant", "bee", "food", "honey", "juice", "strip", "zip"]
        );

        let update = Delta {
            context: "tags".into(),
            group: None,
            added: set(&["honey", "strip", "shoe"]),
            removed: set(&["food"]),
        };
        strategy.on_save(&target, &update).await.unwrap();
        let weights = strategy.tags_with_weight_for(&target, None).await.unwrap();
        let get = |t: &str| weights.iter().find(|(tag, _)| tag == t).map(|(_, w)| *w);
        assert_eq!(get("food"), Some(2));
        assert_eq!(get("honey"), Some(2));
        assert_eq!(get("strip"), Some(2));
        assert_eq!(get("shoe"), Some(1));
        assert_eq!(get("bee"), Some(2));
    }

    #[tokio::test]
    async fn test_destroy_drops_zero_counters() {
        let strategy = IncrementalCounter::new(Arc::new(InMemoryAggregationStore::new()));
        let ctx = TagContext::from_options("tags", &ContextOptions::new()).unwrap();
        let target = AggregationTarget::new("docs", &ctx);
        strategy.on_save(&target, &added(&["a", "b"])).await.unwrap();
        strategy.on_save(&target, &added(&["b"])).await.unwrap();
        strategy.on_destroy(&target, &set(&["a", "b"]), None).await.unwrap();
        assert_eq!(
            strategy.tags_with_weight_for(&target, None).await.unwrap(),
            vec![("b".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_group_argument_rejected_without_group_field() {
        let strategy = IncrementalCounter::new(Arc::new(InMemoryAggregationStore::new()));
        let ctx = TagContext::from_options("tags", &ContextOptions::new()).unwrap();
        let target = AggregationTarget::new("docs", &ctx);
        let err = strategy.tags_for(&target, Some("user1")).await.unwrap_err();
        assert!(matches!(err, TagError::NotGrouped { .. }));
    }
}
