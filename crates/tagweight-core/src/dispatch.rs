//! Lifecycle hooks that keep incremental aggregates in step with documents.
//!
//! The document layer calls [`LifecycleDispatcher::on_save`] with the
//! document's last-persisted state (captured before any in-memory change was
//! applied) and its new state, and [`LifecycleDispatcher::on_destroy`] with
//! the state being removed. For every registered context the dispatcher
//! computes the delta and hands it to that context's strategy.
//!
//! Contexts never interact; the order in which they are dispatched carries
//! no meaning.

use tracing::debug;

use crate::delta::{compute, TagSnapshot};
use crate::document::Document;
use crate::error::TagResult;
use crate::schema::TaggableSchema;
use crate::strategy::AggregationTarget;

/// Stateless coordinator between document mutations and strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleDispatcher;

impl LifecycleDispatcher {
    /// Dispatch a save. `previous` is `None` when the document is new.
    pub async fn on_save(
        &self,
        schema: &TaggableSchema,
        previous: Option<&Document>,
        next: &Document,
    ) -> TagResult<()> {
        for entry in schema.registered() {
            let Some(strategy) = &entry.strategy else {
                continue;
            };
            let context = &entry.context;
            let before = previous.map(|doc| TagSnapshot::of(doc, context));
            let after = TagSnapshot::of(next, context);
            let target = AggregationTarget::new(schema.collection(), context);
            for delta in compute(&context.name, before.as_ref(), Some(&after)) {
                debug!(
                    collection = schema.collection(),
                    context = context.name.as_str(),
                    group = ?delta.group,
                    added = delta.added.len(),
                    removed = delta.removed.len(),
                    "dispatching tag delta"
                );
                strategy.on_save(&target, &delta).await?;
            }
        }
        Ok(())
    }

    /// Dispatch a destroy of the document's last-persisted state.
    pub async fn on_destroy(&self, schema: &TaggableSchema, document: &Document) -> TagResult<()> {
        for entry in schema.registered() {
            let Some(strategy) = &entry.strategy else {
                continue;
            };
            let context = &entry.context;
            let snapshot = TagSnapshot::of(document, context);
            if snapshot.tags.is_empty() {
                continue;
            }
            let target = AggregationTarget::new(schema.collection(), context);
            debug!(
                collection = schema.collection(),
                context = context.name.as_str(),
                removed = snapshot.tags.len(),
                "dispatching tag destroy"
            );
            strategy
                .on_destroy(&target, &snapshot.tags, snapshot.group.as_deref())
                .await?;
        }
        Ok(())
    }
}
