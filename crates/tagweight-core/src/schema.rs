//! Per-document-type registry of tag contexts.
//!
//! Contexts are registered once at schema-definition time, each with an
//! optional aggregation strategy. Everything that used to be a generated
//! per-context method is a lookup keyed by context name here.

use std::sync::Arc;

use serde::Serialize;

use crate::context::{aggregation_name, collection_name_for, ContextOptions, TagContext};
use crate::error::{TagError, TagResult};
use crate::strategy::{AggregationStrategy, AggregationTarget, StrategyKind, TagWeight};

/// A context together with the strategy that aggregates it.
#[derive(Clone)]
pub struct RegisteredContext {
    pub context: TagContext,
    pub strategy: Option<Arc<dyn AggregationStrategy>>,
}

impl RegisteredContext {
    pub fn strategy_kind(&self) -> Option<StrategyKind> {
        self.strategy.as_ref().map(|s| s.kind())
    }
}

impl std::fmt::Debug for RegisteredContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredContext")
            .field("context", &self.context)
            .field("strategy", &self.strategy_kind())
            .finish()
    }
}

/// Serializable view of a registered context, used for listings.
#[derive(Debug, Clone, Serialize)]
pub struct ContextInfo {
    pub name: String,
    pub db_field: String,
    pub separator: String,
    pub group_by_field: Option<String>,
    pub strategy: Option<StrategyKind>,
    pub aggregation: String,
}

/// The taggable contexts of one document type.
#[derive(Debug, Clone)]
pub struct TaggableSchema {
    type_name: String,
    collection: String,
    contexts: Vec<RegisteredContext>,
}

impl TaggableSchema {
    /// Schema for `type_name`, stored in its pluralized lowercase collection.
    pub fn new(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        let collection = collection_name_for(&type_name);
        Self {
            type_name,
            collection,
            contexts: Vec::new(),
        }
    }

    /// Override the storage collection name.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Register a context.
    ///
    /// Registering the same name again is a no-op when the settings and
    /// strategy kind match, and [`TagError::DuplicateContext`] otherwise.
    pub fn register(
        &mut self,
        name: &str,
        options: &ContextOptions,
        strategy: Option<Arc<dyn AggregationStrategy>>,
    ) -> TagResult<&TagContext> {
        let context = TagContext::from_options(name, options)?;
        let kind = strategy.as_ref().map(|s| s.kind());

        if let Some(idx) = self.contexts.iter().position(|c| c.context.name == name) {
            let existing = &self.contexts[idx];
            if existing.context != context || existing.strategy_kind() != kind {
                return Err(TagError::DuplicateContext {
                    context: name.to_string(),
                });
            }
            return Ok(&self.contexts[idx].context);
        }

        if self
            .contexts
            .iter()
            .any(|c| c.context.db_field == context.db_field)
        {
            return Err(TagError::DuplicateContext {
                context: name.to_string(),
            });
        }

        self.contexts.push(RegisteredContext { context, strategy });
        let last = self.contexts.len() - 1;
        Ok(&self.contexts[last].context)
    }

    pub fn registered(&self) -> &[RegisteredContext] {
        &self.contexts
    }

    /// Names of all registered contexts, in registration order.
    pub fn tag_contexts(&self) -> Vec<&str> {
        self.contexts.iter().map(|c| c.context.name.as_str()).collect()
    }

    /// Storage field of every registered context.
    pub fn tag_database_fields(&self) -> Vec<&str> {
        self.contexts
            .iter()
            .map(|c| c.context.db_field.as_str())
            .collect()
    }

    pub fn entry(&self, name: &str) -> TagResult<&RegisteredContext> {
        self.contexts
            .iter()
            .find(|c| c.context.name == name)
            .ok_or_else(|| TagError::UnknownContext {
                context: name.to_string(),
            })
    }

    pub fn context(&self, name: &str) -> TagResult<&TagContext> {
        self.entry(name).map(|c| &c.context)
    }

    pub fn separator_for(&self, name: &str) -> TagResult<&str> {
        self.context(name).map(|c| c.separator.as_str())
    }

    pub fn group_by_field_for(&self, name: &str) -> TagResult<Option<&str>> {
        self.context(name).map(|c| c.group_by_field.as_deref())
    }

    /// `"{collection}_{context}_aggregation"`.
    pub fn aggregation_collection_for(&self, name: &str) -> TagResult<String> {
        let ctx = self.context(name)?;
        Ok(aggregation_name(&self.collection, &ctx.name))
    }

    pub fn info(&self) -> Vec<ContextInfo> {
        self.contexts
            .iter()
            .map(|c| ContextInfo {
                name: c.context.name.clone(),
                db_field: c.context.db_field.clone(),
                separator: c.context.separator.clone(),
                group_by_field: c.context.group_by_field.clone(),
                strategy: c.strategy_kind(),
                aggregation: aggregation_name(&self.collection, &c.context.name),
            })
            .collect()
    }

    fn strategy_for(&self, name: &str) -> TagResult<(&TagContext, &Arc<dyn AggregationStrategy>)> {
        let entry = self.entry(name)?;
        let strategy =
            entry
                .strategy
                .as_ref()
                .ok_or_else(|| TagError::AggregationStrategyMissing {
                    context: name.to_string(),
                })?;
        Ok((&entry.context, strategy))
    }

    /// Distinct tags in use for a context, ascending.
    pub async fn tags_for(&self, name: &str, group: Option<&str>) -> TagResult<Vec<String>> {
        let (context, strategy) = self.strategy_for(name)?;
        let target = AggregationTarget::new(&self.collection, context);
        strategy.tags_for(&target, group).await
    }

    /// Tags in use for a context with their weights, ascending by tag.
    pub async fn tags_with_weight_for(
        &self,
        name: &str,
        group: Option<&str>,
    ) -> TagResult<Vec<TagWeight>> {
        let (context, strategy) = self.strategy_for(name)?;
        let target = AggregationTarget::new(&self.collection, context);
        strategy.tags_with_weight_for(&target, group).await
    }
}
