//! Document layer: persists documents and fires the lifecycle hooks.
//!
//! [`TaggedCollection`] is the only writer of documents for a schema. On save
//! it reads the last-persisted state first, writes the new state, then
//! dispatches the per-context deltas. On destroy it dispatches the removal
//! of the persisted state after the document is gone. A failure part-way
//! through leaves earlier counter updates in place; [`TaggedCollection::reconcile`]
//! repairs any drift.

use std::sync::Arc;

use tracing::info;

use crate::dispatch::LifecycleDispatcher;
use crate::document::Document;
use crate::error::TagResult;
use crate::normalize::{normalize, RawTags, TagList};
use crate::schema::TaggableSchema;
use crate::store::{AggregationStore, DocumentStore};
use crate::strategy::{reconcile, AggregationTarget, StrategyKind, TagWeight};

/// A schema bound to the stores holding its documents and counters.
#[derive(Clone)]
pub struct TaggedCollection {
    schema: Arc<TaggableSchema>,
    documents: Arc<dyn DocumentStore>,
    records: Arc<dyn AggregationStore>,
    dispatcher: LifecycleDispatcher,
}

impl TaggedCollection {
    pub fn new(
        schema: Arc<TaggableSchema>,
        documents: Arc<dyn DocumentStore>,
        records: Arc<dyn AggregationStore>,
    ) -> Self {
        Self {
            schema,
            documents,
            records,
            dispatcher: LifecycleDispatcher,
        }
    }

    pub fn schema(&self) -> &TaggableSchema {
        &self.schema
    }

    /// New unsaved document with every context's default tag list applied.
    pub fn new_document(&self) -> Document {
        self.with_defaults(Document::new())
    }

    pub fn new_document_with_id(&self, id: impl Into<String>) -> Document {
        self.with_defaults(Document::with_id(id))
    }

    fn with_defaults(&self, mut doc: Document) -> Document {
        for entry in self.schema.registered() {
            if let Some(default) = &entry.context.default {
                let raw = RawTags::from(default.clone());
                doc.store_tag_list(&entry.context, normalize(&raw, &entry.context.separator));
            }
        }
        doc
    }

    /// Normalize and assign a context's tag list.
    pub fn set_tags(
        &self,
        doc: &mut Document,
        context: &str,
        raw: impl Into<RawTags>,
    ) -> TagResult<()> {
        let ctx = self.schema.context(context)?;
        let list = normalize(&raw.into(), &ctx.separator);
        doc.store_tag_list(ctx, list);
        Ok(())
    }

    /// Normalize and assign from an untyped JSON value.
    pub fn set_tags_value(
        &self,
        doc: &mut Document,
        context: &str,
        value: &serde_json::Value,
    ) -> TagResult<()> {
        let raw = RawTags::try_from(value)?;
        self.set_tags(doc, context, raw)
    }

    pub fn tags(&self, doc: &Document, context: &str) -> TagResult<Option<TagList>> {
        let ctx = self.schema.context(context)?;
        Ok(doc.tag_list(ctx))
    }

    /// Tag list joined with the context separator; empty when unset.
    pub fn tag_string(&self, doc: &Document, context: &str) -> TagResult<String> {
        let ctx = self.schema.context(context)?;
        Ok(doc
            .tag_list(ctx)
            .map(|t| t.join(&ctx.separator))
            .unwrap_or_default())
    }

    pub fn set_tag_string(&self, doc: &mut Document, context: &str, value: &str) -> TagResult<()> {
        self.set_tags(doc, context, RawTags::from(value))
    }

    pub async fn find(&self, id: &str) -> TagResult<Option<Document>> {
        Ok(self.documents.get(self.schema.collection(), id).await?)
    }

    pub async fn all(&self) -> TagResult<Vec<Document>> {
        Ok(self.documents.all(self.schema.collection()).await?)
    }

    /// Persist a document and update aggregates for every context.
    pub async fn save(&self, doc: &mut Document) -> TagResult<()> {
        let collection = self.schema.collection();
        let previous = self.documents.get(collection, &doc.id).await?;
        doc.updated_at = chrono::Utc::now().timestamp();
        if let Some(prev) = &previous {
            doc.created_at = prev.created_at;
        }
        self.documents.put(collection, doc).await?;
        self.dispatcher
            .on_save(&self.schema, previous.as_ref(), doc)
            .await
    }

    /// Build, save, and return a document in one step.
    pub async fn create(
        &self,
        fields: serde_json::Map<String, serde_json::Value>,
    ) -> TagResult<Document> {
        let mut doc = self.new_document();
        for (key, value) in fields {
            let context = self
                .schema
                .registered()
                .iter()
                .find(|c| c.context.name == key || c.context.db_field == key)
                .map(|c| c.context.name.clone());
            match context {
                Some(name) => self.set_tags_value(&mut doc, &name, &value)?,
                None => doc.set(key, value),
            }
        }
        self.save(&mut doc).await?;
        Ok(doc)
    }

    /// Remove a document and its contribution to the aggregates.
    /// Returns `false` when no such document was persisted.
    pub async fn destroy(&self, id: &str) -> TagResult<bool> {
        let collection = self.schema.collection();
        let Some(persisted) = self.documents.get(collection, id).await? else {
            return Ok(false);
        };
        self.documents.delete(collection, id).await?;
        self.dispatcher.on_destroy(&self.schema, &persisted).await?;
        Ok(true)
    }

    /// Documents carrying every tag in `raw` for a context.
    pub async fn tagged_with(
        &self,
        context: &str,
        raw: impl Into<RawTags>,
    ) -> TagResult<Vec<Document>> {
        let ctx = self.schema.context(context)?;
        let tags = normalize(&raw.into(), &ctx.separator)
            .map(TagList::into_vec)
            .unwrap_or_default();
        Ok(self
            .documents
            .tagged_with(self.schema.collection(), ctx, &tags)
            .await?)
    }

    pub async fn tags_for(&self, context: &str, group: Option<&str>) -> TagResult<Vec<String>> {
        self.schema.tags_for(context, group).await
    }

    pub async fn tags_with_weight_for(
        &self,
        context: &str,
        group: Option<&str>,
    ) -> TagResult<Vec<TagWeight>> {
        self.schema.tags_with_weight_for(context, group).await
    }

    /// Rewrite a context's aggregation table from a full reduction.
    /// Returns the number of rows written.
    pub async fn reconcile(&self, context: &str) -> TagResult<usize> {
        let entry = self.schema.entry(context)?;
        let keep_groups = entry.strategy_kind() != Some(StrategyKind::IncrementalCounter);
        let target = AggregationTarget::new(self.schema.collection(), &entry.context);
        let rows = reconcile(
            &target,
            self.documents.as_ref(),
            self.records.as_ref(),
            keep_groups,
        )
        .await?;
        info!(
            collection = self.schema.collection(),
            context,
            rows,
            "reconciled tag aggregation"
        );
        Ok(rows)
    }
}
