//! Builds the configured document types over a shared pair of stores.
//!
//! Each `[[types]]` entry becomes a [`TaggableSchema`] with its contexts
//! registered in file order, bound into a [`TaggedCollection`].

use anyhow::{Context, Result};
use std::sync::Arc;

use tagweight_core::{AggregationStore, DocumentStore, TaggableSchema, TaggedCollection};

use crate::config::{Config, TypeConfig};
use crate::db;
use crate::sqlite_store::{SqliteAggregationStore, SqliteDocumentStore};

/// All configured document types, in configuration order.
pub struct Catalog {
    records: Arc<dyn AggregationStore>,
    collections: Vec<TaggedCollection>,
}

impl Catalog {
    pub fn build(
        config: &Config,
        documents: Arc<dyn DocumentStore>,
        records: Arc<dyn AggregationStore>,
    ) -> Result<Self> {
        let collections = config
            .types
            .iter()
            .map(|ty| build_collection(ty, documents.clone(), records.clone()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            records,
            collections,
        })
    }

    /// Catalog over the SQLite stores sharing `pool`.
    pub fn sqlite(config: &Config, pool: sqlx::SqlitePool) -> Result<Self> {
        let documents: Arc<dyn DocumentStore> = Arc::new(SqliteDocumentStore::new(pool.clone()));
        let records: Arc<dyn AggregationStore> = Arc::new(SqliteAggregationStore::new(pool));
        Self::build(config, documents, records)
    }

    /// Connect to the configured database and build the catalog over it.
    pub async fn open(config: &Config) -> Result<(sqlx::SqlitePool, Self)> {
        let pool = db::connect(config).await?;
        let catalog = Self::sqlite(config, pool.clone())?;
        Ok((pool, catalog))
    }

    pub fn collections(&self) -> &[TaggedCollection] {
        &self.collections
    }

    pub fn records(&self) -> &dyn AggregationStore {
        self.records.as_ref()
    }

    /// Look up a type by its configured name.
    pub fn get(&self, type_name: &str) -> Result<&TaggedCollection> {
        self.collections
            .iter()
            .find(|c| c.schema().type_name() == type_name)
            .ok_or_else(|| {
                let known: Vec<&str> = self
                    .collections
                    .iter()
                    .map(|c| c.schema().type_name())
                    .collect();
                anyhow::anyhow!(
                    "Unknown type '{}'. Configured types: {}",
                    type_name,
                    known.join(", ")
                )
            })
    }
}

fn build_collection(
    ty: &TypeConfig,
    documents: Arc<dyn DocumentStore>,
    records: Arc<dyn AggregationStore>,
) -> Result<TaggedCollection> {
    let mut schema = TaggableSchema::new(&ty.name);
    if let Some(collection) = &ty.collection {
        schema = schema.with_collection(collection);
    }

    for ctx in &ty.contexts {
        let strategy = ty
            .strategy_for(ctx)
            .map(|kind| kind.build(records.clone(), documents.clone()));
        schema
            .register(&ctx.name, &ctx.options, strategy)
            .with_context(|| format!("Failed to register context '{}.{}'", ty.name, ctx.name))?;
    }

    Ok(TaggedCollection::new(Arc::new(schema), documents, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tagweight_core::store::memory::{InMemoryAggregationStore, InMemoryDocumentStore};
    use tagweight_core::StrategyKind;

    fn catalog(toml_str: &str) -> Result<Catalog> {
        let config: Config = toml::from_str(toml_str)?;
        Catalog::build(
            &config,
            Arc::new(InMemoryDocumentStore::new()),
            Arc::new(InMemoryAggregationStore::new()),
        )
    }

    #[test]
    fn test_context_strategy_overrides_type_default() {
        let catalog = catalog(
            r#"
            [db]
            path = "x.sqlite"
            [[types]]
            name = "Track"
            strategy = "batch"
            [[types.contexts]]
            name = "tags"
            [[types.contexts]]
            name = "artists"
            group_by_field = "user"
            strategy = "incremental_grouped"
            [[types]]
            name = "Box"
            [[types.contexts]]
            name = "labels"
            "#,
        )
        .unwrap();

        let track = catalog.get("Track").unwrap().schema();
        assert_eq!(track.collection(), "tracks");
        let kinds: Vec<Option<StrategyKind>> =
            track.registered().iter().map(|c| c.strategy_kind()).collect();
        assert_eq!(
            kinds,
            vec![
                Some(StrategyKind::BatchRecompute),
                Some(StrategyKind::IncrementalGroupedCounter)
            ]
        );

        let boxes = catalog.get("Box").unwrap().schema();
        assert_eq!(boxes.collection(), "boxes");
        assert_eq!(boxes.registered()[0].strategy_kind(), None);
    }

    #[test]
    fn test_unknown_type_lists_known_ones() {
        let catalog = catalog(
            r#"
            [db]
            path = "x.sqlite"
            [[types]]
            name = "Track"
            collection = "music"
            "#,
        )
        .unwrap();
        assert_eq!(catalog.get("Track").unwrap().schema().collection(), "music");
        let err = catalog.get("Album").err().unwrap();
        assert!(err.to_string().contains("Configured types: Track"));
    }

    #[test]
    fn test_shared_db_field_fails_to_build() {
        let result = catalog(
            r#"
            [db]
            path = "x.sqlite"
            [[types]]
            name = "Track"
            [[types.contexts]]
            name = "tags"
            [[types.contexts]]
            name = "labels"
            db_field = "tags"
            "#,
        );
        assert!(result.is_err());
    }
}
