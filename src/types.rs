use anyhow::Result;
use std::sync::Arc;

use tagweight_core::store::memory::{InMemoryAggregationStore, InMemoryDocumentStore};

use crate::catalog::Catalog;
use crate::config::Config;

/// Print every configured type with its contexts. Needs no database.
pub fn list_types(config: &Config) -> Result<()> {
    let catalog = Catalog::build(
        config,
        Arc::new(InMemoryDocumentStore::new()),
        Arc::new(InMemoryAggregationStore::new()),
    )?;

    for collection in catalog.collections() {
        let schema = collection.schema();
        println!("{} (collection: {})", schema.type_name(), schema.collection());
        println!(
            "  {:<16} {:<12} {:<6} {:<12} {:<20} AGGREGATION",
            "CONTEXT", "FIELD", "SEP", "GROUP BY", "STRATEGY"
        );
        for info in schema.info() {
            println!(
                "  {:<16} {:<12} {:<6} {:<12} {:<20} {}",
                info.name,
                info.db_field,
                format!("{:?}", info.separator),
                info.group_by_field.as_deref().unwrap_or("-"),
                info.strategy
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                info.aggregation
            );
        }
        println!();
    }

    Ok(())
}
