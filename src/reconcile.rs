use anyhow::Result;

use crate::catalog::Catalog;
use crate::config::Config;

/// Rewrite aggregation tables from a full reduction over the documents.
///
/// With no context given, every context of the type that has a strategy is
/// reconciled.
pub async fn run_reconcile(config: &Config, type_name: &str, context: Option<&str>) -> Result<()> {
    let (pool, catalog) = Catalog::open(config).await?;
    let collection = catalog.get(type_name)?;

    let contexts: Vec<String> = match context {
        Some(name) => vec![collection.schema().context(name)?.name.clone()],
        None => collection
            .schema()
            .registered()
            .iter()
            .filter(|entry| entry.strategy.is_some())
            .map(|entry| entry.context.name.clone())
            .collect(),
    };

    for name in &contexts {
        let rows = collection.reconcile(name).await?;
        println!(
            "{:<40} {} row{}",
            collection.schema().aggregation_collection_for(name)?,
            rows,
            if rows == 1 { "" } else { "s" }
        );
    }

    pool.close().await;
    Ok(())
}
