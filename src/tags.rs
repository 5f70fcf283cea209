//! Aggregate queries: `tagw tags <type> <context>`.

use anyhow::Result;
use serde::Serialize;

use crate::catalog::Catalog;
use crate::config::Config;

#[derive(Debug, Clone, Serialize)]
struct WeightedTag {
    tag: String,
    weight: i64,
}

pub async fn run_tags(
    config: &Config,
    type_name: &str,
    context: &str,
    group: Option<String>,
    weights: bool,
    json: bool,
) -> Result<()> {
    let (pool, catalog) = Catalog::open(config).await?;
    let collection = catalog.get(type_name)?;
    let group = group.as_deref();

    if weights {
        let weighted = collection.tags_with_weight_for(context, group).await?;
        if json {
            let out: Vec<WeightedTag> = weighted
                .into_iter()
                .map(|(tag, weight)| WeightedTag { tag, weight })
                .collect();
            println!("{}", serde_json::to_string_pretty(&out)?);
        } else if weighted.is_empty() {
            println!("No tags.");
        } else {
            println!("{:<32} WEIGHT", "TAG");
            for (tag, weight) in &weighted {
                println!("{:<32} {}", tag, weight);
            }
        }
    } else {
        let tags = collection.tags_for(context, group).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&tags)?);
        } else if tags.is_empty() {
            println!("No tags.");
        } else {
            for tag in &tags {
                println!("{}", tag);
            }
        }
    }

    pool.close().await;
    Ok(())
}
