//! Database statistics: document counts per collection and row and weight
//! totals per aggregation table. Used by `tagw stats`.

use anyhow::Result;
use sqlx::Row;

use crate::catalog::Catalog;
use crate::config::Config;

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let (pool, catalog) = Catalog::open(config).await?;

    let total_docs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM documents")
        .fetch_one(&pool)
        .await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Tagweight Database Stats");
    println!("========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Documents:   {}", total_docs);

    let collection_rows = sqlx::query(
        r#"
        SELECT collection, COUNT(*) AS doc_count, MAX(updated_at) AS last_update
        FROM documents
        GROUP BY collection
        ORDER BY collection
        "#,
    )
    .fetch_all(&pool)
    .await?;

    if !collection_rows.is_empty() {
        println!();
        println!("  By collection:");
        println!("  {:<24} {:>6}   {}", "COLLECTION", "DOCS", "LAST UPDATE");
        println!("  {}", "-".repeat(56));
        for row in &collection_rows {
            let collection: String = row.get("collection");
            let doc_count: i64 = row.get("doc_count");
            let last_update: Option<i64> = row.get("last_update");
            println!(
                "  {:<24} {:>6}   {}",
                collection,
                doc_count,
                last_update
                    .map(format_ts_iso)
                    .unwrap_or_else(|| "never".to_string())
            );
        }
    }

    let summaries = catalog.records().summaries().await?;
    if !summaries.is_empty() {
        println!();
        println!("  Aggregations:");
        println!("  {:<40} {:>6} {:>8}", "AGGREGATION", "TAGS", "WEIGHT");
        println!("  {}", "-".repeat(56));
        for s in &summaries {
            println!("  {:<40} {:>6} {:>8}", s.table, s.rows, s.total_weight);
        }
    }

    println!();

    pool.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
