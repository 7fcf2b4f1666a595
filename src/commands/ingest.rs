//! `ingest`: one ingestion run against the configured feed.

use super::Runtime;
use crate::config::Config;
use crate::graphrag::IngestionReport;
use crate::Result;

pub async fn run(config: Config) -> Result<IngestionReport> {
    let runtime = Runtime::connect(config).await?;
    let report = runtime.feed_ingestion()?.run().await?;

    println!("\n📊 Ingestion report");
    println!("   Seen:               {}", report.seen);
    println!("   Merged:             {}", report.merged);
    println!("   Extraction skipped: {}", report.skipped_extraction);
    println!("   Merge failed:       {}", report.failed_merge);
    println!("   Duplicates skipped: {}", report.skipped_duplicate);

    Ok(report)
}
