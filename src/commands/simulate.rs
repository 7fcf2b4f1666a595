//! `simulate`: push the built-in demo articles through the pipeline to
//! exercise canonicalization on duplicate and variant headlines.

use std::sync::Arc;
use std::time::Duration;

use super::Runtime;
use crate::config::Config;
use crate::feed::StaticSource;
use crate::graphrag::{ArticleOutcome, IngestionReport};
use crate::Result;

pub async fn run(config: Config, limit: Option<usize>, delay: Duration) -> Result<IngestionReport> {
    let runtime = Runtime::connect(config).await?;
    let source = StaticSource::demo();
    let articles: Vec<_> = source
        .articles()
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();
    let pipeline = runtime.ingestion(Arc::new(source))?;

    println!("🚀 Starting simulation with {} articles", articles.len());
    println!("--------------------------------------------------");

    let mut report = IngestionReport::default();
    for (i, article) in articles.iter().enumerate() {
        println!("\n📄 Processing {}/{}: '{}'", i + 1, articles.len(), article.title);

        let outcome = pipeline.ingest_article(article).await;
        match &outcome {
            ArticleOutcome::Merged { fragment, result } => {
                let ids: Vec<&str> = fragment.nodes.iter().map(|n| n.id.as_str()).collect();
                println!("   🔍 Entities: {:?}", ids);
                println!(
                    "   ✅ Merged {} nodes, {} edges ({} rejected)",
                    result.nodes_merged, result.edges_merged, result.edges_rejected
                );
            }
            ArticleOutcome::Duplicate => println!("   ⏭️ Already ingested"),
            ArticleOutcome::ExtractionFailed(e) => println!("   ⚠️ Extraction failed: {}", e),
            ArticleOutcome::MergeFailed(e) => println!("   ❌ Merge failed: {}", e),
        }
        report.record(&outcome);

        if i + 1 < articles.len() {
            tokio::time::sleep(delay).await;
        }
    }

    println!("\n--------------------------------------------------");
    println!(
        "🎉 Simulation complete: {} merged, {} skipped, {} failed, {} duplicates",
        report.merged, report.skipped_extraction, report.failed_merge, report.skipped_duplicate
    );
    Ok(report)
}
