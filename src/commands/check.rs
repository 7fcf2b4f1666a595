//! `check`: store connectivity and content summary.

use super::Runtime;
use crate::config::Config;
use crate::store::GraphStats;
use crate::Result;

pub async fn run(config: Config) -> Result<GraphStats> {
    println!("🕵️ Checking database content...");
    let runtime = Runtime::connect(config).await?;
    let stats = runtime.store.stats().await?;

    println!("📊 Entities: {}", stats.node_count);
    println!("🔗 Relationships: {}", stats.edge_count);
    println!("📰 Articles: {}", stats.article_count);

    if !stats.sample_nodes.is_empty() {
        println!("\n📝 First {} entities:", stats.sample_nodes.len());
        for (id, node_type) in &stats.sample_nodes {
            println!(" - [{}] {}", node_type, id);
        }
    }

    Ok(stats)
}
