//! Graph store adapter
//!
//! Provides:
//! - [`GraphStore`]: the minimal query contract the pipelines depend on
//! - [`Neo4jStore`]: Neo4j over bolt (`neo4rs`)
//! - [`MemoryStore`]: in-process store with the same merge semantics

pub mod memory;
pub mod neo4j;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{Config, NodeTypePolicy, StoreBackend};
use crate::models::{Article, Edge, GraphExport, Node, Triple};
use crate::Result;

pub use memory::MemoryStore;
pub use neo4j::Neo4jStore;

/// Outcome of an edge upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeWrite {
    /// Edge created or its sentiment overwritten.
    Written,
    /// One of the endpoints does not exist; nothing was written.
    MissingEndpoint,
}

/// Store statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub node_count: u64,
    pub edge_count: u64,
    pub article_count: u64,
    /// A handful of `(id, type)` pairs.
    pub sample_nodes: Vec<(String, String)>,
}

/// Property graph keyed by node `id` and edge `(source, target, relationship)`.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Round-trip a trivial query.
    async fn ping(&self) -> Result<String>;

    /// Create constraints and indexes if missing.
    async fn init_schema(&self) -> Result<()>;

    /// Idempotently ensure a node keyed by `id` exists.
    async fn upsert_node(&self, node: &Node, policy: NodeTypePolicy) -> Result<()>;

    /// Idempotently ensure an edge between two existing nodes and overwrite
    /// its sentiment. Never creates endpoints.
    async fn upsert_edge(&self, edge: &Edge) -> Result<EdgeWrite>;

    /// One-hop edges in both directions around the named nodes.
    async fn query_neighborhood(&self, names: &[String], limit: usize) -> Result<Vec<Triple>>;

    /// Arbitrary outgoing edges.
    async fn query_global_sample(&self, limit: usize) -> Result<Vec<Triple>>;

    /// True if an article with this source URL was recorded.
    async fn article_exists(&self, url: &str) -> Result<bool>;

    /// Record an ingested article by its source URL.
    async fn record_article(&self, article: &Article) -> Result<()>;

    /// Bounded export for visualization.
    async fn export_graph(&self, limit: usize) -> Result<GraphExport>;

    async fn stats(&self) -> Result<GraphStats>;
}

/// Connect the configured store backend.
pub async fn connect(config: &Config) -> Result<Arc<dyn GraphStore>> {
    match config.store.backend {
        StoreBackend::Neo4j => Ok(Arc::new(Neo4jStore::connect(&config.neo4j).await?)),
        StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
    }
}
