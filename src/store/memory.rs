//! In-process graph store.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{EdgeWrite, GraphStats, GraphStore};
use crate::config::NodeTypePolicy;
use crate::models::{Article, Edge, EdgeKey, ExportLink, ExportNode, GraphExport, Node, Triple};
use crate::normalize::is_canonical_relationship;
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct StoredNode {
    node_type: String,
    types: Vec<String>,
}

#[derive(Debug, Default)]
struct Inner {
    // Insertion order keeps samples and exports stable.
    node_order: Vec<String>,
    nodes: HashMap<String, StoredNode>,
    edges: Vec<Edge>,
    edge_index: HashMap<EdgeKey, usize>,
    articles: HashMap<String, Article>,
}

/// Graph store held in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| Error::Store("memory store lock poisoned".to_string()))
    }

    pub fn node_count(&self) -> usize {
        self.lock().map(|inner| inner.nodes.len()).unwrap_or(0)
    }

    pub fn edge_count(&self) -> usize {
        self.lock().map(|inner| inner.edges.len()).unwrap_or(0)
    }

    /// Current `(type, types)` of a node.
    pub fn node_types(&self, id: &str) -> Option<(String, Vec<String>)> {
        let inner = self.lock().ok()?;
        inner
            .nodes
            .get(id)
            .map(|n| (n.node_type.clone(), n.types.clone()))
    }

    /// Stored edge for a key.
    pub fn edge(&self, source: &str, target: &str, relationship: &str) -> Option<Edge> {
        let inner = self.lock().ok()?;
        let key = EdgeKey {
            source: source.to_string(),
            target: target.to_string(),
            relationship: relationship.to_string(),
        };
        inner.edge_index.get(&key).map(|idx| inner.edges[*idx].clone())
    }
}

fn triple(edge: &Edge) -> Triple {
    Triple {
        subject: edge.source.clone(),
        relationship: edge.relationship.clone(),
        object: edge.target.clone(),
        sentiment: edge.sentiment.to_string(),
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn ping(&self) -> Result<String> {
        let _guard = self.lock()?;
        Ok("Hello from the in-memory store".to_string())
    }

    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_node(&self, node: &Node, policy: NodeTypePolicy) -> Result<()> {
        let mut guard = self.lock()?;
        let inner = &mut *guard;

        if let Some(existing) = inner.nodes.get_mut(&node.id) {
            match policy {
                NodeTypePolicy::FirstWins => {}
                NodeTypePolicy::LastWins => {
                    existing.node_type = node.node_type.clone();
                    existing.types = vec![node.node_type.clone()];
                }
                NodeTypePolicy::MultiType => {
                    if !existing.types.contains(&node.node_type) {
                        existing.types.push(node.node_type.clone());
                    }
                }
            }
            return Ok(());
        }

        inner.nodes.insert(
            node.id.clone(),
            StoredNode {
                node_type: node.node_type.clone(),
                types: vec![node.node_type.clone()],
            },
        );
        inner.node_order.push(node.id.clone());
        Ok(())
    }

    async fn upsert_edge(&self, edge: &Edge) -> Result<EdgeWrite> {
        if !is_canonical_relationship(&edge.relationship) {
            return Err(Error::InvalidArgument(format!(
                "relationship {} is not canonical",
                edge.relationship
            )));
        }

        let mut guard = self.lock()?;
        let inner = &mut *guard;
        if !inner.nodes.contains_key(&edge.source) || !inner.nodes.contains_key(&edge.target) {
            return Ok(EdgeWrite::MissingEndpoint);
        }

        let key = edge.key();
        match inner.edge_index.get(&key).copied() {
            Some(idx) => inner.edges[idx].sentiment = edge.sentiment,
            None => {
                inner.edges.push(edge.clone());
                let idx = inner.edges.len() - 1;
                inner.edge_index.insert(key, idx);
            }
        }
        Ok(EdgeWrite::Written)
    }

    async fn query_neighborhood(&self, names: &[String], limit: usize) -> Result<Vec<Triple>> {
        let inner = self.lock()?;
        let wanted: HashSet<&str> = names.iter().map(String::as_str).collect();
        Ok(inner
            .edges
            .iter()
            .filter(|e| wanted.contains(e.source.as_str()) || wanted.contains(e.target.as_str()))
            .take(limit)
            .map(triple)
            .collect())
    }

    async fn query_global_sample(&self, limit: usize) -> Result<Vec<Triple>> {
        let inner = self.lock()?;
        Ok(inner.edges.iter().take(limit).map(triple).collect())
    }

    async fn article_exists(&self, url: &str) -> Result<bool> {
        Ok(self.lock()?.articles.contains_key(url))
    }

    async fn record_article(&self, article: &Article) -> Result<()> {
        let mut inner = self.lock()?;
        inner
            .articles
            .entry(article.link.clone())
            .or_insert_with(|| article.clone());
        Ok(())
    }

    async fn export_graph(&self, limit: usize) -> Result<GraphExport> {
        let inner = self.lock()?;
        let mut export = GraphExport::default();
        let mut seen = HashSet::new();

        for edge in inner.edges.iter().take(limit) {
            for id in [&edge.source, &edge.target] {
                if seen.insert(id.clone()) {
                    let group = inner
                        .nodes
                        .get(id)
                        .map(|n| n.node_type.clone())
                        .unwrap_or_else(|| "Entity".to_string());
                    export.nodes.push(ExportNode {
                        id: id.clone(),
                        group,
                    });
                }
            }
            export.links.push(ExportLink {
                source: edge.source.clone(),
                target: edge.target.clone(),
                relationship: edge.relationship.clone(),
                sentiment: edge.sentiment.to_string(),
            });
        }

        Ok(export)
    }

    async fn stats(&self) -> Result<GraphStats> {
        let inner = self.lock()?;
        Ok(GraphStats {
            node_count: inner.nodes.len() as u64,
            edge_count: inner.edges.len() as u64,
            article_count: inner.articles.len() as u64,
            sample_nodes: inner
                .node_order
                .iter()
                .take(5)
                .filter_map(|id| inner.nodes.get(id).map(|n| (id.clone(), n.node_type.clone())))
                .collect(),
        })
    }
}
