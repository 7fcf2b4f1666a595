use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, warn};

use crate::config::NodeTypePolicy;
use crate::models::GraphFragment;
use crate::store::{EdgeWrite, GraphStore};

/// What a merge actually wrote.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeResult {
    pub nodes_merged: usize,
    pub edges_merged: usize,
    /// Edges not written because an endpoint is missing from the store.
    pub edges_rejected: usize,
    /// Store error that stopped the remaining writes of the fragment.
    pub failure: Option<String>,
}

impl MergeResult {
    /// True if every write of the fragment was attempted.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }
}

/// Applies fragments to the graph store: nodes first, then edges.
///
/// A fragment is not one transaction. On a store error the remaining writes
/// are abandoned and the ones already applied stay.
#[derive(Clone)]
pub struct MergeEngine {
    store: Arc<dyn GraphStore>,
    policy: NodeTypePolicy,
}

impl MergeEngine {
    pub fn new(store: Arc<dyn GraphStore>, policy: NodeTypePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> NodeTypePolicy {
        self.policy
    }

    pub async fn merge(&self, fragment: &GraphFragment) -> MergeResult {
        let mut result = MergeResult::default();

        for node in &fragment.nodes {
            if let Err(e) = self.store.upsert_node(node, self.policy).await {
                error!(id = %node.id, "Node merge failed, abandoning fragment: {}", e);
                result.failure = Some(e.to_string());
                return result;
            }
            result.nodes_merged += 1;
        }

        for edge in &fragment.edges {
            match self.store.upsert_edge(edge).await {
                Ok(EdgeWrite::Written) => result.edges_merged += 1,
                Ok(EdgeWrite::MissingEndpoint) => {
                    warn!(edge = %edge.key(), "Skipping edge, endpoint not in graph");
                    result.edges_rejected += 1;
                }
                Err(e) => {
                    error!(edge = %edge.key(), "Edge merge failed, abandoning fragment: {}", e);
                    result.failure = Some(e.to_string());
                    return result;
                }
            }
        }

        debug!(
            nodes = result.nodes_merged,
            edges = result.edges_merged,
            rejected = result.edges_rejected,
            "Fragment merged"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Edge, Node, Sentiment};
    use crate::store::MemoryStore;

    fn fragment() -> GraphFragment {
        GraphFragment {
            nodes: vec![
                Node::new("Microsoft", "Company"),
                Node::new("OpenAI", "Company"),
            ],
            edges: vec![Edge::new(
                "Microsoft",
                "OpenAI",
                "INVESTED_IN",
                Sentiment::Positive,
            )],
        }
    }

    #[tokio::test]
    async fn merging_twice_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let engine = MergeEngine::new(store.clone(), NodeTypePolicy::FirstWins);

        let first = engine.merge(&fragment()).await;
        let second = engine.merge(&fragment()).await;

        assert!(first.is_complete() && second.is_complete());
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
    }

    #[tokio::test]
    async fn edge_with_unknown_endpoint_is_rejected_not_created() {
        let store = Arc::new(MemoryStore::new());
        let engine = MergeEngine::new(store.clone(), NodeTypePolicy::FirstWins);

        let mut fragment = fragment();
        fragment
            .edges
            .push(Edge::new("Elon Musk", "OpenAI", "SUED", Sentiment::Negative));

        let result = engine.merge(&fragment).await;

        assert!(result.is_complete());
        assert_eq!(result.edges_merged, 1);
        assert_eq!(result.edges_rejected, 1);
        assert_eq!(store.node_count(), 2);
        assert!(store.node_types("Elon Musk").is_none());
    }

    #[tokio::test]
    async fn store_error_abandons_remaining_writes() {
        let store = Arc::new(MemoryStore::new());
        let engine = MergeEngine::new(store.clone(), NodeTypePolicy::FirstWins);

        let mut fragment = fragment();
        // Non-vocabulary relationships are refused by the store itself.
        fragment.edges.insert(
            0,
            Edge::new("Microsoft", "OpenAI", "ADMIRES", Sentiment::Positive),
        );

        let result = engine.merge(&fragment).await;

        assert!(!result.is_complete());
        assert_eq!(result.nodes_merged, 2);
        assert_eq!(result.edges_merged, 0);
        // Nodes written before the failure are kept.
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 0);
    }
}
