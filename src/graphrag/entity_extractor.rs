use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::integrations::{structured, LanguageModel};
use crate::models::{Edge, GraphFragment, Node};
use crate::normalize::{
    canonical_entity, canonical_node_id, canonical_product, canonical_relationship, clean_name,
};
use crate::prompts::Prompt;
use crate::{Error, Result};

const DEFAULT_NODE_TYPE: &str = "Entity";

/// Turns article text into a normalized [`GraphFragment`] with a language model.
#[derive(Clone)]
pub struct Extractor {
    model: Arc<dyn LanguageModel>,
    system_prompt: String,
}

impl Extractor {
    /// Extractor using the extraction prompt (override from `prompts/` if present).
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self::with_prompt(model, Prompt::Extraction.load())
    }

    pub fn with_prompt(model: Arc<dyn LanguageModel>, system_prompt: impl Into<String>) -> Self {
        Self {
            model,
            system_prompt: system_prompt.into(),
        }
    }

    /// Extract a fragment from `text`.
    ///
    /// Gateway failures and replies that do not match the fragment schema are
    /// reported as [`Error::Extraction`]; nothing is partially accepted.
    pub async fn extract(&self, text: &str) -> Result<GraphFragment> {
        let raw: GraphFragment = structured(self.model.as_ref(), &self.system_prompt, text)
            .await
            .map_err(|e| Error::Extraction(e.to_string()))?;

        let fragment = normalize_fragment(raw)?;
        debug!(
            nodes = fragment.nodes.len(),
            edges = fragment.edges.len(),
            "Extracted fragment"
        );
        Ok(fragment)
    }
}

/// Apply deterministic canonicalization to a model fragment.
///
/// - node ids go through the entity or product rules depending on type
/// - edge endpoints are re-pointed to the canonical ids of their nodes
/// - relationships outside the vocabulary drop the edge
/// - duplicate nodes keep the first type, duplicate edges the last sentiment
pub fn normalize_fragment(raw: GraphFragment) -> Result<GraphFragment> {
    let mut fragment = GraphFragment::default();
    let mut node_index: HashMap<String, usize> = HashMap::new();
    // Surface form (lowercased) -> canonical id, for re-pointing edges.
    let mut aliases: HashMap<String, String> = HashMap::new();

    for node in raw.nodes {
        let surface = clean_name(&node.id);
        if surface.is_empty() {
            return Err(Error::Extraction("node with empty id".to_string()));
        }

        let node_type = match clean_name(&node.node_type) {
            t if t.is_empty() => DEFAULT_NODE_TYPE.to_string(),
            t => t,
        };
        let id = canonical_node_id(&surface, &node_type);
        aliases.insert(surface.to_lowercase(), id.clone());
        aliases.insert(id.to_lowercase(), id.clone());

        if !node_index.contains_key(&id) {
            node_index.insert(id.clone(), fragment.nodes.len());
            fragment.nodes.push(Node::new(id, node_type));
        }
    }

    let mut edge_index: HashMap<(String, String, &'static str), usize> = HashMap::new();

    for edge in raw.edges {
        let Some(relationship) = canonical_relationship(&edge.relationship) else {
            debug!(relationship = %edge.relationship, "Dropping edge with unmapped relationship");
            continue;
        };

        let source = resolve_endpoint(&edge.source, &aliases, &node_index)?;
        let target = resolve_endpoint(&edge.target, &aliases, &node_index)?;

        let key = (source.clone(), target.clone(), relationship);
        match edge_index.get(&key) {
            Some(&idx) => fragment.edges[idx].sentiment = edge.sentiment,
            None => {
                edge_index.insert(key, fragment.edges.len());
                fragment
                    .edges
                    .push(Edge::new(source, target, relationship, edge.sentiment));
            }
        }
    }

    Ok(fragment)
}

/// Map an edge endpoint onto a node of the fragment: by surface form, then by
/// its product and entity canonical forms. Unknown endpoints fall back to the
/// entity form and are left for the merge precondition to reject.
fn resolve_endpoint(
    raw: &str,
    aliases: &HashMap<String, String>,
    node_index: &HashMap<String, usize>,
) -> Result<String> {
    let surface = clean_name(raw);
    if surface.is_empty() {
        return Err(Error::Extraction("edge with empty endpoint".to_string()));
    }
    if let Some(id) = aliases.get(&surface.to_lowercase()) {
        return Ok(id.clone());
    }

    let entity = canonical_entity(&surface);
    let product = canonical_product(&surface);
    for candidate in [&product, &entity] {
        if node_index.contains_key(candidate.as_str()) {
            return Ok(candidate.clone());
        }
        if let Some(id) = aliases.get(&candidate.to_lowercase()) {
            return Ok(id.clone());
        }
    }
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::LlmRequest;
    use crate::models::Sentiment;
    use async_trait::async_trait;

    struct FixedReply(&'static str);

    #[async_trait]
    impl LanguageModel for FixedReply {
        async fn complete(&self, _request: &LlmRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl LanguageModel for Unreachable {
        async fn complete(&self, _request: &LlmRequest) -> Result<String> {
            Err(Error::Gateway("connection refused".to_string()))
        }
    }

    fn raw_fragment(nodes: &[(&str, &str)], edges: &[(&str, &str, &str, Sentiment)]) -> GraphFragment {
        GraphFragment {
            nodes: nodes.iter().map(|(id, t)| Node::new(*id, *t)).collect(),
            edges: edges
                .iter()
                .map(|(s, t, r, sent)| Edge::new(*s, *t, *r, *sent))
                .collect(),
        }
    }

    #[test]
    fn canonicalizes_nodes_and_repoints_edges() {
        let raw = raw_fragment(
            &[("Nvidia Corp", "Company"), ("B200 Blackwell GPU", "Product")],
            &[("Nvidia Corp", "B200 Blackwell GPU", "Unveiled", Sentiment::Positive)],
        );

        let fragment = normalize_fragment(raw).unwrap();

        assert_eq!(fragment.nodes[0].id, "Nvidia");
        assert_eq!(fragment.nodes[1].id, "Blackwell B200");
        assert_eq!(
            fragment.edges,
            vec![Edge::new("Nvidia", "Blackwell B200", "LAUNCHED", Sentiment::Positive)]
        );
    }

    #[test]
    fn product_endpoint_named_differently_is_repointed() {
        let raw = raw_fragment(
            &[("Nvidia", "Company"), ("B200 Blackwell GPU", "Product")],
            &[("Nvidia", "Blackwell B200 GPU", "launched", Sentiment::Positive)],
        );

        let fragment = normalize_fragment(raw).unwrap();

        let ids: Vec<&str> = fragment.nodes.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["Nvidia", "Blackwell B200"]);
        assert_eq!(
            fragment.edges,
            vec![Edge::new("Nvidia", "Blackwell B200", "LAUNCHED", Sentiment::Positive)]
        );
    }

    #[test]
    fn endpoint_using_canonical_id_is_repointed() {
        let raw = raw_fragment(
            &[("Microsoft Corp", "Company"), ("NVDA", "Company")],
            &[("microsoft", "Nvidia", "partnered", Sentiment::Neutral)],
        );

        let fragment = normalize_fragment(raw).unwrap();

        assert_eq!(
            fragment.edges,
            vec![Edge::new("Microsoft", "Nvidia", "PARTNERED_WITH", Sentiment::Neutral)]
        );
    }

    #[test]
    fn unmapped_relationship_is_dropped() {
        let raw = raw_fragment(
            &[("Apple", "Company"), ("OpenAI", "Company")],
            &[("Apple", "OpenAI", "ADMIRES", Sentiment::Positive)],
        );

        let fragment = normalize_fragment(raw).unwrap();
        assert_eq!(fragment.nodes.len(), 2);
        assert!(fragment.edges.is_empty());
    }

    #[test]
    fn duplicates_collapse() {
        let raw = raw_fragment(
            &[("Sam Altman", "Person"), ("Samuel Altman", "Executive"), ("OpenAI", "Company")],
            &[
                ("OpenAI", "Sam Altman", "FIRED", Sentiment::Negative),
                ("OpenAI", "Samuel Altman", "ousted", Sentiment::Neutral),
            ],
        );

        let fragment = normalize_fragment(raw).unwrap();

        assert_eq!(fragment.nodes.len(), 2);
        assert_eq!(fragment.nodes[0], Node::new("Sam Altman", "Person"));
        assert_eq!(fragment.edges.len(), 1);
        assert_eq!(fragment.edges[0].sentiment, Sentiment::Neutral);
    }

    #[test]
    fn empty_node_id_is_a_failure() {
        let raw = raw_fragment(&[("  ", "Company")], &[]);
        assert!(matches!(normalize_fragment(raw), Err(Error::Extraction(_))));
    }

    #[test]
    fn missing_type_defaults() {
        let raw = raw_fragment(&[("Tesla", "")], &[]);
        let fragment = normalize_fragment(raw).unwrap();
        assert_eq!(fragment.nodes[0].node_type, "Entity");
    }

    #[tokio::test]
    async fn extract_normalizes_model_reply() {
        let model = Arc::new(FixedReply(
            r#"{"nodes": [{"id": "Microsoft Corp", "type": "Company"}, {"id": "OpenAI", "type": "Company"}],
                "edges": [{"source": "Microsoft Corp", "target": "OpenAI",
                           "relationship": "Invested", "sentiment": "Positive"}]}"#,
        ));

        let fragment = Extractor::with_prompt(model, "extract").extract("text").await.unwrap();

        assert_eq!(fragment.nodes[0].id, "Microsoft");
        assert_eq!(fragment.edges[0].relationship, "INVESTED_IN");
    }

    #[tokio::test]
    async fn non_conforming_reply_is_extraction_failure() {
        let model = Arc::new(FixedReply(
            r#"{"nodes": [{"id": "A", "type": "Company"}], "edges": [{"source": "A"}]}"#,
        ));

        let err = Extractor::with_prompt(model, "extract")
            .extract("text")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
    }

    #[tokio::test]
    async fn gateway_error_is_extraction_failure() {
        let err = Extractor::with_prompt(Arc::new(Unreachable), "extract")
            .extract("text")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction(_)));
        assert!(err.to_string().contains("connection refused"));
    }
}
