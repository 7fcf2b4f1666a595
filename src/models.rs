//! Graph data model shared by ingestion, storage and Q&A.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Entity node. `id` is the canonical display name and the only merge key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    /// Canonical name, e.g. "Microsoft", "Sam Altman", "Blackwell B200"
    pub id: String,
    /// Coarse category, e.g. "Company", "Person", "Product"
    #[serde(rename = "type")]
    pub node_type: String,
}

impl Node {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
        }
    }
}

/// Closed sentiment set carried on every edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "Positive",
            Sentiment::Negative => "Negative",
            Sentiment::Neutral => "Neutral",
        }
    }

    /// Lenient parse for values read back from the store.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(Sentiment::Positive),
            "negative" => Some(Sentiment::Negative),
            "neutral" => Some(Sentiment::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directed relationship between two entity ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Edge {
    pub source: String,
    pub target: String,
    /// Canonical verb token, e.g. "INVESTED_IN"
    pub relationship: String,
    pub sentiment: Sentiment,
}

impl Edge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        relationship: impl Into<String>,
        sentiment: Sentiment,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relationship: relationship.into(),
            sentiment,
        }
    }

    /// Identity of the edge in the store.
    pub fn key(&self) -> EdgeKey {
        EdgeKey {
            source: self.source.clone(),
            target: self.target.clone(),
            relationship: self.relationship.clone(),
        }
    }
}

/// `(source, target, relationship)` edge identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct EdgeKey {
    pub source: String,
    pub target: String,
    pub relationship: String,
}

impl fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({})-[{}]->({})", self.source, self.relationship, self.target)
    }
}

/// Output of one extractor invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GraphFragment {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl GraphFragment {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }
}

/// News item handed over by an article source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    /// Plain text, markup already stripped
    pub summary: String,
    pub link: String,
    pub published: Option<DateTime<Utc>>,
}

impl Article {
    pub fn new(title: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: summary.into(),
            link: String::new(),
            published: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = link.into();
        self
    }

    /// Text passed to the extractor.
    pub fn text(&self) -> String {
        format!("{}. {}", self.title, self.summary)
    }
}

/// One prior turn of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: String,
    pub text: String,
}

impl ChatTurn {
    pub fn new(role: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            text: text.into(),
        }
    }
}

/// Relationship as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Triple {
    pub subject: String,
    pub relationship: String,
    pub object: String,
    pub sentiment: String,
}

impl Triple {
    /// Human-readable context line: `subject RELATIONSHIP object (sentiment)`.
    pub fn render(&self) -> String {
        format!(
            "{} {} {} ({})",
            self.subject, self.relationship, self.object, self.sentiment
        )
    }
}

/// Visualization export node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportNode {
    pub id: String,
    pub group: String,
}

/// Visualization export link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportLink {
    pub source: String,
    pub target: String,
    pub relationship: String,
    pub sentiment: String,
}

/// Bounded export of the graph for visualization consumers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GraphExport {
    pub nodes: Vec<ExportNode>,
    pub links: Vec<ExportLink>,
}
