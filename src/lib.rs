//! News Knowledge Graph Library
//!
//! This library provides tools to:
//! - Fetch technology news from an RSS feed
//! - Extract entities and relationships with a language model, with
//!   deterministic canonicalization of names, products and verbs
//! - Merge the extracted fragments idempotently into a Neo4j property graph
//! - Answer conversational questions from the graph (GraphRAG)
//! - Serve the graph and the chat over HTTP, with periodic re-ingestion

pub mod config;
pub mod error;
pub mod feed;
pub mod graphrag;
pub mod integrations;
pub mod metrics;
pub mod models;
pub mod normalize;
pub mod prompts;
pub mod scheduler;
pub mod server;
pub mod store;

// Re-export common types
pub use config::{Config, NodeTypePolicy, StoreBackend};
pub use error::{Error, Result};
pub use feed::{ArticleSource, RssSource, StaticSource};
pub use graphrag::{
    Extractor, IngestionPipeline, IngestionReport, MergeEngine, MergeResult, QaAnswer, QaPipeline,
};
pub use integrations::{LanguageModel, LlmRequest, OpenAiCompatClient};
pub use models::{Article, ChatTurn, Edge, GraphFragment, Node, Sentiment, Triple};
pub use prompts::{load_prompt, Prompt};
pub use store::{GraphStore, MemoryStore, Neo4jStore};

// Commands module uses re-exported types, so it must be declared after the re-exports
pub mod commands;
