//! GraphRAG pipelines over the news knowledge graph.
//!
//! Ingestion turns articles into canonical nodes and edges:
//! article text -> [`Extractor`] -> [`MergeEngine`] -> graph store.
//!
//! Question answering reads them back:
//! question -> contextualize -> entity list -> neighborhood or global sample -> answer.
//!
//! Every model reply is untrusted. Extraction output is schema-checked and
//! canonicalized before it touches the store.

pub mod entity_extractor;
pub mod ingest;
pub mod merge;
pub mod retriever;

pub use entity_extractor::{normalize_fragment, Extractor};
pub use ingest::{ArticleOutcome, IngestionPipeline, IngestionReport};
pub use merge::{MergeEngine, MergeResult};
pub use retriever::{
    parse_entity_list, QaAnswer, QaOutcome, QaPipeline, EMPTY_GRAPH_MESSAGE, GLOBAL_CONTEXT,
};
