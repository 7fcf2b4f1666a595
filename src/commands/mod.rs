//! Command implementations
//!
//! Each module corresponds to a subcommand in the CLI.

pub mod ask;
pub mod check;
pub mod ingest;
pub mod serve;
pub mod simulate;

use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::feed::{ArticleSource, RssSource};
use crate::graphrag::{Extractor, IngestionPipeline, QaPipeline};
use crate::integrations::{LanguageModel, OpenAiCompatClient};
use crate::store::{self, GraphStore};
use crate::Result;

/// Connected store plus the configuration the pipelines are built from.
pub struct Runtime {
    pub config: Config,
    pub store: Arc<dyn GraphStore>,
}

impl Runtime {
    /// Validate the configuration, connect the store and ensure its schema.
    pub async fn connect(config: Config) -> Result<Self> {
        config.validate()?;
        let store = store::connect(&config).await?;
        store.init_schema().await?;
        info!(backend = ?config.store.backend, "Graph store ready");
        Ok(Self { config, store })
    }

    /// Language model client from the `llm` section.
    pub fn model(&self) -> Result<Arc<dyn LanguageModel>> {
        let client = OpenAiCompatClient::new(&self.config.llm)?;
        info!(model = client.model(), "Language model configured");
        Ok(Arc::new(client))
    }

    /// Ingestion over an arbitrary source.
    pub fn ingestion(&self, source: Arc<dyn ArticleSource>) -> Result<IngestionPipeline> {
        Ok(IngestionPipeline::new(
            source,
            Extractor::new(self.model()?),
            self.store.clone(),
            &self.config.ingest,
            self.config.feed.max_items,
        ))
    }

    /// Ingestion over the configured RSS feed.
    pub fn feed_ingestion(&self) -> Result<IngestionPipeline> {
        self.ingestion(Arc::new(RssSource::new(&self.config.feed)?))
    }

    pub fn qa(&self) -> Result<QaPipeline> {
        Ok(QaPipeline::new(
            self.model()?,
            self.store.clone(),
            &self.config.qa,
        ))
    }
}
