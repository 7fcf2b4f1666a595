use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, info, warn};

use super::entity_extractor::Extractor;
use super::merge::{MergeEngine, MergeResult};
use crate::config::IngestConfig;
use crate::feed::ArticleSource;
use crate::metrics;
use crate::models::{Article, GraphFragment};
use crate::store::GraphStore;
use crate::Result;

/// Counters for one ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub seen: usize,
    pub merged: usize,
    pub skipped_extraction: usize,
    pub failed_merge: usize,
    pub skipped_duplicate: usize,
}

impl IngestionReport {
    /// Count one article outcome.
    pub fn record(&mut self, outcome: &ArticleOutcome) {
        self.seen += 1;
        match outcome {
            ArticleOutcome::Merged { .. } => self.merged += 1,
            ArticleOutcome::Duplicate => self.skipped_duplicate += 1,
            ArticleOutcome::ExtractionFailed(_) => self.skipped_extraction += 1,
            ArticleOutcome::MergeFailed(_) => self.failed_merge += 1,
        }
    }
}

/// Result of processing a single article.
#[derive(Debug, Clone, PartialEq)]
pub enum ArticleOutcome {
    Merged {
        fragment: GraphFragment,
        result: MergeResult,
    },
    /// Link already recorded by an earlier run.
    Duplicate,
    ExtractionFailed(String),
    /// Store error while checking, merging or recording.
    MergeFailed(String),
}

impl ArticleOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ArticleOutcome::Merged { .. } => "merged",
            ArticleOutcome::Duplicate => "skipped_duplicate",
            ArticleOutcome::ExtractionFailed(_) => "skipped_extraction",
            ArticleOutcome::MergeFailed(_) => "failed_merge",
        }
    }
}

/// Fetch, extract and merge. Each article is its own unit of work.
#[derive(Clone)]
pub struct IngestionPipeline {
    source: Arc<dyn ArticleSource>,
    extractor: Extractor,
    merger: MergeEngine,
    store: Arc<dyn GraphStore>,
    max_items: usize,
    dedupe_by_url: bool,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn ArticleSource>,
        extractor: Extractor,
        store: Arc<dyn GraphStore>,
        config: &IngestConfig,
        max_items: usize,
    ) -> Self {
        Self {
            source,
            extractor,
            merger: MergeEngine::new(store.clone(), config.node_type_policy),
            store,
            max_items,
            dedupe_by_url: config.dedupe_by_url,
        }
    }

    /// Process the latest batch from the source.
    ///
    /// Only a source failure fails the run; article failures are counted.
    pub async fn run(&self) -> Result<IngestionReport> {
        let started = Instant::now();
        let articles = match self.source.fetch_latest(self.max_items).await {
            Ok(articles) => articles,
            Err(e) => {
                metrics::record_ingestion_run(started.elapsed(), false);
                return Err(e);
            }
        };

        info!(count = articles.len(), "🚀 Ingestion run started");
        let mut report = IngestionReport::default();

        for (i, article) in articles.iter().enumerate() {
            info!("📄 Processing {}/{}: '{}'", i + 1, articles.len(), article.title);
            let outcome = self.ingest_article(article).await;
            report.record(&outcome);
        }

        metrics::record_ingestion_run(started.elapsed(), true);
        info!(
            seen = report.seen,
            merged = report.merged,
            skipped_extraction = report.skipped_extraction,
            failed_merge = report.failed_merge,
            skipped_duplicate = report.skipped_duplicate,
            "✅ Ingestion run finished"
        );
        Ok(report)
    }

    /// Process one article. Never returns an error; failures are reported in
    /// the outcome so the caller can move on to the next article.
    pub async fn ingest_article(&self, article: &Article) -> ArticleOutcome {
        let outcome = self.process(article).await;
        metrics::record_article(outcome.label());
        outcome
    }

    async fn process(&self, article: &Article) -> ArticleOutcome {
        let dedupe = self.dedupe_by_url && !article.link.is_empty();

        if dedupe {
            match self.store.article_exists(&article.link).await {
                Ok(true) => {
                    info!(link = %article.link, "⏭️ Already ingested");
                    return ArticleOutcome::Duplicate;
                }
                Ok(false) => {}
                Err(e) => {
                    error!(link = %article.link, "Duplicate check failed: {}", e);
                    return ArticleOutcome::MergeFailed(e.to_string());
                }
            }
        }

        let fragment = match self.extractor.extract(&article.text()).await {
            Ok(fragment) => fragment,
            Err(e) => {
                warn!(title = %article.title, "⚠️ Extraction failed: {}", e);
                return ArticleOutcome::ExtractionFailed(e.to_string());
            }
        };

        let ids: Vec<&str> = fragment.nodes.iter().map(|n| n.id.as_str()).collect();
        info!(entities = ?ids, "🔍 Extracted entities");

        let result = self.merger.merge(&fragment).await;
        if let Some(failure) = &result.failure {
            return ArticleOutcome::MergeFailed(failure.clone());
        }

        if dedupe {
            if let Err(e) = self.store.record_article(article).await {
                warn!(link = %article.link, "Failed to record article: {}", e);
            }
        }

        ArticleOutcome::Merged { fragment, result }
    }

    /// Manual trigger: fetch the newest article and ingest it.
    pub async fn ingest_latest(&self) -> Result<Option<(Article, ArticleOutcome)>> {
        let mut articles = self.source.fetch_latest(1).await?;
        if articles.is_empty() {
            return Ok(None);
        }
        let article = articles.remove(0);
        let outcome = self.ingest_article(&article).await;
        Ok(Some((article, outcome)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::StaticSource;
    use crate::integrations::{LanguageModel, LlmRequest};
    use crate::store::MemoryStore;
    use crate::Error;
    use async_trait::async_trait;

    /// Replies by keyword in the article text; "broken" yields a gateway error.
    struct KeywordModel;

    #[async_trait]
    impl LanguageModel for KeywordModel {
        async fn complete(&self, request: &LlmRequest) -> Result<String> {
            if request.user.contains("broken") {
                return Err(Error::Gateway("503 from upstream".to_string()));
            }
            Ok(r#"{"nodes": [{"id": "Elon Musk", "type": "Person"}, {"id": "OpenAI", "type": "Company"}],
                   "edges": [{"source": "Elon Musk", "target": "OpenAI", "relationship": "SUED", "sentiment": "Negative"}]}"#
                .to_string())
        }
    }

    fn pipeline(store: Arc<MemoryStore>, articles: Vec<Article>, dedupe: bool) -> IngestionPipeline {
        let config = IngestConfig {
            dedupe_by_url: dedupe,
            ..IngestConfig::default()
        };
        IngestionPipeline::new(
            Arc::new(StaticSource::new(articles)),
            Extractor::with_prompt(Arc::new(KeywordModel), "extract"),
            store,
            &config,
            3,
        )
    }

    fn article(title: &str, link: &str) -> Article {
        Article::new(title, "summary").with_link(link)
    }

    #[tokio::test]
    async fn run_counts_outcomes() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(
            store.clone(),
            vec![
                article("Musk sues", "https://a"),
                article("broken", "https://b"),
                article("Musk sues again", "https://c"),
                article("never fetched", "https://d"),
            ],
            true,
        );

        let report = pipeline.run().await.unwrap();

        assert_eq!(
            report,
            IngestionReport {
                seen: 3,
                merged: 2,
                skipped_extraction: 1,
                failed_merge: 0,
                skipped_duplicate: 0,
            }
        );
        assert_eq!(store.edge_count(), 1);
    }

    #[tokio::test]
    async fn second_run_skips_recorded_links() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone(), vec![article("Musk sues", "https://a")], true);

        pipeline.run().await.unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.skipped_duplicate, 1);
        assert_eq!(report.merged, 0);
    }

    #[tokio::test]
    async fn dedupe_disabled_reprocesses() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store.clone(), vec![article("Musk sues", "https://a")], false);

        pipeline.run().await.unwrap();
        let report = pipeline.run().await.unwrap();

        assert_eq!(report.merged, 1);
        assert!(!store.article_exists("https://a").await.unwrap());
    }

    #[tokio::test]
    async fn ingest_latest_processes_first_article() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(
            store,
            vec![article("Musk sues", "https://a"), article("other", "https://b")],
            true,
        );

        let (article, outcome) = pipeline.ingest_latest().await.unwrap().unwrap();
        assert_eq!(article.link, "https://a");
        assert_eq!(outcome.label(), "merged");
    }

    #[tokio::test]
    async fn ingest_latest_with_empty_source() {
        let store = Arc::new(MemoryStore::new());
        let pipeline = pipeline(store, vec![], true);
        assert!(pipeline.ingest_latest().await.unwrap().is_none());
    }
}
