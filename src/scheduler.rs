//! Periodic ingestion trigger.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::graphrag::{IngestionPipeline, IngestionReport};

/// What happened to one scheduled run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed(IngestionReport),
    /// A previous run still holds the run-lock.
    Skipped,
    Failed(String),
}

/// Runs the ingestion pipeline on a fixed interval.
#[derive(Clone)]
pub struct Scheduler {
    pipeline: IngestionPipeline,
    interval: Duration,
    serialize_runs: bool,
    run_lock: Arc<Mutex<()>>,
}

impl Scheduler {
    pub fn new(pipeline: IngestionPipeline, config: &SchedulerConfig) -> Self {
        Self {
            pipeline,
            interval: Duration::from_secs(config.interval_secs.max(1)),
            serialize_runs: config.serialize_runs,
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    /// One run, honouring the run-lock. Errors are logged, never propagated.
    pub async fn run_once(&self) -> RunStatus {
        let _guard = if self.serialize_runs {
            match self.run_lock.try_lock() {
                Ok(guard) => Some(guard),
                Err(_) => {
                    warn!("⏭️ Previous ingestion run still in progress, skipping this tick");
                    return RunStatus::Skipped;
                }
            }
        } else {
            None
        };

        info!("⏰ Scheduled ingestion run");
        match self.pipeline.run().await {
            Ok(report) => RunStatus::Completed(report),
            Err(e) => {
                error!("❌ Ingestion run failed: {}", e);
                RunStatus::Failed(e.to_string())
            }
        }
    }

    /// Spawn the scheduling loop. It stops when `shutdown` turns `true` or its
    /// sender is dropped, then waits for in-flight runs, so the returned handle
    /// resolves only once no run holds the pipeline. The first run fires one
    /// interval after start.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                serialize_runs = self.serialize_runs,
                "🚀 Scheduler started"
            );
            if !self.serialize_runs {
                warn!("Run-lock disabled: overlapping ingestion runs are possible");
            }

            let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut runs = JoinSet::new();

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // Runs are detached from the ticker so a slow run cannot
                        // delay the next tick; the run-lock decides about overlap.
                        let this = self.clone();
                        runs.spawn(async move { this.run_once().await });
                    }
                    Some(_) = runs.join_next(), if !runs.is_empty() => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            if !runs.is_empty() {
                info!(in_flight = runs.len(), "⏳ Waiting for ingestion runs to finish");
            }
            while let Some(joined) = runs.join_next().await {
                if let Err(e) = joined {
                    warn!("Ingestion run task ended abnormally: {}", e);
                }
            }

            info!("🛑 Scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::feed::ArticleSource;
    use crate::graphrag::Extractor;
    use crate::integrations::{LanguageModel, LlmRequest};
    use crate::models::Article;
    use crate::store::MemoryStore;
    use crate::{Error, Result};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    struct EmptyModel;

    #[async_trait]
    impl LanguageModel for EmptyModel {
        async fn complete(&self, _request: &LlmRequest) -> Result<String> {
            Ok(r#"{"nodes": [], "edges": []}"#.to_string())
        }
    }

    /// Source that blocks until released.
    struct GatedSource {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl ArticleSource for GatedSource {
        async fn fetch_latest(&self, _limit: usize) -> Result<Vec<Article>> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(vec![])
        }
    }

    struct FailingSource;

    #[async_trait]
    impl ArticleSource for FailingSource {
        async fn fetch_latest(&self, _limit: usize) -> Result<Vec<Article>> {
            Err(Error::Feed("feed down".to_string()))
        }
    }

    fn scheduler(source: Arc<dyn ArticleSource>, serialize_runs: bool) -> Scheduler {
        let pipeline = IngestionPipeline::new(
            source,
            Extractor::with_prompt(Arc::new(EmptyModel), "extract"),
            Arc::new(MemoryStore::new()),
            &IngestConfig::default(),
            3,
        );
        Scheduler::new(
            pipeline,
            &SchedulerConfig {
                interval_secs: 3600,
                serialize_runs,
                ..SchedulerConfig::default()
            },
        )
    }

    #[tokio::test]
    async fn overlapping_run_is_skipped() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let scheduler = scheduler(
            Arc::new(GatedSource {
                entered: entered.clone(),
                release: release.clone(),
            }),
            true,
        );

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.run_once().await })
        };
        entered.notified().await;

        assert_eq!(scheduler.run_once().await, RunStatus::Skipped);

        release.notify_one();
        assert!(matches!(first.await.unwrap(), RunStatus::Completed(_)));
    }

    #[tokio::test]
    async fn failed_run_is_reported() {
        let status = scheduler(Arc::new(FailingSource), true).run_once().await;
        assert!(matches!(status, RunStatus::Failed(msg) if msg.contains("feed down")));
    }

    #[tokio::test]
    async fn shutdown_waits_for_in_flight_run() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let source = Arc::new(GatedSource {
            entered: entered.clone(),
            release: release.clone(),
        });
        let pipeline = IngestionPipeline::new(
            source,
            Extractor::with_prompt(Arc::new(EmptyModel), "extract"),
            Arc::new(MemoryStore::new()),
            &IngestConfig::default(),
            3,
        );
        let scheduler = Scheduler::new(
            pipeline,
            &SchedulerConfig {
                interval_secs: 1,
                serialize_runs: true,
                ..SchedulerConfig::default()
            },
        );

        let (tx, rx) = watch::channel(false);
        let handle = scheduler.spawn(rx);

        tokio::time::timeout(Duration::from_secs(5), entered.notified())
            .await
            .expect("first run did not start");
        tx.send(true).unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(!handle.is_finished());

        release.notify_one();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop after the run finished")
            .unwrap();
    }

    #[tokio::test]
    async fn stops_on_shutdown() {
        let (tx, rx) = watch::channel(false);
        let handle = scheduler(Arc::new(FailingSource), true).spawn(rx);

        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();
    }
}
