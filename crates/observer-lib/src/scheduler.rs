//! Observation scheduling loop
//!
//! Drives collect -> analyze -> report at a fixed interval, forever. Each
//! cycle runs to completion before the next begins; a failed cycle is
//! logged and the loop keeps going. The iteration counter is in-memory and
//! resets on restart, as does the history store.

use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::time::interval;
use tracing::{error, info};

use crate::aggregator::SnapshotAggregator;
use crate::analysis::Orchestrator;
use crate::models::StageResult;
use crate::report::{synthesize, ReportWriter};

/// Default interval between observation cycles (5 minutes)
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(300);

/// Characters of analysis text logged as a preview after each cycle
const PREVIEW_CHARS: usize = 500;

/// Configuration for the observation loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Sleep interval between cycles
    pub check_interval: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }
}

/// The periodic observation loop
pub struct ObserverLoop {
    aggregator: SnapshotAggregator,
    orchestrator: Orchestrator,
    writer: ReportWriter,
    config: LoopConfig,
    iteration: u64,
}

impl ObserverLoop {
    pub fn new(
        aggregator: SnapshotAggregator,
        orchestrator: Orchestrator,
        writer: ReportWriter,
        config: LoopConfig,
    ) -> Self {
        Self {
            aggregator,
            orchestrator,
            writer,
            config,
            iteration: 0,
        }
    }

    /// Run until the shutdown signal fires
    pub async fn run(mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            interval_secs = self.config.check_interval.as_secs(),
            source = self.aggregator.source_name(),
            report_path = %self.writer.path().display(),
            "Starting observation loop"
        );

        let mut ticker = interval(self.config.check_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.iteration += 1;
                    if let Err(e) = self.run_cycle().await {
                        error!(iteration = self.iteration, error = %e, "Cycle failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("Shutting down observation loop");
                    break;
                }
            }
        }
    }

    /// One full observation cycle: collect, analyze, synthesize, persist
    pub async fn run_cycle(&mut self) -> Result<()> {
        info!(iteration = self.iteration, "Collecting metrics");
        let snapshot = self.aggregator.collect().await;
        info!(
            iteration = self.iteration,
            samples = snapshot.total_samples(),
            "Snapshot collected"
        );

        let outputs = self.orchestrator.observe(snapshot.clone()).await;

        let report = synthesize(&snapshot, &outputs, Utc::now());
        self.writer.persist(&report).await?;

        if let Some(preview) = outputs.iter().find_map(|o| match &o.result {
            StageResult::Findings(text) => Some(text),
            StageResult::Skipped(_) => None,
        }) {
            let preview: String = preview.chars().take(PREVIEW_CHARS).collect();
            info!(iteration = self.iteration, preview = %preview, "Analysis preview");
        }

        Ok(())
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Number of observation records currently retained
    pub fn history_len(&self) -> usize {
        self.orchestrator.history().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InferenceError, SourceError};
    use crate::inference::InferenceClient;
    use crate::models::Sample;
    use crate::source::MetricSource;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubSource;

    #[async_trait]
    impl MetricSource for StubSource {
        async fn collect_category(&self, _category: &str) -> Result<Vec<Sample>, SourceError> {
            Ok(Vec::new())
        }

        fn categories(&self) -> &'static [&'static str] {
            &["pods"]
        }

        fn name(&self) -> &'static str {
            "stub"
        }
    }

    struct StubInference;

    #[async_trait]
    impl InferenceClient for StubInference {
        async fn analyze(&self, _prompt: &str, _max_tokens: u32) -> Result<String, InferenceError> {
            Ok("stub findings".to_string())
        }
    }

    struct FailingInference;

    #[async_trait]
    impl InferenceClient for FailingInference {
        async fn analyze(&self, _prompt: &str, _max_tokens: u32) -> Result<String, InferenceError> {
            Err(InferenceError::EmptyResponse)
        }
    }

    fn make_loop(inference: Arc<dyn InferenceClient>, path: &std::path::Path) -> ObserverLoop {
        ObserverLoop::new(
            SnapshotAggregator::new(Arc::new(StubSource)),
            Orchestrator::new(inference),
            ReportWriter::new(path),
            LoopConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_run_cycle_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.txt");
        let mut observer = make_loop(Arc::new(StubInference), &path);

        observer.run_cycle().await.unwrap();

        let report = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(report.contains("CLUSTER OBSERVER REPORT"));
        assert!(report.contains("stub findings"));
    }

    #[tokio::test]
    async fn test_all_failed_stages_still_produce_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.txt");
        let mut observer = make_loop(Arc::new(FailingInference), &path);

        observer.run_cycle().await.unwrap();

        let report = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(report.contains("No analysis available"));
        assert!(report.contains("No HA issues detected"));
    }

    #[tokio::test]
    async fn test_history_accumulates_across_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latest.txt");
        let mut observer = make_loop(Arc::new(StubInference), &path);

        for _ in 0..3 {
            observer.run_cycle().await.unwrap();
        }
        assert_eq!(observer.orchestrator.history().len(), 3);
    }

    #[tokio::test]
    async fn test_persist_failure_surfaces_without_panicking() {
        // A directory as the report path makes the rename fail.
        let dir = tempfile::tempdir().unwrap();
        let mut observer = make_loop(Arc::new(StubInference), dir.path());

        assert!(observer.run_cycle().await.is_err());
        // The observation itself still happened and was recorded.
        assert_eq!(observer.orchestrator.history().len(), 1);
    }
}
