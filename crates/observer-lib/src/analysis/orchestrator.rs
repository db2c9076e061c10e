//! Stage orchestration
//!
//! Runs the pipeline strictly in order over one snapshot, converts
//! collaborator failures into skipped stages, and appends the completed
//! observation to the history store. Failure of one stage never aborts the
//! cycle.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{AnalysisStage, StagePrompt};
use crate::history::HistoryStore;
use crate::inference::InferenceClient;
use crate::models::{MetricsSnapshot, ObservationRecord, StageOutput, StageResult};

/// Drives the analysis stages and owns the historical context store
pub struct Orchestrator {
    stages: Vec<Box<dyn AnalysisStage>>,
    inference: Arc<dyn InferenceClient>,
    history: HistoryStore,
}

impl Orchestrator {
    pub fn new(inference: Arc<dyn InferenceClient>) -> Self {
        Self::with_stages(super::default_pipeline(), inference)
    }

    pub fn with_stages(
        stages: Vec<Box<dyn AnalysisStage>>,
        inference: Arc<dyn InferenceClient>,
    ) -> Self {
        Self {
            stages,
            inference,
            history: HistoryStore::new(),
        }
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// Run every stage over the snapshot and record the observation.
    ///
    /// Always appends one record, even when every stage was skipped.
    pub async fn observe(&mut self, snapshot: MetricsSnapshot) -> Vec<StageOutput> {
        let mut outputs = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let result = match stage.build_prompt(&snapshot, &self.history) {
                StagePrompt::Skip(reason) => {
                    debug!(stage = stage.name(), reason = %reason, "Stage skipped before inference");
                    StageResult::Skipped(reason)
                }
                StagePrompt::Ready(prompt) => {
                    match self.inference.analyze(&prompt, stage.max_tokens()).await {
                        Ok(text) => {
                            debug!(stage = stage.name(), chars = text.len(), "Stage complete");
                            StageResult::Findings(text)
                        }
                        Err(e) => {
                            warn!(stage = stage.name(), error = %e, "Inference failed, skipping stage");
                            StageResult::Skipped(format!("inference failed: {e}"))
                        }
                    }
                }
            };

            outputs.push(StageOutput {
                stage: stage.name().to_string(),
                result,
            });
        }

        let skipped = outputs.iter().filter(|o| o.result.is_skipped()).count();
        info!(
            stages = outputs.len(),
            skipped,
            history_len = self.history.len() + 1,
            "Observation complete"
        );

        self.history
            .append(ObservationRecord::new(snapshot, outputs.clone()));

        outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InferenceError;
    use crate::history::MIN_PREDICTION_HISTORY;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn empty_snapshot() -> MetricsSnapshot {
        MetricsSnapshot::new(Utc::now(), BTreeMap::new())
    }

    /// Counting mock collaborator
    struct MockInference {
        call_count: AtomicUsize,
        fail_on_call: Option<usize>,
    }

    impl MockInference {
        fn new() -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                fail_on_call: None,
            }
        }

        fn failing_on(call: usize) -> Self {
            Self {
                call_count: AtomicUsize::new(0),
                fail_on_call: Some(call),
            }
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl InferenceClient for MockInference {
        async fn analyze(&self, _prompt: &str, _max_tokens: u32) -> Result<String, InferenceError> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                return Err(InferenceError::EmptyResponse);
            }
            Ok(format!("findings for call {call}"))
        }
    }

    #[tokio::test]
    async fn test_cold_prediction_does_not_call_collaborator() {
        let inference = Arc::new(MockInference::new());
        let mut orchestrator = Orchestrator::new(inference.clone());

        let outputs = orchestrator.observe(empty_snapshot()).await;

        // Three of four stages ran; prediction skipped without a call.
        assert_eq!(inference.calls(), 3);
        let prediction = outputs.iter().find(|o| o.stage == "load_prediction").unwrap();
        assert!(prediction.result.is_skipped());
    }

    #[tokio::test]
    async fn test_warm_prediction_calls_collaborator() {
        let inference = Arc::new(MockInference::new());
        let mut orchestrator = Orchestrator::new(inference.clone());

        for _ in 0..MIN_PREDICTION_HISTORY {
            orchestrator.observe(empty_snapshot()).await;
        }
        let before = inference.calls();
        let outputs = orchestrator.observe(empty_snapshot()).await;

        // All four stages queried the collaborator this cycle.
        assert_eq!(inference.calls() - before, 4);
        let prediction = outputs.iter().find(|o| o.stage == "load_prediction").unwrap();
        assert!(matches!(prediction.result, StageResult::Findings(_)));
    }

    #[tokio::test]
    async fn test_one_failing_stage_does_not_abort_cycle() {
        // First collaborator call (anomaly detection) fails.
        let inference = Arc::new(MockInference::failing_on(0));
        let mut orchestrator = Orchestrator::new(inference.clone());

        let outputs = orchestrator.observe(empty_snapshot()).await;

        assert_eq!(outputs.len(), 4);
        assert!(outputs[0].result.is_skipped());
        assert!(matches!(outputs[2].result, StageResult::Findings(_)));
        assert!(matches!(outputs[3].result, StageResult::Findings(_)));

        // The record was still appended.
        assert_eq!(orchestrator.history().len(), 1);
    }

    #[tokio::test]
    async fn test_record_appended_every_cycle() {
        let inference = Arc::new(MockInference::new());
        let mut orchestrator = Orchestrator::new(inference);

        for i in 1..=4 {
            orchestrator.observe(empty_snapshot()).await;
            assert_eq!(orchestrator.history().len(), i);
        }
    }

    #[tokio::test]
    async fn test_outputs_in_pipeline_order() {
        let inference = Arc::new(MockInference::new());
        let mut orchestrator = Orchestrator::new(inference);

        let outputs = orchestrator.observe(empty_snapshot()).await;
        let names: Vec<_> = outputs.iter().map(|o| o.stage.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "anomaly_detection",
                "load_prediction",
                "resource_optimization",
                "resilience_check"
            ]
        );
    }
}
