//! Analysis pipeline
//!
//! Four fixed stages run in order every cycle, each building a
//! deterministic prompt from the current snapshot (plus trend context for
//! the history-aware stages) and delegating judgment to the inference
//! collaborator. Stages never read each other's output within a cycle;
//! order only affects report layout.

mod orchestrator;
mod stages;

pub use orchestrator::Orchestrator;
pub use stages::{
    default_pipeline, AnomalyDetection, LoadPrediction, ResilienceCheck, ResourceOptimization,
};

use crate::history::HistoryStore;
use crate::models::MetricsSnapshot;

/// Records of trend context fed to the history-aware stages
pub const CONTEXT_WINDOW: usize = 3;

/// Per-record excerpt length in the trend context
const CONTEXT_EXCERPT_CHARS: usize = 200;

/// Outcome of prompt construction for one stage
pub enum StagePrompt {
    /// Prompt is ready; invoke the collaborator
    Ready(String),
    /// Stage cannot run this cycle; do not invoke the collaborator
    Skip(String),
}

/// One analysis pass over a snapshot plus history
pub trait AnalysisStage: Send + Sync {
    /// Stable stage identifier used in records and logs
    fn name(&self) -> &'static str;

    /// Report section heading
    fn title(&self) -> &'static str;

    /// Upper bound on collaborator response size for this stage
    fn max_tokens(&self) -> u32;

    /// Report text when this stage produced no findings
    fn placeholder(&self) -> &'static str;

    fn build_prompt(&self, snapshot: &MetricsSnapshot, history: &HistoryStore) -> StagePrompt;
}

/// Report metadata for a stage name recorded in a past cycle
pub fn placeholder_for(stage: &str) -> &'static str {
    for s in default_pipeline() {
        if s.name() == stage {
            return s.placeholder();
        }
    }
    "No analysis available"
}

pub fn title_for(stage: &str) -> &'static str {
    for s in default_pipeline() {
        if s.name() == stage {
            return s.title();
        }
    }
    "ANALYSIS"
}

/// Render the most recent records as trend context for a prompt.
///
/// Oldest first, one block per record, each stage output truncated so a
/// verbose earlier analysis cannot dominate the prompt.
pub fn format_history(history: &HistoryStore) -> String {
    if history.is_empty() {
        return "No historical observations yet.".to_string();
    }

    let mut out = String::new();
    for record in history.recent(CONTEXT_WINDOW) {
        out.push_str(&format!(
            "Observation at {}: {} samples across {} categories\n",
            record.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            record.snapshot.total_samples(),
            record.snapshot.categories().count(),
        ));
        for output in &record.stage_outputs {
            let text = match &output.result {
                crate::models::StageResult::Findings(text) => excerpt(text),
                crate::models::StageResult::Skipped(reason) => format!("(skipped: {reason})"),
            };
            out.push_str(&format!("  {}: {}\n", output.stage, text));
        }
    }
    out
}

fn excerpt(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= CONTEXT_EXCERPT_CHARS {
        flat
    } else {
        let cut: String = flat.chars().take(CONTEXT_EXCERPT_CHARS).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{MetricsSnapshot, ObservationRecord, StageOutput, StageResult};
    use chrono::Utc;
    use std::collections::BTreeMap;

    fn record_with(text: &str) -> ObservationRecord {
        let snapshot = MetricsSnapshot::new(Utc::now(), BTreeMap::new());
        ObservationRecord::new(
            snapshot,
            vec![StageOutput {
                stage: "anomaly_detection".to_string(),
                result: StageResult::Findings(text.to_string()),
            }],
        )
    }

    #[test]
    fn test_format_history_empty() {
        let history = HistoryStore::new();
        assert_eq!(format_history(&history), "No historical observations yet.");
    }

    #[test]
    fn test_format_history_truncates_long_output() {
        let mut history = HistoryStore::new();
        history.append(record_with(&"x".repeat(1000)));

        let formatted = format_history(&history);
        assert!(formatted.contains("..."));
        assert!(formatted.len() < 1000);
    }

    #[test]
    fn test_format_history_window() {
        let mut history = HistoryStore::new();
        for i in 0..5 {
            history.append(record_with(&format!("finding {i}")));
        }

        let formatted = format_history(&history);
        assert!(!formatted.contains("finding 0"));
        assert!(!formatted.contains("finding 1"));
        assert!(formatted.contains("finding 2"));
        assert!(formatted.contains("finding 4"));
    }

    #[test]
    fn test_placeholder_lookup() {
        assert_eq!(
            placeholder_for("load_prediction"),
            "Insufficient historical data"
        );
        assert_eq!(placeholder_for("unknown_stage"), "No analysis available");
    }
}
