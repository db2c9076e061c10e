//! The four analysis stages
//!
//! Each stage contributes a task description and formatting hints; the
//! ANOMALIES/SEVERITY/PREDICTION/CONFIDENCE markers below shape the
//! collaborator's text and are never parsed back out.

use super::{format_history, AnalysisStage, StagePrompt};
use crate::history::{HistoryStore, MIN_PREDICTION_HISTORY};
use crate::models::MetricsSnapshot;

/// Detects unusual patterns in the current snapshot against recent history
pub struct AnomalyDetection;

impl AnalysisStage for AnomalyDetection {
    fn name(&self) -> &'static str {
        "anomaly_detection"
    }

    fn title(&self) -> &'static str {
        "ANOMALY DETECTION"
    }

    fn max_tokens(&self) -> u32 {
        2000
    }

    fn placeholder(&self) -> &'static str {
        "No analysis available"
    }

    fn build_prompt(&self, snapshot: &MetricsSnapshot, history: &HistoryStore) -> StagePrompt {
        StagePrompt::Ready(format!(
            "You are an expert SRE analyzing Kubernetes cluster metrics for anomalies.\n\
             Identify pods with elevated restarts, failing workloads, warning events that \
             need attention, and metric values that deviate from the recent trend.\n\n\
             Format your response with these sections:\n\
             ANOMALIES: list each anomaly with the affected object\n\
             SEVERITY: overall severity (Low/Medium/High/Critical)\n\n\
             Recent observation history:\n{}\n\
             Current cluster metrics:\n```json\n{}\n```\n\n\
             Be concise and actionable.",
            format_history(history),
            snapshot.serialize_pretty(),
        ))
    }
}

/// Predicts near-term load from the accumulated trend.
///
/// Requires a minimum of history before it runs at all; warmth is judged by
/// the store length at call time.
pub struct LoadPrediction;

impl AnalysisStage for LoadPrediction {
    fn name(&self) -> &'static str {
        "load_prediction"
    }

    fn title(&self) -> &'static str {
        "LOAD PREDICTION"
    }

    fn max_tokens(&self) -> u32 {
        1500
    }

    fn placeholder(&self) -> &'static str {
        "Insufficient historical data"
    }

    fn build_prompt(&self, snapshot: &MetricsSnapshot, history: &HistoryStore) -> StagePrompt {
        if !history.is_warm(MIN_PREDICTION_HISTORY) {
            return StagePrompt::Skip(format!(
                "insufficient historical data: {} of {} observations",
                history.len(),
                MIN_PREDICTION_HISTORY,
            ));
        }

        StagePrompt::Ready(format!(
            "You are an expert SRE forecasting Kubernetes cluster load.\n\
             Based on the trend across recent observations, predict what will happen \
             in the next few hours: resource utilization, replica pressure, and \
             workloads likely to hit limits.\n\n\
             Format your response with these sections:\n\
             PREDICTION: expected behavior over the next few hours\n\
             CONFIDENCE: Low/Medium/High with a one-line justification\n\n\
             Recent observation history:\n{}\n\
             Current cluster metrics:\n```json\n{}\n```\n\n\
             Be concise and actionable.",
            format_history(history),
            snapshot.serialize_pretty(),
        ))
    }
}

/// Recommends resource request/limit adjustments
pub struct ResourceOptimization;

impl AnalysisStage for ResourceOptimization {
    fn name(&self) -> &'static str {
        "resource_optimization"
    }

    fn title(&self) -> &'static str {
        "RESOURCE OPTIMIZATION"
    }

    fn max_tokens(&self) -> u32 {
        2000
    }

    fn placeholder(&self) -> &'static str {
        "No recommendations at this time"
    }

    fn build_prompt(&self, snapshot: &MetricsSnapshot, _history: &HistoryStore) -> StagePrompt {
        StagePrompt::Ready(format!(
            "You are an expert SRE reviewing Kubernetes resource configuration.\n\
             Compare declared requests/limits against observed usage and recommend \
             specific adjustments: over-provisioned workloads to shrink, \
             under-provisioned workloads at risk of throttling or OOM kills, and \
             workloads missing requests or limits entirely.\n\n\
             Current cluster metrics:\n```json\n{}\n```\n\n\
             List each recommendation with the workload name and the suggested values. \
             Be concise and actionable.",
            snapshot.serialize_pretty(),
        ))
    }
}

/// Checks high-availability posture of the observed workloads
pub struct ResilienceCheck;

impl AnalysisStage for ResilienceCheck {
    fn name(&self) -> &'static str {
        "resilience_check"
    }

    fn title(&self) -> &'static str {
        "RESILIENCE CHECK"
    }

    fn max_tokens(&self) -> u32 {
        1500
    }

    fn placeholder(&self) -> &'static str {
        "No HA issues detected"
    }

    fn build_prompt(&self, snapshot: &MetricsSnapshot, _history: &HistoryStore) -> StagePrompt {
        StagePrompt::Ready(format!(
            "You are an expert SRE auditing Kubernetes cluster resilience.\n\
             Look for single-replica deployments, workloads concentrated on one node, \
             deployments with fewer ready replicas than desired, and nodes that are \
             NotReady.\n\n\
             Current cluster metrics:\n```json\n{}\n```\n\n\
             List each high-availability risk with the affected object. \
             Be concise and actionable.",
            snapshot.serialize_pretty(),
        ))
    }
}

/// The fixed stage sequence: anomaly detection, load prediction, resource
/// optimization, resilience check.
pub fn default_pipeline() -> Vec<Box<dyn AnalysisStage>> {
    vec![
        Box::new(AnomalyDetection),
        Box::new(LoadPrediction),
        Box::new(ResourceOptimization),
        Box::new(ResilienceCheck),
    ]
}
