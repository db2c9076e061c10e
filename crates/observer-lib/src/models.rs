//! Core data models for the observer

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single normalized metric value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleValue {
    Number(f64),
    Text(String),
}

impl SampleValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SampleValue::Number(n) => Some(*n),
            SampleValue::Text(s) => s.parse().ok(),
        }
    }
}

/// One labeled sample from a metric source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sample {
    pub labels: BTreeMap<String, String>,
    pub value: SampleValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Sample {
    pub fn new(labels: BTreeMap<String, String>, value: SampleValue) -> Self {
        Self {
            labels,
            value,
            timestamp: None,
        }
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Point-in-time capture of all monitored metric categories.
///
/// Immutable once constructed; the same instance is shared by every
/// analysis stage within a cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    captured_at: DateTime<Utc>,
    categories: BTreeMap<String, Vec<Sample>>,
}

impl MetricsSnapshot {
    pub fn new(captured_at: DateTime<Utc>, categories: BTreeMap<String, Vec<Sample>>) -> Self {
        Self {
            captured_at,
            categories,
        }
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn samples(&self, category: &str) -> &[Sample] {
        self.categories
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &[Sample])> {
        self.categories
            .iter()
            .map(|(name, samples)| (name.as_str(), samples.as_slice()))
    }

    pub fn total_samples(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }

    /// Count of samples in a category whose `label_key` equals `label_value`
    pub fn count_where(&self, category: &str, label_key: &str, label_value: &str) -> usize {
        self.samples(category)
            .iter()
            .filter(|s| s.label(label_key) == Some(label_value))
            .count()
    }

    /// Raw dump for the report tail and for stage prompts
    pub fn serialize_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Outcome of one analysis stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageResult {
    /// Free-text findings from the inference collaborator, treated as opaque
    Findings(String),
    /// Stage did not produce findings; carries the reason
    Skipped(String),
}

impl StageResult {
    pub fn is_skipped(&self) -> bool {
        matches!(self, StageResult::Skipped(_))
    }
}

/// One stage's outcome, in pipeline order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageOutput {
    pub stage: String,
    pub result: StageResult,
}

/// One completed observation cycle: the snapshot plus every stage outcome.
///
/// Created once per cycle and never mutated; owned by the history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservationRecord {
    pub timestamp: DateTime<Utc>,
    pub snapshot: MetricsSnapshot,
    pub stage_outputs: Vec<StageOutput>,
}

impl ObservationRecord {
    pub fn new(snapshot: MetricsSnapshot, stage_outputs: Vec<StageOutput>) -> Self {
        Self {
            timestamp: snapshot.captured_at(),
            snapshot,
            stage_outputs,
        }
    }
}
