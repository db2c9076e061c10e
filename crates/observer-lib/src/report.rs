//! Report synthesis and persistence
//!
//! The terminal step of every cycle: fold the stage outputs and snapshot
//! summary into one human-readable artifact and overwrite the well-known
//! report path. Synthesis is total; it must produce something persistable
//! for any input, including empty snapshots and all-skipped stages.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::analysis::{placeholder_for, title_for};
use crate::error::PersistError;
use crate::models::{MetricsSnapshot, StageOutput, StageResult};

const BANNER: &str =
    "================================================================================";

/// Build the report text for one cycle
pub fn synthesize(
    snapshot: &MetricsSnapshot,
    stage_outputs: &[StageOutput],
    generated_at: DateTime<Utc>,
) -> String {
    let mut report = String::new();

    report.push_str(&format!(
        "{BANNER}\nCLUSTER OBSERVER REPORT\nGenerated: {}\n{BANNER}\n\n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC"),
    ));

    report.push_str("CLUSTER SNAPSHOT:\n");
    let mut any_category = false;
    for (category, samples) in snapshot.categories() {
        any_category = true;
        report.push_str(&format!(
            "- {category}: {} samples{}\n",
            samples.len(),
            category_detail(snapshot, category),
        ));
    }
    if !any_category {
        report.push_str("- no metric categories collected\n");
    }
    report.push('\n');

    for output in stage_outputs {
        report.push_str(&format!("{BANNER}\n{}\n{BANNER}\n\n", title_for(&output.stage)));
        match &output.result {
            StageResult::Findings(text) => report.push_str(text),
            StageResult::Skipped(reason) => {
                report.push_str(&format!("{} ({reason})", placeholder_for(&output.stage)));
            }
        }
        report.push_str("\n\n");
    }

    report.push_str(&format!(
        "{BANNER}\nRAW METRICS:\n{BANNER}\n{}\n",
        snapshot.serialize_pretty(),
    ));

    report
}

/// Summary detail for the categories where a breakdown is worth showing
fn category_detail(snapshot: &MetricsSnapshot, category: &str) -> String {
    match category {
        "nodes" => {
            let ready = snapshot.count_where("nodes", "status", "Ready");
            format!(" ({ready} Ready)")
        }
        "pods" => {
            let running = snapshot.count_where("pods", "status", "Running");
            format!(" ({running} Running)")
        }
        _ => String::new(),
    }
}

/// Persists the report by overwrite to a single well-known path
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrite the previous cycle's report. Atomic via temp file + rename.
    pub async fn persist(&self, report: &str) -> Result<(), PersistError> {
        let wrap = |source: std::io::Error| PersistError::Write {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await.map_err(wrap)?;
            }
        }

        let temp_path = self.path.with_extension("tmp");
        tokio::fs::write(&temp_path, report).await.map_err(wrap)?;
        tokio::fs::rename(&temp_path, &self.path)
            .await
            .map_err(wrap)?;

        debug!(path = %self.path.display(), bytes = report.len(), "Report persisted");
        info!(path = %self.path.display(), "Report saved");
        Ok(())
    }
}
