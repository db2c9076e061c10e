//! Snapshot assembly
//!
//! Issues the source's fixed set of named queries for one observation cycle
//! and assembles the results into a single immutable snapshot. A failed
//! query degrades that category to an empty sample list so the cycle stays
//! informative even when one sub-query is unreachable.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::models::MetricsSnapshot;
use crate::source::MetricSource;

/// Assembles one snapshot per cycle from the configured metric source
pub struct SnapshotAggregator {
    source: Arc<dyn MetricSource>,
}

impl SnapshotAggregator {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self { source }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Collect all categories into one timestamped snapshot
    pub async fn collect(&self) -> MetricsSnapshot {
        let mut categories = BTreeMap::new();
        let mut failed = 0usize;

        for category in self.source.categories() {
            let samples = match self.source.collect_category(category).await {
                Ok(samples) => {
                    debug!(category, count = samples.len(), "Category collected");
                    samples
                }
                Err(e) => {
                    failed += 1;
                    warn!(category, error = %e, "Query failed, degrading to empty");
                    Vec::new()
                }
            };
            categories.insert(category.to_string(), samples);
        }

        if failed > 0 {
            warn!(
                failed,
                total = self.source.categories().len(),
                "Snapshot assembled with degraded categories"
            );
        }

        MetricsSnapshot::new(Utc::now(), categories)
    }
}
