//! Metric source adapters
//!
//! The observer understands two backends: the live cluster-state API
//! (nodes, pods, deployments, events) and a Prometheus-style time-series
//! query endpoint. Both sit behind the same narrow contract so the rest of
//! the pipeline never knows which variant is configured.

mod cluster;
mod promql;

pub use cluster::{ClusterApiSource, EXCLUDED_NAMESPACES};
pub use promql::PromQuerySource;

use crate::error::SourceError;
use crate::models::Sample;

pub use async_trait::async_trait;

/// Trait for metric source implementations
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Execute the named query and return zero-or-more labeled samples
    async fn collect_category(&self, category: &str) -> Result<Vec<Sample>, SourceError>;

    /// The fixed set of categories this source provides, in snapshot order
    fn categories(&self) -> &'static [&'static str];

    /// Short name for logging
    fn name(&self) -> &'static str;
}
