//! Observer library for periodic cluster analysis
//!
//! This crate provides the core functionality for:
//! - Metric collection from a cluster-state API or time-series endpoint
//! - A bounded rolling history of past observations
//! - A fixed four-stage analysis pipeline over an inference collaborator
//! - Report synthesis and persistence
//! - The periodic observation loop

pub mod aggregator;
pub mod analysis;
pub mod error;
pub mod history;
pub mod inference;
pub mod models;
pub mod report;
pub mod scheduler;
pub mod source;

pub use aggregator::SnapshotAggregator;
pub use analysis::Orchestrator;
pub use error::{ConfigError, InferenceError, PersistError, SourceError};
pub use history::{HistoryStore, HISTORY_CAPACITY, MIN_PREDICTION_HISTORY};
pub use inference::{ClaudeClient, InferenceClient};
pub use models::*;
pub use report::{synthesize, ReportWriter};
pub use scheduler::{LoopConfig, ObserverLoop, DEFAULT_CHECK_INTERVAL};
pub use source::{ClusterApiSource, MetricSource, PromQuerySource};
