//! Cluster Observer - periodic AI-assisted cluster analysis
//!
//! Samples cluster metrics at a fixed interval, runs the four-stage
//! analysis pipeline against the inference collaborator, and overwrites a
//! single report file with each cycle's findings.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use observer_lib::{
    ClaudeClient, ClusterApiSource, LoopConfig, MetricSource, ObserverLoop, Orchestrator,
    PromQuerySource, ReportWriter, SnapshotAggregator,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

use config::{ObserverConfig, SourceKind};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting cluster-observer");

    // Missing API key fails here, before the loop ever starts.
    let config = ObserverConfig::load()?;
    info!(
        api_key_configured = !config.api_key.is_empty(),
        model = %config.model,
        interval_secs = config.check_interval_secs,
        report_path = %config.report_path,
        "Observer configured"
    );

    let source = build_source(&config)?;
    let aggregator = SnapshotAggregator::new(source);

    let inference = Arc::new(ClaudeClient::new(
        &config.inference_url,
        config.api_key.clone(),
        config.model.clone(),
        config.inference_timeout_secs,
    )?);
    let orchestrator = Orchestrator::new(inference);

    let writer = ReportWriter::new(&config.report_path);

    let loop_config = LoopConfig {
        check_interval: Duration::from_secs(config.check_interval_secs),
    };
    let observer = ObserverLoop::new(aggregator, orchestrator, writer, loop_config);

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);
    let loop_handle = tokio::spawn(observer.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("SIGINT received, shutting down");
    let _ = shutdown_tx.send(());
    let _ = loop_handle.await;

    Ok(())
}

fn build_source(config: &ObserverConfig) -> Result<Arc<dyn MetricSource>> {
    match config.source_kind {
        SourceKind::Cluster => {
            let token_path = Path::new(&config.cluster_token_path);
            let token = if token_path.exists() {
                Some(ClusterApiSource::load_token(token_path)?)
            } else {
                warn!(
                    path = %config.cluster_token_path,
                    "No service-account token found, querying cluster API unauthenticated"
                );
                None
            };
            Ok(Arc::new(ClusterApiSource::new(&config.cluster_url, token)?))
        }
        SourceKind::Prometheus => {
            Ok(Arc::new(PromQuerySource::new(&config.prometheus_url)?))
        }
    }
}
