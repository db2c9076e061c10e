//! Observer configuration
//!
//! Environment-style configuration with the `OBSERVER_` prefix. Everything
//! has a sane default except the inference API key, whose absence is a hard
//! startup error rather than something discovered one failed cycle at a
//! time.

use anyhow::Result;
use observer_lib::ConfigError;
use serde::Deserialize;

/// Which metric source backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Cluster,
    Prometheus,
}

/// Observer configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ObserverConfig {
    /// Inference API key. Required.
    #[serde(default)]
    pub api_key: String,

    /// Model identifier for the inference collaborator
    #[serde(default = "default_model")]
    pub model: String,

    /// Inference API base URL
    #[serde(default = "default_inference_url")]
    pub inference_url: String,

    /// Per-call inference timeout in seconds
    #[serde(default = "default_inference_timeout")]
    pub inference_timeout_secs: u64,

    /// Metric source backend
    #[serde(default = "default_source_kind")]
    pub source_kind: SourceKind,

    /// Cluster-state API address
    #[serde(default = "default_cluster_url")]
    pub cluster_url: String,

    /// Bearer token file for the cluster-state API; unset means no token
    #[serde(default = "default_cluster_token_path")]
    pub cluster_token_path: String,

    /// Time-series query endpoint address
    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    /// Interval between observation cycles in seconds
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Report output path, overwritten every cycle
    #[serde(default = "default_report_path")]
    pub report_path: String,
}

fn default_model() -> String {
    "claude-sonnet-4-20250514".to_string()
}

fn default_inference_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_inference_timeout() -> u64 {
    60
}

fn default_source_kind() -> SourceKind {
    SourceKind::Cluster
}

fn default_cluster_url() -> String {
    "https://kubernetes.default.svc".to_string()
}

fn default_cluster_token_path() -> String {
    "/var/run/secrets/kubernetes.io/serviceaccount/token".to_string()
}

fn default_prometheus_url() -> String {
    "http://prometheus:9090".to_string()
}

fn default_check_interval() -> u64 {
    300
}

fn default_report_path() -> String {
    "/tmp/cluster-observer-latest.txt".to_string()
}

impl ObserverConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("OBSERVER"))
            .build()?;

        let loaded: ObserverConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.trim().is_empty() {
            return Err(ConfigError::Missing("OBSERVER_API_KEY"));
        }
        if self.check_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                name: "OBSERVER_CHECK_INTERVAL_SECS",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_key() -> ObserverConfig {
        ObserverConfig {
            api_key: "sk-test".to_string(),
            model: default_model(),
            inference_url: default_inference_url(),
            inference_timeout_secs: default_inference_timeout(),
            source_kind: default_source_kind(),
            cluster_url: default_cluster_url(),
            cluster_token_path: default_cluster_token_path(),
            prometheus_url: default_prometheus_url(),
            check_interval_secs: default_check_interval(),
            report_path: default_report_path(),
        }
    }

    #[test]
    fn test_defaults() {
        let config = with_key();
        assert_eq!(config.check_interval_secs, 300);
        assert_eq!(config.source_kind, SourceKind::Cluster);
        assert_eq!(config.report_path, "/tmp/cluster-observer-latest.txt");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let mut config = with_key();
        config.api_key = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Missing("OBSERVER_API_KEY"))
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = with_key();
        config.check_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
