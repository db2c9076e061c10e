//! Time-series query adapter
//!
//! Issues a fixed set of instant queries against a Prometheus-compatible
//! endpoint and normalizes the result rows into labeled samples.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::MetricSource;
use crate::error::SourceError;
use crate::models::{Sample, SampleValue};

/// Fixed category -> query expression mapping
const QUERIES: &[(&str, &str)] = &[
    (
        "pod_cpu",
        "sum(rate(container_cpu_usage_seconds_total{container!=\"\"}[5m])) by (namespace, pod)",
    ),
    (
        "pod_memory",
        "sum(container_memory_working_set_bytes{container!=\"\"}) by (namespace, pod)",
    ),
    (
        "node_cpu",
        "1 - avg(rate(node_cpu_seconds_total{mode=\"idle\"}[5m])) by (instance)",
    ),
    (
        "pod_restarts",
        "sum(kube_pod_container_status_restarts_total) by (namespace, pod)",
    ),
    (
        "http_latency",
        "histogram_quantile(0.95, sum(rate(http_request_duration_seconds_bucket[5m])) by (le, service))",
    ),
    (
        "hpa_replicas",
        "kube_horizontalpodautoscaler_status_current_replicas",
    ),
];

const CATEGORIES: &[&str] = &[
    "pod_cpu",
    "pod_memory",
    "node_cpu",
    "pod_restarts",
    "http_latency",
    "hpa_replicas",
];

/// Metric source backed by a time-series query endpoint
pub struct PromQuerySource {
    client: Client,
    base_url: String,
}

impl PromQuerySource {
    pub fn new(base_url: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn expression(category: &str) -> Option<&'static str> {
        QUERIES
            .iter()
            .find(|(name, _)| *name == category)
            .map(|(_, expr)| *expr)
    }
}

#[async_trait]
impl MetricSource for PromQuerySource {
    async fn collect_category(&self, category: &str) -> Result<Vec<Sample>, SourceError> {
        let expr = Self::expression(category)
            .ok_or_else(|| SourceError::UnknownCategory(category.to_string()))?;

        debug!(category, "Querying time-series endpoint");

        let url = format!("{}/api/v1/query", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("query", expr)])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SourceError::Status {
                category: category.to_string(),
                status: response.status(),
            });
        }

        let body: QueryResponse = response.json().await.map_err(|e| SourceError::Decode {
            category: category.to_string(),
            reason: e.to_string(),
        })?;

        if body.status != "success" {
            return Err(SourceError::Decode {
                category: category.to_string(),
                reason: format!("query status {}", body.status),
            });
        }

        Ok(body
            .data
            .result
            .into_iter()
            .map(row_to_sample)
            .collect())
    }

    fn categories(&self) -> &'static [&'static str] {
        CATEGORIES
    }

    fn name(&self) -> &'static str {
        "prometheus"
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: QueryData,
}

#[derive(Debug, Default, Deserialize)]
struct QueryData {
    #[serde(default)]
    result: Vec<ResultRow>,
}

/// One `{metric: labels, value: [ts, value]}` result entry
#[derive(Debug, Deserialize)]
struct ResultRow {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    value: (f64, String),
}

fn row_to_sample(row: ResultRow) -> Sample {
    let (ts, raw) = row.value;
    let value = raw
        .parse::<f64>()
        .map(SampleValue::Number)
        .unwrap_or(SampleValue::Text(raw));

    let mut sample = Sample::new(row.metric, value);
    sample.timestamp = timestamp_from_epoch(ts);
    sample
}

fn timestamp_from_epoch(epoch_secs: f64) -> Option<DateTime<Utc>> {
    let secs = epoch_secs.trunc() as i64;
    let nanos = (epoch_secs.fract() * 1e9) as u32;
    DateTime::from_timestamp(secs, nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_an_expression() {
        for category in CATEGORIES {
            assert!(PromQuerySource::expression(category).is_some());
        }
    }

    #[test]
    fn test_row_to_sample_numeric() {
        let row = ResultRow {
            metric: BTreeMap::from([
                ("namespace".to_string(), "default".to_string()),
                ("pod".to_string(), "web-1".to_string()),
            ]),
            value: (1700000000.5, "0.25".to_string()),
        };

        let sample = row_to_sample(row);
        assert_eq!(sample.value, SampleValue::Number(0.25));
        assert_eq!(sample.label("pod"), Some("web-1"));
        assert!(sample.timestamp.is_some());
    }

    #[test]
    fn test_row_to_sample_non_numeric_degrades_to_text() {
        let row = ResultRow {
            metric: BTreeMap::new(),
            value: (1700000000.0, "NaN-ish".to_string()),
        };

        assert_eq!(
            row_to_sample(row).value,
            SampleValue::Text("NaN-ish".to_string())
        );
    }

    #[tokio::test]
    async fn test_query_against_mock_server() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "status": "success",
            "data": {
                "resultType": "vector",
                "result": [
                    {
                        "metric": {"namespace": "default", "pod": "web-1"},
                        "value": [1700000000.0, "0.42"]
                    }
                ]
            }
        });
        let mock = server
            .mock("GET", "/api/v1/query")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body.to_string())
            .create_async()
            .await;

        let source = PromQuerySource::new(&server.url()).unwrap();
        let samples = source.collect_category("pod_cpu").await.unwrap();

        mock.assert_async().await;
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].value, SampleValue::Number(0.42));
    }

    #[tokio::test]
    async fn test_error_status_is_source_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v1/query")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status": "error", "data": {"result": []}}"#)
            .create_async()
            .await;

        let source = PromQuerySource::new(&server.url()).unwrap();
        let err = source.collect_category("pod_cpu").await.unwrap_err();
        assert!(matches!(err, SourceError::Decode { .. }));
    }
}
