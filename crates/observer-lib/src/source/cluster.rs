//! Cluster-state API adapter
//!
//! Reads nodes, pods, deployments, and recent events from the Kubernetes
//! API and normalizes them into labeled samples. System namespaces are
//! filtered out, pods get derived readiness/restart fields, and events are
//! reduced to the warning-class entries worth surfacing.
//!
//! Resource requests/limits are taken from the first container that
//! declares them rather than aggregated across containers, matching the
//! behavior this adapter replaces.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use super::MetricSource;
use crate::error::SourceError;
use crate::models::{Sample, SampleValue};

/// Namespaces excluded from pod/deployment/event collections
pub const EXCLUDED_NAMESPACES: &[&str] = &["kube-system", "local-path-storage", "monitoring"];

/// Event reasons kept even when the event type is not Warning
const ACTIONABLE_REASONS: &[&str] = &["Failed", "BackOff", "FailedScheduling"];

/// Maximum events requested from the source per cycle
const EVENT_LIMIT: usize = 20;

const CATEGORIES: &[&str] = &["nodes", "pods", "deployments", "recent_events"];

/// Metric source backed by the cluster-state API
pub struct ClusterApiSource {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ClusterApiSource {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Read a bearer token from a service-account token file
    pub fn load_token(path: &Path) -> Result<String, SourceError> {
        std::fs::read_to_string(path)
            .map(|t| t.trim().to_string())
            .map_err(|source| SourceError::Credential {
                path: path.display().to_string(),
                source,
            })
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        category: &str,
        path: &str,
    ) -> Result<T, SourceError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status {
                category: category.to_string(),
                status: response.status(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::Decode {
                category: category.to_string(),
                reason: e.to_string(),
            })
    }

    async fn collect_nodes(&self) -> Result<Vec<Sample>, SourceError> {
        let list: NodeList = self.fetch("nodes", "/api/v1/nodes").await?;
        Ok(list.items.iter().map(node_sample).collect())
    }

    async fn collect_pods(&self) -> Result<Vec<Sample>, SourceError> {
        let list: PodList = self.fetch("pods", "/api/v1/pods").await?;
        Ok(list
            .items
            .iter()
            .filter(|p| !is_excluded_namespace(p.metadata.namespace.as_deref()))
            .map(pod_sample)
            .collect())
    }

    async fn collect_deployments(&self) -> Result<Vec<Sample>, SourceError> {
        let list: DeploymentList = self.fetch("deployments", "/apis/apps/v1/deployments").await?;
        Ok(list
            .items
            .iter()
            .filter(|d| !is_excluded_namespace(d.metadata.namespace.as_deref()))
            .map(deployment_sample)
            .collect())
    }

    async fn collect_events(&self) -> Result<Vec<Sample>, SourceError> {
        let path = format!("/api/v1/events?limit={EVENT_LIMIT}");
        let list: EventList = self.fetch("recent_events", &path).await?;
        Ok(filter_events(&list.items)
            .into_iter()
            .map(event_sample)
            .collect())
    }
}

#[async_trait]
impl MetricSource for ClusterApiSource {
    async fn collect_category(&self, category: &str) -> Result<Vec<Sample>, SourceError> {
        debug!(category, "Querying cluster API");
        match category {
            "nodes" => self.collect_nodes().await,
            "pods" => self.collect_pods().await,
            "deployments" => self.collect_deployments().await,
            "recent_events" => self.collect_events().await,
            other => Err(SourceError::UnknownCategory(other.to_string())),
        }
    }

    fn categories(&self) -> &'static [&'static str] {
        CATEGORIES
    }

    fn name(&self) -> &'static str {
        "cluster-api"
    }
}

// Minimal wire shapes; only the fields the samples need.

#[derive(Debug, Deserialize)]
struct NodeList {
    #[serde(default)]
    items: Vec<Node>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Node {
    metadata: Metadata,
    #[serde(default)]
    status: NodeStatus,
}

#[derive(Debug, Default, Deserialize)]
struct NodeStatus {
    #[serde(default)]
    conditions: Vec<NodeCondition>,
    #[serde(default)]
    capacity: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct NodeCondition {
    #[serde(rename = "type")]
    condition_type: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Pod {
    pub(crate) metadata: Metadata,
    #[serde(default)]
    pub(crate) spec: PodSpec,
    #[serde(default)]
    pub(crate) status: PodStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PodSpec {
    pub(crate) node_name: Option<String>,
    #[serde(default)]
    pub(crate) containers: Vec<ContainerSpec>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ContainerSpec {
    #[serde(default)]
    pub(crate) resources: ContainerResources,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ContainerResources {
    #[serde(default)]
    pub(crate) requests: BTreeMap<String, String>,
    #[serde(default)]
    pub(crate) limits: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PodStatus {
    pub(crate) phase: Option<String>,
    #[serde(default)]
    pub(crate) container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContainerStatus {
    #[serde(default)]
    pub(crate) ready: bool,
    #[serde(default)]
    pub(crate) restart_count: u32,
}

#[derive(Debug, Deserialize)]
struct DeploymentList {
    #[serde(default)]
    items: Vec<Deployment>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Deployment {
    metadata: Metadata,
    #[serde(default)]
    spec: DeploymentSpec,
    #[serde(default)]
    status: DeploymentStatus,
}

#[derive(Debug, Default, Deserialize)]
struct DeploymentSpec {
    replicas: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentStatus {
    ready_replicas: Option<u32>,
    available_replicas: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct EventList {
    #[serde(default)]
    items: Vec<Event>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Event {
    #[serde(default)]
    pub(crate) metadata: Metadata,
    #[serde(rename = "type")]
    pub(crate) event_type: Option<String>,
    pub(crate) reason: Option<String>,
    pub(crate) message: Option<String>,
    pub(crate) count: Option<u32>,
    #[serde(default)]
    pub(crate) involved_object: InvolvedObject,
    pub(crate) last_timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct InvolvedObject {
    pub(crate) kind: Option<String>,
    pub(crate) name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct Metadata {
    pub(crate) name: Option<String>,
    pub(crate) namespace: Option<String>,
}

pub(crate) fn is_excluded_namespace(namespace: Option<&str>) -> bool {
    namespace
        .map(|ns| EXCLUDED_NAMESPACES.contains(&ns))
        .unwrap_or(false)
}

fn node_sample(node: &Node) -> Sample {
    let ready = node
        .status
        .conditions
        .iter()
        .any(|c| c.condition_type == "Ready" && c.status == "True");
    let status = if ready { "Ready" } else { "NotReady" };

    let mut labels = BTreeMap::new();
    labels.insert(
        "name".to_string(),
        node.metadata.name.clone().unwrap_or_default(),
    );
    labels.insert("status".to_string(), status.to_string());
    if let Some(cpu) = node.status.capacity.get("cpu") {
        labels.insert("cpu_capacity".to_string(), cpu.clone());
    }
    if let Some(memory) = node.status.capacity.get("memory") {
        labels.insert("memory_capacity".to_string(), memory.clone());
    }

    Sample::new(labels, SampleValue::Text(status.to_string()))
}

pub(crate) fn pod_sample(pod: &Pod) -> Sample {
    let restarts: u32 = pod
        .status
        .container_statuses
        .iter()
        .map(|c| c.restart_count)
        .sum();
    let ready_count = pod
        .status
        .container_statuses
        .iter()
        .filter(|c| c.ready)
        .count();
    let declared = pod.spec.containers.len();
    let phase = pod.status.phase.clone().unwrap_or_else(|| "Unknown".to_string());

    let mut labels = BTreeMap::new();
    labels.insert(
        "name".to_string(),
        pod.metadata.name.clone().unwrap_or_default(),
    );
    labels.insert(
        "namespace".to_string(),
        pod.metadata.namespace.clone().unwrap_or_default(),
    );
    if let Some(node) = &pod.spec.node_name {
        labels.insert("node".to_string(), node.clone());
    }
    labels.insert("status".to_string(), phase.clone());
    labels.insert("restarts".to_string(), restarts.to_string());
    labels.insert("ready".to_string(), format!("{ready_count}/{declared}"));

    // First container's declared requests/limits only.
    if let Some(resources) = pod
        .spec
        .containers
        .iter()
        .map(|c| &c.resources)
        .find(|r| !r.requests.is_empty() || !r.limits.is_empty())
    {
        if let Some(cpu) = resources.requests.get("cpu") {
            labels.insert("cpu_request".to_string(), cpu.clone());
        }
        if let Some(memory) = resources.requests.get("memory") {
            labels.insert("memory_request".to_string(), memory.clone());
        }
        if let Some(cpu) = resources.limits.get("cpu") {
            labels.insert("cpu_limit".to_string(), cpu.clone());
        }
        if let Some(memory) = resources.limits.get("memory") {
            labels.insert("memory_limit".to_string(), memory.clone());
        }
    }

    Sample::new(labels, SampleValue::Text(phase))
}

fn deployment_sample(deploy: &Deployment) -> Sample {
    let desired = deploy.spec.replicas.unwrap_or(0);
    let ready = deploy.status.ready_replicas.unwrap_or(0);
    let available = deploy.status.available_replicas.unwrap_or(0);

    let mut labels = BTreeMap::new();
    labels.insert(
        "name".to_string(),
        deploy.metadata.name.clone().unwrap_or_default(),
    );
    labels.insert(
        "namespace".to_string(),
        deploy.metadata.namespace.clone().unwrap_or_default(),
    );
    labels.insert("replicas".to_string(), desired.to_string());
    labels.insert("ready_replicas".to_string(), ready.to_string());
    labels.insert("available_replicas".to_string(), available.to_string());

    Sample::new(labels, SampleValue::Number(f64::from(ready)))
}

/// Keep warning-class events and events with an actionable reason,
/// dropping anything from an excluded namespace
pub(crate) fn filter_events(events: &[Event]) -> Vec<&Event> {
    events
        .iter()
        .filter(|e| !is_excluded_namespace(e.metadata.namespace.as_deref()))
        .filter(|e| {
            e.event_type.as_deref() == Some("Warning")
                || e.reason
                    .as_deref()
                    .map(|r| ACTIONABLE_REASONS.contains(&r))
                    .unwrap_or(false)
        })
        .collect()
}

fn event_sample(event: &Event) -> Sample {
    let mut labels = BTreeMap::new();
    labels.insert(
        "type".to_string(),
        event.event_type.clone().unwrap_or_default(),
    );
    labels.insert("reason".to_string(), event.reason.clone().unwrap_or_default());
    labels.insert(
        "object".to_string(),
        format!(
            "{}/{}",
            event.involved_object.kind.as_deref().unwrap_or("Unknown"),
            event.involved_object.name.as_deref().unwrap_or("unknown"),
        ),
    );
    labels.insert(
        "count".to_string(),
        event.count.unwrap_or(1).to_string(),
    );
    labels.insert(
        "last_seen".to_string(),
        event
            .last_timestamp
            .clone()
            .unwrap_or_else(|| "Unknown".to_string()),
    );

    Sample::new(
        labels,
        SampleValue::Text(event.message.clone().unwrap_or_default()),
    )
}
