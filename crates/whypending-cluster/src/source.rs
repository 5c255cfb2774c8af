use crate::api_client::ApiClient;
use crate::error::{ClusterError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use whypending_core::{Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod, Snapshot};

/// The pod a snapshot is taken for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    pub namespace: String,
    pub pod: String,
}

impl SnapshotRequest {
    pub fn new(namespace: impl Into<String>, pod: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            pod: pod.into(),
        }
    }
}

/// Somewhere a cluster snapshot can be read from
///
/// Implementations must return `ClusterError::PodNotFound` when the
/// requested pod is not part of the snapshot.
#[async_trait]
pub trait ClusterSource: Send + Sync {
    async fn fetch(&self, request: &SnapshotRequest) -> Result<Snapshot>;
}

/// Optional object kinds a pod's constraints refer to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotNeeds {
    /// An affinity term uses a namespaceSelector
    pub namespaces: bool,
    /// A volume references a PersistentVolumeClaim
    pub volumes: bool,
}

impl SnapshotNeeds {
    pub fn of(pod: &Pod) -> Self {
        let Some(spec) = pod.spec.as_ref() else {
            return Self::default();
        };

        let affinity = spec.affinity.as_ref();
        let required_terms = affinity
            .and_then(|a| a.pod_affinity.as_ref())
            .and_then(|pa| pa.required_during_scheduling_ignored_during_execution.as_ref())
            .into_iter()
            .chain(
                affinity
                    .and_then(|a| a.pod_anti_affinity.as_ref())
                    .and_then(|pa| {
                        pa.required_during_scheduling_ignored_during_execution
                            .as_ref()
                    }),
            )
            .flatten();

        let mut namespaces = false;
        for term in required_terms {
            namespaces |= term.namespace_selector.is_some()
                && term.namespaces.as_ref().is_none_or(|n| n.is_empty());
        }

        let volumes = spec
            .volumes
            .iter()
            .flatten()
            .any(|v| v.persistent_volume_claim.is_some());

        Self {
            namespaces,
            volumes,
        }
    }
}

/// Live snapshot read from the Kubernetes API
pub struct ApiSource {
    client: ApiClient,
}

impl ApiSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub async fn connect(kubeconfig: Option<&str>, context: Option<&str>) -> Result<Self> {
        Ok(Self::new(ApiClient::connect(kubeconfig, context).await?))
    }
}

#[async_trait]
impl ClusterSource for ApiSource {
    async fn fetch(&self, request: &SnapshotRequest) -> Result<Snapshot> {
        info!("Listing pods and nodes");
        let (pods, nodes) =
            tokio::try_join!(self.client.list::<Pod>(), self.client.list::<Node>())?;
        let mut snapshot = Snapshot::new(pods, nodes);

        let needs = snapshot
            .find_pod(&request.namespace, &request.pod)
            .map(SnapshotNeeds::of)
            .ok_or_else(|| ClusterError::pod_not_found(&request.namespace, &request.pod))?;

        if needs.namespaces {
            match self.client.list::<Namespace>().await {
                Ok(namespaces) => snapshot.namespaces = namespaces,
                Err(e) => warn!("Namespace labels unavailable, selectors stay unresolved: {}", e),
            }
        }

        if needs.volumes {
            let (claims, volumes) = tokio::join!(
                self.client.list::<PersistentVolumeClaim>(),
                self.client.list::<PersistentVolume>(),
            );
            match (claims, volumes) {
                (Ok(claims), Ok(volumes)) => {
                    snapshot.claims = claims;
                    snapshot.volumes = volumes;
                }
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Volume data unavailable, skipping volume affinity: {}", e)
                }
            }
        }

        info!(
            "Snapshot has {} pods and {} nodes",
            snapshot.pods.len(),
            snapshot.nodes.len()
        );
        Ok(snapshot)
    }
}

/// Offline snapshot read from a file such as `kubectl get pods,nodes -A -o yaml`
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ClusterSource for FileSource {
    async fn fetch(&self, request: &SnapshotRequest) -> Result<Snapshot> {
        info!("Reading snapshot from {}", self.path.display());
        let data = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ClusterError::io(&self.path, e))?;
        let snapshot = parse_snapshot(&data)?;

        if snapshot.find_pod(&request.namespace, &request.pod).is_none() {
            return Err(ClusterError::pod_not_found(&request.namespace, &request.pod));
        }
        Ok(snapshot)
    }
}

/// Split Kubernetes objects and Lists into a snapshot
///
/// JSON input is one document; YAML input may hold several `---` separated
/// documents. Items of typed lists (`PodList`) without their own `kind`
/// inherit it from the list. Unrelated kinds are ignored.
pub fn parse_snapshot(data: &str) -> Result<Snapshot> {
    let mut snapshot = Snapshot::default();

    if data.trim_start().starts_with('{') {
        let doc: Value = serde_json::from_str(data)
            .map_err(|e| ClusterError::parse_error("snapshot", e.to_string()))?;
        collect(doc, None, &mut snapshot)?;
    } else {
        for document in serde_yaml::Deserializer::from_str(data) {
            let doc = Value::deserialize(document)
                .map_err(|e| ClusterError::parse_error("snapshot", e.to_string()))?;
            collect(doc, None, &mut snapshot)?;
        }
    }

    debug!(
        "Parsed {} pods, {} nodes, {} namespaces, {} claims, {} volumes",
        snapshot.pods.len(),
        snapshot.nodes.len(),
        snapshot.namespaces.len(),
        snapshot.claims.len(),
        snapshot.volumes.len()
    );
    Ok(snapshot)
}

fn collect(mut doc: Value, inherited: Option<&str>, snapshot: &mut Snapshot) -> Result<()> {
    if doc.is_null() {
        return Ok(());
    }

    let kind = doc
        .get("kind")
        .and_then(Value::as_str)
        .or(inherited)
        .map(str::to_string);
    let Some(kind) = kind else {
        debug!("Skipping object without kind");
        return Ok(());
    };

    if let Some(item_kind) = kind.strip_suffix("List") {
        let items = match doc.get_mut("items").map(Value::take) {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        };
        let item_kind = Some(item_kind).filter(|k| !k.is_empty());
        for item in items {
            collect(item, item_kind, snapshot)?;
        }
        return Ok(());
    }

    match kind.as_str() {
        "Pod" => snapshot.pods.push(decode(doc, &kind)?),
        "Node" => snapshot.nodes.push(decode(doc, &kind)?),
        "Namespace" => snapshot.namespaces.push(decode(doc, &kind)?),
        "PersistentVolumeClaim" => snapshot.claims.push(decode(doc, &kind)?),
        "PersistentVolume" => snapshot.volumes.push(decode(doc, &kind)?),
        other => debug!("Skipping {} object", other),
    }
    Ok(())
}

fn decode<T: serde::de::DeserializeOwned>(doc: Value, kind: &str) -> Result<T> {
    serde_json::from_value(doc).map_err(|e| ClusterError::parse_error(kind, e.to_string()))
}
