use k8s_openapi::api::core::v1::{Node, PersistentVolume, PersistentVolumeClaim, Pod};
use std::collections::{BTreeMap, HashMap};
use whypending_core::Snapshot;

static NO_LABELS: BTreeMap<String, String> = BTreeMap::new();

/// Labels of an object, empty when unset
pub fn labels_of(labels: &Option<BTreeMap<String, String>>) -> &BTreeMap<String, String> {
    labels.as_ref().unwrap_or(&NO_LABELS)
}

/// Name of a node, empty when unset
pub fn node_name(node: &Node) -> &str {
    node.metadata.name.as_deref().unwrap_or_default()
}

/// Namespace of a pod, empty when unset
pub fn pod_namespace(pod: &Pod) -> &str {
    pod.metadata.namespace.as_deref().unwrap_or_default()
}

/// Name of a pod, empty when unset
pub fn pod_name(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or_default()
}

/// Lookup tables over the optional parts of a snapshot
#[derive(Debug, Default)]
pub struct SnapshotIndex<'a> {
    namespace_labels: HashMap<&'a str, &'a BTreeMap<String, String>>,
    claims: HashMap<(&'a str, &'a str), &'a PersistentVolumeClaim>,
    volumes: HashMap<&'a str, &'a PersistentVolume>,
}

impl<'a> SnapshotIndex<'a> {
    /// Build the index over a snapshot's namespaces, claims and volumes
    pub fn new(snapshot: &'a Snapshot) -> Self {
        let namespace_labels = snapshot
            .namespaces
            .iter()
            .filter_map(|ns| {
                ns.metadata
                    .name
                    .as_deref()
                    .map(|name| (name, labels_of(&ns.metadata.labels)))
            })
            .collect();

        let claims = snapshot
            .claims
            .iter()
            .filter_map(|pvc| {
                let namespace = pvc.metadata.namespace.as_deref()?;
                let name = pvc.metadata.name.as_deref()?;
                Some(((namespace, name), pvc))
            })
            .collect();

        let volumes = snapshot
            .volumes
            .iter()
            .filter_map(|pv| pv.metadata.name.as_deref().map(|name| (name, pv)))
            .collect();

        Self {
            namespace_labels,
            claims,
            volumes,
        }
    }

    /// Labels of a namespace, if the snapshot knows it
    pub fn namespace_labels(&self, namespace: &str) -> Option<&'a BTreeMap<String, String>> {
        self.namespace_labels.get(namespace).copied()
    }

    pub fn claim(&self, namespace: &str, name: &str) -> Option<&'a PersistentVolumeClaim> {
        self.claims.get(&(namespace, name)).copied()
    }

    pub fn volume(&self, name: &str) -> Option<&'a PersistentVolume> {
        self.volumes.get(name).copied()
    }
}

/// Everything a predicate sees when judging one node
#[derive(Debug, Clone, Copy)]
pub struct NodeContext<'a> {
    /// Pod being diagnosed
    pub pod: &'a Pod,
    /// Node being judged
    pub node: &'a Node,
    /// Pods already bound to the node
    pub node_pods: &'a [&'a Pod],
    pub index: &'a SnapshotIndex<'a>,
}

impl<'a> NodeContext<'a> {
    pub fn node_labels(&self) -> &'a BTreeMap<String, String> {
        labels_of(&self.node.metadata.labels)
    }
}
