use k8s_openapi::api::core::v1::{Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod};

/// Point-in-time view of the cluster objects a diagnosis reads.
///
/// `namespaces`, `claims` and `volumes` are optional extras: when empty the
/// predicates that need them degrade (namespace selectors are noted as
/// unresolved, volume affinity is skipped).
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Pods across all namespaces, bound or not
    pub pods: Vec<Pod>,
    /// Nodes in the order results are reported
    pub nodes: Vec<Node>,
    pub namespaces: Vec<Namespace>,
    pub claims: Vec<PersistentVolumeClaim>,
    pub volumes: Vec<PersistentVolume>,
}

impl Snapshot {
    /// Create a snapshot from pods and nodes only
    pub fn new(pods: Vec<Pod>, nodes: Vec<Node>) -> Self {
        Self {
            pods,
            nodes,
            ..Default::default()
        }
    }

    /// Find a pod by namespace and name
    pub fn find_pod(&self, namespace: &str, name: &str) -> Option<&Pod> {
        self.pods.iter().find(|p| {
            p.metadata.namespace.as_deref() == Some(namespace)
                && p.metadata.name.as_deref() == Some(name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pod(namespace: &str, name: &str) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.namespace = Some(namespace.to_string());
        pod.metadata.name = Some(name.to_string());
        pod
    }

    #[test]
    fn test_find_pod() {
        let snapshot = Snapshot::new(
            vec![pod("default", "web"), pod("prod", "web"), pod("prod", "db")],
            vec![],
        );

        let found = snapshot.find_pod("prod", "web").unwrap();
        assert_eq!(found.metadata.namespace.as_deref(), Some("prod"));
        assert!(snapshot.find_pod("staging", "web").is_none());
        assert!(snapshot.find_pod("prod", "cache").is_none());
    }
}
