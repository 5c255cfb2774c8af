use crate::selector::Term;
use crate::types::{pod_namespace, NodeContext};
use tracing::debug;
use whypending_core::{Note, PvAffinityMismatch};

/// Bound persistent volumes whose required node affinity excludes the node.
///
/// Only claims found in the snapshot and bound to a known volume are
/// checked; a volume passes when any one of its terms matches.
pub fn evaluate_volume_affinity(ctx: &NodeContext, notes: &mut Vec<Note>) -> Vec<PvAffinityMismatch> {
    let namespace = pod_namespace(ctx.pod);
    let claim_names = ctx
        .pod
        .spec
        .iter()
        .flat_map(|spec| spec.volumes.iter().flatten())
        .filter_map(|v| v.persistent_volume_claim.as_ref())
        .map(|source| source.claim_name.as_str());

    let mut mismatches = Vec::new();
    for claim_name in claim_names {
        let Some(claim) = ctx.index.claim(namespace, claim_name) else {
            debug!("Claim {}/{} not in snapshot", namespace, claim_name);
            continue;
        };
        let Some(volume_name) = claim.spec.as_ref().and_then(|s| s.volume_name.as_deref()) else {
            continue;
        };
        let Some(volume) = ctx.index.volume(volume_name) else {
            debug!("Volume {} not in snapshot", volume_name);
            continue;
        };
        let Some(required) = volume
            .spec
            .as_ref()
            .and_then(|s| s.node_affinity.as_ref())
            .and_then(|na| na.required.as_ref())
        else {
            continue;
        };

        let labels = ctx.node_labels();
        let satisfied = required
            .node_selector_terms
            .iter()
            .any(|term| Term::from_node_selector_term(term).matches(labels, notes));
        if !satisfied {
            mismatches.push(PvAffinityMismatch {
                volume_name: volume_name.to_string(),
                claim_name: claim_name.to_string(),
                terms: required.node_selector_terms.clone(),
            });
        }
    }
    mismatches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SnapshotIndex;
    use k8s_openapi::api::core::v1::{
        Node, NodeSelector, NodeSelectorRequirement, NodeSelectorTerm, PersistentVolume,
        PersistentVolumeClaim, PersistentVolumeClaimSpec, PersistentVolumeClaimVolumeSource,
        PersistentVolumeSpec, Pod, PodSpec, Volume, VolumeNodeAffinity,
    };
    use std::collections::BTreeMap;
    use whypending_core::Snapshot;

    fn create_test_pod(claims: &[&str]) -> Pod {
        let mut pod = Pod::default();
        pod.metadata.namespace = Some("db".to_string());
        pod.metadata.name = Some("postgres-0".to_string());
        pod.spec = Some(PodSpec {
            volumes: Some(
                claims
                    .iter()
                    .map(|claim| Volume {
                        name: claim.to_string(),
                        persistent_volume_claim: Some(PersistentVolumeClaimVolumeSource {
                            claim_name: claim.to_string(),
                            read_only: None,
                        }),
                        ..Default::default()
                    })
                    .collect(),
            ),
            ..Default::default()
        });
        pod
    }

    fn claim(name: &str, volume: Option<&str>) -> PersistentVolumeClaim {
        let mut pvc = PersistentVolumeClaim::default();
        pvc.metadata.namespace = Some("db".to_string());
        pvc.metadata.name = Some(name.to_string());
        pvc.spec = Some(PersistentVolumeClaimSpec {
            volume_name: volume.map(str::to_string),
            ..Default::default()
        });
        pvc
    }

    fn local_volume(name: &str, hostname: &str) -> PersistentVolume {
        let mut pv = PersistentVolume::default();
        pv.metadata.name = Some(name.to_string());
        pv.spec = Some(PersistentVolumeSpec {
            node_affinity: Some(VolumeNodeAffinity {
                required: Some(NodeSelector {
                    node_selector_terms: vec![NodeSelectorTerm {
                        match_expressions: Some(vec![NodeSelectorRequirement {
                            key: "kubernetes.io/hostname".to_string(),
                            operator: "In".to_string(),
                            values: Some(vec![hostname.to_string()]),
                        }]),
                        match_fields: None,
                    }],
                }),
            }),
            ..Default::default()
        });
        pv
    }

    fn create_test_node(hostname: &str) -> Node {
        let mut node = Node::default();
        node.metadata.name = Some(hostname.to_string());
        node.metadata.labels = Some(BTreeMap::from([(
            "kubernetes.io/hostname".to_string(),
            hostname.to_string(),
        )]));
        node
    }

    fn evaluate(pod: &Pod, node: &Node, snapshot: &Snapshot) -> Vec<PvAffinityMismatch> {
        let index = SnapshotIndex::new(snapshot);
        let ctx = NodeContext {
            pod,
            node,
            node_pods: &[],
            index: &index,
        };
        let mut notes = Vec::new();
        evaluate_volume_affinity(&ctx, &mut notes)
    }

    #[test]
    fn test_local_volume_pins_pod_to_node() {
        let pod = create_test_pod(&["data"]);
        let snapshot = Snapshot {
            claims: vec![claim("data", Some("pv-1"))],
            volumes: vec![local_volume("pv-1", "node-a")],
            ..Default::default()
        };

        assert!(evaluate(&pod, &create_test_node("node-a"), &snapshot).is_empty());

        let mismatches = evaluate(&pod, &create_test_node("node-b"), &snapshot);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].volume_name, "pv-1");
        assert_eq!(mismatches[0].claim_name, "data");
        assert_eq!(mismatches[0].terms.len(), 1);
    }

    #[test]
    fn test_unbound_or_unknown_claims_impose_nothing() {
        let pod = create_test_pod(&["pending", "missing"]);
        let snapshot = Snapshot {
            claims: vec![claim("pending", None)],
            ..Default::default()
        };
        assert!(evaluate(&pod, &create_test_node("node-b"), &snapshot).is_empty());
    }

    #[test]
    fn test_without_volume_data_nothing_is_reported() {
        let pod = create_test_pod(&["data"]);
        assert!(evaluate(&pod, &create_test_node("node-b"), &Snapshot::default()).is_empty());
    }
}
