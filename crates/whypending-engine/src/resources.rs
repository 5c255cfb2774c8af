use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as K8sQuantity;
use std::collections::BTreeMap;
use tracing::{debug, warn};
use whypending_core::{pod_ref, record_note, Note, Quantity, ResourceShortfall};

/// Sum of a pod's container requests, keyed by resource name.
///
/// Entries that do not parse are skipped and noted.
pub fn pod_requests(pod: &Pod, notes: &mut Vec<Note>) -> BTreeMap<String, Quantity> {
    let mut totals = BTreeMap::new();
    add_pod_requests(&mut totals, pod, notes);
    totals
}

fn add_pod_requests(totals: &mut BTreeMap<String, Quantity>, pod: &Pod, notes: &mut Vec<Note>) {
    let containers = pod.spec.iter().flat_map(|spec| spec.containers.iter());
    for container in containers {
        let requests = container
            .resources
            .as_ref()
            .and_then(|r| r.requests.as_ref());
        for (name, raw) in requests.into_iter().flatten() {
            let Some(quantity) = parse_or_note(&pod_ref(pod), name, raw, notes) else {
                continue;
            };
            totals
                .entry(name.clone())
                .and_modify(|total| *total += quantity)
                .or_insert(quantity);
        }
    }
}

fn parse_or_note(
    owner: &str,
    name: &str,
    raw: &K8sQuantity,
    notes: &mut Vec<Note>,
) -> Option<Quantity> {
    match Quantity::try_from(raw) {
        Ok(quantity) => Some(quantity),
        Err(e) => {
            warn!("Ignoring {} {}: {}", owner, name, e);
            record_note(
                notes,
                Note::InvalidQuantity {
                    owner: owner.to_string(),
                    resource_name: name.to_string(),
                    value: raw.0.clone(),
                },
            );
            None
        }
    }
}

/// Capacity left on a node once the pods bound to it are accounted for.
///
/// Only resources the node advertises appear; unused ones keep their full
/// allocatable amount.
pub fn remaining_capacity(
    node_name: &str,
    node_pods: &[&Pod],
    allocatable: &BTreeMap<String, K8sQuantity>,
    notes: &mut Vec<Note>,
) -> BTreeMap<String, Quantity> {
    let mut used = BTreeMap::new();
    for pod in node_pods {
        add_pod_requests(&mut used, pod, notes);
    }

    let owner = format!("node/{}", node_name);
    allocatable
        .iter()
        .filter_map(|(name, raw)| {
            let alloc = parse_or_note(&owner, name, raw, notes)?;
            let left = match used.get(name) {
                Some(u) => alloc - *u,
                None => alloc,
            };
            Some((name.clone(), left))
        })
        .collect()
}

/// Resources the pod requests more of than the node has left.
///
/// A resource missing from the node's allocatable counts as zero left. One
/// whose allocatable value cannot be parsed is not compared; the note from
/// `remaining_capacity` stands in for it. Entries come out sorted by
/// resource name.
pub fn compute_shortfall(
    pod: &Pod,
    node_name: &str,
    node_pods: &[&Pod],
    allocatable: &BTreeMap<String, K8sQuantity>,
    notes: &mut Vec<Note>,
) -> Vec<ResourceShortfall> {
    let requests = pod_requests(pod, notes);
    let remaining = remaining_capacity(node_name, node_pods, allocatable, notes);

    requests
        .into_iter()
        .filter_map(|(name, required)| {
            let left = match remaining.get(&name) {
                Some(left) => *left,
                None if allocatable.contains_key(&name) => return None,
                None => Quantity::zero(),
            };
            debug!(
                "Node {} resource {}: required {}, left {}",
                node_name, name, required, left
            );
            (left < required).then_some(ResourceShortfall {
                resource_name: name,
                required,
                left,
            })
        })
        .collect()
}
