use crate::selector::Term;
use crate::types::{labels_of, pod_name, pod_namespace, NodeContext, SnapshotIndex};
use k8s_openapi::api::core::v1::{Pod, PodAffinityTerm};
use tracing::warn;
use whypending_core::{record_note, Note, PodAffinityMismatch, PodAntiAffinityMismatch};

/// Required pod affinity terms that no pod on the node satisfies.
///
/// Terms whose topology key the node does not carry are skipped.
pub fn evaluate_pod_affinity(ctx: &NodeContext, notes: &mut Vec<Note>) -> Vec<PodAffinityMismatch> {
    let terms = ctx
        .pod
        .spec
        .as_ref()
        .and_then(|s| s.affinity.as_ref())
        .and_then(|a| a.pod_affinity.as_ref())
        .and_then(|pa| pa.required_during_scheduling_ignored_during_execution.as_ref());

    terms
        .into_iter()
        .flatten()
        .filter(|term| applies_to_node(ctx, term))
        .filter(|term| {
            !ctx.node_pods
                .iter()
                .any(|candidate| pod_matches_term(ctx, candidate, term, notes))
        })
        .map(|term| PodAffinityMismatch { term: term.clone() })
        .collect()
}

/// Pods on the node selected by a required anti-affinity term, one record
/// per offending pod.
pub fn evaluate_pod_anti_affinity(
    ctx: &NodeContext,
    notes: &mut Vec<Note>,
) -> Vec<PodAntiAffinityMismatch> {
    let terms = ctx
        .pod
        .spec
        .as_ref()
        .and_then(|s| s.affinity.as_ref())
        .and_then(|a| a.pod_anti_affinity.as_ref())
        .and_then(|pa| pa.required_during_scheduling_ignored_during_execution.as_ref());

    let mut mismatches = Vec::new();
    for term in terms.into_iter().flatten() {
        if !applies_to_node(ctx, term) {
            continue;
        }
        for candidate in ctx.node_pods {
            if pod_matches_term(ctx, candidate, term, notes) {
                mismatches.push(PodAntiAffinityMismatch {
                    term: term.clone(),
                    namespace: pod_namespace(candidate).to_string(),
                    pod_name: pod_name(candidate).to_string(),
                });
            }
        }
    }
    mismatches
}

fn applies_to_node(ctx: &NodeContext, term: &PodAffinityTerm) -> bool {
    ctx.node_labels().contains_key(&term.topology_key)
}

/// Whether `candidate` falls in the term's namespaces and label selector.
///
/// A term without a label selector selects no pods; an empty selector
/// selects all of them.
fn pod_matches_term(
    ctx: &NodeContext,
    candidate: &Pod,
    term: &PodAffinityTerm,
    notes: &mut Vec<Note>,
) -> bool {
    if !namespace_matches(ctx.index, pod_namespace(ctx.pod), candidate, term, notes) {
        return false;
    }
    match term.label_selector.as_ref() {
        Some(selector) => Term::from_label_selector(selector)
            .matches(labels_of(&candidate.metadata.labels), notes),
        None => false,
    }
}

/// Namespace scoping: an explicit namespace list wins, then a namespace
/// selector, then the target pod's own namespace.
fn namespace_matches(
    index: &SnapshotIndex,
    target_namespace: &str,
    candidate: &Pod,
    term: &PodAffinityTerm,
    notes: &mut Vec<Note>,
) -> bool {
    let candidate_namespace = pod_namespace(candidate);

    if let Some(namespaces) = term.namespaces.as_ref().filter(|ns| !ns.is_empty()) {
        return namespaces.iter().any(|ns| ns == candidate_namespace);
    }

    if let Some(selector) = term.namespace_selector.as_ref() {
        return match index.namespace_labels(candidate_namespace) {
            Some(labels) => Term::from_label_selector(selector).matches(labels, notes),
            None => {
                warn!(
                    "Namespace {} not in snapshot; namespaceSelector assumed to match",
                    candidate_namespace
                );
                record_note(
                    notes,
                    Note::UnresolvedNamespaceSelector {
                        namespace: candidate_namespace.to_string(),
                    },
                );
                true
            }
        };
    }

    candidate_namespace == target_namespace
}
