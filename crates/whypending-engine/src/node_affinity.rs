use crate::selector::Term;
use crate::types::labels_of;
use k8s_openapi::api::core::v1::{Node, Pod};
use whypending_core::{NodeAffinityMismatch, Note};

/// Node selector terms the node fails.
///
/// The plain `nodeSelector` is checked as one synthetic term. Every failing
/// required node-affinity term is reported on its own, even when another
/// term matches and the scheduler would accept the node on that clause.
pub fn evaluate_node_affinity(
    pod: &Pod,
    node: &Node,
    notes: &mut Vec<Note>,
) -> Vec<NodeAffinityMismatch> {
    let Some(spec) = pod.spec.as_ref() else {
        return Vec::new();
    };
    let labels = labels_of(&node.metadata.labels);
    let mut mismatches = Vec::new();

    if let Some(selector) = spec.node_selector.as_ref().filter(|s| !s.is_empty()) {
        let term = Term::from_node_selector(selector);
        if !term.matches(labels, notes) {
            mismatches.push(NodeAffinityMismatch {
                term: term.to_node_selector_term(),
            });
        }
    }

    let required = spec
        .affinity
        .as_ref()
        .and_then(|a| a.node_affinity.as_ref())
        .and_then(|na| na.required_during_scheduling_ignored_during_execution.as_ref());

    for node_term in required.into_iter().flat_map(|r| r.node_selector_terms.iter()) {
        if !Term::from_node_selector_term(node_term).matches(labels, notes) {
            mismatches.push(NodeAffinityMismatch {
                term: node_term.clone(),
            });
        }
    }

    mismatches
}
