use crate::node_affinity::evaluate_node_affinity;
use crate::pod_affinity::{evaluate_pod_affinity, evaluate_pod_anti_affinity};
use crate::resources::compute_shortfall;
use crate::taint::evaluate_taints;
use crate::types::{node_name, NodeContext};
use crate::volume::evaluate_volume_affinity;
use whypending_core::Findings;

/// Filter predicate trait
///
/// Each predicate records everything it finds wrong with the node instead
/// of stopping at the first failure.
pub trait FilterPredicate: Send + Sync {
    /// Evaluate the node for the context's pod
    fn evaluate(&self, ctx: &NodeContext, findings: &mut Findings);

    /// Name of the filter
    fn name(&self) -> &str;
}

/// Requested resources against what the node has left
pub struct PodFitsResources;

impl FilterPredicate for PodFitsResources {
    fn evaluate(&self, ctx: &NodeContext, findings: &mut Findings) {
        let allocatable = ctx
            .node
            .status
            .as_ref()
            .and_then(|s| s.allocatable.as_ref())
            .cloned()
            .unwrap_or_default();

        findings.resource_not_enough = compute_shortfall(
            ctx.pod,
            node_name(ctx.node),
            ctx.node_pods,
            &allocatable,
            &mut findings.notes,
        );
    }

    fn name(&self) -> &str {
        "PodFitsResources"
    }
}

/// Taints and tolerations
pub struct TaintToleration;

impl FilterPredicate for TaintToleration {
    fn evaluate(&self, ctx: &NodeContext, findings: &mut Findings) {
        findings.node_taint_not_tolerated = evaluate_taints(ctx.pod, ctx.node);
    }

    fn name(&self) -> &str {
        "TaintToleration"
    }
}

/// nodeSelector and required node affinity
pub struct NodeAffinity;

impl FilterPredicate for NodeAffinity {
    fn evaluate(&self, ctx: &NodeContext, findings: &mut Findings) {
        findings.node_affinity_mismatch =
            evaluate_node_affinity(ctx.pod, ctx.node, &mut findings.notes);
    }

    fn name(&self) -> &str {
        "NodeAffinity"
    }
}

/// Required inter-pod affinity
pub struct InterPodAffinity;

impl FilterPredicate for InterPodAffinity {
    fn evaluate(&self, ctx: &NodeContext, findings: &mut Findings) {
        findings.pod_affinity_mismatch = evaluate_pod_affinity(ctx, &mut findings.notes);
    }

    fn name(&self) -> &str {
        "InterPodAffinity"
    }
}

/// Required inter-pod anti-affinity
pub struct InterPodAntiAffinity;

impl FilterPredicate for InterPodAntiAffinity {
    fn evaluate(&self, ctx: &NodeContext, findings: &mut Findings) {
        findings.pod_anti_affinity_mismatch = evaluate_pod_anti_affinity(ctx, &mut findings.notes);
    }

    fn name(&self) -> &str {
        "InterPodAntiAffinity"
    }
}

/// Node affinity of bound persistent volumes
pub struct VolumeNodeAffinity;

impl FilterPredicate for VolumeNodeAffinity {
    fn evaluate(&self, ctx: &NodeContext, findings: &mut Findings) {
        findings.pv_affinity_mismatch = evaluate_volume_affinity(ctx, &mut findings.notes);
    }

    fn name(&self) -> &str {
        "VolumeNodeAffinity"
    }
}

/// Get default filter predicates
pub fn default_filters() -> Vec<Box<dyn FilterPredicate>> {
    vec![
        Box::new(PodFitsResources),
        Box::new(TaintToleration),
        Box::new(NodeAffinity),
        Box::new(InterPodAffinity),
        Box::new(InterPodAntiAffinity),
        Box::new(VolumeNodeAffinity),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_names() {
        let names: Vec<String> = default_filters()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "PodFitsResources",
                "TaintToleration",
                "NodeAffinity",
                "InterPodAffinity",
                "InterPodAntiAffinity",
                "VolumeNodeAffinity",
            ]
        );
    }
}
