use crate::filter::{default_filters, FilterPredicate};
use crate::types::{node_name, pod_name, pod_namespace, NodeContext, SnapshotIndex};
use k8s_openapi::api::core::v1::{Node, Pod};
use std::collections::HashMap;
use tracing::{debug, info};
use whypending_core::{pod_ref, Detail, Findings, Snapshot};

/// Configuration for the diagnoser
#[derive(Debug, Clone)]
pub struct DiagnoserConfig {
    /// Worker threads used to judge nodes; 1 judges them in sequence
    pub workers: usize,
}

impl Default for DiagnoserConfig {
    fn default() -> Self {
        Self { workers: 1 }
    }
}

/// Re-evaluates scheduling predicates for a pod against every node
pub struct Diagnoser {
    config: DiagnoserConfig,
    filters: Vec<Box<dyn FilterPredicate>>,
}

impl Default for Diagnoser {
    fn default() -> Self {
        Self::new(DiagnoserConfig::default())
    }
}

impl Diagnoser {
    /// Create a new diagnoser with the default predicates
    pub fn new(config: DiagnoserConfig) -> Self {
        Self {
            config,
            filters: default_filters(),
        }
    }

    /// One `Detail` per node, in the snapshot's node order.
    ///
    /// Returns nothing when there is no target or no nodes.
    pub fn diagnose(&self, target: Option<&Pod>, snapshot: &Snapshot) -> Vec<Detail> {
        let Some(target) = target else {
            return Vec::new();
        };
        if snapshot.nodes.is_empty() {
            return Vec::new();
        }

        let node_pods = group_by_node(target, &snapshot.pods);
        let index = SnapshotIndex::new(snapshot);
        let nodes = snapshot.nodes.as_slice();

        info!(
            "Diagnosing pod {} against {} nodes",
            pod_ref(target),
            nodes.len()
        );

        let judge = |node: &Node| {
            let bound = node_pods
                .get(node_name(node))
                .map(Vec::as_slice)
                .unwrap_or_default();
            let ctx = NodeContext {
                pod: target,
                node,
                node_pods: bound,
                index: &index,
            };
            self.judge(&ctx)
        };

        let workers = self.config.workers.clamp(1, nodes.len());
        if workers == 1 {
            return nodes.iter().map(judge).collect();
        }

        // Each worker owns a disjoint run of slots, indexed like `nodes`
        let mut slots: Vec<Option<Detail>> = vec![None; nodes.len()];
        let chunk = nodes.len().div_ceil(workers);
        std::thread::scope(|scope| {
            for (slot_chunk, node_chunk) in slots.chunks_mut(chunk).zip(nodes.chunks(chunk)) {
                let judge = &judge;
                scope.spawn(move || {
                    for (slot, node) in slot_chunk.iter_mut().zip(node_chunk) {
                        *slot = Some(judge(node));
                    }
                });
            }
        });
        slots.into_iter().flatten().collect()
    }

    /// Run every predicate against one node and draw the verdict
    fn judge(&self, ctx: &NodeContext) -> Detail {
        let mut findings = Findings::default();
        for filter in &self.filters {
            filter.evaluate(ctx, &mut findings);
        }

        let detail = Detail::from_findings(node_name(ctx.node), findings);
        debug!("{}", detail.summary());
        detail
    }
}

/// Diagnose with the default configuration
pub fn diagnose(target: Option<&Pod>, snapshot: &Snapshot) -> Vec<Detail> {
    Diagnoser::default().diagnose(target, snapshot)
}

/// Pods bound to each node, by node name.
///
/// Unbound pods, pods that have finished running, and the target itself
/// are left out.
fn group_by_node<'a>(target: &Pod, pods: &'a [Pod]) -> HashMap<&'a str, Vec<&'a Pod>> {
    let mut grouped: HashMap<&str, Vec<&Pod>> = HashMap::new();
    for pod in pods {
        let Some(node) = pod
            .spec
            .as_ref()
            .and_then(|s| s.node_name.as_deref())
            .filter(|n| !n.is_empty())
        else {
            continue;
        };
        if is_terminated(pod) || is_same_pod(pod, target) {
            continue;
        }
        grouped.entry(node).or_default().push(pod);
    }
    grouped
}

fn is_terminated(pod: &Pod) -> bool {
    matches!(
        pod.status.as_ref().and_then(|s| s.phase.as_deref()),
        Some("Succeeded") | Some("Failed")
    )
}

fn is_same_pod(a: &Pod, b: &Pod) -> bool {
    pod_namespace(a) == pod_namespace(b) && pod_name(a) == pod_name(b)
}
