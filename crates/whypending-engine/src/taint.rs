use k8s_openapi::api::core::v1::{Node, Pod, Taint, Toleration};
use whypending_core::TaintNotTolerated;

/// The only taint effect that keeps new pods off a node
pub const NO_SCHEDULE: &str = "NoSchedule";

/// Whether any toleration covers the taint.
///
/// Keys must be equal. `Equal` (or no operator) also needs equal values;
/// `Exists` ignores the value. In both cases an empty toleration effect
/// matches every effect.
pub fn tolerates_taint(tolerations: &[Toleration], taint: &Taint) -> bool {
    tolerations.iter().any(|toleration| {
        if toleration.key.as_deref().unwrap_or_default() != taint.key {
            return false;
        }

        let effect_matches = match toleration.effect.as_deref() {
            None | Some("") => true,
            Some(effect) => effect == taint.effect,
        };

        match toleration.operator.as_deref() {
            None | Some("") | Some("Equal") => {
                toleration.value.as_deref().unwrap_or_default()
                    == taint.value.as_deref().unwrap_or_default()
                    && effect_matches
            }
            Some("Exists") => effect_matches,
            Some(_) => false,
        }
    })
}

/// `NoSchedule` taints on the node that the pod does not tolerate
pub fn evaluate_taints(pod: &Pod, node: &Node) -> Vec<TaintNotTolerated> {
    let tolerations = pod
        .spec
        .as_ref()
        .and_then(|s| s.tolerations.as_deref())
        .unwrap_or_default();

    node.spec
        .as_ref()
        .and_then(|s| s.taints.as_ref())
        .into_iter()
        .flatten()
        .filter(|taint| taint.effect == NO_SCHEDULE && !tolerates_taint(tolerations, taint))
        .map(|taint| TaintNotTolerated {
            taint: taint.clone(),
        })
        .collect()
}
