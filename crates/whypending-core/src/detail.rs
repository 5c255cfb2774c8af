use crate::quantity::Quantity;
use k8s_openapi::api::core::v1::{NodeSelectorTerm, PodAffinityTerm, Taint};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Predicate category a node can fail on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reason {
    ResourceNotEnough,
    NodeTaintNotTolerated,
    NodeAffinityMismatch,
    PodAffinityMismatch,
    PodAntiAffinityMismatch,
    PvAffinityMismatch,
    Schedulable,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::ResourceNotEnough => "ResourceNotEnough",
            Reason::NodeTaintNotTolerated => "NodeTaintNotTolerated",
            Reason::NodeAffinityMismatch => "NodeAffinityMismatch",
            Reason::PodAffinityMismatch => "PodAffinityMismatch",
            Reason::PodAntiAffinityMismatch => "PodAntiAffinityMismatch",
            Reason::PvAffinityMismatch => "PvAffinityMismatch",
            Reason::Schedulable => "Schedulable",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resource the node cannot supply in the requested amount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceShortfall {
    pub resource_name: String,
    pub required: Quantity,
    pub left: Quantity,
}

/// A `NoSchedule` taint none of the pod's tolerations cover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaintNotTolerated {
    pub taint: Taint,
}

/// A node selector term the node's labels do not satisfy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeAffinityMismatch {
    pub term: NodeSelectorTerm,
}

/// A required pod affinity term no pod on the node satisfies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodAffinityMismatch {
    pub term: PodAffinityTerm,
}

/// A pod on the node that a required anti-affinity term selects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodAntiAffinityMismatch {
    pub term: PodAffinityTerm,
    pub namespace: String,
    pub pod_name: String,
}

/// A bound persistent volume whose node affinity excludes the node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvAffinityMismatch {
    pub volume_name: String,
    pub claim_name: String,
    pub terms: Vec<NodeSelectorTerm>,
}

/// Something the evaluation could not model exactly and let pass.
///
/// A node reported schedulable while carrying notes may still be rejected by
/// the real scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Note {
    /// Selector operator outside In/NotIn/Exists/DoesNotExist/Gt/Lt
    #[serde(rename_all = "camelCase")]
    UnsupportedOperator { key: String, operator: String },
    /// Node selector term selecting on node fields instead of labels
    #[serde(rename_all = "camelCase")]
    UnsupportedMatchFields { keys: Vec<String> },
    /// namespaceSelector could not be checked because the namespace's
    /// labels were not in the snapshot
    #[serde(rename_all = "camelCase")]
    UnresolvedNamespaceSelector { namespace: String },
    /// A resource request or allocatable entry that did not parse
    #[serde(rename_all = "camelCase")]
    InvalidQuantity {
        owner: String,
        resource_name: String,
        value: String,
    },
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Note::UnsupportedOperator { key, operator } => {
                write!(f, "operator {} on key {} not evaluated", operator, key)
            }
            Note::UnsupportedMatchFields { keys } => {
                write!(f, "matchFields {} not evaluated", keys.join(","))
            }
            Note::UnresolvedNamespaceSelector { namespace } => {
                write!(f, "namespaceSelector not evaluated for namespace {}", namespace)
            }
            Note::InvalidQuantity {
                owner,
                resource_name,
                value,
            } => write!(f, "{} {}={} ignored", owner, resource_name, value),
        }
    }
}

/// Per-predicate findings for one node, before the verdict is drawn
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Findings {
    pub resource_not_enough: Vec<ResourceShortfall>,
    pub node_taint_not_tolerated: Vec<TaintNotTolerated>,
    pub node_affinity_mismatch: Vec<NodeAffinityMismatch>,
    pub pod_affinity_mismatch: Vec<PodAffinityMismatch>,
    pub pod_anti_affinity_mismatch: Vec<PodAntiAffinityMismatch>,
    pub pv_affinity_mismatch: Vec<PvAffinityMismatch>,
    pub notes: Vec<Note>,
}

/// Record a note once; the same construct seen on several pods collapses
pub fn record_note(notes: &mut Vec<Note>, note: Note) {
    if !notes.contains(&note) {
        notes.push(note);
    }
}

impl Findings {
    fn is_clear(&self) -> bool {
        self.resource_not_enough.is_empty()
            && self.node_taint_not_tolerated.is_empty()
            && self.node_affinity_mismatch.is_empty()
            && self.pod_affinity_mismatch.is_empty()
            && self.pod_anti_affinity_mismatch.is_empty()
            && self.pv_affinity_mismatch.is_empty()
    }
}

/// Diagnosis of one node for the target pod
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Detail {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub node_name: String,
    pub schedulable: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_not_enough: Vec<ResourceShortfall>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_taint_not_tolerated: Vec<TaintNotTolerated>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub node_affinity_mismatch: Vec<NodeAffinityMismatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pod_affinity_mismatch: Vec<PodAffinityMismatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pod_anti_affinity_mismatch: Vec<PodAntiAffinityMismatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pv_affinity_mismatch: Vec<PvAffinityMismatch>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<Note>,
}

impl Detail {
    /// Draw the verdict: schedulable iff no predicate reported anything
    pub fn from_findings(node_name: impl Into<String>, findings: Findings) -> Self {
        let schedulable = findings.is_clear();
        Self {
            node_name: node_name.into(),
            schedulable,
            resource_not_enough: findings.resource_not_enough,
            node_taint_not_tolerated: findings.node_taint_not_tolerated,
            node_affinity_mismatch: findings.node_affinity_mismatch,
            pod_affinity_mismatch: findings.pod_affinity_mismatch,
            pod_anti_affinity_mismatch: findings.pod_anti_affinity_mismatch,
            pv_affinity_mismatch: findings.pv_affinity_mismatch,
            notes: findings.notes,
        }
    }

    /// Categories this node fails on, in report order
    pub fn reasons(&self) -> Vec<Reason> {
        let categories = [
            (self.resource_not_enough.is_empty(), Reason::ResourceNotEnough),
            (
                self.node_taint_not_tolerated.is_empty(),
                Reason::NodeTaintNotTolerated,
            ),
            (
                self.node_affinity_mismatch.is_empty(),
                Reason::NodeAffinityMismatch,
            ),
            (
                self.pod_affinity_mismatch.is_empty(),
                Reason::PodAffinityMismatch,
            ),
            (
                self.pod_anti_affinity_mismatch.is_empty(),
                Reason::PodAntiAffinityMismatch,
            ),
            (self.pv_affinity_mismatch.is_empty(), Reason::PvAffinityMismatch),
        ];
        let reasons: Vec<Reason> = categories
            .into_iter()
            .filter(|(empty, _)| !empty)
            .map(|(_, reason)| reason)
            .collect();
        if reasons.is_empty() {
            vec![Reason::Schedulable]
        } else {
            reasons
        }
    }

    /// One-line summary: the node name followed by its reasons
    pub fn summary(&self) -> String {
        let mut line = self.node_name.clone();
        for reason in self.reasons() {
            line.push(' ');
            line.push_str(reason.as_str());
        }
        line
    }
}

impl fmt::Display for Detail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shortfall() -> ResourceShortfall {
        ResourceShortfall {
            resource_name: "cpu".to_string(),
            required: Quantity::parse("2").unwrap(),
            left: Quantity::parse("1").unwrap(),
        }
    }

    #[test]
    fn test_clear_findings_are_schedulable() {
        let detail = Detail::from_findings("node1", Findings::default());
        assert!(detail.schedulable);
        assert_eq!(detail.summary(), "node1 Schedulable");
    }

    #[test]
    fn test_notes_do_not_affect_verdict() {
        let mut findings = Findings::default();
        record_note(
            &mut findings.notes,
            Note::UnresolvedNamespaceSelector {
                namespace: "team-a".to_string(),
            },
        );
        record_note(
            &mut findings.notes,
            Note::UnresolvedNamespaceSelector {
                namespace: "team-a".to_string(),
            },
        );
        let detail = Detail::from_findings("node1", findings);
        assert!(detail.schedulable);
        assert_eq!(detail.notes.len(), 1);
    }

    #[test]
    fn test_summary_lists_reasons_in_order() {
        let findings = Findings {
            resource_not_enough: vec![shortfall()],
            node_taint_not_tolerated: vec![TaintNotTolerated {
                taint: Taint {
                    key: "gpu".to_string(),
                    effect: "NoSchedule".to_string(),
                    ..Default::default()
                },
            }],
            ..Default::default()
        };
        let detail = Detail::from_findings("node2", findings);
        assert!(!detail.schedulable);
        assert_eq!(
            detail.summary(),
            "node2 ResourceNotEnough NodeTaintNotTolerated"
        );
    }

    #[test]
    fn test_json_shape() {
        let findings = Findings {
            resource_not_enough: vec![shortfall()],
            ..Default::default()
        };
        let detail = Detail::from_findings("node1", findings);
        let value = serde_json::to_value(&detail).unwrap();

        assert_eq!(value["nodeName"], "node1");
        assert_eq!(value["schedulable"], false);
        assert_eq!(value["resourceNotEnough"][0]["resourceName"], "cpu");
        assert_eq!(value["resourceNotEnough"][0]["required"], "2");
        assert_eq!(value["resourceNotEnough"][0]["left"], "1");
        assert!(value.get("nodeTaintNotTolerated").is_none());
        assert!(value.get("notes").is_none());
    }

    #[test]
    fn test_note_json_is_tagged() {
        let note = Note::UnsupportedOperator {
            key: "size".to_string(),
            operator: "Between".to_string(),
        };
        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["kind"], "unsupportedOperator");
        assert_eq!(value["operator"], "Between");
    }
}
