//! Whypending Core - Shared types for pending-pod diagnosis
//!
//! This crate provides:
//! - Exact Kubernetes resource quantities
//! - The per-node diagnosis model (`Detail`) and its mismatch records
//! - Error types with miette diagnostics

pub mod detail;
pub mod error;
pub mod quantity;
pub mod snapshot;

// Re-export commonly used types
pub use detail::{
    Detail, Findings, NodeAffinityMismatch, Note, PodAffinityMismatch, PodAntiAffinityMismatch,
    PvAffinityMismatch, Reason, ResourceShortfall, TaintNotTolerated, record_note,
};
pub use error::{CoreError, Result};
pub use quantity::{Quantity, QuantityFormat};
pub use snapshot::Snapshot;

// Re-export k8s-openapi types for convenience
pub use k8s_openapi;
pub use k8s_openapi::api::core::v1::{
    Namespace, Node, PersistentVolume, PersistentVolumeClaim, Pod,
};
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// `namespace/name` of a pod, for logs and reports
pub fn pod_ref(pod: &Pod) -> String {
    format!(
        "{}/{}",
        pod.metadata.namespace.as_deref().unwrap_or_default(),
        pod.metadata.name.as_deref().unwrap_or_default()
    )
}
