//! Whypending Cluster - Snapshot acquisition
//!
//! This crate provides:
//! - Cluster configuration resolution (kubeconfig, context, in-cluster)
//! - A read-only, paginating Kubernetes list client
//! - Live (`ApiSource`) and offline (`FileSource`) snapshot sources

// Allow unused assignments for diagnostic fields - they're used by the thiserror/miette macros
#![allow(unused_assignments)]

pub mod api_client;
pub mod error;
pub mod source;

// Re-export primary types
pub use api_client::{resolve_config, ApiClient};
pub use error::{ClusterError, Result};
pub use source::{
    parse_snapshot, ApiSource, ClusterSource, FileSource, SnapshotNeeds, SnapshotRequest,
};
