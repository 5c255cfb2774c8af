//! Whypending Engine - Explains why a pod cannot be placed on each node
//!
//! This crate provides:
//! - Resource accounting against node allocatable
//! - Label selector matching
//! - Taint/toleration, node affinity, pod (anti-)affinity and volume
//!   affinity predicates
//! - Per-node verdicts over a cluster snapshot

pub mod diagnose;
pub mod filter;
pub mod node_affinity;
pub mod pod_affinity;
pub mod resources;
pub mod selector;
pub mod taint;
pub mod types;
pub mod volume;

// Re-export commonly used types
pub use diagnose::{diagnose, Diagnoser, DiagnoserConfig};
pub use filter::FilterPredicate;
pub use selector::{Operator, Requirement, Term};
pub use types::{NodeContext, SnapshotIndex};
