//! # Custom Resource Definitions
//!
//! CRD types for kube-secret-sync.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `SecretSyncRule` specification, rules and namespace selector

mod spec;

// Re-export all public types
pub use spec::{
    NamespaceSelector, Rules, SecretReference, SecretSyncRule, SecretSyncRuleSpec,
};
