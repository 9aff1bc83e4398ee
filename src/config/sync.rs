//! # Sync Configuration
//!
//! The configuration surface consumed by the reconciliation engine. Built
//! once at startup from the command line; pattern lists are compiled here so
//! a malformed regex stops the process before any watch is opened.

use crate::controller::filter::NameFilter;
use crate::controller::rules::RuleDefaults;
use std::path::PathBuf;

/// How the controller reaches the API server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterAccess {
    /// Service account token mounted into the pod
    InCluster,
    /// An explicit kubeconfig file, for running outside the cluster
    Kubeconfig(PathBuf),
}

/// Settings shared by the dispatcher and reconciler
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Restricts the Secret watch to one namespace; `None` watches all
    pub secrets_namespace: Option<String>,
    /// Force default for rules that do not set `rules.force`
    pub force: bool,
    /// Namespaces that never receive replicas, whatever the rule says
    pub protected_namespaces: NameFilter,
    /// Delete managed replicas a modified rule no longer selects
    pub prune_stale_replicas: bool,
    pub cluster_access: ClusterAccess,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            secrets_namespace: None,
            force: false,
            protected_namespaces: NameFilter::default(),
            prune_stale_replicas: true,
            cluster_access: ClusterAccess::InCluster,
        }
    }
}

impl SyncConfig {
    /// Defaults every compiled rule inherits
    #[must_use]
    pub fn rule_defaults(&self) -> RuleDefaults {
        RuleDefaults {
            force: self.force,
            protected_namespaces: self.protected_namespaces.clone(),
        }
    }
}
