//! # SecretSyncRule Spec
//!
//! Main CRD specification types.

use serde::{Deserialize, Serialize};

/// SecretSyncRule Custom Resource Definition
///
/// Designates one source Secret and the namespaces it should be replicated into.
///
/// # Example
///
/// ```yaml
/// apiVersion: kube-secret-sync.io/v1
/// kind: SecretSyncRule
/// metadata:
///   name: registry-credentials
///   namespace: default
/// spec:
///   secret:
///     name: registry-credentials
///     namespace: default
///   rules:
///     namespaces:
///       include: ["team-a", "team-b"]
///       excludeRegex: ["^kube-"]
///     force: false
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "SecretSyncRule",
    group = "kube-secret-sync.io",
    version = "v1",
    namespaced,
    shortname = "ssr",
    printcolumn = r#"{"name":"Secret", "type":"string", "jsonPath":".spec.secret.name"}, {"name":"Source", "type":"string", "jsonPath":".spec.secret.namespace"}, {"name":"Force", "type":"boolean", "jsonPath":".spec.rules.force"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct SecretSyncRuleSpec {
    /// The source Secret to replicate
    pub secret: SecretReference,
    /// Targeting and ownership rules
    #[serde(default)]
    pub rules: Rules,
}

/// Identifies the source Secret by namespace and name
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretReference {
    /// Name of the source Secret
    pub name: String,
    /// Namespace holding the source Secret
    pub namespace: String,
}

/// Rules applied when replicating the source Secret
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rules {
    /// Which namespaces receive a replica
    #[serde(default)]
    pub namespaces: NamespaceSelector,
    /// Overwrite or delete target Secrets even when they were not created by the controller.
    /// Falls back to the controller-wide `--force` default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
}

/// Namespace targeting lists
///
/// Exclusions always win. When both include lists are empty every
/// namespace not excluded is a target.
#[derive(Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NamespaceSelector {
    /// Namespaces excluded by exact name
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Namespaces excluded by regular expression
    #[serde(default)]
    pub exclude_regex: Vec<String>,
    /// Namespaces included by exact name
    #[serde(default)]
    pub include: Vec<String>,
    /// Namespaces included by regular expression
    #[serde(default)]
    pub include_regex: Vec<String>,
}

impl SecretSyncRule {
    /// `namespace/name` of the rule itself, for logging
    #[must_use]
    pub fn key(&self) -> String {
        format!(
            "{}/{}",
            self.metadata.namespace.as_deref().unwrap_or("default"),
            self.metadata.name.as_deref().unwrap_or("unknown")
        )
    }
}
