//! # Rule Matching Engine
//!
//! Decides which Secret a [`SecretSyncRule`] replicates and which namespaces
//! receive the replica.
//!
//! Namespace selection is evaluated in a fixed order and short-circuits:
//!
//! 1. the rule's own source namespace is never a target
//! 2. controller-wide protected namespaces are never targets
//! 3. anything matching `exclude` or `excludeRegex` is excluded
//! 4. with both include lists empty, everything left is included
//! 5. otherwise the namespace must match `include` or `includeRegex`

use crate::cluster::{object_name, object_namespace, ClusterApi};
use crate::controller::filter::NameFilter;
use crate::crd::{SecretReference, SecretSyncRule};
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use tracing::{debug, warn};

/// Controller-wide settings every rule inherits
#[derive(Debug, Clone, Default)]
pub struct RuleDefaults {
    /// Used when the rule leaves `rules.force` unset
    pub force: bool,
    pub protected_namespaces: NameFilter,
}

/// A SecretSyncRule with its namespace lists compiled
#[derive(Debug, Clone)]
pub struct CompiledRule {
    key: String,
    source: SecretReference,
    exclude: NameFilter,
    include: NameFilter,
    protected: NameFilter,
    force: bool,
}

impl CompiledRule {
    /// Compile a rule's selector
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRule`] when the source reference is incomplete
    /// or any pattern fails to compile.
    pub fn compile(rule: &SecretSyncRule, defaults: &RuleDefaults) -> Result<Self> {
        let key = rule.key();
        let spec = &rule.spec;

        if spec.secret.name.is_empty() || spec.secret.namespace.is_empty() {
            return Err(Error::InvalidRule {
                rule: key,
                message: "spec.secret requires both name and namespace".to_string(),
            });
        }

        let selector = &spec.rules.namespaces;
        let invalid = |e: Error| Error::InvalidRule {
            rule: key.clone(),
            message: e.to_string(),
        };
        let exclude = NameFilter::new(selector.exclude.iter().cloned(), &selector.exclude_regex)
            .map_err(invalid)?;
        let include = NameFilter::new(selector.include.iter().cloned(), &selector.include_regex)
            .map_err(invalid)?;

        Ok(Self {
            source: spec.secret.clone(),
            exclude,
            include,
            protected: defaults.protected_namespaces.clone(),
            force: spec.rules.force.unwrap_or(defaults.force),
            key,
        })
    }

    /// `namespace/name` of the SecretSyncRule
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The source Secret this rule replicates
    #[must_use]
    pub fn source(&self) -> &SecretReference {
        &self.source
    }

    /// Effective force policy after applying the controller default
    #[must_use]
    pub fn force(&self) -> bool {
        self.force
    }

    /// True iff `secret` is this rule's source
    #[must_use]
    pub fn should_sync_secret(&self, secret: &Secret) -> bool {
        object_namespace(secret) == self.source.namespace && object_name(secret) == self.source.name
    }

    /// True iff `namespace` should hold a replica
    #[must_use]
    pub fn should_sync_namespace(&self, namespace: &str) -> bool {
        if namespace == self.source.namespace {
            return false;
        }

        if self.protected.is_excluded(namespace) || self.exclude.is_excluded(namespace) {
            return false;
        }

        self.include.is_included(namespace)
    }

    /// Names of the given namespaces this rule targets
    #[must_use]
    pub fn select_namespaces(&self, namespaces: &[Namespace]) -> Vec<String> {
        namespaces
            .iter()
            .map(object_name)
            .filter(|name| self.should_sync_namespace(name))
            .map(str::to_string)
            .collect()
    }

    /// All current cluster namespaces this rule targets
    ///
    /// # Errors
    ///
    /// Propagates the namespace list failure; callers log it and treat the
    /// target set as empty.
    pub async fn target_namespaces(&self, cluster: &dyn ClusterApi) -> Result<Vec<String>> {
        let namespaces = cluster.list_namespaces().await?;
        let targets = self.select_namespaces(&namespaces);
        debug!(
            rule = self.key.as_str(),
            targets = targets.len(),
            "Resolved target namespaces"
        );
        Ok(targets)
    }
}

/// Matching across every currently known rule
#[derive(Debug, Clone, Default)]
pub struct SyncRuleSet {
    rules: Vec<CompiledRule>,
}

impl SyncRuleSet {
    /// Compile every rule, logging and skipping the ones that are invalid
    #[must_use]
    pub fn compile(rules: &[SecretSyncRule], defaults: &RuleDefaults) -> Self {
        let rules = rules
            .iter()
            .filter_map(|rule| match CompiledRule::compile(rule, defaults) {
                Ok(compiled) => Some(compiled),
                Err(e) => {
                    warn!(rule = rule.key().as_str(), error = %e, "Skipping invalid SecretSyncRule");
                    None
                }
            })
            .collect();
        Self { rules }
    }

    /// List rules from the cluster and compile them
    ///
    /// # Errors
    ///
    /// Returns the list failure.
    pub async fn load(cluster: &dyn ClusterApi, defaults: &RuleDefaults) -> Result<Self> {
        let rules = cluster.list_sync_rules().await?;
        Ok(Self::compile(&rules, defaults))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledRule> {
        self.rules.iter()
    }

    #[must_use]
    pub fn any_rule_matches_secret(&self, secret: &Secret) -> bool {
        self.rules.iter().any(|rule| rule.should_sync_secret(secret))
    }

    #[must_use]
    pub fn any_rule_matches_namespace(&self, namespace: &str) -> bool {
        self.rules
            .iter()
            .any(|rule| rule.should_sync_namespace(namespace))
    }

    /// Rules whose source is `secret`
    pub fn matching_secret<'a>(
        &'a self,
        secret: &'a Secret,
    ) -> impl Iterator<Item = &'a CompiledRule> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.should_sync_secret(secret))
    }

    /// Rules that target `namespace`
    pub fn matching_namespace<'a>(
        &'a self,
        namespace: &'a str,
    ) -> impl Iterator<Item = &'a CompiledRule> + 'a {
        self.rules
            .iter()
            .filter(move |rule| rule.should_sync_namespace(namespace))
    }

    /// Whether any rule not matched by `ignore` still places a Secret named
    /// `secret_name` into `namespace`
    #[must_use]
    pub fn claims<F>(&self, namespace: &str, secret_name: &str, ignore: F) -> bool
    where
        F: Fn(&CompiledRule) -> bool,
    {
        self.rules.iter().any(|rule| {
            !ignore(rule)
                && rule.source().name == secret_name
                && rule.should_sync_namespace(namespace)
        })
    }
}
