//! # Secret Reconciler
//!
//! Idempotent create, update and delete of replica Secrets.
//!
//! A replica is derived from its source and never authored independently:
//! `type`, `data`, `stringData`, `labels` and `immutable` are copied
//! verbatim, annotations are the source's minus bookkeeping keys plus the
//! managed-by marker. Target Secrets without the marker are foreign and are
//! only touched when the rule's effective force policy allows it.

use crate::cluster::{object_name, ClusterApi};
use crate::constants::{
    BOOKKEEPING_ANNOTATIONS, MANAGED_BY_ANNOTATION_KEY, MANAGED_BY_ANNOTATION_VALUE,
};
use crate::controller::rules::CompiledRule;
use crate::error::Result;
use crate::observability::metrics;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Secret type the API server assumes when none is set
const DEFAULT_SECRET_TYPE: &str = "Opaque";

/// Result of one reconciliation against one target namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    /// Replica already matches the source
    Unchanged,
    /// Target exists but is not managed and force is off
    SkippedForeign,
    Deleted,
    /// Nothing to delete
    Absent,
}

impl SyncOutcome {
    /// Stable name used in logs and metric labels
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SyncOutcome::Created => "created",
            SyncOutcome::Updated => "updated",
            SyncOutcome::Unchanged => "unchanged",
            SyncOutcome::SkippedForeign => "skipped_foreign",
            SyncOutcome::Deleted => "deleted",
            SyncOutcome::Absent => "absent",
        }
    }
}

/// Source annotations with controller and kubectl bookkeeping removed
#[must_use]
pub fn normalized_annotations(secret: &Secret) -> BTreeMap<String, String> {
    secret
        .metadata
        .annotations
        .iter()
        .flatten()
        .filter(|(key, _)| !BOOKKEEPING_ANNOTATIONS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Whether `secret` carries the managed-by marker
#[must_use]
pub fn is_managed(secret: &Secret) -> bool {
    secret
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(MANAGED_BY_ANNOTATION_KEY))
        .is_some_and(|value| value == MANAGED_BY_ANNOTATION_VALUE)
}

/// Build the desired replica of `source` for `namespace`
#[must_use]
pub fn prepare_replica(namespace: &str, source: &Secret) -> Secret {
    let mut annotations = normalized_annotations(source);
    annotations.insert(
        MANAGED_BY_ANNOTATION_KEY.to_string(),
        MANAGED_BY_ANNOTATION_VALUE.to_string(),
    );

    Secret {
        metadata: ObjectMeta {
            name: source.metadata.name.clone(),
            namespace: Some(namespace.to_string()),
            labels: source.metadata.labels.clone(),
            annotations: Some(annotations),
            ..ObjectMeta::default()
        },
        type_: source.type_.clone(),
        data: source.data.clone(),
        string_data: source.string_data.clone(),
        immutable: source.immutable,
    }
}

fn non_empty<V>(map: Option<&BTreeMap<String, V>>) -> Option<&BTreeMap<String, V>> {
    map.filter(|map| !map.is_empty())
}

/// Content equality ignoring bookkeeping annotations
///
/// An absent map and an empty map compare equal, as do an unset type and
/// `Opaque`.
#[must_use]
pub fn secrets_are_equal(a: &Secret, b: &Secret) -> bool {
    a.type_.as_deref().unwrap_or(DEFAULT_SECRET_TYPE)
        == b.type_.as_deref().unwrap_or(DEFAULT_SECRET_TYPE)
        && non_empty(a.data.as_ref()) == non_empty(b.data.as_ref())
        && non_empty(a.string_data.as_ref()) == non_empty(b.string_data.as_ref())
        && non_empty(a.metadata.labels.as_ref()) == non_empty(b.metadata.labels.as_ref())
        && normalized_annotations(a) == normalized_annotations(b)
}

/// Applies replicas through the cluster API
#[derive(Clone)]
pub struct Reconciler {
    cluster: Arc<dyn ClusterApi>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler").finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterApi>) -> Self {
        Self { cluster }
    }

    /// Create or update the replica of `source` in `namespace`
    ///
    /// # Errors
    ///
    /// Returns the cluster API failure. Nothing is retried here; the next
    /// notification for the same object re-triggers reconciliation.
    pub async fn create_or_update(
        &self,
        rule: &CompiledRule,
        namespace: &str,
        source: &Secret,
    ) -> Result<SyncOutcome> {
        let name = object_name(source);
        let desired = prepare_replica(namespace, source);

        let existing = self
            .cluster
            .get_secret(namespace, name)
            .await
            .inspect_err(|e| {
                error!(namespace, name, rule = rule.key(), error = %e, "Failed to fetch replica");
            })?;

        let outcome = match existing {
            None => {
                self.cluster
                    .create_secret(namespace, &desired)
                    .await
                    .inspect_err(|e| {
                        error!(namespace, name, rule = rule.key(), error = %e, "Failed to create replica");
                    })?;
                info!(namespace, name, rule = rule.key(), "Created replica");
                SyncOutcome::Created
            }
            Some(existing) => {
                let managed = is_managed(&existing);
                if !managed && !rule.force() {
                    debug!(
                        namespace,
                        name,
                        rule = rule.key(),
                        "Skipping foreign Secret, force is disabled"
                    );
                    SyncOutcome::SkippedForeign
                } else if managed && secrets_are_equal(&existing, &desired) {
                    debug!(namespace, name, rule = rule.key(), "Replica already up to date");
                    SyncOutcome::Unchanged
                } else {
                    let mut desired = desired;
                    desired.metadata.resource_version = existing.metadata.resource_version;
                    desired.metadata.uid = existing.metadata.uid;
                    self.cluster
                        .update_secret(namespace, &desired)
                        .await
                        .inspect_err(|e| {
                            error!(namespace, name, rule = rule.key(), error = %e, "Failed to update replica");
                        })?;
                    if managed {
                        info!(namespace, name, rule = rule.key(), "Updated replica");
                    } else {
                        info!(namespace, name, rule = rule.key(), "Overwrote foreign Secret (force)");
                    }
                    SyncOutcome::Updated
                }
            }
        };

        metrics::record_replica_operation(outcome.as_str());
        Ok(outcome)
    }

    /// Delete the replica named `name` from `namespace`
    ///
    /// Foreign Secrets are removed only when the rule forces.
    ///
    /// # Errors
    ///
    /// Returns the cluster API failure.
    pub async fn delete_replica(
        &self,
        rule: &CompiledRule,
        namespace: &str,
        name: &str,
    ) -> Result<SyncOutcome> {
        self.remove(rule, namespace, name, rule.force()).await
    }

    /// Delete a managed replica the rule no longer selects
    ///
    /// Foreign Secrets are never pruned, whatever the force policy.
    ///
    /// # Errors
    ///
    /// Returns the cluster API failure.
    pub async fn prune_replica(
        &self,
        rule: &CompiledRule,
        namespace: &str,
        name: &str,
    ) -> Result<SyncOutcome> {
        self.remove(rule, namespace, name, false).await
    }

    async fn remove(
        &self,
        rule: &CompiledRule,
        namespace: &str,
        name: &str,
        force: bool,
    ) -> Result<SyncOutcome> {
        let existing = self
            .cluster
            .get_secret(namespace, name)
            .await
            .inspect_err(|e| {
                error!(namespace, name, rule = rule.key(), error = %e, "Failed to fetch replica");
            })?;

        let outcome = match existing {
            None => SyncOutcome::Absent,
            Some(existing) if !is_managed(&existing) && !force => {
                debug!(
                    namespace,
                    name,
                    rule = rule.key(),
                    "Leaving foreign Secret in place"
                );
                SyncOutcome::SkippedForeign
            }
            Some(_) => match self.cluster.delete_secret(namespace, name).await {
                Ok(()) => {
                    info!(namespace, name, rule = rule.key(), "Deleted replica");
                    SyncOutcome::Deleted
                }
                Err(e) if e.is_not_found() => SyncOutcome::Absent,
                Err(e) => {
                    error!(namespace, name, rule = rule.key(), error = %e, "Failed to delete replica");
                    return Err(e);
                }
            },
        };

        metrics::record_replica_operation(outcome.as_str());
        Ok(outcome)
    }
}
