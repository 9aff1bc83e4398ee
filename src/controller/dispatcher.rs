//! # Event Dispatcher
//!
//! Routes decoded watch notifications to the rule engine and the reconciler.
//!
//! Every kind has the same three transitions: `Added`, `Modified` (a no-op
//! once a deletion timestamp is set) and `Deleted`.
//!
//! - **Secret**: changes to a rule's source are pushed to every target
//!   namespace; deleting the source removes its replicas. Secrets carrying
//!   the managed-by marker are the controller's own writes and are ignored.
//! - **Namespace**: only `Added` matters, and only for namespaces created
//!   after the process started. Older namespaces are covered by the initial
//!   replay of the Secret and SecretSyncRule watches.
//! - **SecretSyncRule**: `Added` and `Modified` resync the source into every
//!   target; `Modified` also prunes managed replicas the rule no longer
//!   selects. `Deleted` removes the rule's replicas by name.
//!
//! Rules are listed fresh for every notification; nothing is cached.

use crate::cluster::{object_name, ClusterApi, EventType, Notification, ResourceEvent};
use crate::config::SyncConfig;
use crate::controller::reconciler::{is_managed, Reconciler, SyncOutcome};
use crate::controller::rules::{CompiledRule, SyncRuleSet};
use crate::crd::SecretSyncRule;
use crate::error::Result;
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Explicit context threaded through the dispatcher and reconciler
#[derive(Clone)]
pub struct SyncContext {
    pub cluster: Arc<dyn ClusterApi>,
    pub config: Arc<SyncConfig>,
    /// Captured once at startup
    pub start_time: DateTime<Utc>,
}

impl std::fmt::Debug for SyncContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncContext")
            .field("config", &self.config)
            .field("start_time", &self.start_time)
            .finish_non_exhaustive()
    }
}

impl SyncContext {
    /// Build a context whose start time is now
    #[must_use]
    pub fn new(cluster: Arc<dyn ClusterApi>, config: SyncConfig) -> Self {
        Self::with_start_time(cluster, config, Utc::now())
    }

    #[must_use]
    pub fn with_start_time(
        cluster: Arc<dyn ClusterApi>,
        config: SyncConfig,
        start_time: DateTime<Utc>,
    ) -> Self {
        Self {
            cluster,
            config: Arc::new(config),
            start_time,
        }
    }
}

/// Tally of what one notification caused
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub skipped: usize,
    pub deleted: usize,
    pub failed: usize,
    /// The notification needed no work
    pub ignored: bool,
}

impl DispatchReport {
    fn ignored() -> Self {
        Self {
            ignored: true,
            ..Self::default()
        }
    }

    fn record(&mut self, result: &Result<SyncOutcome>) {
        match result {
            Ok(SyncOutcome::Created) => self.created += 1,
            Ok(SyncOutcome::Updated) => self.updated += 1,
            Ok(SyncOutcome::Unchanged | SyncOutcome::Absent) => self.unchanged += 1,
            Ok(SyncOutcome::SkippedForeign) => self.skipped += 1,
            Ok(SyncOutcome::Deleted) => self.deleted += 1,
            Err(_) => self.failed += 1,
        }
    }

    /// Number of cluster writes performed
    #[must_use]
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Handles one notification at a time
#[derive(Debug, Clone)]
pub struct Dispatcher {
    ctx: Arc<SyncContext>,
    reconciler: Reconciler,
}

impl Dispatcher {
    #[must_use]
    pub fn new(ctx: Arc<SyncContext>) -> Self {
        let reconciler = Reconciler::new(Arc::clone(&ctx.cluster));
        Self { ctx, reconciler }
    }

    /// Handle a notification to completion
    ///
    /// # Errors
    ///
    /// Returns an error when the notification could not be evaluated at all
    /// (rules could not be listed, the rule is invalid). Failures against
    /// individual target namespaces are counted in the report instead.
    pub async fn dispatch(&self, event: ResourceEvent) -> Result<DispatchReport> {
        match event {
            ResourceEvent::Secret(notification) => self.on_secret(notification).await,
            ResourceEvent::Namespace(notification) => self.on_namespace(notification).await,
            ResourceEvent::SyncRule(notification) => self.on_sync_rule(*notification).await,
        }
    }

    async fn rules(&self) -> Result<SyncRuleSet> {
        SyncRuleSet::load(self.ctx.cluster.as_ref(), &self.ctx.config.rule_defaults()).await
    }

    async fn on_secret(&self, notification: Notification<Secret>) -> Result<DispatchReport> {
        let Some(event_type) = notification.actionable() else {
            return Ok(DispatchReport::ignored());
        };
        let secret = notification.object;
        if is_managed(&secret) {
            return Ok(DispatchReport::ignored());
        }

        let rules = self.rules().await?;
        let matching: Vec<&CompiledRule> = rules.matching_secret(&secret).collect();
        if matching.is_empty() {
            return Ok(DispatchReport::ignored());
        }

        let name = object_name(&secret);
        let mut report = DispatchReport::default();
        for rule in matching {
            let targets = match rule.target_namespaces(self.ctx.cluster.as_ref()).await {
                Ok(targets) => targets,
                Err(e) => {
                    warn!(rule = rule.key(), error = %e, "Failed to list target namespaces");
                    report.failed += 1;
                    continue;
                }
            };

            for namespace in &targets {
                let result = match event_type {
                    EventType::Added | EventType::Modified => {
                        self.reconciler
                            .create_or_update(rule, namespace, &secret)
                            .await
                    }
                    EventType::Deleted => {
                        if rules.claims(namespace, name, |other| other.should_sync_secret(&secret))
                        {
                            debug!(
                                namespace = namespace.as_str(),
                                name,
                                rule = rule.key(),
                                "Replica still claimed by another rule"
                            );
                            continue;
                        }
                        self.reconciler.delete_replica(rule, namespace, name).await
                    }
                };
                report.record(&result);
            }
        }

        Ok(report)
    }

    async fn on_namespace(&self, notification: Notification<Namespace>) -> Result<DispatchReport> {
        if notification.actionable() != Some(EventType::Added) {
            return Ok(DispatchReport::ignored());
        }
        let namespace = notification.object;
        let name = object_name(&namespace);

        // creationTimestamp has whole-second precision
        if let Some(created) = creation_second(&namespace) {
            if created < self.ctx.start_time.timestamp() {
                debug!(namespace = name, "Namespace predates controller start");
                return Ok(DispatchReport::ignored());
            }
        }

        let rules = self.rules().await?;
        let mut report = DispatchReport::ignored();
        for rule in rules.matching_namespace(name) {
            report.ignored = false;
            let source = rule.source();
            let secret = match self
                .ctx
                .cluster
                .get_secret(&source.namespace, &source.name)
                .await
            {
                Ok(Some(secret)) => secret,
                Ok(None) => {
                    warn!(
                        rule = rule.key(),
                        source = %format!("{}/{}", source.namespace, source.name),
                        "Source Secret not found"
                    );
                    continue;
                }
                Err(e) => {
                    warn!(rule = rule.key(), error = %e, "Failed to fetch source Secret");
                    report.failed += 1;
                    continue;
                }
            };

            info!(namespace = name, rule = rule.key(), "Syncing into new namespace");
            let result = self.reconciler.create_or_update(rule, name, &secret).await;
            report.record(&result);
        }

        Ok(report)
    }

    async fn on_sync_rule(
        &self,
        notification: Notification<SecretSyncRule>,
    ) -> Result<DispatchReport> {
        let Some(event_type) = notification.actionable() else {
            return Ok(DispatchReport::ignored());
        };
        let rule = CompiledRule::compile(&notification.object, &self.ctx.config.rule_defaults())?;

        match event_type {
            EventType::Added => self.resync(&rule, false).await,
            EventType::Modified => self.resync(&rule, self.ctx.config.prune_stale_replicas).await,
            EventType::Deleted => self.remove_rule(&rule).await,
        }
    }

    /// Push the rule's source into every target, then optionally prune
    async fn resync(&self, rule: &CompiledRule, prune: bool) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();
        let source = rule.source();
        let namespaces = self.ctx.cluster.list_namespaces().await?;
        let targets = rule.select_namespaces(&namespaces);

        match self
            .ctx
            .cluster
            .get_secret(&source.namespace, &source.name)
            .await
        {
            Ok(Some(secret)) => {
                info!(
                    rule = rule.key(),
                    targets = targets.len(),
                    "Syncing rule into target namespaces"
                );
                for namespace in &targets {
                    let result = self
                        .reconciler
                        .create_or_update(rule, namespace, &secret)
                        .await;
                    report.record(&result);
                }
            }
            Ok(None) => {
                warn!(
                    rule = rule.key(),
                    source = %format!("{}/{}", source.namespace, source.name),
                    "Source Secret not found, nothing to sync"
                );
            }
            Err(e) => {
                warn!(rule = rule.key(), error = %e, "Failed to fetch source Secret");
                report.failed += 1;
            }
        }

        if prune {
            let rules = self.rules().await?;
            for namespace in namespaces.iter().map(object_name) {
                if namespace == source.namespace || rule.should_sync_namespace(namespace) {
                    continue;
                }
                if rules.claims(namespace, &source.name, |other| other.key() == rule.key()) {
                    continue;
                }
                let result = self
                    .reconciler
                    .prune_replica(rule, namespace, &source.name)
                    .await;
                report.record(&result);
            }
        }

        Ok(report)
    }

    /// Remove the replicas of a deleted rule, by name
    async fn remove_rule(&self, rule: &CompiledRule) -> Result<DispatchReport> {
        let mut report = DispatchReport::default();
        let name = &rule.source().name;
        let rules = self.rules().await?;
        let namespaces = self.ctx.cluster.list_namespaces().await?;

        info!(rule = rule.key(), "Rule deleted, removing replicas");
        for namespace in rule.select_namespaces(&namespaces) {
            if rules.claims(&namespace, name, |other| other.key() == rule.key()) {
                debug!(
                    namespace = namespace.as_str(),
                    name = name.as_str(),
                    "Replica still claimed by another rule"
                );
                continue;
            }
            let result = self.reconciler.delete_replica(rule, &namespace, name).await;
            report.record(&result);
        }

        Ok(report)
    }
}

/// Namespace creation time in Unix seconds, if the API server reported one
fn creation_second(namespace: &Namespace) -> Option<i64> {
    namespace
        .metadata
        .creation_timestamp
        .as_ref()
        .map(|time| time.0.timestamp())
}
