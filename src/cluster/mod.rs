//! # Cluster API
//!
//! The seam between the reconciliation engine and the Kubernetes API.
//!
//! Every component reaches the cluster through [`ClusterApi`], which lets the
//! dispatcher and reconciler run against an in-memory fake in tests while
//! using [`KubeCluster`] in production.
//!
//! Watch notifications are decoded once at the stream boundary into the
//! [`ResourceEvent`] tagged union, so downstream code always sees a concrete
//! kind instead of inspecting the object's type per event.

mod client;

pub use client::KubeCluster;

use crate::crd::SecretSyncRule;
use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::Resource;

/// The resource kinds the controller watches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKind {
    /// Core `Secret`
    Secret,
    /// Core `Namespace`
    Namespace,
    /// `SecretSyncRule` custom resource
    SyncRule,
}

impl WatchKind {
    /// Stable name used in logs and metric labels
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WatchKind::Secret => "Secret",
            WatchKind::Namespace => "Namespace",
            WatchKind::SyncRule => "SecretSyncRule",
        }
    }
}

impl std::fmt::Display for WatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Change type carried by a watch notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Added,
    Modified,
    Deleted,
}

impl EventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Added => "Added",
            EventType::Modified => "Modified",
            EventType::Deleted => "Deleted",
        }
    }
}

/// One watch notification for a known kind
#[derive(Debug, Clone)]
pub struct Notification<K> {
    pub event_type: EventType,
    pub object: K,
}

impl<K> Notification<K> {
    #[must_use]
    pub fn new(event_type: EventType, object: K) -> Self {
        Self { event_type, object }
    }
}

impl<K: Resource> Notification<K> {
    /// The event type a handler should act on, if any
    ///
    /// `Modified` notifications for objects already being deleted are no-ops.
    #[must_use]
    pub fn actionable(&self) -> Option<EventType> {
        match self.event_type {
            EventType::Modified if self.object.meta().deletion_timestamp.is_some() => None,
            event_type => Some(event_type),
        }
    }

    /// `resourceVersion` of the carried object, used to resume a watch
    #[must_use]
    pub fn resource_version(&self) -> Option<&str> {
        self.object.meta().resource_version.as_deref()
    }
}

/// A watch notification tagged by resource kind
#[derive(Debug, Clone)]
pub enum ResourceEvent {
    Secret(Notification<Secret>),
    Namespace(Notification<Namespace>),
    SyncRule(Box<Notification<SecretSyncRule>>),
}

impl ResourceEvent {
    #[must_use]
    pub fn kind(&self) -> WatchKind {
        match self {
            ResourceEvent::Secret(_) => WatchKind::Secret,
            ResourceEvent::Namespace(_) => WatchKind::Namespace,
            ResourceEvent::SyncRule(_) => WatchKind::SyncRule,
        }
    }

    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            ResourceEvent::Secret(n) => n.event_type,
            ResourceEvent::Namespace(n) => n.event_type,
            ResourceEvent::SyncRule(n) => n.event_type,
        }
    }

    #[must_use]
    pub fn resource_version(&self) -> Option<&str> {
        match self {
            ResourceEvent::Secret(n) => n.resource_version(),
            ResourceEvent::Namespace(n) => n.resource_version(),
            ResourceEvent::SyncRule(n) => n.resource_version(),
        }
    }

    /// `namespace/name` (or just `name` for cluster-scoped kinds) for logging
    #[must_use]
    pub fn object_key(&self) -> String {
        fn key<K: Resource>(object: &K) -> String {
            let meta = object.meta();
            let name = meta.name.as_deref().unwrap_or("unknown");
            match meta.namespace.as_deref() {
                Some(namespace) => format!("{namespace}/{name}"),
                None => name.to_string(),
            }
        }
        match self {
            ResourceEvent::Secret(n) => key(&n.object),
            ResourceEvent::Namespace(n) => key(&n.object),
            ResourceEvent::SyncRule(n) => key(&n.object),
        }
    }
}

/// One item of a decoded watch stream
#[derive(Debug, Clone)]
pub enum WatchItem {
    /// An object changed
    Event(ResourceEvent),
    /// The server's progress marker; only advances the resume point
    Bookmark { resource_version: String },
}

impl WatchItem {
    /// Version a reopened watch should resume from, if the item carries one
    #[must_use]
    pub fn resource_version(&self) -> Option<&str> {
        match self {
            WatchItem::Event(event) => event.resource_version(),
            WatchItem::Bookmark { resource_version } => Some(resource_version),
        }
    }
}

impl From<ResourceEvent> for WatchItem {
    fn from(event: ResourceEvent) -> Self {
        WatchItem::Event(event)
    }
}

/// A decoded watch feed; `Err` items are per-notification failures
pub type EventStream = BoxStream<'static, Result<WatchItem>>;

/// Kubernetes API operations consumed by the reconciliation engine
///
/// No state is cached between calls; every read goes to the API server.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// List every namespace in the cluster
    async fn list_namespaces(&self) -> Result<Vec<Namespace>>;

    /// Get a Secret, returning `None` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// Create a Secret in `namespace`
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret>;

    /// Replace an existing Secret in `namespace`
    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret>;

    /// Delete a Secret by name
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()>;

    /// List Secrets in one namespace
    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>>;

    /// List SecretSyncRules across all namespaces
    async fn list_sync_rules(&self) -> Result<Vec<SecretSyncRule>>;

    /// Open a watch stream for `kind`
    ///
    /// `namespace` scopes namespaced kinds (`None` watches all namespaces).
    /// The stream ends when the API server closes it; callers re-open.
    async fn watch(
        &self,
        kind: WatchKind,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> Result<EventStream>;
}

/// Name of a Kubernetes object, or `""` when unset
#[must_use]
pub fn object_name<K: Resource>(object: &K) -> &str {
    object.meta().name.as_deref().unwrap_or_default()
}

/// Namespace of a Kubernetes object, or `""` when unset
#[must_use]
pub fn object_namespace<K: Resource>(object: &K) -> &str {
    object.meta().namespace.as_deref().unwrap_or_default()
}
