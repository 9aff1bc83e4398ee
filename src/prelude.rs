//! Commonly used types and traits

pub use crate::cluster::{
    ClusterApi, EventStream, EventType, KubeCluster, Notification, ResourceEvent, WatchItem,
    WatchKind,
};
pub use crate::config::{ClusterAccess, ControllerConfig, SyncConfig};
pub use crate::controller::dispatcher::{DispatchReport, Dispatcher, SyncContext};
pub use crate::controller::filter::NameFilter;
pub use crate::controller::reconciler::{Reconciler, SyncOutcome};
pub use crate::controller::rules::{CompiledRule, RuleDefaults, SyncRuleSet};
pub use crate::crd::{NamespaceSelector, Rules, SecretReference, SecretSyncRule, SecretSyncRuleSpec};
pub use crate::error::{Error, Result};
