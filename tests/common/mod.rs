//! Common test utilities
//!
//! An in-memory [`ClusterApi`] plus builders for the objects the controller
//! works with. No live cluster is needed.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::channel::mpsc;
use futures::StreamExt;
use k8s_openapi::api::core::v1::{Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube_secret_sync::cluster::{
    ClusterApi, EventStream, EventType, Notification, ResourceEvent, WatchItem, WatchKind,
};
use kube_secret_sync::config::SyncConfig;
use kube_secret_sync::constants::{MANAGED_BY_ANNOTATION_KEY, MANAGED_BY_ANNOTATION_VALUE};
use kube_secret_sync::controller::dispatcher::SyncContext;
use kube_secret_sync::crd::{
    NamespaceSelector, Rules, SecretReference, SecretSyncRule, SecretSyncRuleSpec,
};
use kube_secret_sync::error::{Error, Result};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Sender half of a scripted watch stream
pub type WatchSender = mpsc::UnboundedSender<Result<WatchItem>>;

enum WatchScript {
    Stream(mpsc::UnboundedReceiver<Result<WatchItem>>),
    Fail(Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Calls {
    pub creates: usize,
    pub updates: usize,
    pub deletes: usize,
    pub namespace_lists: usize,
    pub rule_lists: usize,
}

#[derive(Default)]
struct State {
    namespaces: Vec<Namespace>,
    secrets: BTreeMap<(String, String), Secret>,
    rules: Vec<SecretSyncRule>,
    calls: Calls,
    next_resource_version: u64,
    fail_namespace_list: bool,
    fail_rule_list: bool,
    fail_writes_in: Vec<String>,
    watches: HashMap<WatchKind, VecDeque<WatchScript>>,
    opened: Vec<(WatchKind, Option<String>, String)>,
}

/// In-memory cluster
#[derive(Default)]
pub struct FakeCluster {
    state: Mutex<State>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_namespaces(names: &[&str]) -> Arc<Self> {
        let cluster = Self::new();
        for name in names {
            cluster.add_namespace(namespace(name));
        }
        cluster
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake cluster state poisoned")
    }

    pub fn add_namespace(&self, namespace: Namespace) {
        self.state().namespaces.push(namespace);
    }

    /// Store a Secret directly, bypassing the call counters
    pub fn put_secret(&self, mut secret: Secret) {
        let mut state = self.state();
        state.next_resource_version += 1;
        secret.metadata.resource_version = Some(state.next_resource_version.to_string());
        let key = key_of(&secret);
        state.secrets.insert(key, secret);
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.state()
            .secrets
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
    }

    pub fn secret_count(&self) -> usize {
        self.state().secrets.len()
    }

    pub fn add_rule(&self, rule: SecretSyncRule) {
        self.state().rules.push(rule);
    }

    pub fn remove_rule(&self, namespace: &str, name: &str) {
        self.state().rules.retain(|rule| {
            rule.metadata.namespace.as_deref() != Some(namespace)
                || rule.metadata.name.as_deref() != Some(name)
        });
    }

    pub fn calls(&self) -> Calls {
        self.state().calls
    }

    pub fn fail_namespace_list(&self, fail: bool) {
        self.state().fail_namespace_list = fail;
    }

    pub fn fail_rule_list(&self, fail: bool) {
        self.state().fail_rule_list = fail;
    }

    /// Make every write into `namespace` fail
    pub fn fail_writes_in(&self, namespace: &str) {
        self.state().fail_writes_in.push(namespace.to_string());
    }

    /// Queue a scripted stream for the next `watch(kind)` call
    pub fn script_watch(&self, kind: WatchKind) -> WatchSender {
        let (tx, rx) = mpsc::unbounded();
        self.state()
            .watches
            .entry(kind)
            .or_default()
            .push_back(WatchScript::Stream(rx));
        tx
    }

    /// Make the next `watch(kind)` call fail
    pub fn fail_next_watch(&self, kind: WatchKind, error: Error) {
        self.state()
            .watches
            .entry(kind)
            .or_default()
            .push_back(WatchScript::Fail(error));
    }

    /// Every watch open attempt as `(kind, namespace, resource_version)`
    pub fn opened_watches(&self) -> Vec<(WatchKind, Option<String>, String)> {
        self.state().opened.clone()
    }

    fn check_writable(state: &State, namespace: &str) -> Result<()> {
        if state.fail_writes_in.iter().any(|ns| ns == namespace) {
            return Err(fake_error(format!("writes to {namespace} are failing")));
        }
        Ok(())
    }
}

fn fake_error(message: String) -> Error {
    Error::Config { message }
}

fn key_of(secret: &Secret) -> (String, String) {
    (
        secret.metadata.namespace.clone().unwrap_or_default(),
        secret.metadata.name.clone().unwrap_or_default(),
    )
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let mut state = self.state();
        state.calls.namespace_lists += 1;
        if state.fail_namespace_list {
            return Err(fake_error("namespace list unavailable".to_string()));
        }
        Ok(state.namespaces.clone())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret> {
        let mut state = self.state();
        Self::check_writable(&state, namespace)?;
        let mut secret = secret.clone();
        secret.metadata.namespace = Some(namespace.to_string());
        let key = key_of(&secret);
        if state.secrets.contains_key(&key) {
            return Err(fake_error(format!("{}/{} already exists", key.0, key.1)));
        }
        state.calls.creates += 1;
        state.next_resource_version += 1;
        secret.metadata.resource_version = Some(state.next_resource_version.to_string());
        state.secrets.insert(key, secret.clone());
        Ok(secret)
    }

    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret> {
        let mut state = self.state();
        Self::check_writable(&state, namespace)?;
        let mut secret = secret.clone();
        secret.metadata.namespace = Some(namespace.to_string());
        let key = key_of(&secret);
        let current = state
            .secrets
            .get(&key)
            .ok_or_else(|| fake_error(format!("{}/{} not found", key.0, key.1)))?;
        if current.metadata.resource_version != secret.metadata.resource_version {
            return Err(fake_error(format!("{}/{} conflict", key.0, key.1)));
        }
        state.calls.updates += 1;
        state.next_resource_version += 1;
        secret.metadata.resource_version = Some(state.next_resource_version.to_string());
        state.secrets.insert(key, secret.clone());
        Ok(secret)
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()> {
        let mut state = self.state();
        Self::check_writable(&state, namespace)?;
        state.calls.deletes += 1;
        state
            .secrets
            .remove(&(namespace.to_string(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| fake_error(format!("{namespace}/{name} not found")))
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>> {
        Ok(self
            .state()
            .secrets
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, secret)| secret.clone())
            .collect())
    }

    async fn list_sync_rules(&self) -> Result<Vec<SecretSyncRule>> {
        let mut state = self.state();
        state.calls.rule_lists += 1;
        if state.fail_rule_list {
            return Err(fake_error("the server could not find the requested resource".to_string()));
        }
        Ok(state.rules.clone())
    }

    async fn watch(
        &self,
        kind: WatchKind,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> Result<EventStream> {
        let mut state = self.state();
        state.opened.push((
            kind,
            namespace.map(str::to_string),
            resource_version.to_string(),
        ));
        match state.watches.get_mut(&kind).and_then(VecDeque::pop_front) {
            Some(WatchScript::Stream(rx)) => Ok(rx.boxed()),
            Some(WatchScript::Fail(error)) => Err(error),
            None => Ok(futures::stream::pending().boxed()),
        }
    }
}

/// Sync context over `cluster` whose process started at `started`
pub fn context_started(
    cluster: &Arc<FakeCluster>,
    config: SyncConfig,
    started: &str,
) -> Arc<SyncContext> {
    let start_time = DateTime::parse_from_rfc3339(started)
        .expect("start time should parse")
        .with_timezone(&Utc);
    Arc::new(SyncContext::with_start_time(
        Arc::clone(cluster) as Arc<dyn ClusterApi>,
        config,
        start_time,
    ))
}

/// Sync context over `cluster` that started at noon on 2024-01-01
pub fn context(cluster: &Arc<FakeCluster>, config: SyncConfig) -> Arc<SyncContext> {
    context_started(cluster, config, START_TIME)
}

pub const START_TIME: &str = "2024-01-01T12:00:00Z";

pub fn namespace(name: &str) -> Namespace {
    Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        ..Namespace::default()
    }
}

/// A namespace with an RFC 3339 creation timestamp
pub fn namespace_created(name: &str, timestamp: &str) -> Namespace {
    serde_json::from_value(serde_json::json!({
        "metadata": { "name": name, "creationTimestamp": timestamp, "resourceVersion": "1" }
    }))
    .expect("namespace should deserialize")
}

pub fn secret(namespace: &str, name: &str, value: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            ..ObjectMeta::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(BTreeMap::from([(
            "token".to_string(),
            ByteString(value.as_bytes().to_vec()),
        )])),
        ..Secret::default()
    }
}

/// A Secret that carries the managed-by marker
pub fn managed_secret(namespace: &str, name: &str, value: &str) -> Secret {
    let mut secret = secret(namespace, name, value);
    secret.metadata.annotations = Some(BTreeMap::from([(
        MANAGED_BY_ANNOTATION_KEY.to_string(),
        MANAGED_BY_ANNOTATION_VALUE.to_string(),
    )]));
    secret
}

pub fn token(secret: &Secret) -> String {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get("token"))
        .map(|value| String::from_utf8_lossy(&value.0).into_owned())
        .unwrap_or_default()
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_string()).collect()
}

pub fn include(namespaces: &[&str]) -> NamespaceSelector {
    NamespaceSelector {
        include: strings(namespaces),
        ..NamespaceSelector::default()
    }
}

/// A rule in `default` replicating `source_namespace/source_name`
pub fn rule(
    name: &str,
    source_namespace: &str,
    source_name: &str,
    namespaces: NamespaceSelector,
    force: Option<bool>,
) -> SecretSyncRule {
    let mut rule = SecretSyncRule::new(
        name,
        SecretSyncRuleSpec {
            secret: SecretReference {
                name: source_name.to_string(),
                namespace: source_namespace.to_string(),
            },
            rules: Rules { namespaces, force },
        },
    );
    rule.metadata.namespace = Some("default".to_string());
    rule
}

pub fn secret_event(event_type: EventType, secret: Secret) -> ResourceEvent {
    ResourceEvent::Secret(Notification::new(event_type, secret))
}

pub fn namespace_event(event_type: EventType, namespace: Namespace) -> ResourceEvent {
    ResourceEvent::Namespace(Notification::new(event_type, namespace))
}

pub fn rule_event(event_type: EventType, rule: SecretSyncRule) -> ResourceEvent {
    ResourceEvent::SyncRule(Box::new(Notification::new(event_type, rule)))
}

/// Push an object event onto a scripted watch
pub fn send(tx: &WatchSender, event: ResourceEvent) {
    tx.unbounded_send(Ok(event.into()))
        .expect("watch receiver should be alive");
}

/// Push a bookmark onto a scripted watch
pub fn send_bookmark(tx: &WatchSender, resource_version: &str) {
    tx.unbounded_send(Ok(WatchItem::Bookmark {
        resource_version: resource_version.to_string(),
    }))
    .expect("watch receiver should be alive");
}

/// Push an in-stream failure onto a scripted watch
pub fn send_error(tx: &WatchSender, error: Error) {
    tx.unbounded_send(Err(error))
        .expect("watch receiver should be alive");
}
