//! # Kubernetes-backed Cluster API
//!
//! [`ClusterApi`] implementation on top of a `kube::Client`.

use super::{
    ClusterApi, EventStream, EventType, Notification, ResourceEvent, WatchItem, WatchKind,
};
use crate::crd::SecretSyncRule;
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::{Namespace, Secret};
use kube::api::{Api, DeleteParams, ListParams, PostParams, WatchEvent, WatchParams};
use kube::Client;
use tracing::debug;

/// Cluster API backed by a live `kube::Client`
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

impl KubeCluster {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn scoped<K>(&self, namespace: Option<&str>) -> Api<K>
    where
        K: kube::Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        match namespace {
            Some(namespace) => Api::namespaced(self.client.clone(), namespace),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn list_namespaces(&self) -> Result<Vec<Namespace>> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.secrets(namespace).get_opt(name).await?)
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret> {
        Ok(self
            .secrets(namespace)
            .create(&PostParams::default(), secret)
            .await?)
    }

    async fn update_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret> {
        let name = secret.metadata.name.as_deref().ok_or_else(|| Error::Config {
            message: format!("cannot update a Secret without a name in namespace {namespace}"),
        })?;
        Ok(self
            .secrets(namespace)
            .replace(name, &PostParams::default(), secret)
            .await?)
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<()> {
        self.secrets(namespace)
            .delete(name, &DeleteParams::default())
            .await?;
        Ok(())
    }

    async fn list_secrets(&self, namespace: &str) -> Result<Vec<Secret>> {
        Ok(self
            .secrets(namespace)
            .list(&ListParams::default())
            .await?
            .items)
    }

    async fn list_sync_rules(&self) -> Result<Vec<SecretSyncRule>> {
        let api: Api<SecretSyncRule> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn watch(
        &self,
        kind: WatchKind,
        namespace: Option<&str>,
        resource_version: &str,
    ) -> Result<EventStream> {
        debug!(
            kind = kind.as_str(),
            namespace = namespace.unwrap_or("*"),
            resource_version,
            "watch.open"
        );
        let params = WatchParams::default();
        let stream = match kind {
            WatchKind::Secret => {
                let api: Api<Secret> = self.scoped(namespace);
                decode(kind, api.watch(&params, resource_version).await?, ResourceEvent::Secret)
            }
            WatchKind::Namespace => {
                let api: Api<Namespace> = Api::all(self.client.clone());
                decode(
                    kind,
                    api.watch(&params, resource_version).await?,
                    ResourceEvent::Namespace,
                )
            }
            WatchKind::SyncRule => {
                let api: Api<SecretSyncRule> = self.scoped(namespace);
                decode(kind, api.watch(&params, resource_version).await?, |n| {
                    ResourceEvent::SyncRule(Box::new(n))
                })
            }
        };
        Ok(stream)
    }
}

/// Decode raw watch events into [`WatchItem`]s
///
/// Bookmarks become [`WatchItem::Bookmark`] so the feed can move its resume
/// point without dispatching anything. An in-stream HTTP 410 becomes
/// [`Error::WatchExpired`] so the feed knows to replay; objects that fail to
/// deserialize surface as per-item errors and the stream continues.
fn decode<K, S, F>(kind: WatchKind, stream: S, wrap: F) -> EventStream
where
    K: Send + 'static,
    S: Stream<Item = kube::Result<WatchEvent<K>>> + Send + 'static,
    F: Fn(Notification<K>) -> ResourceEvent + Send + Sync + 'static,
{
    stream
        .filter_map(move |item| {
            let decoded = match item {
                Ok(WatchEvent::Added(object)) => Some(Ok(WatchItem::Event(wrap(
                    Notification::new(EventType::Added, object),
                )))),
                Ok(WatchEvent::Modified(object)) => Some(Ok(WatchItem::Event(wrap(
                    Notification::new(EventType::Modified, object),
                )))),
                Ok(WatchEvent::Deleted(object)) => Some(Ok(WatchItem::Event(wrap(
                    Notification::new(EventType::Deleted, object),
                )))),
                Ok(WatchEvent::Bookmark(bookmark)) => Some(Ok(WatchItem::Bookmark {
                    resource_version: bookmark.metadata.resource_version,
                })),
                Ok(WatchEvent::Error(status)) if status.code == 410 => {
                    Some(Err(Error::WatchExpired))
                }
                Ok(WatchEvent::Error(status)) => Some(Err(Error::Watch {
                    kind: kind.as_str(),
                    message: status.message.clone(),
                })),
                Err(source) => Some(Err(Error::Kube { source })),
            };
            futures::future::ready(decoded)
        })
        .boxed()
}
