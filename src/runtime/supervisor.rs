//! # Watch Supervisor
//!
//! Owns the three watch feeds and the single dispatch loop.
//!
//! The loop waits on whichever feed has a notification (or on the shutdown
//! signal), handles exactly one notification to completion, then waits
//! again. Handlers never run concurrently with each other.
//!
//! Each [`WatchFeed`] heals itself: a closed stream is reopened from the
//! last seen `resourceVersion` (bookmarks included), an expired version
//! replays from scratch, and failed opens back off exponentially. A
//! server-side timeout is a normal end and reopens at once; only streams
//! that close right after opening without delivering anything back off.
//! A feed never ends, and [`WatchFeed::next`] is cancel-safe so losing a
//! `select!` race never drops a notification.

use crate::cluster::{ClusterApi, EventStream, ResourceEvent, WatchItem, WatchKind};
use crate::constants::{HEALTHY_WATCH_LIFETIME_MS, REPLAY_RESOURCE_VERSION};
use crate::controller::backoff::ExponentialBackoff;
use crate::controller::dispatcher::{Dispatcher, SyncContext};
use crate::observability::metrics;
use crate::runtime::error_policy::handle_watch_error;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Delay bounds for reopening a watch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchBackoff {
    pub start: Duration,
    pub max: Duration,
}

impl WatchBackoff {
    fn build(self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.start, self.max)
    }
}

/// A never-ending, self-reopening feed of notifications for one kind
pub struct WatchFeed {
    cluster: Arc<dyn ClusterApi>,
    kind: WatchKind,
    namespace: Option<String>,
    resource_version: String,
    stream: Option<EventStream>,
    /// Whether the open stream has delivered anything yet
    delivered: bool,
    opened_at: Instant,
    backoff: ExponentialBackoff,
}

impl std::fmt::Debug for WatchFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchFeed")
            .field("kind", &self.kind)
            .field("namespace", &self.namespace)
            .field("resource_version", &self.resource_version)
            .field("open", &self.stream.is_some())
            .finish_non_exhaustive()
    }
}

impl WatchFeed {
    #[must_use]
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        kind: WatchKind,
        namespace: Option<String>,
        backoff: WatchBackoff,
    ) -> Self {
        Self {
            cluster,
            kind,
            namespace,
            resource_version: REPLAY_RESOURCE_VERSION.to_string(),
            stream: None,
            delivered: false,
            opened_at: Instant::now(),
            backoff: backoff.build(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> WatchKind {
        self.kind
    }

    /// Last `resourceVersion` seen, where the next reopen resumes
    #[must_use]
    pub fn resource_version(&self) -> &str {
        &self.resource_version
    }

    /// Wait for the next notification, reopening the stream as needed
    ///
    /// Cancel-safe: state only changes once a notification is in hand or
    /// the stream is known to be gone.
    pub async fn next(&mut self) -> ResourceEvent {
        loop {
            if self.stream.is_none() {
                self.stream = self.open().await;
            }
            let Some(stream) = self.stream.as_mut() else {
                continue;
            };

            match stream.next().await {
                Some(Ok(item)) => {
                    self.delivered = true;
                    self.backoff.reset();
                    if let Some(version) = item.resource_version() {
                        self.resource_version = version.to_string();
                    }
                    match item {
                        WatchItem::Event(event) => return event,
                        WatchItem::Bookmark { .. } => {
                            debug!(
                                kind = self.kind.as_str(),
                                resource_version = self.resource_version.as_str(),
                                "Watch bookmark"
                            );
                        }
                    }
                }
                Some(Err(e)) => {
                    let class = handle_watch_error(self.kind, &e);
                    if !class.needs_backoff() {
                        self.resource_version = REPLAY_RESOURCE_VERSION.to_string();
                        self.stream = None;
                    }
                }
                None => {
                    debug!(kind = self.kind.as_str(), "Watch stream closed, reopening");
                    self.stream = None;
                    let healthy = self.opened_at.elapsed()
                        >= Duration::from_millis(HEALTHY_WATCH_LIFETIME_MS);
                    if healthy {
                        self.backoff.reset();
                    } else if !self.delivered {
                        tokio::time::sleep(self.backoff.next_backoff()).await;
                    }
                }
            }
        }
    }

    async fn open(&mut self) -> Option<EventStream> {
        match self
            .cluster
            .watch(self.kind, self.namespace.as_deref(), &self.resource_version)
            .await
        {
            Ok(stream) => {
                debug!(
                    kind = self.kind.as_str(),
                    resource_version = self.resource_version.as_str(),
                    "Watch opened"
                );
                metrics::increment_watch_opens(self.kind.as_str());
                self.delivered = false;
                self.opened_at = Instant::now();
                Some(stream)
            }
            Err(e) => {
                let class = handle_watch_error(self.kind, &e);
                if class.needs_backoff() {
                    tokio::time::sleep(self.backoff.next_backoff()).await;
                } else {
                    self.resource_version = REPLAY_RESOURCE_VERSION.to_string();
                }
                None
            }
        }
    }
}

/// Multiplexes the three feeds onto the dispatcher
#[derive(Debug)]
pub struct Supervisor {
    dispatcher: Dispatcher,
    secrets: WatchFeed,
    namespaces: WatchFeed,
    rules: WatchFeed,
}

impl Supervisor {
    /// Build the feeds; the Secret watch is scoped to
    /// `secrets_namespace` when one is configured
    #[must_use]
    pub fn new(ctx: Arc<SyncContext>, backoff: WatchBackoff) -> Self {
        let cluster = Arc::clone(&ctx.cluster);
        let secrets_namespace = ctx.config.secrets_namespace.clone();
        Self {
            secrets: WatchFeed::new(
                Arc::clone(&cluster),
                WatchKind::Secret,
                secrets_namespace,
                backoff,
            ),
            namespaces: WatchFeed::new(Arc::clone(&cluster), WatchKind::Namespace, None, backoff),
            rules: WatchFeed::new(cluster, WatchKind::SyncRule, None, backoff),
            dispatcher: Dispatcher::new(ctx),
        }
    }

    /// Run until `shutdown` resolves
    ///
    /// The notification being handled when the signal arrives finishes
    /// first; the feeds are dropped on return.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Watching Secrets, Namespaces and SecretSyncRules");

        loop {
            let event = tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown signal received, closing watch streams");
                    break;
                }
                event = self.rules.next() => event,
                event = self.secrets.next() => event,
                event = self.namespaces.next() => event,
            };
            self.handle(event).await;
        }
    }

    async fn handle(&mut self, event: ResourceEvent) {
        let kind = event.kind().as_str();
        let event_type = event.event_type().as_str();
        let object = event.object_key();
        metrics::increment_notifications(kind, event_type);

        let started = Instant::now();
        let result = self.dispatcher.dispatch(event).await;
        metrics::observe_dispatch_duration(kind, started.elapsed().as_secs_f64());

        match result {
            Ok(report) if report.ignored => {
                debug!(kind, event = event_type, object = object.as_str(), "Notification ignored");
            }
            Ok(report) if report.failed > 0 => {
                metrics::increment_dispatch_errors(kind);
                warn!(
                    kind,
                    event = event_type,
                    object = object.as_str(),
                    created = report.created,
                    updated = report.updated,
                    deleted = report.deleted,
                    failed = report.failed,
                    "Notification handled with failures"
                );
            }
            Ok(report) => {
                debug!(
                    kind,
                    event = event_type,
                    object = object.as_str(),
                    created = report.created,
                    updated = report.updated,
                    unchanged = report.unchanged,
                    skipped = report.skipped,
                    deleted = report.deleted,
                    "Notification handled"
                );
            }
            Err(e) => {
                metrics::increment_dispatch_errors(kind);
                error!(kind, event = event_type, object = object.as_str(), error = %e, "Failed to handle notification");
            }
        }
    }
}
