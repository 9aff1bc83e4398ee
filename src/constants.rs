//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Annotation key written onto every replica the controller authors
pub const MANAGED_BY_ANNOTATION_KEY: &str = "app.kubernetes.io/managed-by";

/// Annotation value paired with [`MANAGED_BY_ANNOTATION_KEY`]
pub const MANAGED_BY_ANNOTATION_VALUE: &str = "kube-secret-sync";

/// Annotation injected by `kubectl apply`; never copied onto replicas
pub const LAST_APPLIED_ANNOTATION_KEY: &str = "kubectl.kubernetes.io/last-applied-configuration";

/// Bookkeeping annotations stripped before copying or comparing
pub const BOOKKEEPING_ANNOTATIONS: [&str; 2] =
    [MANAGED_BY_ANNOTATION_KEY, LAST_APPLIED_ANNOTATION_KEY];

/// API group of the SecretSyncRule custom resource
pub const CRD_GROUP: &str = "kube-secret-sync.io";

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default watch re-open backoff starting value (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_START_MS: u64 = 500;

/// Default watch re-open backoff maximum value (milliseconds)
pub const DEFAULT_WATCH_BACKOFF_MAX_MS: u64 = 30_000;

/// A watch that stays open at least this long (milliseconds) ended normally,
/// even if it delivered nothing
pub const HEALTHY_WATCH_LIFETIME_MS: u64 = 5_000;

/// Resource version that asks the API server for a full replay
pub const REPLAY_RESOURCE_VERSION: &str = "0";

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "kube_secret_sync=info";

/// Log filter used with `--debug`
pub const DEBUG_LOG_FILTER: &str = "kube_secret_sync=debug";
