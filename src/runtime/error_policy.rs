//! # Error Policy
//!
//! Classification of watch failures and the recovery each class gets.

use crate::cluster::WatchKind;
use crate::error::Error;
use crate::observability::metrics;
use tracing::{error, warn};

/// How a watch failure should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// Resource version too old (410); replay from scratch
    Expired,
    /// Credentials rejected (401/403)
    Unauthorized,
    /// API server throttling or still initializing (429)
    Throttled,
    /// The watched resource type does not exist (404), usually a missing CRD
    NotFound,
    /// Anything else
    Other,
}

impl WatchErrorClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WatchErrorClass::Expired => "expired",
            WatchErrorClass::Unauthorized => "unauthorized",
            WatchErrorClass::Throttled => "throttled",
            WatchErrorClass::NotFound => "not_found",
            WatchErrorClass::Other => "other",
        }
    }

    /// Whether the feed should reopen only after a backoff delay
    #[must_use]
    pub fn needs_backoff(self) -> bool {
        !matches!(self, WatchErrorClass::Expired)
    }
}

/// Classify a watch failure by its API status code
#[must_use]
pub fn classify_watch_error(error: &Error) -> WatchErrorClass {
    if error.is_gone() {
        return WatchErrorClass::Expired;
    }
    match error {
        Error::Kube {
            source: kube::Error::Api(response),
        } => match response.code {
            401 | 403 => WatchErrorClass::Unauthorized,
            404 => WatchErrorClass::NotFound,
            429 => WatchErrorClass::Throttled,
            _ => WatchErrorClass::Other,
        },
        _ => WatchErrorClass::Other,
    }
}

/// Log a watch failure with diagnostics for its class and count it
pub fn handle_watch_error(kind: WatchKind, error: &Error) -> WatchErrorClass {
    let class = classify_watch_error(error);
    metrics::increment_watch_errors(kind.as_str(), class.as_str());

    match class {
        WatchErrorClass::Expired => {
            warn!(
                kind = kind.as_str(),
                "Watch resource version expired (410), replaying from scratch"
            );
        }
        WatchErrorClass::Unauthorized => {
            error!(
                kind = kind.as_str(),
                error = %error,
                "Watch authentication failed - RBAC may have been revoked or token expired"
            );
            error!("Verify the ServiceAccount can list and watch secrets, namespaces and secretsyncrules");
        }
        WatchErrorClass::Throttled => {
            warn!(
                kind = kind.as_str(),
                error = %error,
                "API server throttling or storage reinitializing (429), backing off"
            );
        }
        WatchErrorClass::NotFound => {
            error!(
                kind = kind.as_str(),
                error = %error,
                "Watched resource not found (404). Is the CRD installed?"
            );
            if kind == WatchKind::SyncRule {
                error!("Installation: crdgen | kubectl apply -f -");
            }
        }
        WatchErrorClass::Other => {
            error!(kind = kind.as_str(), error = %error, "Watch stream error");
        }
    }

    class
}
