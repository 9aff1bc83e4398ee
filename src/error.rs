//! # Errors
//!
//! Error taxonomy for the controller.
//!
//! Configuration errors (malformed patterns) are fatal at startup. Cluster
//! API errors are logged with the resource identity and returned to the
//! immediate caller; the next notification is the retry. Policy skips are
//! not errors and never appear here.

use thiserror::Error;

/// Main error type for kube-secret-sync operations
#[derive(Debug, Error)]
pub enum Error {
    /// A namespace include/exclude pattern failed to compile
    #[error("invalid regular expression `{pattern}`: {source}")]
    InvalidPattern {
        /// The pattern as written in the rule or flag
        pattern: String,
        /// The underlying regex error
        #[source]
        source: regex::Error,
    },

    /// A SecretSyncRule could not be turned into a usable matcher
    #[error("invalid SecretSyncRule {rule}: {message}")]
    InvalidRule {
        /// `namespace/name` of the offending rule
        rule: String,
        /// Description of what's invalid
        message: String,
    },

    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// The watch resource version is too old (HTTP 410); the stream must replay
    #[error("watch resource version expired")]
    WatchExpired,

    /// The API server reported an error inside a watch stream
    #[error("watch error for {kind}: {message}")]
    Watch {
        /// Resource kind being watched
        kind: &'static str,
        /// Message from the API server
        message: String,
    },

    /// Invalid controller configuration
    #[error("configuration error: {message}")]
    Config {
        /// Description of what's invalid
        message: String,
    },
}

impl Error {
    /// Whether this error came back as an HTTP 404 from the API server
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(response) } if response.code == 404)
    }

    /// Whether a watch must restart from a full replay (HTTP 410 Gone)
    #[must_use]
    pub fn is_gone(&self) -> bool {
        match self {
            Error::WatchExpired => true,
            Error::Kube {
                source: kube::Error::Api(response),
            } => response.code == 410,
            _ => false,
        }
    }
}

/// Convenience alias used across the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;
