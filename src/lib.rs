//! kube-secret-sync Library
//!
//! A Kubernetes controller that replicates a source Secret into other
//! namespaces according to `SecretSyncRule` resources, and keeps the
//! replicas in step as the source, the namespaces or the rules change.
//! Tests are included in the module files and under `tests/`.
//!
//! ## Quick Start
//!
//! ```rust
//! use kube_secret_sync::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod cli;
pub mod cluster;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod error;
pub mod observability;
pub mod prelude;
pub mod runtime;
pub mod server;

pub use error::{Error, Result};
