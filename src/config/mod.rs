//! # Configuration
//!
//! - `controller.rs` - process-level settings from environment variables
//! - `sync.rs` - reconciliation settings from the command line

mod controller;
mod sync;

pub use controller::{ControllerConfig, LogFormat};
pub use sync::{ClusterAccess, SyncConfig};
