//! # kube-secret-sync
//!
//! A Kubernetes controller that replicates Secrets across namespaces.
//!
//! ## Overview
//!
//! 1. **Watching SecretSyncRules** - each rule names one source Secret and the namespaces it belongs in
//! 2. **Watching Secrets** - changes to a source are pushed to every target namespace
//! 3. **Watching Namespaces** - new namespaces receive replicas as soon as they appear
//! 4. **Respecting ownership** - Secrets the controller did not create are only touched with `force`
//!
//! ## Features
//!
//! - **Include/exclude lists**: exact names and regular expressions per rule
//! - **Protected namespaces**: controller-wide exclusions no rule can override
//! - **Prometheus metrics**: exposes metrics for monitoring and observability
//! - **Health probes**: HTTP endpoints for liveness and readiness checks

use anyhow::Result;
use clap::Parser;
use kube_secret_sync::cli::{Cli, Commands};
use kube_secret_sync::runtime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start(args) => {
            let debug = args.debug;
            let sync_config = args.into_sync_config()?;
            runtime::run(sync_config, debug).await
        }
        Commands::Version => {
            println!(
                "kube-secret-sync {} (git {}, built {})",
                env!("CARGO_PKG_VERSION"),
                env!("BUILD_GIT_HASH"),
                env!("BUILD_DATETIME")
            );
            Ok(())
        }
    }
}
