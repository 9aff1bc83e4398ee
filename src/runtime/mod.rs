//! # Runtime
//!
//! - `initialization.rs` - rustls, tracing, metrics server, client, startup inventory
//! - `supervisor.rs` - watch feeds and the dispatch loop
//! - `error_policy.rs` - watch failure classification

pub mod error_policy;
pub mod initialization;
pub mod supervisor;

use crate::config::SyncConfig;
use crate::controller::dispatcher::SyncContext;
use anyhow::Result;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use supervisor::{Supervisor, WatchBackoff};
use tracing::{info, warn};

/// Run the controller until SIGINT, SIGTERM, SIGHUP or SIGQUIT
///
/// # Errors
///
/// Returns startup failures (client construction, metrics registration).
/// Nothing after startup is fatal.
pub async fn run(sync_config: SyncConfig, debug: bool) -> Result<()> {
    let start_time = Utc::now();
    let init = initialization::initialize(&sync_config, debug).await?;

    let backoff = WatchBackoff {
        start: init.controller_config.watch_backoff_start(),
        max: init.controller_config.watch_backoff_max(),
    };
    let ctx = Arc::new(SyncContext::with_start_time(
        init.cluster,
        sync_config,
        start_time,
    ));
    info!(start_time = %ctx.start_time, "Controller start time captured");

    let supervisor = Supervisor::new(ctx, backoff);
    init.server_state.is_ready.store(true, Ordering::Relaxed);

    supervisor.run(shutdown_signal()).await;

    init.server_state.is_ready.store(false, Ordering::Relaxed);
    info!("Controller stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM, SIGHUP or SIGQUIT on unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = {
        use tokio::signal::unix::SignalKind;
        async {
            tokio::select! {
                () = unix_signal(SignalKind::terminate(), "SIGTERM") => {},
                () = unix_signal(SignalKind::hangup(), "SIGHUP") => {},
                () = unix_signal(SignalKind::quit(), "SIGQUIT") => {},
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

/// Resolves on the first delivery of `kind`; never resolves if the
/// handler cannot be installed
#[cfg(unix)]
async fn unix_signal(kind: tokio::signal::unix::SignalKind, name: &'static str) {
    match tokio::signal::unix::signal(kind) {
        Ok(mut signal) => {
            signal.recv().await;
            info!(signal = name, "Shutdown signal received");
        }
        Err(e) => {
            warn!("Failed to listen for {}: {}", name, e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Duration;

    /// Install the handlers, then deliver `signal` to this process
    async fn stops_on(signal: &str) {
        let mut shutdown = Box::pin(shutdown_signal());
        assert!(futures::poll!(shutdown.as_mut()).is_pending());

        let status = std::process::Command::new("kill")
            .arg(format!("-{signal}"))
            .arg(std::process::id().to_string())
            .status()
            .expect("kill should run");
        assert!(status.success());

        tokio::time::timeout(Duration::from_secs(5), shutdown)
            .await
            .expect("shutdown should resolve on the signal");
    }

    #[tokio::test]
    async fn test_shutdown_on_sighup() {
        stops_on("HUP").await;
    }

    #[tokio::test]
    async fn test_shutdown_on_sigquit() {
        stops_on("QUIT").await;
    }
}
