//! # Initialization
//!
//! Controller startup: rustls setup, tracing, metrics, the HTTP server,
//! Kubernetes client construction and the startup inventory.

use crate::cluster::{object_name, ClusterApi, KubeCluster};
use crate::config::{ClusterAccess, ControllerConfig, LogFormat, SyncConfig};
use crate::constants::{DEBUG_LOG_FILTER, DEFAULT_LOG_FILTER};
use crate::controller::rules::SyncRuleSet;
use crate::observability;
use crate::server::{start_server, ServerState};
use anyhow::{Context, Result};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::Client;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Everything the run loop needs once startup is done
pub struct InitializationResult {
    pub cluster: Arc<dyn ClusterApi>,
    /// Server state for health checks
    pub server_state: Arc<ServerState>,
    pub controller_config: ControllerConfig,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field(
                "server_ready",
                &self
                    .server_state
                    .is_ready
                    .load(std::sync::atomic::Ordering::Relaxed),
            )
            .field("controller_config", &self.controller_config)
            .finish_non_exhaustive()
    }
}

/// What the startup inventory found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupSummary {
    /// Whether SecretSyncRules could be listed at all
    pub crd_queryable: bool,
    pub rules: usize,
    /// Rules that failed to compile
    pub invalid_rules: usize,
    /// `namespace/name` of source Secrets that do not exist
    pub missing_sources: Vec<String>,
    /// `namespace/name` of sources outside the watched secrets namespace;
    /// their changes are never seen
    pub unwatched_sources: Vec<String>,
}

/// Initialize the controller runtime
///
/// This function handles:
/// - rustls crypto provider setup
/// - Tracing subscriber setup
/// - Metrics registration
/// - HTTP server startup
/// - Kubernetes client creation
/// - Startup inventory of existing SecretSyncRules
pub async fn initialize(sync_config: &SyncConfig, debug: bool) -> Result<InitializationResult> {
    // Required for rustls 0.23+ when no default provider is set via features
    let crypto_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    let controller_config = ControllerConfig::from_env();
    init_tracing(controller_config.log_format, debug);
    if !crypto_installed {
        debug!("rustls crypto provider was already installed");
    }

    info!("Starting kube-secret-sync");
    info!(
        "Build info: timestamp={}, datetime={}, git_hash={}",
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState {
        is_ready: Arc::new(AtomicBool::new(false)),
    });

    if controller_config.enable_metrics {
        let server_state_clone = Arc::clone(&server_state);
        let server_port = controller_config.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = start_server(server_port, server_state_clone).await {
                error!("HTTP server error: {}", e);
            }
        });
    } else {
        info!("Metrics server disabled (ENABLE_METRICS=false)");
    }

    let client = build_client(&sync_config.cluster_access).await?;
    let cluster: Arc<dyn ClusterApi> = Arc::new(KubeCluster::new(client));

    startup_inventory(cluster.as_ref(), sync_config).await;

    info!("Controller initialized, starting watch loop...");

    Ok(InitializationResult {
        cluster,
        server_state,
        controller_config,
    })
}

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins unless `debug` is set.
pub fn init_tracing(format: LogFormat, debug: bool) {
    let filter = if debug {
        EnvFilter::new(DEBUG_LOG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };

    if let Err(e) = result {
        warn!("Tracing subscriber already initialized: {}", e);
    }
}

/// Build a client for the configured access mode
///
/// # Errors
///
/// Fails when the service account or kubeconfig cannot be loaded.
pub async fn build_client(access: &ClusterAccess) -> Result<Client> {
    let config = match access {
        ClusterAccess::InCluster => {
            info!("Using in-cluster configuration");
            kube::Config::incluster().context("Failed to load in-cluster configuration")?
        }
        ClusterAccess::Kubeconfig(path) => {
            info!(path = %path.display(), "Using kubeconfig");
            let kubeconfig = Kubeconfig::read_from(path)
                .with_context(|| format!("Failed to read kubeconfig {}", path.display()))?;
            kube::Config::from_custom_kubeconfig(kubeconfig, &KubeConfigOptions::default())
                .await
                .context("Failed to load kubeconfig")?
        }
    };

    Client::try_from(config).context("Failed to create Kubernetes client")
}

/// Summarize existing SecretSyncRules before the watch starts
///
/// Never fatal: the SecretSyncRule watch replays every rule anyway, so this
/// only surfaces problems early.
#[tracing::instrument(skip_all, name = "controller.startup.inventory")]
pub async fn startup_inventory(
    cluster: &dyn ClusterApi,
    sync_config: &SyncConfig,
) -> StartupSummary {
    let mut summary = StartupSummary::default();
    let rules = match cluster.list_sync_rules().await {
        Ok(rules) => rules,
        Err(e) => {
            error!("CRD is not queryable; {}. Is the CRD installed?", e);
            error!("Installation: crdgen | kubectl apply -f -");
            warn!("Continuing despite CRD queryability check failure - the watch will retry");
            return summary;
        }
    };
    summary.crd_queryable = true;
    summary.rules = rules.len();

    if rules.is_empty() {
        info!("No existing SecretSyncRule resources found, watch will pick up new resources");
        return summary;
    }

    let mut rules_by_namespace: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for rule in &rules {
        rules_by_namespace
            .entry(rule.metadata.namespace.as_deref().unwrap_or("default"))
            .or_default()
            .push(object_name(rule));
    }

    info!("kube-secret-sync - Startup Resource Summary");
    info!("Resource Kind: SecretSyncRule");
    info!("Total Resources: {}", rules.len());
    info!("Namespaces: {}", rules_by_namespace.len());
    for (namespace, names) in &mut rules_by_namespace {
        names.sort_unstable();
        info!("  {} ({}): {}", namespace, names.len(), names.join(", "));
    }

    let compiled = SyncRuleSet::compile(&rules, &sync_config.rule_defaults());
    summary.invalid_rules = rules.len() - compiled.len();

    let mut secrets_by_namespace: HashMap<String, HashSet<String>> = HashMap::new();
    for rule in compiled.iter() {
        let source = rule.source();
        if let Some(watched) = sync_config.secrets_namespace.as_deref() {
            if source.namespace != watched {
                let unwatched = format!("{}/{}", source.namespace, source.name);
                warn!(
                    rule = rule.key(),
                    source = unwatched.as_str(),
                    secrets_namespace = watched,
                    "Source Secret is outside the watched namespace; its changes will not be replicated"
                );
                summary.unwatched_sources.push(unwatched);
            }
        }
        if !secrets_by_namespace.contains_key(&source.namespace) {
            match cluster.list_secrets(&source.namespace).await {
                Ok(secrets) => {
                    let names = secrets
                        .iter()
                        .map(|secret| object_name(secret).to_string())
                        .collect();
                    secrets_by_namespace.insert(source.namespace.clone(), names);
                }
                Err(e) => {
                    warn!(namespace = source.namespace.as_str(), error = %e, "Failed to list source Secrets");
                    continue;
                }
            }
        }

        let present = secrets_by_namespace
            .get(&source.namespace)
            .is_some_and(|names| names.contains(&source.name));
        if !present {
            let missing = format!("{}/{}", source.namespace, source.name);
            warn!(
                rule = rule.key(),
                source = missing.as_str(),
                "Source Secret not found; the rule produces no replicas until it exists"
            );
            summary.missing_sources.push(missing);
        }
    }

    summary
}
