//! # CLI
//!
//! Command-line interface for kube-secret-sync.
//!
//! ## Usage
//!
//! ```bash
//! # Run inside the cluster with the mounted service account
//! kube-secret-sync start
//!
//! # Run against the current kubeconfig, overwriting foreign Secrets by default
//! kube-secret-sync start --local --force
//!
//! # Never replicate into system namespaces
//! kube-secret-sync start --exclude-regex-namespaces '^kube-,^openshift-'
//! ```
//!
//! Every flag can also be set through the environment variable shown in
//! `--help`.

use crate::config::{ClusterAccess, SyncConfig};
use crate::controller::filter::NameFilter;
use crate::error::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Replicates Secrets across namespaces according to SecretSyncRules
#[derive(Debug, Parser)]
#[command(name = "kube-secret-sync", version, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the controller
    Start(StartArgs),
    /// Print build information
    Version,
}

#[derive(Debug, Clone, Args)]
pub struct StartArgs {
    /// Enable debug logging
    #[arg(long, env = "DEBUG")]
    pub debug: bool,

    /// Only watch Secrets in this namespace (all namespaces when unset)
    #[arg(long, env = "SECRETS_NAMESPACE")]
    pub secrets_namespace: Option<String>,

    /// Overwrite and delete Secrets the controller did not create, unless a rule says otherwise
    #[arg(long, env = "FORCE")]
    pub force: bool,

    /// Namespaces that never receive replicas (comma separated)
    #[arg(long, env = "EXCLUDE_NAMESPACES", value_delimiter = ',')]
    pub exclude_namespaces: Vec<String>,

    /// Regular expressions for namespaces that never receive replicas (comma separated)
    #[arg(long, env = "EXCLUDE_REGEX_NAMESPACES", value_delimiter = ',')]
    pub exclude_regex_namespaces: Vec<String>,

    /// Delete managed replicas that an edited rule no longer selects
    #[arg(
        long,
        env = "PRUNE_STALE_REPLICAS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub prune_stale_replicas: bool,

    /// Run outside the cluster using a kubeconfig
    #[arg(long, visible_alias = "out-of-cluster", env = "OUT_OF_CLUSTER")]
    pub local: bool,

    /// Kubeconfig used with --local (defaults to ~/.kube/config)
    #[arg(long, env = "KUBECONFIG_PATH")]
    pub kubeconfig: Option<PathBuf>,
}

impl StartArgs {
    /// Build the sync configuration, compiling the protected-namespace patterns
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidPattern`] for a malformed regular expression.
    pub fn into_sync_config(self) -> Result<SyncConfig> {
        let protected_namespaces = NameFilter::new(
            non_blank(self.exclude_namespaces),
            non_blank(self.exclude_regex_namespaces),
        )?;

        let cluster_access = if self.local {
            ClusterAccess::Kubeconfig(self.kubeconfig.unwrap_or_else(default_kubeconfig))
        } else {
            ClusterAccess::InCluster
        };

        Ok(SyncConfig {
            secrets_namespace: self.secrets_namespace.filter(|ns| !ns.is_empty()),
            force: self.force,
            protected_namespaces,
            prune_stale_replicas: self.prune_stale_replicas,
            cluster_access,
        })
    }
}

fn non_blank(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

fn default_kubeconfig() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".kube")
        .join("config")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(args: &[&str]) -> StartArgs {
        let cli = Cli::try_parse_from(
            std::iter::once("kube-secret-sync")
                .chain(std::iter::once("start"))
                .chain(args.iter().copied()),
        )
        .expect("arguments should parse");
        match cli.command {
            Commands::Start(args) => args,
            Commands::Version => panic!("expected start"),
        }
    }

    #[test]
    fn test_exclusion_lists_are_comma_separated() {
        let config = start(&[
            "--exclude-namespaces",
            "kube-system, kube-public",
            "--exclude-regex-namespaces",
            "^openshift-",
        ])
        .into_sync_config()
        .expect("config should build");

        assert!(config.protected_namespaces.is_excluded("kube-system"));
        assert!(config.protected_namespaces.is_excluded("kube-public"));
        assert!(config.protected_namespaces.is_excluded("openshift-infra"));
        assert!(!config.protected_namespaces.is_excluded("team-a"));
    }

    #[test]
    fn test_malformed_regex_is_fatal() {
        let result = start(&["--exclude-regex-namespaces", "team-("]).into_sync_config();
        assert!(matches!(
            result,
            Err(crate::error::Error::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_local_uses_kubeconfig() {
        let config = start(&["--local", "--kubeconfig", "/tmp/kubeconfig", "--force"])
            .into_sync_config()
            .expect("config should build");

        assert!(config.force);
        assert_eq!(
            config.cluster_access,
            ClusterAccess::Kubeconfig(PathBuf::from("/tmp/kubeconfig"))
        );
    }

    #[test]
    fn test_prune_can_be_disabled() {
        let config = start(&["--prune-stale-replicas", "false"])
            .into_sync_config()
            .expect("config should build");
        assert!(!config.prune_stale_replicas);
    }
}
