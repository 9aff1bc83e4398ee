//! # CRD Generator
//!
//! Generates the `SecretSyncRule` CustomResourceDefinition YAML from the
//! Rust type definitions.
//!
//! ## Usage
//!
//! ```bash
//! # Generate CRD YAML
//! cargo run --bin crdgen > config/crd/secretsyncrule.yaml
//!
//! # Generate and apply directly
//! cargo run --bin crdgen | kubectl apply -f -
//! ```

use kube::core::CustomResourceExt;
use kube_secret_sync::crd::SecretSyncRule;

fn main() -> anyhow::Result<()> {
    let yaml = serde_yaml::to_string(&SecretSyncRule::crd())?;
    print!("{yaml}");
    Ok(())
}
