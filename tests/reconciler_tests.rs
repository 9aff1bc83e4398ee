//! # Reconciler Tests
//!
//! Create, update and delete of replicas against the in-memory cluster.

mod common;

use common::*;
use kube_secret_sync::cluster::ClusterApi;
use kube_secret_sync::controller::reconciler::{is_managed, Reconciler, SyncOutcome};
use kube_secret_sync::controller::rules::{CompiledRule, RuleDefaults};
use std::sync::Arc;

fn compiled(force: Option<bool>) -> CompiledRule {
    CompiledRule::compile(
        &rule("registry", "default", "registry", include(&["team-a"]), force),
        &RuleDefaults::default(),
    )
    .expect("rule should compile")
}

fn reconciler(cluster: &Arc<FakeCluster>) -> Reconciler {
    Reconciler::new(Arc::clone(cluster) as Arc<dyn ClusterApi>)
}

#[tokio::test]
async fn test_create_then_noop() {
    let cluster = FakeCluster::with_namespaces(&["default", "team-a"]);
    let source = secret("default", "registry", "v1");
    let reconciler = reconciler(&cluster);
    let rule = compiled(None);

    let first = reconciler
        .create_or_update(&rule, "team-a", &source)
        .await
        .expect("create should succeed");
    let second = reconciler
        .create_or_update(&rule, "team-a", &source)
        .await
        .expect("second pass should succeed");

    assert_eq!(first, SyncOutcome::Created);
    assert_eq!(second, SyncOutcome::Unchanged);
    assert_eq!(cluster.calls().creates, 1);
    assert_eq!(cluster.calls().updates, 0);

    let replica = cluster.secret("team-a", "registry").expect("replica exists");
    assert!(is_managed(&replica));
    assert_eq!(token(&replica), "v1");
}

#[tokio::test]
async fn test_changed_source_updates_managed_replica() {
    let cluster = FakeCluster::with_namespaces(&["default", "team-a"]);
    cluster.put_secret(managed_secret("team-a", "registry", "v1"));
    let reconciler = reconciler(&cluster);

    let outcome = reconciler
        .create_or_update(&compiled(None), "team-a", &secret("default", "registry", "v2"))
        .await
        .expect("update should succeed");

    assert_eq!(outcome, SyncOutcome::Updated);
    assert_eq!(cluster.calls().updates, 1);
    let replica = cluster.secret("team-a", "registry").expect("replica exists");
    assert_eq!(token(&replica), "v2");
    assert!(is_managed(&replica));
}

#[tokio::test]
async fn test_foreign_secret_left_alone_without_force() {
    let cluster = FakeCluster::with_namespaces(&["default", "team-a"]);
    cluster.put_secret(secret("team-a", "registry", "hand-made"));
    let reconciler = reconciler(&cluster);

    let outcome = reconciler
        .create_or_update(&compiled(Some(false)), "team-a", &secret("default", "registry", "v1"))
        .await
        .expect("skip is not an error");

    assert_eq!(outcome, SyncOutcome::SkippedForeign);
    assert_eq!(cluster.calls().updates, 0);
    let existing = cluster.secret("team-a", "registry").expect("still there");
    assert_eq!(token(&existing), "hand-made");
    assert!(!is_managed(&existing));
}

#[tokio::test]
async fn test_force_overwrites_foreign_secret() {
    let cluster = FakeCluster::with_namespaces(&["default", "team-a"]);
    cluster.put_secret(secret("team-a", "registry", "hand-made"));
    let reconciler = reconciler(&cluster);

    let outcome = reconciler
        .create_or_update(&compiled(Some(true)), "team-a", &secret("default", "registry", "v1"))
        .await
        .expect("forced update should succeed");

    assert_eq!(outcome, SyncOutcome::Updated);
    let replica = cluster.secret("team-a", "registry").expect("replica exists");
    assert_eq!(token(&replica), "v1");
    assert!(is_managed(&replica));
}

#[tokio::test]
async fn test_controller_force_default_applies_when_rule_is_silent() {
    let cluster = FakeCluster::with_namespaces(&["default", "team-a"]);
    cluster.put_secret(secret("team-a", "registry", "hand-made"));
    let reconciler = reconciler(&cluster);
    let defaults = RuleDefaults {
        force: true,
        ..RuleDefaults::default()
    };
    let rule = CompiledRule::compile(
        &rule("registry", "default", "registry", include(&["team-a"]), None),
        &defaults,
    )
    .expect("rule should compile");

    let outcome = reconciler
        .create_or_update(&rule, "team-a", &secret("default", "registry", "v1"))
        .await
        .expect("forced update should succeed");

    assert_eq!(outcome, SyncOutcome::Updated);
}

#[tokio::test]
async fn test_delete_managed_replica() {
    let cluster = FakeCluster::with_namespaces(&["default", "team-a"]);
    cluster.put_secret(managed_secret("team-a", "registry", "v1"));
    let reconciler = reconciler(&cluster);

    let outcome = reconciler
        .delete_replica(&compiled(None), "team-a", "registry")
        .await
        .expect("delete should succeed");

    assert_eq!(outcome, SyncOutcome::Deleted);
    assert!(cluster.secret("team-a", "registry").is_none());
}

#[tokio::test]
async fn test_delete_foreign_requires_force() {
    let cluster = FakeCluster::with_namespaces(&["default", "team-a"]);
    cluster.put_secret(secret("team-a", "registry", "hand-made"));
    let reconciler = reconciler(&cluster);

    let outcome = reconciler
        .delete_replica(&compiled(None), "team-a", "registry")
        .await
        .expect("skip is not an error");
    assert_eq!(outcome, SyncOutcome::SkippedForeign);
    assert!(cluster.secret("team-a", "registry").is_some());

    let outcome = reconciler
        .delete_replica(&compiled(Some(true)), "team-a", "registry")
        .await
        .expect("forced delete should succeed");
    assert_eq!(outcome, SyncOutcome::Deleted);
    assert!(cluster.secret("team-a", "registry").is_none());
}

#[tokio::test]
async fn test_prune_never_removes_foreign_secret() {
    let cluster = FakeCluster::with_namespaces(&["default", "team-a"]);
    cluster.put_secret(secret("team-a", "registry", "hand-made"));
    let reconciler = reconciler(&cluster);

    let outcome = reconciler
        .prune_replica(&compiled(Some(true)), "team-a", "registry")
        .await
        .expect("skip is not an error");

    assert_eq!(outcome, SyncOutcome::SkippedForeign);
    assert_eq!(cluster.calls().deletes, 0);
}

#[tokio::test]
async fn test_delete_missing_replica_is_absent() {
    let cluster = FakeCluster::with_namespaces(&["default", "team-a"]);
    let reconciler = reconciler(&cluster);

    let outcome = reconciler
        .delete_replica(&compiled(None), "team-a", "registry")
        .await
        .expect("nothing to delete is fine");

    assert_eq!(outcome, SyncOutcome::Absent);
    assert_eq!(cluster.calls().deletes, 0);
}

#[tokio::test]
async fn test_write_failure_is_returned() {
    let cluster = FakeCluster::with_namespaces(&["default", "team-a"]);
    cluster.fail_writes_in("team-a");
    let reconciler = reconciler(&cluster);

    let result = reconciler
        .create_or_update(&compiled(None), "team-a", &secret("default", "registry", "v1"))
        .await;

    assert!(result.is_err());
    assert!(cluster.secret("team-a", "registry").is_none());
}
