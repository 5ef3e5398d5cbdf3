//! Resource lifecycle specs
//!
//! Idle resources are released according to their level and come back on
//! the next access, through the fast path when it works.

use crate::prelude::*;

const MINUTE: Duration = Duration::from_secs(60);

#[tokio::test]
async fn release_levels_gate_idle_release() {
    let cluster = Cluster::new();
    let node = cluster.node("n1");

    // Past every threshold at once
    cluster.advance(3 * 60 * MINUTE);
    let mut released = node.scan_idle_resources().await;
    released.sort();
    assert_eq!(
        released,
        vec![
            ResourceType::Monitoring,
            ResourceType::CoreService,
            ResourceType::BusinessCache,
            ResourceType::Temporary,
        ]
    );
    assert!(node.lifecycle().is_available(ResourceType::Infrastructure));
    assert!(!node.lifecycle().release(ResourceType::Infrastructure).await);
}

#[tokio::test]
async fn recently_used_resources_stay() {
    let cluster = Cluster::new();
    let node = cluster.node("n1");

    cluster.advance(25 * MINUTE);
    node.record_resource_access(ResourceType::CoreService);
    node.record_resource_access(ResourceType::Temporary);
    cluster.advance(9 * MINUTE);

    assert_eq!(
        node.scan_idle_resources().await,
        vec![ResourceType::BusinessCache]
    );
}

#[tokio::test]
async fn released_resource_comes_back_fast() {
    let cluster = Cluster::new();
    let handler = FakeResourceHandler::new();
    let node = cluster.node_with("n1", handler.clone());
    cluster.advance(11 * MINUTE);
    node.scan_idle_resources().await;

    let path = node
        .ensure_resource_available(ResourceType::BusinessCache)
        .await
        .unwrap();
    assert_eq!(path, RecoveryPath::Fast);
    assert!(!handler
        .calls()
        .contains(&ResourceCall::StandardRecover(ResourceType::BusinessCache)));
    assert_eq!(
        node.ensure_resource_available(ResourceType::BusinessCache)
            .await
            .unwrap(),
        RecoveryPath::AlreadyAvailable
    );
}

#[tokio::test]
async fn failed_fast_path_falls_back_to_standard() {
    let cluster = Cluster::new();
    let handler = FakeResourceHandler::new();
    handler.fail_fast(ResourceType::Temporary);
    let node = cluster.node_with("n1", handler.clone());
    cluster.advance(11 * MINUTE);
    node.scan_idle_resources().await;

    let path = node
        .ensure_resource_available(ResourceType::Temporary)
        .await
        .unwrap();
    assert_eq!(path, RecoveryPath::Standard);

    let stats = node.recovery_snapshot();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].standard_count, 1);
    assert_eq!(stats[0].fast_count, 0);
}

#[tokio::test]
async fn unrecoverable_resource_is_an_error() {
    let cluster = Cluster::new();
    let handler = FakeResourceHandler::new();
    handler.decline_fast(ResourceType::CoreService);
    handler.fail_standard(ResourceType::CoreService);
    let node = cluster.node_with("n1", handler);
    cluster.advance(31 * MINUTE);
    node.scan_idle_resources().await;

    let err = node
        .ensure_resource_available(ResourceType::CoreService)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("core_service"), "{err}");
}
