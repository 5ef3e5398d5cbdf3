//! Fair lock specs
//!
//! Waiters on a fair lock are granted in the order they asked, no matter
//! which node they run on.

use crate::prelude::*;
use std::sync::Mutex;

#[tokio::test]
async fn grants_follow_request_order_across_nodes() {
    let cluster = Cluster::new();
    let holder_node = cluster.node("n0");
    let held = holder_node
        .try_fair_lock(&caller("first"), "batch", "b-1", None)
        .await
        .unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let mut waiters = Vec::new();
    for n in 1..=4 {
        let node = cluster.node(&format!("n{n}"));
        let order = order.clone();
        waiters.push(tokio::spawn(async move {
            let me = caller(&format!("waiter-{n}"));
            let handle = node
                .lock(
                    &me,
                    "batch",
                    "b-1",
                    wait_for(LockProtocol::Fair, Duration::from_secs(5)),
                )
                .await
                .unwrap();
            order.lock().unwrap().push(n);
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert!(node.unlock(&handle).await);
        }));
        // Each waiter joins the queue before the next one asks
        tokio::time::sleep(Duration::from_millis(15)).await;
    }

    assert!(holder_node.unlock(&held).await);
    for waiter in waiters {
        waiter.await.unwrap();
    }
    assert_eq!(*order.lock().unwrap(), vec![1, 2, 3, 4]);
}

#[tokio::test]
async fn late_try_does_not_jump_the_queue() {
    let cluster = Cluster::new();
    let (n1, n2, n3) = (cluster.node("n1"), cluster.node("n2"), cluster.node("n3"));
    let held = n1
        .try_fair_lock(&caller("a"), "batch", "b-1", None)
        .await
        .unwrap();

    let queued = {
        let n2 = n2.clone();
        tokio::spawn(async move {
            n2.lock(
                &caller("b"),
                "batch",
                "b-1",
                wait_for(LockProtocol::Fair, Duration::from_secs(2)),
            )
            .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(n1.unlock(&held).await);

    // The queued waiter is ahead of a newcomer's single attempt
    let newcomer = n3.try_fair_lock(&caller("c"), "batch", "b-1", None).await;
    let granted = queued.await.unwrap();
    assert!(granted.is_some());
    assert!(newcomer.is_none());
}
