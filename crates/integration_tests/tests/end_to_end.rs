use std::time::Duration;

use integration_tests::FakeNode;
use tipwatch_scanner::test_helpers::RecordingPresenter;
use tipwatch_scanner::{
    Cursor, FailurePolicy, Height, NodeClient, NodeConfig, PollConfig, PollLoop, PollMode,
    TipTracker, TrackerError,
};
use tokio::sync::broadcast;

fn poll_config(policy: FailurePolicy) -> PollConfig {
    PollConfig {
        interval: Duration::from_millis(50),
        failure_policy: policy,
    }
}

fn client_for(node: &FakeNode) -> NodeClient {
    NodeClient::new(&NodeConfig {
        url: node.url.clone(),
        request_timeout_secs: Some(5),
    })
    .expect("Failed to create client")
}

/// Wait until the presenter has shown exactly `expected`, failing after a few seconds
async fn wait_for_ids(presenter: &RecordingPresenter, expected: &[&str]) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while presenter.presented_ids() != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(
        reached.is_ok(),
        "expected {:?}, presented {:?}",
        expected,
        presenter.presented_ids()
    );
}

/// Wait until the node has served `count` requests for `path`
async fn wait_for_requests(node: &FakeNode, path: &str, count: usize) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while node.chain().requested_paths.iter().filter(|p| *p == path).count() < count {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(reached.is_ok(), "node never saw {} requests for {}", count, path);
}

#[tokio::test]
async fn test_watcher_emits_each_new_block_once() {
    println!("=== Watcher end-to-end against fake node ===");
    let node = FakeNode::start().await;
    node.mine(100, "abc123", &["t1", "t2"]);

    let presenter = RecordingPresenter::new();
    let mut poll_loop = PollLoop::new(
        TipTracker::new(client_for(&node)),
        presenter.clone(),
        poll_config(FailurePolicy::Fatal),
    );
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { poll_loop.run(shutdown_rx).await });

    println!("Step 1: first block observed");
    wait_for_ids(&presenter, &["t1", "t2"]).await;

    println!("Step 2: node mines height 101");
    node.mine(101, "def456", &["t3"]);
    wait_for_ids(&presenter, &["t1", "t2", "t3"]).await;
    // A few more ticks at the same tip must not re-emit anything
    let info_requests = node.chain().requested_paths.iter().filter(|p| *p == "/info").count();
    wait_for_requests(&node, "/info", info_requests + 3).await;

    println!("Step 3: shutdown");
    shutdown_tx.send(()).unwrap();
    let cursor = handle.await.unwrap().unwrap();

    assert_eq!(cursor, Cursor::at(Height(101)));
    assert_eq!(
        presenter.presented(),
        vec![
            (Height(100), "t1".to_string()),
            (Height(100), "t2".to_string()),
            (Height(101), "t3".to_string()),
        ]
    );

    // Each block body fetched exactly once despite repeated ticks
    let chain = node.chain();
    let block_fetches: Vec<&String> = chain
        .requested_paths
        .iter()
        .filter(|p| p.starts_with("/blocks/") && !p.starts_with("/blocks/at/"))
        .collect();
    assert_eq!(block_fetches, vec!["/blocks/abc123", "/blocks/def456"]);
    println!("=== Watcher end-to-end complete ===");
}

#[tokio::test]
async fn test_catch_up_watcher_fills_gap() {
    let node = FakeNode::start().await;
    node.mine(100, "b100", &["t100"]);

    let presenter = RecordingPresenter::new();
    let tracker = TipTracker::new(client_for(&node)).with_mode(PollMode::CatchUp { max_blocks: 8 });
    let mut poll_loop = PollLoop::new(tracker, presenter.clone(), poll_config(FailurePolicy::Fatal));
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { poll_loop.run(shutdown_rx).await });

    wait_for_ids(&presenter, &["t100"]).await;
    // Several blocks can land between two ticks
    node.mine(101, "b101", &["t101"]);
    node.mine(102, "b102", &["t102"]);
    node.mine(103, "b103", &["t103"]);
    wait_for_ids(&presenter, &["t100", "t101", "t102", "t103"]).await;

    shutdown_tx.send(()).unwrap();
    let cursor = handle.await.unwrap().unwrap();

    assert_eq!(cursor, Cursor::at(Height(103)));
    assert_eq!(presenter.presented_ids(), vec!["t100", "t101", "t102", "t103"]);
}

#[tokio::test]
async fn test_watcher_stops_on_ambiguous_height() {
    let node = FakeNode::start().await;
    {
        let mut chain = node.chain();
        chain.full_height = Some(100);
        chain.header_ids.insert(100, Vec::new());
    }

    let presenter = RecordingPresenter::new();
    let mut poll_loop = PollLoop::new(
        TipTracker::new(client_for(&node)),
        presenter.clone(),
        poll_config(FailurePolicy::Fatal),
    );
    let (_shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let result = tokio::time::timeout(Duration::from_secs(5), poll_loop.run(shutdown_rx))
        .await
        .expect("Loop should stop on its own");

    assert_eq!(
        result,
        Err(TrackerError::ChainAnomaly {
            height: Height(100),
            found: 0
        })
    );
    assert!(poll_loop.cursor().is_unseen());
    assert!(presenter.presented().is_empty());
}

#[tokio::test]
async fn test_tolerant_watcher_recovers_once_node_settles() {
    let node = FakeNode::start().await;
    {
        let mut chain = node.chain();
        chain.full_height = Some(100);
        chain.header_ids.insert(100, Vec::new());
    }

    let presenter = RecordingPresenter::new();
    let mut poll_loop = PollLoop::new(
        TipTracker::new(client_for(&node)),
        presenter.clone(),
        poll_config(FailurePolicy::Tolerant {
            max_consecutive_failures: 1_000,
        }),
    );
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(async move { poll_loop.run(shutdown_rx).await });

    wait_for_requests(&node, "/blocks/at/100", 3).await;
    assert!(presenter.presented().is_empty());

    node.mine(100, "settled", &["t1"]);
    wait_for_ids(&presenter, &["t1"]).await;

    shutdown_tx.send(()).unwrap();
    let cursor = handle.await.unwrap().unwrap();

    assert_eq!(cursor, Cursor::at(Height(100)));
    assert_eq!(presenter.presented_ids(), vec!["t1"]);
}
