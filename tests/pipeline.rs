use std::{sync::Arc, time::Duration};

use launch_sniper::{
    Launchpad, pipeline,
    orchestrator::Services,
    stream::Tailer,
    testing::{
        FakeNode, RecordingNotifier, RecordingTradeClient, TEST_WALLET, TradeCall, sniper_config,
    },
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

const FEED: &str = concat!(
    r#"{"from":"0x9999999999999999999999999999999999999999","tx_hash":"0xaa","pool_address":"0x1111111111111111111111111111111111111111","token_addresses":["0x2222222222222222222222222222222222222222"]}"#,
    "\n",
    r#"{"from":"0xabcdefabcdefabcdefabcdefabcdefabcdefabcd","tx_hash":"#,
    "\n",
    r#"{"from":"0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD","tx_hash":"0xbb","pool_address":"0x3333333333333333333333333333333333333333","token_addresses":["0x4444444444444444444444444444444444444444"]}"#,
    "\n",
);

async fn wait_for(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

#[tokio::test]
async fn test_three_line_feed_buys_once_before_disposal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");

    let client = Arc::new(RecordingTradeClient::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let services = Services {
        launchpad: Launchpad::base(),
        node: Arc::new(FakeNode::default()),
        client: client.clone(),
        notifier: notifier.clone(),
    };

    let tailer = Tailer::open(&path, None).await.unwrap();
    assert_eq!(tailer.cursor(), 0);
    let lines = tailer.into_lines(Duration::from_millis(5), tokio::time::sleep);

    let tracker = TaskTracker::new();
    let cancel = CancellationToken::new();
    let pipeline = tokio::spawn(pipeline::run(
        1,
        TEST_WALLET,
        Arc::new(sniper_config()),
        services,
        lines,
        tracker.clone(),
        cancel.clone(),
    ));

    tokio::fs::write(&path, FEED).await.unwrap();
    wait_for(|| !client.calls_named("sell").is_empty()).await;

    cancel.cancel();
    assert_eq!(pipeline.await.unwrap(), 1);
    tracker.close();
    tracker.wait().await;

    let calls = client.calls();
    let buys: Vec<_> = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, TradeCall::Buy { .. }))
        .collect();
    assert_eq!(buys.len(), 1);
    let (buy_idx, buy) = buys[0];
    assert!(matches!(
        buy,
        TradeCall::Buy { pool, .. } if pool.to_string().starts_with("0x3333")
    ));
    let first_disposal = calls.iter().position(TradeCall::is_disposal).unwrap();
    assert!(buy_idx < first_disposal);

    assert_eq!(notifier.count_starting_with(1, "Buy executed"), 1);
    assert_eq!(notifier.count_starting_with(1, "Sell executed"), 1);
}

#[tokio::test]
async fn test_lines_split_across_writes_are_joined() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");

    let client = Arc::new(RecordingTradeClient::default());
    let services = Services {
        launchpad: Launchpad::base(),
        node: Arc::new(FakeNode::default()),
        client: client.clone(),
        notifier: Arc::new(RecordingNotifier::default()),
    };

    let tailer = Tailer::open(&path, None).await.unwrap();
    let lines = tailer.into_lines(Duration::from_millis(5), tokio::time::sleep);
    let tracker = TaskTracker::new();
    let cancel = CancellationToken::new();
    let pipeline = tokio::spawn(pipeline::run(
        1,
        TEST_WALLET,
        Arc::new(sniper_config()),
        services,
        lines,
        tracker.clone(),
        cancel.clone(),
    ));

    let matching = FEED.lines().nth(2).unwrap();
    let (head, tail) = matching.split_at(40);
    tokio::fs::write(&path, head).await.unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(client.calls().is_empty());

    let mut file = tokio::fs::OpenOptions::new()
        .append(true)
        .open(&path)
        .await
        .unwrap();
    tokio::io::AsyncWriteExt::write_all(&mut file, format!("{tail}\n").as_bytes())
        .await
        .unwrap();
    wait_for(|| !client.calls_named("buy").is_empty()).await;

    cancel.cancel();
    assert_eq!(pipeline.await.unwrap(), 1);
    tracker.close();
    tracker.wait().await;
}
