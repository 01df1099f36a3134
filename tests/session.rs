use std::{sync::Arc, time::Duration};

use alloy::primitives::{Address, B256, U256, address, b256};
use launch_sniper::{
    Launchpad,
    orchestrator::Services,
    session::{PipelineSettings, SessionRegistry, SessionState},
    stream::CursorStore,
    testing::{
        FakeNode, RecordingNotifier, RecordingTradeClient, TEST_WALLET, TradeCall, sniper_config,
    },
    types::{DisposalPolicy, ReceiptLog},
};

const LAUNCH_TX: B256 = b256!("0x6c5a0d6f3b1d1f0cb2a6a2b8fd0e4d9f9c2f4a8b7e3d1c0b9a8f7e6d5c4b3a29");
const POOL: Address = address!("0x5555555555555555555555555555555555555555");
const TOKEN: Address = address!("0x6666666666666666666666666666666666666666");
const DEST: Address = address!("0x7777777777777777777777777777777777777777");

fn bare_launch_line() -> String {
    format!(r#"{{"from":"0xabcdefabcdefabcdefabcdefabcdefabcdefabcd","tx_hash":"{LAUNCH_TX}"}}"#)
}

fn launch_receipt(launchpad: &Launchpad) -> Vec<ReceiptLog> {
    vec![ReceiptLog::new(
        launchpad.factory(),
        vec![
            launchpad.pool_created_topic(),
            POOL.into_word(),
            TOKEN.into_word(),
        ],
    )]
}

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
async fn test_funded_session_snipes_launch_from_receipt() {
    let dir = tempfile::tempdir().unwrap();
    let stream_path = dir.path().join("output.jsonl");
    let cursor_dir = dir.path().join("cursors");

    // Resume from the start of the stream so the launch already written is seen.
    CursorStore::new(&cursor_dir, 7).save(0).await.unwrap();
    tokio::fs::write(&stream_path, format!("{}\n", bare_launch_line()))
        .await
        .unwrap();

    let launchpad = Launchpad::base();
    let client = Arc::new(
        RecordingTradeClient::default()
            .with_eth_balances([U256::ZERO, U256::from(60_000_000_000_000_000u64)]),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let services = Services {
        launchpad: launchpad.clone(),
        node: Arc::new(FakeNode::default().with_receipt(LAUNCH_TX, launch_receipt(&launchpad))),
        client: client.clone(),
        notifier: notifier.clone(),
    };
    let settings = PipelineSettings {
        tail_interval: Duration::from_millis(5),
        funding_interval: Duration::from_millis(5),
        cursor_dir: Some(cursor_dir.clone()),
        ..PipelineSettings::new(&stream_path)
    };
    let registry = SessionRegistry::new(services, settings);

    let wallet = registry.provision(7, sniper_config()).await.unwrap();
    assert_eq!(wallet, TEST_WALLET);
    registry.watch_funding(7).unwrap();
    assert_eq!(
        registry.session(7).map(|s| s.state),
        Some(SessionState::AwaitingFunds)
    );

    wait_for(|| notifier.count_starting_with(7, "Sell executed") == 1).await;
    registry.stop(7).unwrap();
    registry.shutdown().await;

    let buys = client.calls_named("buy");
    assert_eq!(buys.len(), 1);
    assert!(matches!(
        buys[0],
        TradeCall::Buy { pool, token, .. } if pool == POOL && token == TOKEN
    ));

    let messages = notifier.messages(7);
    let position = |prefix: &str| messages.iter().position(|m| m.starts_with(prefix));
    let funded = position("Wallet funded").unwrap();
    let launched = position("New token launched").unwrap();
    let bought = position("Buy executed").unwrap();
    let sold = position("Sell executed").unwrap();
    assert!(funded < launched && launched < bought && bought < sold);

    let stream_len = tokio::fs::metadata(&stream_path).await.unwrap().len();
    let cursor = CursorStore::new(&cursor_dir, 7).load().await.unwrap();
    assert_eq!(cursor, Some(stream_len));
}

#[tokio::test]
async fn test_transfer_policy_session_and_sweep() {
    let dir = tempfile::tempdir().unwrap();
    let stream_path = dir.path().join("output.jsonl");

    let client = Arc::new(
        RecordingTradeClient::default()
            .with_eth_balances([U256::from(10_000_000_000_000_000u64)]),
    );
    let notifier = Arc::new(RecordingNotifier::default());
    let services = Services {
        launchpad: Launchpad::base(),
        node: Arc::new(FakeNode::default()),
        client: client.clone(),
        notifier: notifier.clone(),
    };
    let settings = PipelineSettings {
        tail_interval: Duration::from_millis(5),
        ..PipelineSettings::new(&stream_path)
    };
    let registry = SessionRegistry::new(services, settings);

    let config = launch_sniper::types::SniperConfig {
        disposal: DisposalPolicy::TransferTo(DEST),
        ..sniper_config()
    };
    registry.register(3, TEST_WALLET, config).unwrap();
    registry.activate(3).unwrap();
    // Give the pipeline time to open the stream before the launch is written.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let line = r#"{"from":"0xabcdefabcdefabcdefabcdefabcdefabcdefabcd","tx_hash":"0x01","pool_address":"0x1111111111111111111111111111111111111111","token_addresses":["0x2222222222222222222222222222222222222222"]}"#;
    tokio::fs::write(&stream_path, format!("{line}\n"))
        .await
        .unwrap();

    wait_for(|| notifier.count_starting_with(3, "Transfer executed") == 1).await;
    registry.stop(3).unwrap();

    let tx = registry.withdraw(3, DEST).await.unwrap();
    assert!(notifier.messages(3).contains(&format!("Withdrawal executed: {tx}")));
    registry.shutdown().await;

    assert!(client.calls_named("sell").is_empty());
    assert_eq!(
        client.calls_named("transfer_token"),
        vec![TradeCall::TransferToken {
            wallet: TEST_WALLET,
            to: DEST,
            token: address!("0x2222222222222222222222222222222222222222"),
            amount: U256::from(1000),
        }]
    );
    assert_eq!(
        client.calls_named("transfer"),
        vec![TradeCall::Transfer {
            wallet: TEST_WALLET,
            to: DEST,
            eth_out: U256::from(9_700_000_000_000_000u64),
        }]
    );
}
