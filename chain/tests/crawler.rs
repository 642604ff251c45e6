use std::collections::BTreeSet;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::sol_types::SolEvent;
use chain::contracts::IERC20;
use chain::crawler::{CrawlError, EventCrawler};
use chain::stream::EventStream;
use shared::block::BlockWindow;
use test_helpers::chain::{event_log, MockChain};

fn token() -> Address {
    Address::repeat_byte(0x70)
}

fn transfer(from: Address, to: Address, block: u64) -> chain::rpc::EventLog {
    event_log(token(), IERC20::Transfer::SIGNATURE_HASH, &[from, to], block)
}

fn setup(head: u64) -> (Arc<MockChain>, EventCrawler, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let chain = Arc::new(MockChain::new(head));
    let crawler = EventCrawler::new(chain.clone(), dir.path());
    (chain, crawler, dir)
}

#[tokio::test]
async fn test_windows_follow_the_documented_split() {
    let (chain, crawler, dir) = setup(12_550);
    std::fs::write(dir.path().join("dual_core_transfers.checkpoint"), "100")
        .unwrap();
    let stream = EventStream::dual_core_transfers(token(), 2500);

    let outcome = crawler.crawl(&stream).await.unwrap();

    let windows = chain
        .log_queries()
        .iter()
        .map(|query| query.window)
        .collect::<Vec<_>>();
    assert_eq!(
        windows,
        vec![
            BlockWindow::new(100, 2600),
            BlockWindow::new(2601, 5100),
            BlockWindow::new(5101, 7600),
            BlockWindow::new(7601, 10100),
            BlockWindow::new(10101, 12550),
        ]
    );
    assert_eq!(outcome.checkpoint_advanced_to, 12_550);
    assert_eq!(
        std::fs::read_to_string(
            dir.path().join("dual_core_transfers.checkpoint")
        )
        .unwrap(),
        "12550"
    );
}

#[tokio::test]
async fn test_participants_are_merged_into_the_address_set() {
    let (chain, crawler, _dir) = setup(6_000);
    let alice = Address::repeat_byte(0xa1);
    let bob = Address::repeat_byte(0xb0);
    chain.push_log(transfer(Address::ZERO, alice, 10));
    chain.push_log(transfer(alice, bob, 3_000));
    chain.push_log(transfer(bob, alice, 3_000));
    let stream = EventStream::dual_core_transfers(token(), 2500);

    let outcome = crawler.crawl(&stream).await.unwrap();

    assert_eq!(outcome.new_addresses, BTreeSet::from([alice, bob]));
    assert_eq!(outcome.event_blocks, BTreeSet::from([10, 3_000]));
    assert_eq!(
        crawler.address_set("dual_core").load().await.unwrap(),
        BTreeSet::from([alice, bob])
    );
}

#[tokio::test]
async fn test_second_crawl_without_activity_is_a_noop() {
    let (chain, crawler, _dir) = setup(5_000);
    chain.push_log(transfer(
        Address::repeat_byte(1),
        Address::repeat_byte(2),
        4_000,
    ));
    let stream = EventStream::dual_core_transfers(token(), 2500);

    let first = crawler.crawl(&stream).await.unwrap();
    let second = crawler.crawl(&stream).await.unwrap();

    assert_eq!(first.checkpoint_advanced_to, 5_000);
    assert_eq!(second.checkpoint_advanced_to, 5_000);
    assert!(second.new_addresses.is_empty());
    assert_eq!(
        crawler.address_set("dual_core").load().await.unwrap().len(),
        2
    );
}

#[tokio::test]
async fn test_failed_window_keeps_checkpoint_and_resumes() {
    let (chain, crawler, dir) = setup(10_000);
    let alice = Address::repeat_byte(0xa1);
    let bob = Address::repeat_byte(0xb0);
    chain.push_log(transfer(Address::ZERO, alice, 100));
    chain.push_log(transfer(Address::ZERO, bob, 9_000));
    chain.fail_window(7_501);
    let stream = EventStream::dual_core_transfers(token(), 2500);

    let result = crawler.crawl(&stream).await;

    assert!(matches!(
        result,
        Err(CrawlError::Logs { window, .. }) if window.from == 7_501
    ));
    assert!(!dir.path().join("dual_core_transfers.checkpoint").exists());
    assert!(crawler
        .address_set("dual_core")
        .load()
        .await
        .unwrap()
        .is_empty());

    chain.heal();
    let queried_before = chain.log_queries().len();
    let outcome = crawler.crawl(&stream).await.unwrap();

    let resumed = chain.log_queries()[queried_before..]
        .iter()
        .map(|query| query.window)
        .collect::<Vec<_>>();
    assert_eq!(resumed, vec![BlockWindow::new(7_501, 10_000)]);
    assert_eq!(outcome.new_addresses, BTreeSet::from([alice, bob]));
    assert_eq!(outcome.checkpoint_advanced_to, 10_000);
    assert!(!dir.path().join("dual_core_transfers.staging.jsonl").exists());
}

#[tokio::test]
async fn test_checkpoint_ahead_of_head_is_clamped() {
    let (chain, crawler, dir) = setup(500);
    std::fs::write(dir.path().join("dual_core_transfers.checkpoint"), "900")
        .unwrap();
    let stream = EventStream::dual_core_transfers(token(), 2500);

    let outcome = crawler.crawl(&stream).await.unwrap();

    assert_eq!(
        chain.log_queries()[0].window,
        BlockWindow::new(500, 500)
    );
    assert_eq!(outcome.checkpoint_advanced_to, 500);
}

#[tokio::test]
async fn test_staging_beyond_head_is_discarded() {
    let (chain, crawler, dir) = setup(20_000);
    let stream = EventStream::dual_core_transfers(token(), 2500);
    chain.fail_window(17_501);
    assert!(crawler.crawl(&stream).await.is_err());

    // the chain got truncated below the staged windows
    chain.heal();
    chain.set_head(3_000);
    let queried_before = chain.log_queries().len();
    crawler.crawl(&stream).await.unwrap();

    let windows = chain.log_queries()[queried_before..]
        .iter()
        .map(|query| query.window)
        .collect::<Vec<_>>();
    assert_eq!(
        windows,
        vec![BlockWindow::new(0, 2500), BlockWindow::new(2501, 3000)]
    );
    assert_eq!(
        std::fs::read_to_string(
            dir.path().join("dual_core_transfers.checkpoint")
        )
        .unwrap(),
        "3000"
    );
}

#[tokio::test]
async fn test_scan_reports_event_blocks_without_committing() {
    let (chain, crawler, dir) = setup(30_000);
    let hub = Address::with_last_byte(0x05);
    let stream = EventStream::turn_round(hub, 9999);
    let turned_round = stream.event_signature;
    chain.push_log(event_log(hub, turned_round, &[], 12_000));
    chain.push_log(event_log(hub, turned_round, &[], 24_000));

    let pending = crawler.scan(&stream).await.unwrap();

    assert_eq!(pending.event_blocks, BTreeSet::from([12_000, 24_000]));
    assert!(pending.discovered.is_empty());
    assert!(!dir.path().join("turn_round.checkpoint").exists());

    let outcome = crawler.commit(pending).await.unwrap();

    assert_eq!(outcome.checkpoint_advanced_to, 30_000);
    assert!(dir.path().join("turn_round.checkpoint").exists());
}

#[tokio::test]
async fn test_crawl_recovers_from_a_torn_staging_tail() {
    let (chain, crawler, dir) = setup(200);
    let alice = Address::repeat_byte(0xa1);
    chain.push_log(transfer(Address::ZERO, alice, 150));
    std::fs::write(
        dir.path().join("dual_core_transfers.staging.jsonl"),
        "{\"kind\":\"window\",\"from\":0,\"to\":100}\n{\"kind\":\"events\",\"blo",
    )
    .unwrap();
    let stream = EventStream::dual_core_transfers(token(), 2500);

    let first = crawler.crawl(&stream).await.unwrap();
    let second = crawler.crawl(&stream).await.unwrap();

    assert_eq!(
        chain.log_queries()[0].window,
        BlockWindow::new(101, 200)
    );
    assert_eq!(first.new_addresses, BTreeSet::from([alice]));
    assert_eq!(first.checkpoint_advanced_to, 200);
    assert!(second.new_addresses.is_empty());
    assert_eq!(second.checkpoint_advanced_to, 200);
}
