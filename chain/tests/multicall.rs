use std::sync::Arc;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use chain::contracts::IAssetOnchain::getUserStakedOrderCall;
use chain::contracts::IERC20::balanceOfCall;
use chain::multicall::{
    Call, CallFailure, FailureMode, MulticallConfig, MulticallError,
    MulticallReader,
};
use test_helpers::chain::{returns, reverts, MockAggregator};

fn token() -> Address {
    Address::repeat_byte(0x70)
}

/// Balance of a holder is its first address byte, at every block.
fn balances() -> MockAggregator {
    MockAggregator::new(|call, _block| {
        let decoded = balanceOfCall::abi_decode(&call.data).unwrap();
        match decoded.account.0[0] {
            0xff => reverts("blocked"),
            n => returns(U256::from(n)),
        }
    })
}

fn config(batch_size: u64) -> MulticallConfig {
    MulticallConfig {
        multicall_batch_size: batch_size,
        multicall_requests_per_second: 0,
        ..MulticallConfig::default()
    }
}

fn holders(n: u8) -> Vec<balanceOfCall> {
    (1..=n)
        .map(|i| balanceOfCall {
            account: Address::repeat_byte(i),
        })
        .collect()
}

#[tokio::test]
async fn test_empty_input_never_reaches_the_aggregator() {
    let aggregator = Arc::new(balances());
    let reader = MulticallReader::new(aggregator.clone(), config(5));

    let results = reader.read_batch(&[], 100).await.unwrap();

    assert!(results.is_empty());
    assert!(aggregator.batch_sizes().is_empty());
}

#[tokio::test]
async fn test_twelve_holders_in_batches_of_five() {
    let aggregator = Arc::new(balances());
    let reader = MulticallReader::new(aggregator.clone(), config(5));

    let results = reader.read_typed(token(), &holders(12), 100).await.unwrap();

    assert_eq!(aggregator.batch_sizes(), vec![5, 5, 2]);
    let values = results
        .into_iter()
        .map(|result| result.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(values, (1..=12).map(U256::from).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_order_is_preserved_with_concurrent_batches() {
    let aggregator = Arc::new(balances());
    let reader = MulticallReader::new(
        aggregator.clone(),
        MulticallConfig {
            multicall_concurrency: 4,
            ..config(4)
        },
    );

    let results = reader.read_typed(token(), &holders(50), 7).await.unwrap();

    let values = results
        .into_iter()
        .map(|result| result.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(values, (1..=50).map(U256::from).collect::<Vec<_>>());
    assert!(aggregator.max_in_flight() <= 4);
    assert_eq!(aggregator.batch_sizes().iter().sum::<usize>(), 50);
}

#[tokio::test]
async fn test_reverted_call_does_not_fail_its_neighbours() {
    let reader = MulticallReader::new(Arc::new(balances()), config(4));
    let mut calls = holders(3);
    calls.insert(
        1,
        balanceOfCall {
            account: Address::repeat_byte(0xff),
        },
    );

    let results = reader.read_typed(token(), &calls, 7).await.unwrap();

    assert_eq!(results[0], Ok(U256::from(1)));
    assert!(matches!(results[1], Err(CallFailure::Reverted(_))));
    assert_eq!(results[2], Ok(U256::from(2)));
    assert_eq!(results[3], Ok(U256::from(3)));
}

#[tokio::test]
async fn test_fail_closed_aborts_on_any_failure() {
    let reader = MulticallReader::new(
        Arc::new(balances()),
        MulticallConfig {
            multicall_failure_mode: FailureMode::FailClosed,
            ..config(4)
        },
    );
    let mut calls = holders(6);
    calls.push(balanceOfCall {
        account: Address::repeat_byte(0xff),
    });

    let result = reader.read_typed(token(), &calls, 7).await;

    assert!(matches!(
        result,
        Err(MulticallError::CallFailed { index: 6, .. })
    ));
}

#[tokio::test]
async fn test_undecodable_return_is_a_decode_failure() {
    let reader = MulticallReader::new(
        Arc::new(MockAggregator::new(|_, _| returns(true))),
        config(4),
    );

    let typed = reader
        .read_typed(
            token(),
            &[getUserStakedOrderCall {
                user: Address::repeat_byte(1),
            }],
            1,
        )
        .await
        .unwrap();

    assert!(matches!(typed[0], Err(CallFailure::Decode(_))));
}

#[tokio::test]
async fn test_grouped_results_follow_their_groups() {
    let reader = MulticallReader::new(Arc::new(balances()), config(4));
    let call = |n: u8| {
        Call::encode(
            token(),
            &balanceOfCall {
                account: Address::repeat_byte(n),
            },
        )
    };
    let groups = vec![vec![call(1), call(2), call(3)], vec![], vec![call(9)]];

    let results = reader.read_grouped(&groups, 3).await.unwrap();

    assert_eq!(
        results.iter().map(Vec::len).collect::<Vec<_>>(),
        vec![3, 0, 1]
    );
    let last = balanceOfCall::abi_decode_returns(
        results[2][0].as_ref().unwrap(),
    )
    .unwrap();
    assert_eq!(last, U256::from(9));
}

#[tokio::test]
async fn test_transport_error_fails_the_read() {
    let aggregator = Arc::new(balances());
    aggregator.set_failing(true);
    let reader = MulticallReader::new(aggregator, config(4));

    let result = reader.read_typed(token(), &holders(2), 1).await;

    assert!(matches!(result, Err(MulticallError::Rpc { batch: 0, .. })));
}
