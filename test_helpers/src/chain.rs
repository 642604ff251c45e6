use std::collections::{HashMap, HashSet};
use std::sync::atomic::{self, AtomicUsize};
use std::sync::Mutex;

use alloy::primitives::{Address, Bytes, B256};
use alloy::sol_types::{Revert, SolError, SolValue};
use async_trait::async_trait;
use chain::multicall::{Aggregator, Call, RawCallResult};
use chain::rpc::{ChainClient, EventLog, LogQuery};
use chrono::{DateTime, Utc};
use shared::block::BlockNumber;

#[derive(Default)]
struct ChainState {
    head: BlockNumber,
    logs: Vec<EventLog>,
    timestamps: HashMap<BlockNumber, DateTime<Utc>>,
    code: HashMap<Address, Bytes>,
    failing_windows: HashSet<BlockNumber>,
    log_queries: Vec<LogQuery>,
    code_queries: usize,
}

/// In-memory chain answering log, head, timestamp and code queries.
#[derive(Default)]
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(head: BlockNumber) -> Self {
        let chain = Self::default();
        chain.set_head(head);
        chain
    }

    pub fn set_head(&self, head: BlockNumber) {
        self.state.lock().unwrap().head = head;
    }

    pub fn push_log(&self, log: EventLog) {
        self.state.lock().unwrap().logs.push(log);
    }

    pub fn set_timestamp(&self, block: BlockNumber, time: DateTime<Utc>) {
        self.state.lock().unwrap().timestamps.insert(block, time);
    }

    pub fn set_code(&self, address: Address, code: impl Into<Bytes>) {
        self.state.lock().unwrap().code.insert(address, code.into());
    }

    /// Log queries for windows starting at `from` fail until healed.
    pub fn fail_window(&self, from: BlockNumber) {
        self.state.lock().unwrap().failing_windows.insert(from);
    }

    pub fn heal(&self) {
        self.state.lock().unwrap().failing_windows.clear();
    }

    pub fn log_queries(&self) -> Vec<LogQuery> {
        self.state.lock().unwrap().log_queries.clone()
    }

    pub fn code_queries(&self) -> usize {
        self.state.lock().unwrap().code_queries
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn block_number(&self) -> anyhow::Result<BlockNumber> {
        Ok(self.state.lock().unwrap().head)
    }

    async fn block_timestamp(
        &self,
        block: BlockNumber,
    ) -> anyhow::Result<DateTime<Utc>> {
        self.state
            .lock()
            .unwrap()
            .timestamps
            .get(&block)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Block {} not found", block))
    }

    async fn logs(&self, query: &LogQuery) -> anyhow::Result<Vec<EventLog>> {
        let mut state = self.state.lock().unwrap();
        state.log_queries.push(*query);

        if state.failing_windows.contains(&query.window.from) {
            anyhow::bail!("connection reset fetching {}", query.window);
        }

        Ok(state
            .logs
            .iter()
            .filter(|log| {
                log.address == query.address
                    && log.topic(0) == Some(&query.event_signature)
                    && query.window.contains(log.block_number)
            })
            .cloned()
            .collect())
    }

    async fn code(&self, address: Address) -> anyhow::Result<Bytes> {
        let mut state = self.state.lock().unwrap();
        state.code_queries += 1;
        Ok(state.code.get(&address).cloned().unwrap_or_default())
    }
}

pub fn event_log(
    contract: Address,
    signature: B256,
    indexed: &[Address],
    block: BlockNumber,
) -> EventLog {
    let mut topics = vec![signature];
    topics.extend(indexed.iter().map(|address| address.into_word()));

    EventLog {
        block_number: block,
        address: contract,
        topics,
        data: Bytes::new(),
        transaction_hash: Some(B256::with_last_byte(block as u8)),
        log_index: Some(0),
    }
}

/// Successful call returning `value`.
pub fn returns<T: SolValue>(value: T) -> RawCallResult {
    RawCallResult {
        success: true,
        return_data: (value,).abi_encode_params().into(),
    }
}

pub fn reverts(reason: &str) -> RawCallResult {
    RawCallResult {
        success: false,
        return_data: Revert {
            reason: reason.to_string(),
        }
        .abi_encode()
        .into(),
    }
}

type CallHandler =
    Box<dyn Fn(&Call, BlockNumber) -> RawCallResult + Send + Sync>;

/// Aggregator answering each call through a handler, recording batch sizes
/// and the peak number of batches in flight.
pub struct MockAggregator {
    handler: CallHandler,
    batches: Mutex<Vec<usize>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    failing: Mutex<bool>,
}

impl MockAggregator {
    pub fn new(
        handler: impl Fn(&Call, BlockNumber) -> RawCallResult
            + Send
            + Sync
            + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            batches: Mutex::new(vec![]),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            failing: Mutex::new(false),
        }
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(atomic::Ordering::SeqCst)
    }

    /// Every following round trip fails at the transport level.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }
}

#[async_trait]
impl Aggregator for MockAggregator {
    async fn aggregate(
        &self,
        calls: &[Call],
        block: BlockNumber,
    ) -> anyhow::Result<Vec<RawCallResult>> {
        if *self.failing.lock().unwrap() {
            anyhow::bail!("request timed out");
        }
        self.batches.lock().unwrap().push(calls.len());

        let in_flight =
            self.in_flight.fetch_add(1, atomic::Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(in_flight, atomic::Ordering::SeqCst);
        tokio::task::yield_now().await;

        let results = calls
            .iter()
            .map(|call| (self.handler)(call, block))
            .collect();

        self.in_flight.fetch_sub(1, atomic::Ordering::SeqCst);
        Ok(results)
    }
}
