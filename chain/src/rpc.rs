use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockNumberOrTag, Filter, Log};
use alloy::transports::http::reqwest::Url;
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::block::{BlockNumber, BlockWindow};

/// Raw event log as it is kept in the staging log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventLog {
    pub block_number: BlockNumber,
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

impl EventLog {
    pub fn topic(&self, index: usize) -> Option<&B256> {
        self.topics.get(index)
    }

    fn from_rpc(log: Log) -> Option<Self> {
        let block_number = log.block_number?;
        Some(Self {
            block_number,
            address: log.inner.address,
            topics: log.topics().to_vec(),
            data: log.data().data.clone(),
            transaction_hash: log.transaction_hash,
            log_index: log.log_index,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogQuery {
    pub address: Address,
    pub event_signature: B256,
    pub window: BlockWindow,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn block_number(&self) -> anyhow::Result<BlockNumber>;

    async fn block_timestamp(
        &self,
        block: BlockNumber,
    ) -> anyhow::Result<DateTime<Utc>>;

    async fn logs(&self, query: &LogQuery) -> anyhow::Result<Vec<EventLog>>;

    async fn code(&self, address: Address) -> anyhow::Result<Bytes>;
}

#[derive(Clone)]
pub struct RpcChainClient {
    provider: DynProvider,
}

impl RpcChainClient {
    pub fn new(rpc_url: &str) -> anyhow::Result<Self> {
        let url = Url::parse(rpc_url)
            .with_context(|| format!("Invalid rpc url {}", rpc_url))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        Ok(Self { provider })
    }

    pub fn provider(&self) -> DynProvider {
        self.provider.clone()
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn block_number(&self) -> anyhow::Result<BlockNumber> {
        self.provider
            .get_block_number()
            .await
            .context("Failed to query latest block number")
    }

    async fn block_timestamp(
        &self,
        block: BlockNumber,
    ) -> anyhow::Result<DateTime<Utc>> {
        let header = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Number(block))
            .await
            .with_context(|| format!("Failed to query block {}", block))?
            .with_context(|| format!("Block {} not found", block))?
            .header;

        DateTime::from_timestamp(header.timestamp as i64, 0).with_context(
            || format!("Block {} has an invalid timestamp", block),
        )
    }

    async fn logs(&self, query: &LogQuery) -> anyhow::Result<Vec<EventLog>> {
        let filter = Filter::new()
            .address(query.address)
            .event_signature(query.event_signature)
            .from_block(query.window.from)
            .to_block(query.window.to);

        let logs = self.provider.get_logs(&filter).await.with_context(|| {
            format!("Failed to query logs in window {}", query.window)
        })?;

        let total = logs.len();
        let logs = logs
            .into_iter()
            .filter_map(EventLog::from_rpc)
            .collect::<Vec<_>>();
        if logs.len() < total {
            tracing::warn!(
                window = %query.window,
                skipped = total - logs.len(),
                "Skipping logs without a block number"
            );
        }

        Ok(logs)
    }

    async fn code(&self, address: Address) -> anyhow::Result<Bytes> {
        self.provider
            .get_code_at(address)
            .await
            .with_context(|| format!("Failed to query code of {}", address))
    }
}
