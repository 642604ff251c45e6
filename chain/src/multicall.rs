use std::sync::Arc;

use alloy::primitives::{hex, Address, Bytes};
use alloy::providers::DynProvider;
use alloy::rpc::types::BlockId;
use alloy::sol_types::{decode_revert_reason, SolCall};
use anyhow::Context;
use async_trait::async_trait;
use futures::{FutureExt, StreamExt, TryStreamExt};
use shared::block::BlockNumber;
use shared::error::MainError;
use shared::rate_limit::RateLimiter;
use thiserror::Error;

use crate::contracts::IMulticall3;

pub const MIN_BATCH_SIZE: usize = 4;
pub const MAX_BATCH_SIZE: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub target: Address,
    pub data: Bytes,
}

impl Call {
    pub fn new(target: Address, data: impl Into<Bytes>) -> Self {
        Self {
            target,
            data: data.into(),
        }
    }

    pub fn encode<C: SolCall>(target: Address, call: &C) -> Self {
        Self::new(target, call.abi_encode())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCallResult {
    pub success: bool,
    pub return_data: Bytes,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallFailure {
    #[error("call reverted: {0}")]
    Reverted(String),
    #[error("failed to decode return data: {0}")]
    Decode(String),
}

pub type CallResult<T> = Result<T, CallFailure>;

#[derive(Error, Debug)]
pub enum MulticallError {
    #[error("Multicall batch {batch} failed")]
    Rpc {
        batch: usize,
        #[source]
        source: anyhow::Error,
    },
    #[error(
        "Multicall batch {batch} returned {actual} results for {expected} calls"
    )]
    LengthMismatch {
        batch: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Call {index} failed: {reason}")]
    CallFailed { index: usize, reason: CallFailure },
}

impl From<MulticallError> for MainError {
    fn from(error: MulticallError) -> Self {
        tracing::error!(reason = ?error, "Multicall read failed");
        match error {
            MulticallError::Rpc { .. }
            | MulticallError::LengthMismatch { .. } => MainError::RpcError,
            MulticallError::CallFailed { .. } => MainError::ContractCall,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Failed calls are returned as `CallFailure`s.
    #[default]
    Lenient,
    /// Any failed call aborts the whole read.
    FailClosed,
}

#[derive(clap::Parser, Clone, Copy, Debug)]
pub struct MulticallConfig {
    #[clap(
        long,
        env,
        default_value_t = 500,
        value_parser = clap::value_parser!(u64).range(4..=4096),
        help = "Calls per aggregate3 round trip"
    )]
    pub multicall_batch_size: u64,

    #[clap(
        long,
        env,
        default_value_t = 1,
        help = "Batches allowed in flight at once"
    )]
    pub multicall_concurrency: usize,

    #[clap(
        long,
        env,
        default_value_t = 10,
        help = "Batches dispatched per second, 0 disables the limit"
    )]
    pub multicall_requests_per_second: u32,

    #[clap(long, env, value_enum, default_value_t = FailureMode::Lenient)]
    pub multicall_failure_mode: FailureMode,
}

impl Default for MulticallConfig {
    fn default() -> Self {
        Self {
            multicall_batch_size: 500,
            multicall_concurrency: 1,
            multicall_requests_per_second: 10,
            multicall_failure_mode: FailureMode::Lenient,
        }
    }
}

/// Executes a batch of calls in one round trip at a fixed block, returning
/// one result per call in input order.
#[async_trait]
pub trait Aggregator: Send + Sync {
    async fn aggregate(
        &self,
        calls: &[Call],
        block: BlockNumber,
    ) -> anyhow::Result<Vec<RawCallResult>>;
}

/// `aggregate3` on a deployed Multicall3, with `allowFailure` set on every
/// call.
#[derive(Clone)]
pub struct Multicall3 {
    provider: DynProvider,
    address: Address,
}

impl Multicall3 {
    pub fn new(provider: DynProvider, address: Address) -> Self {
        Self { provider, address }
    }
}

#[async_trait]
impl Aggregator for Multicall3 {
    async fn aggregate(
        &self,
        calls: &[Call],
        block: BlockNumber,
    ) -> anyhow::Result<Vec<RawCallResult>> {
        let multicall = IMulticall3::new(self.address, self.provider.clone());
        let calls = calls
            .iter()
            .map(|call| IMulticall3::Call3 {
                target: call.target,
                allowFailure: true,
                callData: call.data.clone(),
            })
            .collect::<Vec<_>>();

        let results = multicall
            .aggregate3(calls)
            .block(BlockId::number(block))
            .call()
            .await
            .with_context(|| format!("aggregate3 failed at block {}", block))?;

        Ok(results
            .into_iter()
            .map(|result| RawCallResult {
                success: result.success,
                return_data: result.returnData,
            })
            .collect())
    }
}

#[derive(Clone)]
pub struct MulticallReader {
    aggregator: Arc<dyn Aggregator>,
    batch_size: usize,
    concurrency: usize,
    mode: FailureMode,
    limiter: Arc<RateLimiter>,
}

impl MulticallReader {
    pub fn new(
        aggregator: Arc<dyn Aggregator>,
        config: MulticallConfig,
    ) -> Self {
        Self {
            aggregator,
            batch_size: (config.multicall_batch_size as usize)
                .clamp(MIN_BATCH_SIZE, MAX_BATCH_SIZE),
            concurrency: config.multicall_concurrency.max(1),
            mode: config.multicall_failure_mode,
            limiter: Arc::new(RateLimiter::per_second(
                config.multicall_requests_per_second,
            )),
        }
    }

    /// One result per call, in input order, whatever the batch split.
    pub async fn read_batch(
        &self,
        calls: &[Call],
        block: BlockNumber,
    ) -> Result<Vec<CallResult<Bytes>>, MulticallError> {
        if calls.is_empty() {
            return Ok(vec![]);
        }

        let batches = calls
            .chunks(self.batch_size)
            .map(<[Call]>::to_vec)
            .enumerate()
            .map(|(batch, chunk)| {
                let aggregator = self.aggregator.clone();
                let limiter = self.limiter.clone();
                async move {
                    limiter.acquire().await;

                    let results = aggregator
                        .aggregate(&chunk, block)
                        .await
                        .map_err(|source| MulticallError::Rpc {
                            batch,
                            source,
                        })?;

                    if results.len() != chunk.len() {
                        return Err(MulticallError::LengthMismatch {
                            batch,
                            expected: chunk.len(),
                            actual: results.len(),
                        });
                    }

                    tracing::debug!(
                        batch,
                        calls = chunk.len(),
                        block,
                        "Read batch"
                    );
                    Ok(results)
                }
                .boxed()
            })
            .collect::<Vec<_>>();

        let batches = futures::stream::iter(batches)
            .buffered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await?;

        batches
            .into_iter()
            .flatten()
            .enumerate()
            .map(|(index, result)| {
                if result.success {
                    return Ok(Ok(result.return_data));
                }
                let reason = decode_revert_reason(&result.return_data)
                    .unwrap_or_else(|| {
                        hex::encode_prefixed(&result.return_data)
                    });
                self.failure(index, CallFailure::Reverted(reason))
            })
            .collect()
    }

    /// Decodes each return value as `C::Return`.
    pub async fn read_typed<C: SolCall>(
        &self,
        target: Address,
        calls: &[C],
        block: BlockNumber,
    ) -> Result<Vec<CallResult<C::Return>>, MulticallError> {
        let encoded = calls
            .iter()
            .map(|call| Call::encode(target, call))
            .collect::<Vec<_>>();

        self.read_batch(&encoded, block)
            .await?
            .into_iter()
            .enumerate()
            .map(|(index, result)| match result {
                Ok(data) => match decode_return::<C>(&data) {
                    Ok(value) => Ok(Ok(value)),
                    Err(failure) => self.failure(index, failure),
                },
                Err(failure) => Ok(Err(failure)),
            })
            .collect()
    }

    /// Dispatches all groups as one ordered read and hands back the results
    /// grouped the same way.
    pub async fn read_grouped(
        &self,
        groups: &[Vec<Call>],
        block: BlockNumber,
    ) -> Result<Vec<Vec<CallResult<Bytes>>>, MulticallError> {
        let flat = groups.iter().flatten().cloned().collect::<Vec<_>>();
        let mut results = self.read_batch(&flat, block).await?.into_iter();

        Ok(groups
            .iter()
            .map(|group| results.by_ref().take(group.len()).collect())
            .collect())
    }

    /// `read_grouped` with each return value decoded as `C::Return`. Decode
    /// failures follow the failure mode like reverts do.
    pub async fn read_grouped_typed<C: SolCall>(
        &self,
        groups: &[Vec<Call>],
        block: BlockNumber,
    ) -> Result<Vec<Vec<CallResult<C::Return>>>, MulticallError> {
        let mut index = 0;
        let mut decoded = Vec::with_capacity(groups.len());

        for group in self.read_grouped(groups, block).await? {
            let mut results = Vec::with_capacity(group.len());
            for result in group {
                results.push(match result {
                    Ok(data) => match decode_return::<C>(&data) {
                        Ok(value) => Ok(value),
                        Err(failure) => self.failure(index, failure)?,
                    },
                    Err(failure) => Err(failure),
                });
                index += 1;
            }
            decoded.push(results);
        }

        Ok(decoded)
    }

    fn failure<T>(
        &self,
        index: usize,
        failure: CallFailure,
    ) -> Result<CallResult<T>, MulticallError> {
        match self.mode {
            FailureMode::FailClosed => Err(MulticallError::CallFailed {
                index,
                reason: failure,
            }),
            FailureMode::Lenient => {
                tracing::debug!(index, %failure, "Call failed");
                Ok(Err(failure))
            }
        }
    }
}

pub fn decode_return<C: SolCall>(data: &[u8]) -> CallResult<C::Return> {
    C::abi_decode_returns(data).map_err(|e| CallFailure::Decode(e.to_string()))
}
