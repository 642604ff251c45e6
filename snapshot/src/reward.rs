use std::fmt::Display;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use shared::block::BlockNumber;

use crate::diff::DiffError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RewardKind {
    /// Holders staking through the asset contract.
    Core,
    /// Holders with BTC stake positions claimed through the marketplace.
    Btc,
}

impl Display for RewardKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RewardKind::Core => write!(f, "core"),
            RewardKind::Btc => write!(f, "btc"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RewardSample {
    pub holder: Address,
    pub block: BlockNumber,
    pub value: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardDelta {
    pub holder: Address,
    pub kind: RewardKind,
    pub today: U256,
    pub yesterday: U256,
    pub delta: U256,
}

/// Reads the accumulated reward of a holder set at a block height.
#[async_trait]
pub trait RewardSource: Send + Sync {
    type Holder: Send + Sync;

    fn kind(&self) -> RewardKind;

    fn address(&self, holder: &Self::Holder) -> Address;

    /// Narrows the holder set before both heights are read.
    async fn prepare(
        &self,
        holders: Vec<Self::Holder>,
        _yesterday: BlockNumber,
    ) -> Result<Vec<Self::Holder>, DiffError> {
        Ok(holders)
    }

    /// One entry per holder, in order. `None` when the reward of that holder
    /// could not be resolved at `block`.
    async fn read(
        &self,
        holders: &[Self::Holder],
        block: BlockNumber,
    ) -> Result<Vec<Option<U256>>, DiffError>;
}
