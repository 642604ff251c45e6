use std::collections::hash_map::Entry;
use std::collections::HashMap;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use chain::contracts::IBitcoinStake::btcTxMapCall;
use chain::contracts::IMarketplace::{
    claimBTCRewardProxyOnBehalfCall, BtcClaim,
};
use chain::multicall::MulticallReader;
use shared::block::BlockNumber;
use shared::id::holder_id;

use crate::diff::DiffError;
use crate::reward::{RewardKind, RewardSource};

/// An unredeemed BTC stake whose rewards are claimed to `receiver`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtcStakePosition {
    pub holder: Address,
    pub receiver: Address,
    pub tx_hash: B256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BtcStaker {
    pub holder: Address,
    pub positions: Vec<BtcStakePosition>,
}

#[async_trait]
pub trait BtcStakerSource: Send + Sync {
    async fn positions(&self) -> anyhow::Result<Vec<BtcStakePosition>>;
}

/// Groups positions by holder, keeping the order holders first appear in.
pub fn group_by_holder(positions: Vec<BtcStakePosition>) -> Vec<BtcStaker> {
    let mut index: HashMap<Address, usize> = HashMap::new();
    let mut stakers: Vec<BtcStaker> = vec![];
    for position in positions {
        match index.entry(position.holder) {
            Entry::Occupied(slot) => {
                stakers[*slot.get()].positions.push(position)
            }
            Entry::Vacant(slot) => {
                slot.insert(stakers.len());
                stakers.push(BtcStaker {
                    holder: position.holder,
                    positions: vec![position],
                });
            }
        }
    }
    stakers
}

/// Marketplace rewards of BTC stakers, simulated through
/// `claimBTCRewardProxyOnBehalf`.
#[derive(Clone)]
pub struct BtcRewardSource {
    reader: MulticallReader,
    bitcoin_stake: Address,
    marketplace: Address,
}

impl BtcRewardSource {
    pub fn new(
        reader: MulticallReader,
        bitcoin_stake: Address,
        marketplace: Address,
    ) -> Self {
        Self {
            reader,
            bitcoin_stake,
            marketplace,
        }
    }
}

#[async_trait]
impl RewardSource for BtcRewardSource {
    type Holder = BtcStaker;

    fn kind(&self) -> RewardKind {
        RewardKind::Btc
    }

    fn address(&self, holder: &BtcStaker) -> Address {
        holder.holder
    }

    /// Drops positions that are not staked at `yesterday`, and holders left
    /// without any position.
    async fn prepare(
        &self,
        holders: Vec<BtcStaker>,
        yesterday: BlockNumber,
    ) -> Result<Vec<BtcStaker>, DiffError> {
        let calls = holders
            .iter()
            .flat_map(|staker| &staker.positions)
            .map(|position| btcTxMapCall {
                txHash: position.tx_hash,
            })
            .collect::<Vec<_>>();
        let mut amounts = self
            .reader
            .read_typed(self.bitcoin_stake, &calls, yesterday)
            .await?
            .into_iter();

        let mut eligible = Vec::with_capacity(holders.len());
        for mut staker in holders {
            let staked = amounts.by_ref().take(staker.positions.len());
            let positions = staker
                .positions
                .drain(..)
                .zip(staked)
                .filter_map(|(position, amount)| match amount {
                    Ok(amount) if !amount.is_zero() => Some(position),
                    Ok(_) => None,
                    Err(failure) => {
                        tracing::warn!(
                            holder = holder_id(&position.holder),
                            tx_hash = %position.tx_hash,
                            %failure,
                            "Dropping unreadable btc position"
                        );
                        None
                    }
                })
                .collect::<Vec<_>>();

            if positions.is_empty() {
                tracing::debug!(
                    holder = holder_id(&staker.holder),
                    "No staked btc position left"
                );
                continue;
            }
            staker.positions = positions;
            eligible.push(staker);
        }

        Ok(eligible)
    }

    async fn read(
        &self,
        holders: &[BtcStaker],
        block: BlockNumber,
    ) -> Result<Vec<Option<U256>>, DiffError> {
        let calls = holders
            .iter()
            .map(|staker| claimBTCRewardProxyOnBehalfCall {
                claims: staker
                    .positions
                    .iter()
                    .map(|position| BtcClaim {
                        receiver: position.receiver,
                        txHash: position.tx_hash,
                        to: position.holder,
                    })
                    .collect(),
            })
            .collect::<Vec<_>>();

        let rewards = self
            .reader
            .read_typed(self.marketplace, &calls, block)
            .await?;

        Ok(rewards
            .into_iter()
            .map(|result| {
                result.ok().map(|rewards| {
                    rewards.into_iter().fold(U256::ZERO, |acc, r| acc + r)
                })
            })
            .collect())
    }
}
