use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use chain::contracts::IAssetOnchain::{
    getMarketplaceRewardCall, getUserStakedOrderCall,
};
use chain::multicall::{Call, MulticallReader};
use shared::block::BlockNumber;
use shared::id::holder_id;

use crate::diff::DiffError;
use crate::reward::{RewardKind, RewardSource};

/// Orders per `getMarketplaceReward` call.
pub const ORDER_CHUNK: usize = 5;

/// Marketplace rewards of core stakers, read in two dependent stages:
/// staked orders first, then the reward of each chunk of orders.
#[derive(Clone)]
pub struct CoreRewardSource {
    reader: MulticallReader,
    asset_onchain: Address,
}

impl CoreRewardSource {
    pub fn new(reader: MulticallReader, asset_onchain: Address) -> Self {
        Self {
            reader,
            asset_onchain,
        }
    }

    fn reward_calls(&self, user: Address, orders: &[U256]) -> Vec<Call> {
        if orders.is_empty() {
            return vec![Call::encode(
                self.asset_onchain,
                &getMarketplaceRewardCall {
                    user,
                    orders: vec![],
                },
            )];
        }

        orders
            .chunks(ORDER_CHUNK)
            .map(|chunk| {
                Call::encode(
                    self.asset_onchain,
                    &getMarketplaceRewardCall {
                        user,
                        orders: chunk.to_vec(),
                    },
                )
            })
            .collect()
    }
}

#[async_trait]
impl RewardSource for CoreRewardSource {
    type Holder = Address;

    fn kind(&self) -> RewardKind {
        RewardKind::Core
    }

    fn address(&self, holder: &Address) -> Address {
        *holder
    }

    async fn read(
        &self,
        holders: &[Address],
        block: BlockNumber,
    ) -> Result<Vec<Option<U256>>, DiffError> {
        let order_calls = holders
            .iter()
            .map(|user| getUserStakedOrderCall { user: *user })
            .collect::<Vec<_>>();
        let orders = self
            .reader
            .read_typed(self.asset_onchain, &order_calls, block)
            .await?;

        let groups = holders
            .iter()
            .zip(&orders)
            .map(|(user, orders)| match orders {
                Ok(orders) => self.reward_calls(*user, orders),
                Err(failure) => {
                    tracing::warn!(
                        holder = holder_id(user),
                        block,
                        %failure,
                        "Failed to read staked orders"
                    );
                    vec![]
                }
            })
            .collect::<Vec<_>>();
        let rewards = self
            .reader
            .read_grouped_typed::<getMarketplaceRewardCall>(&groups, block)
            .await?;

        Ok(holders
            .iter()
            .zip(orders)
            .zip(rewards)
            .map(|((user, orders), rewards)| {
                orders.ok()?;
                let total = rewards
                    .into_iter()
                    .map(|result| {
                        result.unwrap_or_else(|failure| {
                            tracing::warn!(
                                holder = holder_id(user),
                                block,
                                %failure,
                                "Counting failed reward chunk as zero"
                            );
                            U256::ZERO
                        })
                    })
                    .fold(U256::ZERO, |acc, reward| acc + reward);
                Some(total)
            })
            .collect())
    }
}
