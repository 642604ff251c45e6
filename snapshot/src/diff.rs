use alloy::primitives::{Address, U256};
use chain::multicall::MulticallError;
use shared::block::BlockNumber;
use shared::error::MainError;
use shared::id::holder_id;
use thiserror::Error;

use crate::reward::{RewardDelta, RewardKind, RewardSample, RewardSource};

#[derive(Error, Debug)]
pub enum DiffError {
    #[error(
        "Reward of {holder} decreased from {yesterday} to {today} ({kind})"
    )]
    InconsistentReward {
        holder: Address,
        kind: RewardKind,
        today: U256,
        yesterday: U256,
    },
    #[error(
        "The {kind} source returned {actual} readings for {expected} holders"
    )]
    ReadingCount {
        kind: RewardKind,
        expected: usize,
        actual: usize,
    },
    #[error(transparent)]
    Multicall(#[from] MulticallError),
}

impl From<DiffError> for MainError {
    fn from(error: DiffError) -> Self {
        match error {
            DiffError::InconsistentReward { .. } => {
                tracing::error!(reason = %error, "Aborting snapshot");
                MainError::InconsistentReward
            }
            DiffError::ReadingCount { .. } => {
                tracing::error!(reason = %error, "Aborting snapshot");
                MainError::RpcError
            }
            DiffError::Multicall(e) => e.into(),
        }
    }
}

/// Computes per-holder reward deltas between two block heights.
#[derive(Debug, Clone, Copy)]
pub struct DiffEngine {
    vault: Address,
}

impl DiffEngine {
    /// `vault` never appears in any output.
    pub fn new(vault: Address) -> Self {
        Self { vault }
    }

    pub async fn diff<S: RewardSource>(
        &self,
        source: &S,
        holders: Vec<S::Holder>,
        today: BlockNumber,
        yesterday: BlockNumber,
    ) -> Result<Vec<RewardDelta>, DiffError> {
        let kind = source.kind();
        let holders = holders
            .into_iter()
            .filter(|holder| source.address(holder) != self.vault)
            .collect::<Vec<_>>();
        let holders = source.prepare(holders, yesterday).await?;

        let today_samples = self.samples(source, &holders, today).await?;
        let yesterday_samples =
            self.samples(source, &holders, yesterday).await?;

        let mut deltas = Vec::with_capacity(holders.len());
        for (today, yesterday) in today_samples.into_iter().zip(yesterday_samples)
        {
            let (Ok(today), Ok(yesterday)) = (today, yesterday) else {
                continue;
            };

            let delta = today.value.checked_sub(yesterday.value).ok_or(
                DiffError::InconsistentReward {
                    holder: today.holder,
                    kind,
                    today: today.value,
                    yesterday: yesterday.value,
                },
            )?;

            deltas.push(RewardDelta {
                holder: today.holder,
                kind,
                today: today.value,
                yesterday: yesterday.value,
                delta,
            });
        }

        tracing::info!(
            %kind,
            holders = holders.len(),
            resolved = deltas.len(),
            today,
            yesterday,
            "Diffed rewards"
        );

        Ok(deltas)
    }

    /// Samples for every holder; unresolved holders are logged and come
    /// back as `Err(holder)`.
    async fn samples<S: RewardSource>(
        &self,
        source: &S,
        holders: &[S::Holder],
        block: BlockNumber,
    ) -> Result<Vec<Result<RewardSample, Address>>, DiffError> {
        let values = source.read(holders, block).await?;
        if values.len() != holders.len() {
            return Err(DiffError::ReadingCount {
                kind: source.kind(),
                expected: holders.len(),
                actual: values.len(),
            });
        }

        Ok(holders
            .iter()
            .zip(values)
            .map(|(holder, value)| {
                let holder = source.address(holder);
                match value {
                    Some(value) => Ok(RewardSample {
                        holder,
                        block,
                        value,
                    }),
                    None => {
                        tracing::warn!(
                            holder = holder_id(&holder),
                            kind = %source.kind(),
                            block,
                            "Skipping holder with unresolved reward"
                        );
                        Err(holder)
                    }
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;

    /// Rewards per block per holder; a missing entry is unresolved.
    struct TableSource {
        rewards: HashMap<BlockNumber, HashMap<Address, u64>>,
    }

    #[async_trait]
    impl RewardSource for TableSource {
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
            let table = self.rewards.get(&block);
            Ok(holders
                .iter()
                .map(|holder| {
                    table
                        .and_then(|t| t.get(holder))
                        .map(|v| U256::from(*v))
                })
                .collect())
        }
    }

    fn holder(n: u8) -> Address {
        Address::repeat_byte(n)
    }

    fn source(
        today: &[(u8, u64)],
        yesterday: &[(u8, u64)],
    ) -> TableSource {
        let table = |rows: &[(u8, u64)]| -> HashMap<Address, u64> {
            rows.iter().map(|(h, v)| (holder(*h), *v)).collect()
        };
        TableSource {
            rewards: HashMap::from([(11, table(today)), (10, table(yesterday))]),
        }
    }

    #[tokio::test]
    async fn test_delta_is_today_minus_yesterday() {
        let engine = DiffEngine::new(Address::ZERO);
        let source = source(&[(1, 1000), (2, 50)], &[(1, 700), (2, 50)]);

        let deltas = engine
            .diff(&source, vec![holder(1), holder(2)], 11, 10)
            .await
            .unwrap();

        assert_eq!(deltas.len(), 2);
        assert_eq!(deltas[0].holder, holder(1));
        assert_eq!(deltas[0].delta, U256::from(300));
        assert_eq!(deltas[1].delta, U256::ZERO);
    }

    #[tokio::test]
    async fn test_equal_readings_yield_zero_deltas() {
        let engine = DiffEngine::new(Address::ZERO);
        let rows = [(1, 5), (2, 6), (3, 7)];
        let source = source(&rows, &rows);

        let deltas = engine
            .diff(&source, vec![holder(1), holder(2), holder(3)], 11, 10)
            .await
            .unwrap();

        assert_eq!(deltas.len(), 3);
        assert!(deltas.iter().all(|d| d.delta.is_zero()));
    }

    #[tokio::test]
    async fn test_decreasing_reward_aborts() {
        let engine = DiffEngine::new(Address::ZERO);
        let source = source(&[(1, 10), (2, 699)], &[(1, 5), (2, 700)]);

        let result = engine
            .diff(&source, vec![holder(1), holder(2)], 11, 10)
            .await;

        match result {
            Err(DiffError::InconsistentReward {
                holder: h,
                today,
                yesterday,
                ..
            }) => {
                assert_eq!(h, holder(2));
                assert_eq!(today, U256::from(699));
                assert_eq!(yesterday, U256::from(700));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unresolved_holder_is_skipped() {
        let engine = DiffEngine::new(Address::ZERO);
        let source = source(&[(1, 10), (2, 20), (3, 30)], &[(1, 5), (3, 1)]);

        let deltas = engine
            .diff(&source, vec![holder(1), holder(2), holder(3)], 11, 10)
            .await
            .unwrap();

        let holders = deltas.iter().map(|d| d.holder).collect::<Vec<_>>();
        assert_eq!(holders, vec![holder(1), holder(3)]);
    }

    #[tokio::test]
    async fn test_vault_is_never_reported() {
        let vault = holder(0xcd);
        let engine = DiffEngine::new(vault);
        // the vault's own readings would be inconsistent
        let source = source(&[(0xcd, 1), (1, 9)], &[(0xcd, 2), (1, 3)]);

        let deltas = engine
            .diff(&source, vec![vault, holder(1)], 11, 10)
            .await
            .unwrap();

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].holder, holder(1));
    }
}
