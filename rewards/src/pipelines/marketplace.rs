use std::collections::BTreeSet;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use shared::block::BlockNumber;
use shared::error::{AsDbError, AsRpcError, MainError};
use shared::point::PointType;
use snapshot::btc_reward::{group_by_holder, BtcRewardSource};
use snapshot::core_reward::CoreRewardSource;
use snapshot::diff::DiffEngine;
use snapshot::points::marketplace_records;

use super::{known_addresses, publish};
use crate::context::AppContext;

/// Marketplace reward snapshots, one per UTC day with a round turn since
/// the previous run, each taken at the last round turn of its day.
///
/// The turn round checkpoint only advances once every snapshot is persisted,
/// or found to be persisted already, so a failed cycle is retried against
/// the same rounds.
pub async fn marketplace_snapshot(ctx: &AppContext) -> Result<(), MainError> {
    let pending = ctx.crawler.scan(&ctx.settings.turn_round_stream).await?;

    if pending.event_blocks.is_empty() {
        ctx.crawler.commit(pending).await?;
        return Err(MainError::NoAction);
    }

    let rounds = last_round_per_day(ctx, &pending.event_blocks).await?;

    let mut taken = 0;
    for (block, time) in rounds {
        match snapshot_at(ctx, block, time).await {
            Ok(()) => taken += 1,
            Err(MainError::DuplicateCycle) => tracing::info!(
                block,
                %time,
                "Marketplace snapshot already taken"
            ),
            Err(e) => return Err(e),
        }
    }

    ctx.crawler.commit(pending).await?;

    if taken == 0 {
        Err(MainError::DuplicateCycle)
    } else {
        Ok(())
    }
}

async fn last_round_per_day(
    ctx: &AppContext,
    blocks: &BTreeSet<BlockNumber>,
) -> Result<Vec<(BlockNumber, DateTime<Utc>)>, MainError> {
    let mut rounds: Vec<(BlockNumber, DateTime<Utc>)> = Vec::new();

    for &block in blocks {
        let time = ctx.chain.block_timestamp(block).await.into_rpc_error()?;
        match rounds.last_mut() {
            Some(last) if last.1.date_naive() == time.date_naive() => {
                *last = (block, time)
            }
            _ => rounds.push((block, time)),
        }
    }

    Ok(rounds)
}

async fn snapshot_at(
    ctx: &AppContext,
    block: BlockNumber,
    time: DateTime<Utc>,
) -> Result<(), MainError> {
    let settings = &ctx.settings;
    let yesterday = block.saturating_sub(1);

    if ctx
        .persister
        .already_persisted(PointType::MarketplaceClaimReward, time)
        .await?
    {
        return Err(MainError::DuplicateCycle);
    }

    tracing::info!(block, %time, "Taking marketplace snapshot");

    let mut core_holders = known_addresses(ctx, &settings.stake_stream)
        .await?
        .into_iter()
        .collect::<Vec<Address>>();
    for extra in &settings.extra_core_stakers {
        if !core_holders.contains(extra) {
            core_holders.push(*extra);
        }
    }

    let engine = DiffEngine::new(settings.vault);
    let core =
        CoreRewardSource::new(ctx.reader.clone(), settings.asset_onchain);
    let mut deltas = engine.diff(&core, core_holders, block, yesterday).await?;

    let btc_stakers =
        group_by_holder(ctx.btc_stakers.positions().await.into_db_error()?);
    let btc = BtcRewardSource::new(
        ctx.reader.clone(),
        settings.bitcoin_stake,
        settings.marketplace,
    );
    deltas.extend(engine.diff(&btc, btc_stakers, block, yesterday).await?);

    let records =
        marketplace_records(&deltas, time, settings.marketplace_multiplier);

    tracing::info!(
        block,
        deltas = deltas.len(),
        records = records.len(),
        "Computed marketplace snapshot"
    );

    publish(ctx, PointType::MarketplaceClaimReward, time, records).await
}
