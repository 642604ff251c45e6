use std::collections::BTreeSet;

use alloy::primitives::{Address, U256};
use chain::accounts::AccountKind;
use chain::contracts::IERC20::balanceOfCall;
use chrono::{DateTime, NaiveTime, Utc};
use shared::block::BlockNumber;
use shared::error::{AsRpcError, MainError};
use shared::point::{PointRecord, PointType};
use snapshot::points::dual_core_records;

use super::{known_addresses, publish};
use crate::context::AppContext;

/// Daily dual core holding snapshot, stamped at UTC midnight of `now`.
///
/// Runs once the configured delay after midnight has passed; earlier calls
/// and calls for a day already persisted do nothing.
pub async fn dual_core_snapshot(
    ctx: &AppContext,
    now: DateTime<Utc>,
) -> Result<(), MainError> {
    let settings = &ctx.settings;
    if now.time() < settings.snapshot_not_before {
        return Err(MainError::NoAction);
    }

    let today = now.date_naive();
    let time = today.and_time(NaiveTime::MIN).and_utc();
    if ctx
        .persister
        .already_persisted(PointType::DualCoreSnapshot, time)
        .await?
    {
        return Err(MainError::DuplicateCycle);
    }

    let outcome = ctx.crawler.crawl(&settings.dual_core_stream).await?;
    let records =
        holdings(ctx, outcome.checkpoint_advanced_to, time).await?;

    publish(ctx, PointType::DualCoreSnapshot, time, records).await
}

/// Dual core records at the chain head for the holders crawled so far,
/// stamped `now`. Nothing is persisted or submitted and the crawler
/// checkpoint stays where it is.
pub async fn dual_core_preview(
    ctx: &AppContext,
    now: DateTime<Utc>,
) -> Result<Vec<PointRecord>, MainError> {
    let block = ctx.chain.block_number().await.into_rpc_error()?;
    holdings(ctx, block, now).await
}

async fn holdings(
    ctx: &AppContext,
    block: BlockNumber,
    time: DateTime<Utc>,
) -> Result<Vec<PointRecord>, MainError> {
    let settings = &ctx.settings;
    let holders = known_addresses(ctx, &settings.dual_core_stream)
        .await?
        .into_iter()
        .filter(|holder| *holder != settings.vault)
        .collect::<Vec<_>>();

    let calls = holders
        .iter()
        .map(|holder| balanceOfCall { account: *holder })
        .collect::<Vec<_>>();
    let results = ctx
        .reader
        .read_typed(settings.dual_core_token, &calls, block)
        .await?;

    let mut balances: Vec<(Address, U256)> = Vec::with_capacity(holders.len());
    for (holder, result) in holders.iter().zip(results) {
        match result {
            Ok(balance) => balances.push((*holder, balance)),
            Err(reason) => tracing::warn!(
                holder = %holder,
                %reason,
                "Skipping unreadable dual core balance"
            ),
        }
    }

    if settings.classify_accounts {
        let holding = balances
            .iter()
            .filter(|(_, balance)| !balance.is_zero())
            .map(|(holder, _)| *holder)
            .collect::<BTreeSet<_>>();
        let kinds = ctx.classifier.classify(&holding).await.into_rpc_error()?;
        let contracts = kinds
            .values()
            .filter(|kind| **kind == AccountKind::Contract)
            .count();
        tracing::info!(
            holders = kinds.len(),
            contracts,
            "Classified dual core holders"
        );
    }

    let rate_diff =
        ctx.exchange_rates.rate_diff(time.date_naive()).await?;
    let records = dual_core_records(
        &balances,
        settings.vault,
        time,
        rate_diff,
        settings.dual_core_multiplier,
    );

    tracing::info!(
        block,
        holders = holders.len(),
        records = records.len(),
        rate_diff,
        "Computed dual core snapshot"
    );

    Ok(records)
}
