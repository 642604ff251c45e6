use std::collections::BTreeSet;

use alloy::primitives::Address;
use chain::stream::EventStream;
use chrono::{DateTime, Utc};
use shared::error::{AsLocalStateError, MainError};
use shared::point::{PointRecord, PointType};

use crate::context::AppContext;

pub mod dual_core;
pub mod marketplace;
pub mod stakes;

pub use dual_core::{dual_core_preview, dual_core_snapshot};
pub use marketplace::marketplace_snapshot;
pub use stakes::crawl_stakes;

/// Addresses collected so far by the crawler of `stream`.
async fn known_addresses(
    ctx: &AppContext,
    stream: &EventStream,
) -> Result<BTreeSet<Address>, MainError> {
    match &stream.address_set {
        Some(name) => ctx
            .crawler
            .address_set(name)
            .load()
            .await
            .into_local_state_error(),
        None => Ok(BTreeSet::new()),
    }
}

/// Persists a snapshot, submits it once fully persisted and prunes expired
/// snapshot files.
async fn publish(
    ctx: &AppContext,
    kind: PointType,
    time: DateTime<Utc>,
    records: Vec<PointRecord>,
) -> Result<(), MainError> {
    let persisted = ctx.persister.persist(kind, time, &records).await;

    match ctx.persister.cleanup(time.date_naive()).await {
        Ok(0) => (),
        Ok(removed) => tracing::info!(removed, "Removed expired snapshots"),
        Err(reason) => {
            tracing::warn!(%reason, "Failed to remove expired snapshots")
        }
    }

    let report = persisted?;
    if records.is_empty() {
        return Ok(());
    }

    let submitted = match ctx.submitter.submit(&records).await {
        Ok(submitted) => submitted,
        Err(reason) => {
            tracing::error!(
                %kind,
                %time,
                dump = %report.dump.display(),
                records = records.len(),
                ?reason,
                "Snapshot persisted but not submitted, resubmit from dump"
            );
            return Err(reason.into());
        }
    };
    tracing::info!(
        %kind,
        %time,
        persisted = report.inserted,
        submitted,
        "Published snapshot"
    );

    Ok(())
}
