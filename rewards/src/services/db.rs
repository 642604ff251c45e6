use std::convert::identity;
use std::str::FromStr;

use alloy::primitives::B256;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orm::btc_positions::BtcStakePositionDb;
use shared::error::ContextDbInteractError;
use shared::id::parse_address;
use shared::point::{PointKey, PointRecord, PointType};
use snapshot::btc_reward::{BtcStakePosition, BtcStakerSource};
use snapshot::persister::PointStore;

use crate::app_state::AppState;
use crate::repository;

pub struct PgPointStore {
    app_state: AppState,
}

impl PgPointStore {
    pub fn new(app_state: AppState) -> Self {
        Self { app_state }
    }
}

#[async_trait]
impl PointStore for PgPointStore {
    async fn insert_many(
        &self,
        records: &[PointRecord],
    ) -> anyhow::Result<Vec<PointKey>> {
        let conn = self.app_state.get_db_connection().await?;
        let records = records.to_vec();

        conn.interact(move |conn| {
            repository::points::insert_points(conn, &records)
        })
        .await
        .context_db_interact_error()
        .and_then(identity)
    }

    async fn find_one(
        &self,
        kind: PointType,
        time: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        let conn = self.app_state.get_db_connection().await?;

        conn.interact(move |conn| {
            repository::points::point_exists(conn, kind, time)
        })
        .await
        .context_db_interact_error()
        .and_then(identity)
    }
}

pub struct PgBtcStakers {
    app_state: AppState,
}

impl PgBtcStakers {
    pub fn new(app_state: AppState) -> Self {
        Self { app_state }
    }
}

#[async_trait]
impl BtcStakerSource for PgBtcStakers {
    async fn positions(&self) -> anyhow::Result<Vec<BtcStakePosition>> {
        let conn = self.app_state.get_db_connection().await?;

        let rows = conn
            .interact(repository::btc_positions::unredeemed_positions)
            .await
            .context_db_interact_error()
            .and_then(identity)?;

        Ok(rows
            .into_iter()
            .filter_map(|row| match to_position(&row) {
                Ok(position) => Some(position),
                Err(reason) => {
                    tracing::warn!(
                        id = row.id,
                        %reason,
                        "Skipping malformed btc stake position"
                    );
                    None
                }
            })
            .collect())
    }
}

fn to_position(row: &BtcStakePositionDb) -> anyhow::Result<BtcStakePosition> {
    Ok(BtcStakePosition {
        holder: parse_address(&row.holder)?,
        receiver: parse_address(&row.receiver)?,
        tx_hash: B256::from_str(row.tx_hash.trim()).map_err(|e| {
            anyhow::anyhow!("Invalid tx hash {}: {}", row.tx_hash, e)
        })?,
    })
}
