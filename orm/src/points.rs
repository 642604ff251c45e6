use chrono::{DateTime, Utc};
use diesel::{Insertable, Queryable, Selectable};
use serde::{Deserialize, Serialize};
use shared::point::{PointKey, PointRecord, PointType};

use crate::schema::points;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    diesel_derive_enum::DbEnum,
)]
#[ExistingTypePath = "crate::schema::sql_types::PointType"]
pub enum PointTypeDb {
    DualCoreSnapshot,
    MarketplaceClaimReward,
}

impl From<PointType> for PointTypeDb {
    fn from(value: PointType) -> Self {
        match value {
            PointType::DualCoreSnapshot => Self::DualCoreSnapshot,
            PointType::MarketplaceClaimReward => Self::MarketplaceClaimReward,
        }
    }
}

impl From<PointTypeDb> for PointType {
    fn from(value: PointTypeDb) -> Self {
        match value {
            PointTypeDb::DualCoreSnapshot => Self::DualCoreSnapshot,
            PointTypeDb::MarketplaceClaimReward => Self::MarketplaceClaimReward,
        }
    }
}

#[derive(Serialize, Queryable, Selectable, Clone, Debug)]
#[diesel(table_name = points)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PointDb {
    pub id: i32,
    pub holder: String,
    pub amount: String,
    pub point: f64,
    pub point_type: PointTypeDb,
    pub time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PointDb {
    pub fn key(&self) -> PointKey {
        PointKey {
            holder: self.holder.clone(),
            time: self.time,
            kind: self.point_type.into(),
        }
    }
}

impl From<PointDb> for PointRecord {
    fn from(value: PointDb) -> Self {
        PointRecord {
            holder: value.holder,
            amount: value.amount,
            point: value.point,
            kind: value.point_type.into(),
            time: value.time,
            created_at: value.created_at,
        }
    }
}

#[derive(Serialize, Insertable, Clone, Debug)]
#[diesel(table_name = points)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct PointInsertDb {
    pub holder: String,
    pub amount: String,
    pub point: f64,
    pub point_type: PointTypeDb,
    pub time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PointInsertDb {
    pub fn from_record(record: &PointRecord) -> Self {
        Self {
            holder: record.holder.to_lowercase(),
            amount: record.amount.clone(),
            point: record.point,
            point_type: record.kind.into(),
            time: record.time,
            created_at: record.created_at,
        }
    }
}
