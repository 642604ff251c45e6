use std::fmt::Display;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize,
    Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointType {
    DualCoreSnapshot,
    MarketplaceClaimReward,
}

impl PointType {
    /// Prefix of the dated dump and backup files written for this type.
    pub fn file_prefix(&self) -> &'static str {
        match self {
            PointType::DualCoreSnapshot => "snapshot_data",
            PointType::MarketplaceClaimReward => "marketplaceReward",
        }
    }
}

impl Display for PointType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PointType::DualCoreSnapshot => write!(f, "DUAL_CORE_SNAPSHOT"),
            PointType::MarketplaceClaimReward => {
                write!(f, "MARKETPLACE_CLAIM_REWARD")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointRecord {
    pub holder: String,
    pub amount: String,
    pub point: f64,
    #[serde(rename = "type")]
    pub kind: PointType,
    pub time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl PointRecord {
    pub fn new(
        holder: String,
        amount: String,
        point: f64,
        kind: PointType,
        time: DateTime<Utc>,
    ) -> Self {
        Self {
            holder: holder.to_lowercase(),
            amount,
            point,
            kind,
            time,
            created_at: time,
        }
    }

    pub fn key(&self) -> PointKey {
        PointKey {
            holder: self.holder.clone(),
            time: self.time,
            kind: self.kind,
        }
    }
}

/// Uniqueness key of a persisted point record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointKey {
    pub holder: String,
    pub time: DateTime<Utc>,
    pub kind: PointType,
}

/// `YYYY_MM_DD`, the date suffix of dump and backup files.
pub fn date_suffix(date: NaiveDate) -> String {
    date.format("%Y_%m_%d").to_string()
}

pub fn parse_date_suffix(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y_%m_%d").ok()
}
