use std::collections::HashSet;
use std::sync::atomic::{self, AtomicBool};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use shared::point::{PointKey, PointRecord, PointType};
use snapshot::btc_reward::{BtcStakePosition, BtcStakerSource};
use snapshot::exchange_rate::{ExchangeRateError, ExchangeRateSource};
use snapshot::persister::PointStore;
use snapshot::submission::{PointSubmitter, SubmitError};

/// Point store keeping records in memory, unique on `(time, holder, type)`.
#[derive(Default)]
pub struct MemoryPointStore {
    records: Mutex<Vec<PointRecord>>,
    rejected: Mutex<HashSet<String>>,
    unavailable: AtomicBool,
}

impl MemoryPointStore {
    pub fn records(&self) -> Vec<PointRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Inserts of `holder` are silently dropped, as a write error would.
    pub fn reject_holder(&self, holder: &str) {
        self.rejected.lock().unwrap().insert(holder.to_lowercase());
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, atomic::Ordering::SeqCst);
    }

    fn check_available(&self) -> anyhow::Result<()> {
        if self.unavailable.load(atomic::Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl PointStore for MemoryPointStore {
    async fn insert_many(
        &self,
        records: &[PointRecord],
    ) -> anyhow::Result<Vec<PointKey>> {
        self.check_available()?;
        let rejected = self.rejected.lock().unwrap().clone();
        let mut stored = self.records.lock().unwrap();

        let mut inserted = vec![];
        for record in records {
            let key = record.key();
            if rejected.contains(&record.holder)
                || stored.iter().any(|existing| existing.key() == key)
            {
                continue;
            }
            stored.push(record.clone());
            inserted.push(key);
        }
        Ok(inserted)
    }

    async fn find_one(
        &self,
        kind: PointType,
        time: DateTime<Utc>,
    ) -> anyhow::Result<bool> {
        self.check_available()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .any(|record| record.kind == kind && record.time == time))
    }
}

#[derive(Default)]
pub struct RecordingSubmitter {
    submitted: Mutex<Vec<PointRecord>>,
    failing: AtomicBool,
}

impl RecordingSubmitter {
    pub fn submitted(&self) -> Vec<PointRecord> {
        self.submitted.lock().unwrap().clone()
    }

    /// Rejects every submission, as an unreachable points API would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, atomic::Ordering::SeqCst);
    }
}

#[async_trait]
impl PointSubmitter for RecordingSubmitter {
    async fn submit(
        &self,
        records: &[PointRecord],
    ) -> Result<usize, SubmitError> {
        if self.failing.load(atomic::Ordering::SeqCst) {
            return Err(SubmitError::InvalidKey);
        }
        self.submitted.lock().unwrap().extend_from_slice(records);
        Ok(records.len())
    }
}

#[derive(Default)]
pub struct StaticBtcStakers {
    pub positions: Vec<BtcStakePosition>,
}

#[async_trait]
impl BtcStakerSource for StaticBtcStakers {
    async fn positions(&self) -> anyhow::Result<Vec<BtcStakePosition>> {
        Ok(self.positions.clone())
    }
}

/// Same rate change every day; `None` behaves like a missing chart entry.
pub struct FixedExchangeRates(pub Option<f64>);

#[async_trait]
impl ExchangeRateSource for FixedExchangeRates {
    async fn rate_diff(
        &self,
        today: NaiveDate,
    ) -> Result<f64, ExchangeRateError> {
        self.0.ok_or(ExchangeRateError::Missing(today))
    }
}

pub fn scratch_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}
