use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use shared::error::MainError;
use shared::point::{
    date_suffix, parse_date_suffix, PointKey, PointRecord, PointType,
};
use thiserror::Error;

pub const RETENTION_DAYS: u64 = 30;

/// Durable point storage, unique on `(time, holder, type)`.
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Inserts what it can, skipping conflicting or rejected records, and
    /// returns the keys that were actually inserted.
    async fn insert_many(
        &self,
        records: &[PointRecord],
    ) -> anyhow::Result<Vec<PointKey>>;

    async fn find_one(
        &self,
        kind: PointType,
        time: DateTime<Utc>,
    ) -> anyhow::Result<bool>;
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("{kind} snapshot at {time} is already persisted")]
    Duplicate {
        kind: PointType,
        time: DateTime<Utc>,
    },
    #[error(
        "{failed} of {attempted} records were not persisted, backup in {}",
        backup.display()
    )]
    Partial {
        failed: usize,
        attempted: usize,
        backup: PathBuf,
    },
    #[error("Point store error")]
    Store(#[source] anyhow::Error),
    #[error("Snapshot file error")]
    LocalState(#[source] anyhow::Error),
}

impl From<PersistError> for MainError {
    fn from(error: PersistError) -> Self {
        match error {
            PersistError::Duplicate { .. } => MainError::DuplicateCycle,
            PersistError::Partial { .. } => {
                tracing::error!(reason = %error, "Partial persistence");
                MainError::PartialPersistence
            }
            PersistError::Store(_) => {
                tracing::error!(reason = ?error, "Point store unavailable");
                MainError::Database
            }
            PersistError::LocalState(_) => {
                tracing::error!(reason = ?error, "Snapshot file error");
                MainError::LocalState
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistReport {
    pub attempted: usize,
    pub inserted: usize,
    pub dump: PathBuf,
}

pub struct SnapshotPersister {
    store: Arc<dyn PointStore>,
    data_dir: PathBuf,
}

impl SnapshotPersister {
    pub fn new(
        store: Arc<dyn PointStore>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            data_dir: data_dir.into(),
        }
    }

    fn dated_path(&self, prefix: &str, date: NaiveDate) -> PathBuf {
        self.data_dir
            .join(format!("{}_{}.json", prefix, date_suffix(date)))
    }

    pub async fn already_persisted(
        &self,
        kind: PointType,
        time: DateTime<Utc>,
    ) -> Result<bool, PersistError> {
        self.store
            .find_one(kind, time)
            .await
            .map_err(PersistError::Store)
    }

    /// Writes every record to the dated dump, then inserts them. Records the
    /// store did not insert are backed up to `failed_<prefix>_<date>.json`.
    pub async fn persist(
        &self,
        kind: PointType,
        time: DateTime<Utc>,
        records: &[PointRecord],
    ) -> Result<PersistReport, PersistError> {
        if self.already_persisted(kind, time).await? {
            return Err(PersistError::Duplicate { kind, time });
        }

        let date = time.date_naive();
        let dump = self.dated_path(kind.file_prefix(), date);
        write_json(&dump, records)
            .await
            .map_err(PersistError::LocalState)?;

        let inserted = if records.is_empty() {
            tracing::warn!(%kind, %time, "Snapshot has no records");
            HashSet::new()
        } else {
            self.store
                .insert_many(records)
                .await
                .map_err(PersistError::Store)?
                .into_iter()
                .collect::<HashSet<_>>()
        };

        let failed = records
            .iter()
            .filter(|record| !inserted.contains(&record.key()))
            .collect::<Vec<_>>();

        if !failed.is_empty() {
            let backup = self.dated_path(
                &format!("failed_{}", kind.file_prefix()),
                date,
            );
            write_json(&backup, &failed)
                .await
                .map_err(PersistError::LocalState)?;
            return Err(PersistError::Partial {
                failed: failed.len(),
                attempted: records.len(),
                backup,
            });
        }

        tracing::info!(
            %kind,
            %time,
            inserted = inserted.len(),
            dump = %dump.display(),
            "Persisted snapshot"
        );

        Ok(PersistReport {
            attempted: records.len(),
            inserted: inserted.len(),
            dump,
        })
    }

    /// Deletes dated dumps and backups older than the retention period.
    pub async fn cleanup(
        &self,
        today: NaiveDate,
    ) -> Result<usize, PersistError> {
        let mut entries = match tokio::fs::read_dir(&self.data_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(0)
            }
            Err(e) => return Err(PersistError::LocalState(e.into())),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| PersistError::LocalState(e.into()))?
        {
            let name = entry.file_name();
            let Some(date) = name.to_str().and_then(artifact_date) else {
                continue;
            };
            if today.signed_duration_since(date).num_days()
                <= RETENTION_DAYS as i64
            {
                continue;
            }

            tokio::fs::remove_file(entry.path())
                .await
                .with_context(|| {
                    format!("Failed to remove {}", entry.path().display())
                })
                .map_err(PersistError::LocalState)?;
            tracing::debug!(file = ?name, "Removed expired snapshot file");
            removed += 1;
        }

        Ok(removed)
    }
}

/// Date of a `[failed_]<prefix>_YYYY_MM_DD.json` snapshot artifact.
fn artifact_date(file_name: &str) -> Option<NaiveDate> {
    let stem = file_name.strip_suffix(".json")?;
    let stem = stem.strip_prefix("failed_").unwrap_or(stem);

    [PointType::DualCoreSnapshot, PointType::MarketplaceClaimReward]
        .iter()
        .find_map(|kind| {
            stem.strip_prefix(kind.file_prefix())?
                .strip_prefix('_')
                .and_then(parse_date_suffix)
        })
}

async fn write_json<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create {}", parent.display())
        })?;
    }
    let contents =
        serde_json::to_vec(value).context("Failed to serialize records")?;
    tokio::fs::write(path, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}
