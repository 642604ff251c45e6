use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::PathBuf;

use alloy::primitives::Address;
use anyhow::Context;
use shared::id::{holder_id, parse_address};

use crate::utils::write_atomic;

/// Append-only set of participant addresses, stored as a JSON array of
/// lowercase hex strings.
#[derive(Debug, Clone)]
pub struct AddressSetStore {
    path: PathBuf,
}

impl AddressSetStore {
    pub fn new(dir: impl Into<PathBuf>, name: &str) -> Self {
        Self {
            path: dir.into().join(format!("addresses_{}.json", name)),
        }
    }

    pub async fn load(&self) -> anyhow::Result<BTreeSet<Address>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(BTreeSet::new())
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read {}", self.path.display())
                })
            }
        };

        let entries: Vec<String> = serde_json::from_slice(&raw)
            .with_context(|| {
                format!("Failed to parse {}", self.path.display())
            })?;

        entries.iter().map(|entry| parse_address(entry)).collect()
    }

    /// Unions `addresses` into the stored set and returns the ones that were
    /// not known yet. The file is left untouched when nothing is new.
    pub async fn merge(
        &self,
        addresses: &BTreeSet<Address>,
    ) -> anyhow::Result<BTreeSet<Address>> {
        let mut known = self.load().await?;
        let added = addresses
            .difference(&known)
            .copied()
            .collect::<BTreeSet<_>>();

        if added.is_empty() {
            return Ok(added);
        }

        known.extend(added.iter().copied());
        let entries = known.iter().map(holder_id).collect::<Vec<_>>();
        let contents = serde_json::to_vec(&entries)
            .context("Failed to serialize address set")?;

        write_atomic(&self.path, &contents).await?;

        Ok(added)
    }
}
