use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use shared::block::{BlockNumber, BlockWindow};
use tokio::io::AsyncWriteExt;

use crate::rpc::EventLog;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StagedEntry {
    Events {
        block: BlockNumber,
        logs: Vec<EventLog>,
    },
    Window {
        from: BlockNumber,
        to: BlockNumber,
    },
}

/// Content of a staging log, deduplicated by block number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedEvents {
    pub blocks: BTreeMap<BlockNumber, Vec<EventLog>>,
    pub windows: Vec<BlockWindow>,
}

impl StagedEvents {
    /// Last block covered by completed windows chained from `start`, if any.
    pub fn covered_until(&self, start: BlockNumber) -> Option<BlockNumber> {
        let mut windows = self.windows.clone();
        windows.sort_by_key(|window| window.from);

        let mut covered = None;
        let mut next = start;
        for window in windows {
            if window.from <= next && window.to >= next {
                covered = Some(window.to);
                next = window.to.saturating_add(1);
            }
        }
        covered
    }

    pub fn logs_in(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> impl Iterator<Item = (&BlockNumber, &Vec<EventLog>)> {
        self.blocks.range(from..=to)
    }
}

/// Append-only JSON-lines log of fetched logs and completed windows for one
/// stream. Cleared once the stream checkpoint has been advanced.
#[derive(Debug, Clone)]
pub struct StagingLog {
    path: PathBuf,
}

impl StagingLog {
    pub fn new(dir: impl Into<PathBuf>, stream_id: &str) -> Self {
        Self {
            path: dir.into().join(format!("{}.staging.jsonl", stream_id)),
        }
    }

    async fn append(&self, entry: &StagedEntry) -> anyhow::Result<()> {
        let mut line = serde_json::to_vec(entry)
            .context("Failed to serialize staging entry")?;
        line.push(b'\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create {}", parent.display())
            })?;
        }
        self.write_raw(&line).await
    }

    async fn write_raw(&self, bytes: &[u8]) -> anyhow::Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .with_context(|| {
                format!("Failed to open {}", self.path.display())
            })?;
        file.write_all(bytes).await.with_context(|| {
            format!("Failed to append to {}", self.path.display())
        })?;
        file.sync_data().await.with_context(|| {
            format!("Failed to sync {}", self.path.display())
        })
    }

    /// Cuts the log back to `len` bytes, dropping a torn tail.
    async fn truncate(&self, len: usize) -> anyhow::Result<()> {
        let file = tokio::fs::OpenOptions::new()
            .write(true)
            .open(&self.path)
            .await
            .with_context(|| {
                format!("Failed to open {}", self.path.display())
            })?;
        file.set_len(len as u64).await.with_context(|| {
            format!("Failed to truncate {}", self.path.display())
        })?;
        file.sync_data().await.with_context(|| {
            format!("Failed to sync {}", self.path.display())
        })
    }

    pub async fn append_block(
        &self,
        block: BlockNumber,
        logs: Vec<EventLog>,
    ) -> anyhow::Result<()> {
        self.append(&StagedEntry::Events { block, logs }).await
    }

    pub async fn mark_window(&self, window: BlockWindow) -> anyhow::Result<()> {
        self.append(&StagedEntry::Window {
            from: window.from,
            to: window.to,
        })
        .await
    }

    pub async fn load(&self) -> anyhow::Result<StagedEvents> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Ok(StagedEvents::default())
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read {}", self.path.display())
                })
            }
        };

        let mut staged = StagedEvents::default();
        let mut offset = 0;

        for (index, line) in raw.split_inclusive('\n').enumerate() {
            let start = offset;
            offset += line.len();
            if line.trim().is_empty() {
                continue;
            }

            let entry = match serde_json::from_str::<StagedEntry>(line) {
                Ok(entry) => entry,
                // a crash can leave the last line half written
                Err(e) if raw[offset..].trim().is_empty() => {
                    tracing::warn!(
                        path = %self.path.display(),
                        %e,
                        "Dropping torn trailing staging entry"
                    );
                    self.truncate(start).await?;
                    return Ok(staged);
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!(
                            "Corrupted staging entry {} in {}",
                            index,
                            self.path.display()
                        )
                    })
                }
            };

            match entry {
                StagedEntry::Events { block, logs } => {
                    staged.blocks.insert(block, logs);
                }
                StagedEntry::Window { from, to } => {
                    staged.windows.push(BlockWindow::new(from, to))
                }
            }
        }

        // complete entry whose newline was lost
        if !raw.is_empty() && !raw.ends_with('\n') {
            self.write_raw(b"\n").await?;
        }

        Ok(staged)
    }

    pub async fn clear(&self) -> anyhow::Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("Failed to remove {}", self.path.display())
            }),
        }
    }
}
