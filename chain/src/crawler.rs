use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::Address;
use shared::block::{block_windows, BlockNumber, BlockWindow};
use shared::error::MainError;
use thiserror::Error;

use crate::address_set::AddressSetStore;
use crate::checkpoint::CheckpointStore;
use crate::rpc::{ChainClient, EventLog};
use crate::staging::StagingLog;
use crate::stream::EventStream;

#[derive(Error, Debug)]
pub enum CrawlError {
    #[error("Failed to query the chain head")]
    Head(#[source] anyhow::Error),
    #[error("Failed to fetch logs of stream {stream} in window {window}")]
    Logs {
        stream: String,
        window: BlockWindow,
        #[source]
        source: anyhow::Error,
    },
    #[error("Crawler local state error")]
    LocalState(#[from] anyhow::Error),
}

impl From<CrawlError> for MainError {
    fn from(error: CrawlError) -> Self {
        tracing::error!(reason = ?error, "Crawl failed");
        match error {
            CrawlError::Head(_) | CrawlError::Logs { .. } => {
                MainError::RpcError
            }
            CrawlError::LocalState(_) => MainError::LocalState,
        }
    }
}

/// Result of a scan whose checkpoint has not been advanced yet.
#[derive(Debug, Clone)]
pub struct PendingCrawl {
    pub stream: EventStream,
    pub from: BlockNumber,
    pub latest: BlockNumber,
    pub discovered: BTreeSet<Address>,
    pub event_blocks: BTreeSet<BlockNumber>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOutcome {
    pub new_addresses: BTreeSet<Address>,
    pub checkpoint_advanced_to: BlockNumber,
    pub event_blocks: BTreeSet<BlockNumber>,
}

#[derive(Clone)]
pub struct EventCrawler {
    client: Arc<dyn ChainClient>,
    data_dir: PathBuf,
    checkpoints: CheckpointStore,
}

impl EventCrawler {
    pub fn new(
        client: Arc<dyn ChainClient>,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        let data_dir = data_dir.into();
        Self {
            client,
            checkpoints: CheckpointStore::new(data_dir.clone()),
            data_dir,
        }
    }

    pub fn address_set(&self, name: &str) -> AddressSetStore {
        AddressSetStore::new(self.data_dir.clone(), name)
    }

    fn staging(&self, stream: &EventStream) -> StagingLog {
        StagingLog::new(self.data_dir.clone(), &stream.id)
    }

    /// Fetches every log between the checkpoint and the chain head into the
    /// staging log, without advancing the checkpoint.
    pub async fn scan(
        &self,
        stream: &EventStream,
    ) -> Result<PendingCrawl, CrawlError> {
        let checkpoint = match self.checkpoints.load(&stream.id).await? {
            Some(checkpoint) => checkpoint,
            None => {
                tracing::warn!(
                    stream = %stream.id,
                    "No checkpoint found, crawling from block 0"
                );
                0
            }
        };
        let latest =
            self.client.block_number().await.map_err(CrawlError::Head)?;

        let start = checkpoint.min(latest);
        if start < checkpoint {
            tracing::warn!(
                stream = %stream.id,
                checkpoint,
                latest,
                "Checkpoint is ahead of the chain head, clamping"
            );
        }

        let staging = self.staging(stream);
        let resume_from = match staging.load().await?.covered_until(start) {
            Some(covered) if covered > latest => {
                tracing::warn!(
                    stream = %stream.id,
                    covered,
                    latest,
                    "Staged windows are beyond the chain head, discarding"
                );
                staging.clear().await?;
                start
            }
            Some(covered) => {
                tracing::info!(
                    stream = %stream.id,
                    covered,
                    "Resuming from staged windows"
                );
                covered + 1
            }
            None => start,
        };

        if resume_from <= latest {
            for window in block_windows(resume_from, latest, stream.window) {
                let logs =
                    self.client.logs(&stream.query(window)).await.map_err(
                        |source| CrawlError::Logs {
                            stream: stream.id.clone(),
                            window,
                            source,
                        },
                    )?;

                tracing::debug!(
                    stream = %stream.id,
                    from = window.from,
                    to = window.to,
                    logs = logs.len(),
                    "Fetched window"
                );

                for (block, logs) in group_by_block(logs) {
                    staging.append_block(block, logs).await?;
                }
                staging.mark_window(window).await?;
            }
        }

        let staged = staging.load().await?;
        let mut discovered = BTreeSet::new();
        let mut event_blocks = BTreeSet::new();
        for (block, logs) in staged.logs_in(start, latest) {
            if logs.is_empty() {
                continue;
            }
            event_blocks.insert(*block);
            for log in logs {
                discovered.extend(stream.participants(log));
            }
        }

        tracing::info!(
            stream = %stream.id,
            from = start,
            to = latest,
            events = event_blocks.len(),
            addresses = discovered.len(),
            "Scanned stream"
        );

        Ok(PendingCrawl {
            stream: stream.clone(),
            from: start,
            latest,
            discovered,
            event_blocks,
        })
    }

    /// Merges the discovered addresses, advances the checkpoint to the
    /// scanned head and clears the staging log.
    pub async fn commit(
        &self,
        pending: PendingCrawl,
    ) -> Result<CrawlOutcome, CrawlError> {
        let new_addresses = match &pending.stream.address_set {
            Some(name) => {
                self.address_set(name).merge(&pending.discovered).await?
            }
            None => BTreeSet::new(),
        };

        self.checkpoints
            .save(&pending.stream.id, pending.latest)
            .await?;
        self.staging(&pending.stream).clear().await?;

        tracing::info!(
            stream = %pending.stream.id,
            checkpoint = pending.latest,
            new_addresses = new_addresses.len(),
            "Advanced checkpoint"
        );

        Ok(CrawlOutcome {
            new_addresses,
            checkpoint_advanced_to: pending.latest,
            event_blocks: pending.event_blocks,
        })
    }

    pub async fn crawl(
        &self,
        stream: &EventStream,
    ) -> Result<CrawlOutcome, CrawlError> {
        let pending = self.scan(stream).await?;
        self.commit(pending).await
    }
}

fn group_by_block(
    logs: Vec<EventLog>,
) -> BTreeMap<BlockNumber, Vec<EventLog>> {
    let mut blocks: BTreeMap<BlockNumber, Vec<EventLog>> = BTreeMap::new();
    for log in logs {
        blocks.entry(log.block_number).or_default().push(log);
    }
    blocks
}
