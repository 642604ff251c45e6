use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::Context;
use shared::block::BlockNumber;

use crate::utils::write_atomic;

/// Last processed block per event stream, one decimal text file each.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, stream_id: &str) -> PathBuf {
        self.dir.join(format!("{}.checkpoint", stream_id))
    }

    pub async fn load(
        &self,
        stream_id: &str,
    ) -> anyhow::Result<Option<BlockNumber>> {
        let path = self.path(stream_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to read {}", path.display())
                })
            }
        };

        raw.trim().parse::<BlockNumber>().map(Some).with_context(|| {
            format!("Corrupted checkpoint in {}: {:?}", path.display(), raw)
        })
    }

    pub async fn save(
        &self,
        stream_id: &str,
        block: BlockNumber,
    ) -> anyhow::Result<()> {
        write_atomic(&self.path(stream_id), block.to_string().as_bytes()).await
    }
}
