use std::fmt::Display;

use serde::{Deserialize, Serialize};

pub type BlockNumber = u64;

/// Inclusive range of blocks queried in one `eth_getLogs` round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockWindow {
    pub from: BlockNumber,
    pub to: BlockNumber,
}

impl BlockWindow {
    pub fn new(from: BlockNumber, to: BlockNumber) -> Self {
        Self { from, to }
    }

    pub fn contains(&self, block: BlockNumber) -> bool {
        self.from <= block && block <= self.to
    }
}

impl Display for BlockWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {}]", self.from, self.to)
    }
}

/// Splits `[start, latest]` into contiguous windows.
///
/// Window boundaries sit at `start + k * width`, so every window satisfies
/// `to - from <= width` and the next window starts right after the previous
/// one ends. When `start == latest` a single one-block window is produced.
/// A `start` above `latest` is clamped down to `latest`.
pub fn block_windows(
    start: BlockNumber,
    latest: BlockNumber,
    width: u64,
) -> impl Iterator<Item = BlockWindow> {
    let width = width.max(1);
    let start = start.min(latest);
    let first = BlockWindow::new(start, start.saturating_add(width).min(latest));

    std::iter::successors(Some(first), move |previous| {
        if previous.to >= latest {
            return None;
        }
        Some(BlockWindow::new(
            previous.to + 1,
            previous.to.saturating_add(width).min(latest),
        ))
    })
}
