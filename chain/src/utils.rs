use std::path::Path;

use anyhow::Context;

/// Writes through a sibling temp file and a rename, so readers only ever see
/// the old or the new content.
pub(crate) async fn write_atomic(
    path: &Path,
    contents: &[u8],
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.with_context(|| {
            format!("Failed to create {}", parent.display())
        })?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");

    tokio::fs::write(&tmp, contents)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    tokio::fs::rename(&tmp, path)
        .await
        .with_context(|| format!("Failed to replace {}", path.display()))
}
