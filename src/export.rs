use std::path::{Path, PathBuf};
use tracing::info;

use crate::proto::Result;
use crate::stream::StreamBuffer;

/// Writes the buffer verbatim to `<dir>/<device_id>.csv`.
pub async fn write_csv(
    dir: impl AsRef<Path>,
    device_id: &str,
    buffer: &StreamBuffer,
) -> Result<PathBuf> {
    let path = dir.as_ref().join(format!("{}.csv", device_id));
    tokio::fs::write(&path, buffer.to_csv()).await?;
    info!(path = %path.display(), rows = buffer.row_count(), "csv written");
    Ok(path)
}
