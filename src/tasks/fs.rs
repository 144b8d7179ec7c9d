use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

/// Outcome of the two-sample size check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stability {
    /// Same non-zero size on both samples.
    Stable(u64),
    /// Size changed during the delay; still being written.
    Growing,
    Empty,
    /// File disappeared (e.g. another node processed it).
    Missing,
    /// Shutdown requested during the delay.
    Cancelled,
}

async fn size_of(path: &Path) -> Result<Option<u64>> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Ok(Some(meta.len())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("Failed to stat {}", path.display())),
    }
}

/// Measures the size of `path`, waits `delay`, and measures again.
pub async fn check_stability(
    path: &Path,
    delay: Duration,
    shutdown: &CancellationToken,
) -> Result<Stability> {
    let Some(before) = size_of(path).await? else {
        return Ok(Stability::Missing);
    };

    tokio::select! {
        _ = shutdown.cancelled() => return Ok(Stability::Cancelled),
        _ = tokio::time::sleep(delay) => {}
    }

    let Some(after) = size_of(path).await? else {
        return Ok(Stability::Missing);
    };

    Ok(if before != after {
        Stability::Growing
    } else if after == 0 {
        Stability::Empty
    } else {
        Stability::Stable(after)
    })
}

/// Regular, non-hidden files of `dir` in listing order. A missing folder lists as empty.
pub async fn list_files(dir: &Path) -> Result<Vec<(PathBuf, String)>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!("Folder {} does not exist yet", dir.display());
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!("Skipping non UTF-8 file name in {}", dir.display());
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        if entry.file_type().await?.is_file() {
            files.push((entry.path(), name));
        }
    }

    Ok(files)
}

/// Temp file used while writing `name` into `dir`. Hidden, so listings skip it.
pub fn temp_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!(".{}.{}.tmp", name, uuid::Uuid::new_v4().simple()))
}

/// Writes `data` to `dir/name` so that the final name only ever shows complete content.
///
/// The bytes go to a temp file in the same folder, are synced, then renamed over the
/// final name. On failure the temp file is removed.
pub async fn write_atomic(dir: &Path, name: &str, data: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    let target = dir.join(name);
    let temp = temp_path(dir, name);

    let result = async {
        let mut file = tokio::fs::File::create(&temp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&temp, &target).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(e).with_context(|| format!("Failed to write {}", target.display()));
    }

    Ok(target)
}

pub async fn exists(path: &Path) -> Result<bool> {
    tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("Failed to check {}", path.display()))
}
