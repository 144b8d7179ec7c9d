use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, TimeDelta};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use super::backup;
use crate::lock::service::DistributedLock;
use crate::tasks::fs;
use crate::tasks::scheduler::Cycle;
use crate::tasks::types::CycleReport;

/// Lock key and file name of the archive for `date`.
pub fn archive_name(date: NaiveDate) -> String {
    format!("backup_{}.zip", date.format("%d%m%Y"))
}

pub struct RetentionTask {
    folders: Vec<PathBuf>,
    days: u32,
    backup_folder: Option<PathBuf>,
    lock: Arc<DistributedLock>,
}

impl RetentionTask {
    /// `folders` may repeat; each folder is swept once.
    pub fn new(
        folders: impl IntoIterator<Item = PathBuf>,
        days: u32,
        backup_folder: Option<PathBuf>,
        lock: Arc<DistributedLock>,
    ) -> Self {
        let mut seen = HashSet::new();
        let folders = folders
            .into_iter()
            .filter(|folder| seen.insert(folder.clone()))
            .collect();

        Self {
            folders,
            days,
            backup_folder,
            lock,
        }
    }

    pub fn folders(&self) -> &[PathBuf] {
        &self.folders
    }

    /// Files last modified before `cutoff`. A folder or file that cannot be read is
    /// logged and passed over.
    async fn aged_files(&self, cutoff: SystemTime) -> Vec<PathBuf> {
        let mut aged = Vec::new();
        for folder in &self.folders {
            let listing = match fs::list_files(folder).await {
                Ok(listing) => listing,
                Err(e) => {
                    tracing::warn!("Skipping retention of {}: {:#}", folder.display(), e);
                    continue;
                }
            };
            for (path, _) in listing {
                match tokio::fs::metadata(&path).await.and_then(|meta| meta.modified()) {
                    Ok(modified) if modified < cutoff => aged.push(path),
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Failed to read mtime of {}: {}", path.display(), e),
                }
            }
        }
        aged
    }

    pub async fn run_at(&self, now: DateTime<Local>) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        if self.days == 0 {
            return Ok(report);
        }

        let Some(cutoff) = TimeDelta::try_days(i64::from(self.days))
            .and_then(|period| now.checked_sub_signed(period))
        else {
            return Ok(report);
        };

        let aged = self.aged_files(SystemTime::from(cutoff)).await;
        if aged.is_empty() {
            return Ok(report);
        }
        tracing::info!("{} files older than {} days", aged.len(), self.days);

        if let Some(folder) = &self.backup_folder {
            self.backup(folder, archive_name(now.date_naive()), &aged).await;
        }

        for path in aged {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    tracing::debug!("Deleted {}", path.display());
                    report.handled += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to delete {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    async fn backup(&self, folder: &Path, name: String, files: &[PathBuf]) {
        let Some(_claim) = self.lock.acquire(&name).await else {
            tracing::info!("{} is being written by another node, skipping backup", name);
            return;
        };

        let job = {
            let folder = folder.to_path_buf();
            let name = name.clone();
            let files = files.to_vec();
            tokio::task::spawn_blocking(move || backup::append_to_archive(&folder, &name, &files))
        };

        match job.await {
            Ok(Ok(summary)) => tracing::info!(
                "Backed up {} files to {} ({} already archived, {} renamed, {} unreadable)",
                summary.added,
                name,
                summary.kept,
                summary.renamed.len(),
                summary.unreadable.len()
            ),
            Ok(Err(e)) => tracing::error!("Backup to {} failed: {:#}", name, e),
            Err(e) => tracing::error!("Backup to {} aborted: {}", name, e),
        }
    }
}

#[async_trait]
impl Cycle for RetentionTask {
    fn name(&self) -> &str {
        "retention"
    }

    async fn run_cycle(&self) -> Result<CycleReport> {
        self.run_at(Local::now()).await
    }
}
