//! Input Cycle (folder → message service)
//!
//! Every file in the input folder is claimed through the farm lock, checked for
//! stability, submitted, archived, deleted and acknowledged. Only one node of the farm
//! ever submits a given file name at a time.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::fs::{self, Stability};
use super::postprocess::{HookContext, Hooks};
use super::scheduler::Cycle;
use super::types::{AckStatus, CycleReport, STABILITY_DELAY};
use crate::lock::service::DistributedLock;
use crate::transport::{TransportClient, TransportError};

/// Folders used by one input pipeline. Only `input` is mandatory.
#[derive(Debug, Clone, Default)]
pub struct InputFolders {
    pub input: PathBuf,
    pub processed: Option<PathBuf>,
    pub ack: Option<PathBuf>,
    pub ack_ok: Option<PathBuf>,
    pub ack_failed: Option<PathBuf>,
}

/// Result of submitting one file, as written to the ack folders.
struct Outcome {
    status: AckStatus,
    document: Vec<u8>,
    message_type: Option<String>,
}

pub struct InputTask {
    name: String,
    folders: InputFolders,
    lock: Arc<DistributedLock>,
    transport: Arc<dyn TransportClient>,
    hooks: Hooks,
    stability_delay: Duration,
    shutdown: CancellationToken,
}

impl InputTask {
    pub fn new(
        name: impl Into<String>,
        folders: InputFolders,
        lock: Arc<DistributedLock>,
        transport: Arc<dyn TransportClient>,
        hooks: Hooks,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            folders,
            lock,
            transport,
            hooks,
            stability_delay: STABILITY_DELAY,
            shutdown,
        }
    }

    pub fn with_stability_delay(mut self, delay: Duration) -> Self {
        self.stability_delay = delay;
        self
    }

    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let files = fs::list_files(&self.folders.input).await?;

        tracing::trace!("{} found {} files", self.name, files.len());

        for (path, file_name) in files {
            if self.shutdown.is_cancelled() {
                tracing::debug!("{} stopping early, shutdown requested", self.name);
                break;
            }

            // Claim: whoever holds the name across the farm handles the file
            let Some(_claim) = self.lock.acquire(&file_name).await else {
                tracing::trace!("{} is handled by another pipeline or node", file_name);
                report.skipped += 1;
                continue;
            };

            match fs::check_stability(&path, self.stability_delay, &self.shutdown).await {
                Ok(Stability::Stable(_)) => {}
                Ok(state) => {
                    tracing::debug!("Skipping {} this cycle: {:?}", file_name, state);
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    tracing::warn!("{:#}", e);
                    report.failed += 1;
                    continue;
                }
            }

            match self.process(&path, &file_name).await {
                Ok(AckStatus::Ok) => report.handled += 1,
                Ok(AckStatus::Failed) => report.failed += 1,
                Err(e) => {
                    tracing::error!("Failed to process {}: {:#}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Submits one stable file. An `Err` means the file was left in place.
    async fn process(&self, path: &Path, file_name: &str) -> Result<AckStatus> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;

        let outcome = match self.transport.send(file_name, data).await {
            Ok(receipt) => {
                if receipt.accepted {
                    tracing::info!("Sent {}", file_name);
                } else {
                    tracing::warn!("{} was rejected by the message service", file_name);
                }
                Outcome {
                    status: if receipt.accepted {
                        AckStatus::Ok
                    } else {
                        AckStatus::Failed
                    },
                    document: receipt.document,
                    message_type: receipt.message_type,
                }
            }
            Err(e) => {
                tracing::error!("Failed to send {}: {}", file_name, e);
                Outcome {
                    status: AckStatus::Failed,
                    document: fault_document(file_name, &e),
                    message_type: None,
                }
            }
        };

        let archived = self.archive_copy(path, file_name).await;

        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("Failed to delete {} after sending", path.display()))?;

        let ack = self.write_acks(file_name, &outcome).await;

        let hook = match outcome.status {
            AckStatus::Ok => self.hooks.on_sent.as_ref(),
            AckStatus::Failed => self.hooks.on_failed.as_ref(),
        };
        if let Some(hook) = hook {
            let target = archived.or(ack).unwrap_or_else(|| path.to_path_buf());
            hook.spawn(&HookContext {
                path: &target,
                status: outcome.status.as_str(),
                message_type: outcome.message_type.as_deref(),
            });
        }

        Ok(outcome.status)
    }

    /// Best-effort copy into the processed folder.
    async fn archive_copy(&self, path: &Path, file_name: &str) -> Option<PathBuf> {
        let folder = self.folders.processed.as_ref()?;

        let copy = async {
            tokio::fs::create_dir_all(folder).await?;
            let target = folder.join(file_name);
            tokio::fs::copy(path, &target).await?;
            Ok::<_, std::io::Error>(target)
        };

        match copy.await {
            Ok(target) => Some(target),
            Err(e) => {
                tracing::warn!("Could not copy {} to {}: {}", file_name, folder.display(), e);
                None
            }
        }
    }

    /// Writes the ack document to the ack folder and to the folder for its status.
    /// Returns the path in the ack folder when one was written.
    async fn write_acks(&self, file_name: &str, outcome: &Outcome) -> Option<PathBuf> {
        let ack_name = ack_file_name(file_name);
        let by_status = match outcome.status {
            AckStatus::Ok => self.folders.ack_ok.as_ref(),
            AckStatus::Failed => self.folders.ack_failed.as_ref(),
        };

        let mut written = None;
        for (i, folder) in [self.folders.ack.as_ref(), by_status].into_iter().enumerate() {
            let Some(folder) = folder else { continue };
            match fs::write_atomic(folder, &ack_name, &outcome.document).await {
                Ok(path) if i == 0 => written = Some(path),
                Ok(_) => {}
                Err(e) => tracing::warn!("{:#}", e),
            }
        }
        written
    }
}

#[async_trait]
impl Cycle for InputTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run_cycle(&self) -> Result<CycleReport> {
        InputTask::run_cycle(self).await
    }
}

pub fn ack_file_name(file_name: &str) -> String {
    format!("{}.ack.xml", file_name)
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Ack written in place of the service's answer when the service couldn't be reached.
pub fn fault_document(file_name: &str, error: &TransportError) -> Vec<u8> {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <fault>\n  <file>{}</file>\n  <time>{}</time>\n  <error>{}</error>\n</fault>\n",
        escape_xml(file_name),
        chrono::Local::now().to_rfc3339(),
        escape_xml(&error.to_string()),
    )
    .into_bytes()
}
