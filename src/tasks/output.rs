//! Output Cycle (message service → folder)
//!
//! Lists messages newer than the high-water mark, claims each code through the farm lock
//! and writes its payload into the output folder. A target that already exists is left
//! untouched, so delivering the same message twice leaves one file.

use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio_util::sync::CancellationToken;

use super::fs;
use super::naming::{ExtensionPolicy, target_name};
use super::postprocess::{CommandTemplate, HookContext};
use super::scheduler::Cycle;
use super::types::CycleReport;
use crate::lock::service::DistributedLock;
use crate::transport::{MessageSummary, TransportClient};

pub struct OutputTask {
    name: String,
    folder: PathBuf,
    message_types: Vec<String>,
    extension: ExtensionPolicy,
    lock: Arc<DistributedLock>,
    transport: Arc<dyn TransportClient>,
    on_received: Option<CommandTemplate>,
    /// Highest code seen so far. Only grows; not persisted across restarts.
    last_code: AtomicI64,
    shutdown: CancellationToken,
}

enum Delivery {
    Written,
    AlreadyPresent,
}

impl OutputTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        folder: PathBuf,
        message_types: Vec<String>,
        extension: ExtensionPolicy,
        lock: Arc<DistributedLock>,
        transport: Arc<dyn TransportClient>,
        on_received: Option<CommandTemplate>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            folder,
            message_types,
            extension,
            lock,
            transport,
            on_received,
            last_code: AtomicI64::new(0),
            shutdown,
        }
    }

    pub fn last_code(&self) -> i64 {
        self.last_code.load(Ordering::SeqCst)
    }

    /// Lock key for message `code`. Pipelines writing different folders each claim their
    /// own copy of a message.
    pub fn claim_key(&self, code: i64) -> String {
        format!("{}@{}", code, self.folder.display())
    }

    fn wanted(&self, summary: &MessageSummary) -> bool {
        self.message_types.is_empty() || self.message_types.contains(&summary.message_type)
    }

    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let mut report = CycleReport::default();
        let since = self.last_code();

        let entries = self.transport.list(since, &self.message_types).await?;
        tracing::trace!("{} listed {} messages after {}", self.name, entries.len(), since);

        let mut highest = since;
        for summary in entries {
            if self.shutdown.is_cancelled() {
                tracing::debug!("{} stopping early, shutdown requested", self.name);
                break;
            }
            highest = highest.max(summary.code);

            if !self.wanted(&summary) {
                report.skipped += 1;
                continue;
            }

            let Some(_claim) = self.lock.acquire(&self.claim_key(summary.code)).await else {
                tracing::trace!("Message {} is handled elsewhere", summary.code);
                report.skipped += 1;
                continue;
            };

            match self.deliver(&summary).await {
                Ok(Delivery::Written) => report.handled += 1,
                Ok(Delivery::AlreadyPresent) => report.skipped += 1,
                Err(e) => {
                    tracing::error!("Failed to receive message {}: {:#}", summary.code, e);
                    report.failed += 1;
                }
            }
        }

        // Advance past everything listed, delivered or not
        self.last_code.fetch_max(highest, Ordering::SeqCst);

        Ok(report)
    }

    async fn deliver(&self, summary: &MessageSummary) -> Result<Delivery> {
        let payload = self.transport.get(summary.code).await?;
        let file_name = target_name(&payload, &self.extension);

        if fs::exists(&self.folder.join(&file_name)).await? {
            tracing::debug!("{} already present, skipping message {}", file_name, summary.code);
            return Ok(Delivery::AlreadyPresent);
        }

        let path = fs::write_atomic(&self.folder, &file_name, payload.bytes()).await?;
        tracing::info!("Received message {} as {}", summary.code, path.display());

        if let Some(hook) = &self.on_received {
            hook.spawn(&HookContext {
                path: &path,
                status: "RECEIVED",
                message_type: Some(&summary.message_type),
            });
        }

        Ok(Delivery::Written)
    }
}

#[async_trait]
impl Cycle for OutputTask {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run_cycle(&self) -> Result<CycleReport> {
        OutputTask::run_cycle(self).await
    }
}
