//! Cycle Scheduler
//!
//! Drives every periodic cycle of the process on its own timer.
//!
//! ## Responsibilities
//! - **Timing**: one `tokio::time::interval` per cycle; a late tick is delayed, never bunched.
//! - **No overlap**: the next tick is only awaited once the current run has finished.
//! - **Isolation**: each run is spawned, so an error or a panic is logged and the
//!   schedule carries on.
//! - **Shutdown**: the shared `CancellationToken` stops every loop after its current run.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::types::CycleReport;

/// A unit of periodic work.
#[async_trait]
pub trait Cycle: Send + Sync + 'static {
    /// Label used in logs, e.g. `input[0]`.
    fn name(&self) -> &str;

    async fn run_cycle(&self) -> Result<CycleReport>;
}

pub struct Scheduler {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn task_count(&self) -> usize {
        self.handles.len()
    }

    /// Starts `cycle` now and then every `period`.
    pub fn spawn(&mut self, cycle: Arc<dyn Cycle>, period: Duration) {
        tracing::info!("Scheduling {} every {:?}", cycle.name(), period);

        let shutdown = self.shutdown.clone();
        self.handles.push(tokio::spawn(async move {
            run_loop(cycle, period, shutdown).await;
        }));
    }

    /// Waits until every loop has exited. Call after cancelling the token.
    pub async fn join(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::error!("Scheduler loop ended abnormally: {}", e);
            }
        }
        tracing::info!("All cycles stopped");
    }
}

async fn run_loop(cycle: Arc<dyn Cycle>, period: Duration, shutdown: CancellationToken) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let name = cycle.name().to_string();
        let run = {
            let cycle = cycle.clone();
            tokio::spawn(async move { cycle.run_cycle().await })
        };

        match run.await {
            Ok(Ok(report)) if report == CycleReport::default() => {
                tracing::trace!("{}: nothing to do", name)
            }
            Ok(Ok(report)) => tracing::info!("{}: {}", name, report),
            Ok(Err(e)) => tracing::error!("{} cycle failed: {:#}", name, e),
            Err(e) if e.is_panic() => tracing::error!("{} cycle panicked", name),
            Err(e) => tracing::error!("{} cycle aborted: {}", name, e),
        }
    }

    tracing::debug!("{} stopped", cycle.name());
}
