//! Polling Task Engine
//!
//! Periodic cycles that move data between folders and the message service, each item
//! guarded by the farm-wide [`DistributedLock`](crate::lock::service::DistributedLock).
//!
//! ## Cycles
//! - **Input** (`input`): folder → service. Stability gate, send, archive to the processed
//!   folder, delete, write the ack, run the post-process hook.
//! - **Output** (`output`): service → folder. List past the high-water mark, fetch, write
//!   through a temp file and rename, skip targets that already exist.
//! - **Retention** lives in [`crate::archive`] but runs on the same scheduler.
//!
//! ## Submodules
//! - **`fs`**: Listing, stability check and crash-safe writes.
//! - **`naming`**: Target file names and the magic-byte extension table.
//! - **`postprocess`**: External command templates.
//! - **`scheduler`**: One timer-driven loop per cycle, with shutdown.

pub mod fs;
pub mod input;
pub mod naming;
pub mod output;
pub mod postprocess;
pub mod scheduler;
pub mod types;
