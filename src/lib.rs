//! Magic Folder Farm Library
//!
//! This library crate defines the modules of a magic-folder agent: a process that moves
//! files between local folders and a remote message service, and that can run as one
//! member of a farm of identical agents sharing the same folders.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//!
//! - **`membership`**: The farm registry. Knows which peers are reachable, subscribes to
//!   the configured members on startup and evicts peers that stop answering.
//! - **`lock`**: Coordinator-free mutual exclusion over item names. A node asks every
//!   known peer before owning a name; concurrent claims are settled by node id, lowest wins.
//! - **`transport`**: Client of the remote message service (send, list, get).
//! - **`tasks`**: The polling engine. Input and output cycles per pipeline, stability
//!   checks, crash-safe writes, file naming and post-process commands.
//! - **`archive`**: Retention sweep with zip backup of aged files.
//! - **`config`**: YAML and environment settings, validated at startup.

pub mod archive;
pub mod config;
pub mod lock;
pub mod membership;
pub mod tasks;
pub mod transport;
