//! Distributed Lock Module
//!
//! Coordinator-free mutual exclusion over names (file names, message codes, archive
//! names) across the farm.
//!
//! ## Protocol
//! 1. **Pending**: `try_lock` marks the name as pending locally.
//! 2. **Query**: Every known peer is asked `is_locked(name, my_id)`. One `true` denies.
//! 3. **Priority**: A peer that is itself pending on the same name answers `true` only if
//!    its id is lower than the asker's; otherwise it yields and drops its own pending mark.
//! 4. **Commit**: If nobody objected and the pending mark survived, the name becomes held.
//!
//! Peers that never answer are evicted from membership and count as "not locking".
//! Without a configured node id the lock runs in single mode and is granted locally.

pub mod handlers;
pub mod protocol;
pub mod service;
pub mod table;
