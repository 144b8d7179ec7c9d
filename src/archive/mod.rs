//! Retention Archiver
//!
//! Deletes files older than the retention period from every configured output and
//! acknowledgement folder, after appending them to the day's zip archive.
//!
//! The archive name is claimed through the farm lock so that only one node writes a
//! given day's archive at a time. Deletion never depends on the backup outcome.

pub mod backup;
pub mod retention;
