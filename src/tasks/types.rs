use std::fmt;
use std::time::Duration;

/// Delay between the two size measurements of the stability check.
pub const STABILITY_DELAY: Duration = Duration::from_millis(500);

/// Lowest accepted poll interval for input and output cycles.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Counters returned by one run of a cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    /// Items this node processed to completion.
    pub handled: usize,
    /// Items left alone: claimed elsewhere, unstable, filtered, already present.
    pub skipped: usize,
    /// Items abandoned because of an error.
    pub failed: usize,
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "handled={} skipped={} failed={}",
            self.handled, self.skipped, self.failed
        )
    }
}

/// How a submitted file ended up, for ack routing and hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckStatus {
    Ok,
    Failed,
}

impl AckStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AckStatus::Ok => "OK",
            AckStatus::Failed => "FAILED",
        }
    }
}
