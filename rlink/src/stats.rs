//! Per-endpoint counters and the analysis log format.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::config::{Mode, Role};

/// Monotonic counters describing one endpoint's activity.
///
/// Counters only ever advance; they reset only when a fresh endpoint is
/// built. They are updated under the same lock as the window state they
/// describe, so a snapshot is always internally consistent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinkStats {
    /// Frames handed to the channel: data, acks, and retransmissions alike,
    /// counted before the channel gets a chance to drop them.
    pub frames_transmitted: u64,

    /// Data frames sent again after a timeout.
    pub retransmissions: u64,

    /// Blank acknowledgment frames sent.
    pub acks_sent: u64,

    /// Valid zero-length frames received.
    pub acks_received: u64,

    /// Data frames received for sequence numbers already seen.
    pub duplicates_received: u64,

    /// Seconds from endpoint start until the consumer's one-shot
    /// recognition mark; zero when never marked.
    pub time_to_recognize: f64,
}

impl LinkStats {
    /// Formats the tab-separated analysis record:
    ///
    /// ```text
    /// mode  drop  corrupt  role  acks_received  acks_sent
    /// frames_transmitted  duplicates_received  retransmissions
    /// time_to_recognize
    /// ```
    pub fn log_line(&self, mode: Mode, drop_rate: f64, corrupt_rate: f64, role: Role) -> String {
        format!(
            "{}\t{:.2}\t{:.2}\t{}\t{}\t{}\t{}\t{}\t{}\t{:.2}",
            mode,
            drop_rate,
            corrupt_rate,
            role,
            self.acks_received,
            self.acks_sent,
            self.frames_transmitted,
            self.duplicates_received,
            self.retransmissions,
            self.time_to_recognize,
        )
    }
}

/// Appends one analysis record to `path`, creating the file if needed.
pub fn append_log(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}
