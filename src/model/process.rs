//! Per-process counters collected from `/proc/[pid]/`.

use serde::{Deserialize, Serialize};

/// Counters for a single process.
///
/// CPU times and I/O byte counts are cumulative over the process lifetime;
/// memory sizes are gauges. `(pid, start_time)` is the process identity:
/// a reused PID gets a different `start_time`, and the rate engine must
/// treat it as a new process.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct ProcessSample {
    /// Process ID.
    pub pid: u32,

    /// Process start time in jiffies after boot.
    /// Source: `/proc/[pid]/stat` field 22 (starttime).
    ///
    /// Disambiguates PID reuse.
    pub start_time: u64,

    /// Executable name without arguments.
    /// Source: `/proc/[pid]/stat` field 2 (comm), parentheses stripped.
    pub name: String,

    /// Process state character (R, S, D, Z, ...).
    /// Source: `/proc/[pid]/stat` field 3.
    pub state: char,

    /// Time in user mode (jiffies). Source: stat field 14.
    pub utime: u64,

    /// Time in kernel mode (jiffies). Source: stat field 15.
    pub stime: u64,

    /// Virtual memory size (Kb). Gauge. Source: stat field 23 / 1024.
    pub vsize_kb: u64,

    /// Resident set size (Kb). Gauge. Source: stat field 24 * page size.
    pub rss_kb: u64,

    /// Bytes read from storage. Source: `read_bytes` in `/proc/[pid]/io`.
    pub read_bytes: u64,

    /// Bytes written to storage. Source: `write_bytes` in `/proc/[pid]/io`.
    pub write_bytes: u64,
}

impl ProcessSample {
    /// Default state for processes whose state could not be read.
    pub fn unknown_state() -> char {
        '?'
    }
}
