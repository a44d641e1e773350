//! The top-level snapshot structure.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::cgroup::CgroupSample;
use super::process::ProcessSample;
use super::system::SystemSample;

/// A point-in-time observation of the whole machine.
///
/// Samples are produced by the collector, appended to the store as one
/// compressed frame each, and read back for replay. Consecutive samples from
/// the same writer have non-decreasing timestamps; the writer never
/// back-dates.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct Sample {
    /// Unix timestamp (seconds since epoch) at collection time.
    pub timestamp: i64,

    /// Boot time of the running kernel (seconds since epoch).
    /// Source: `btime` in `/proc/stat`.
    ///
    /// Identity of the kernel instance: two samples with different boot
    /// times must never be diffed against each other.
    pub boot_time: i64,

    /// System-wide counters.
    pub system: SystemSample,

    /// Per-process counters, keyed by PID.
    pub processes: BTreeMap<u32, ProcessSample>,

    /// Cgroup v2 tree, when cgroup collection is enabled.
    pub cgroups: Option<CgroupSample>,
}
