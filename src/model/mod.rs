//! Data model for collected samples.
//!
//! - [`sample`]: the top-level [`Sample`] snapshot
//! - [`system`]: system-wide counters from `/proc`
//! - [`process`]: per-process counters from `/proc/[pid]/`
//! - [`cgroup`]: the cgroup v2 tree from `/sys/fs/cgroup`
//!
//! A `Sample` is immutable once produced: the collector builds it, the store
//! serializes it, and the rate engine only ever borrows it.

mod cgroup;
mod process;
mod sample;
mod system;

pub use cgroup::{CgroupCpu, CgroupIo, CgroupMemory, CgroupSample};
pub use process::ProcessSample;
pub use sample::Sample;
pub use system::{CpuTicks, DiskCounters, MemCounters, NetCounters, SystemSample};
