//! Cgroup v2 tree collected from `/sys/fs/cgroup`.
//!
//! Nodes own their children in a name-keyed map; there are no parent
//! back-references. Traversal reconstructs ancestor context with an explicit
//! stack, so the tree stays cycle-free and trivially serializable.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// CPU accounting for one cgroup. Source: `cpu.stat`. All cumulative.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CgroupCpu {
    /// Total CPU time consumed (microseconds).
    pub usage_usec: u64,

    /// User-mode CPU time (microseconds).
    pub user_usec: u64,

    /// Kernel-mode CPU time (microseconds).
    pub system_usec: u64,

    /// Time the group spent throttled (microseconds).
    pub throttled_usec: u64,

    /// Number of throttle events.
    pub nr_throttled: u64,
}

/// Memory accounting for one cgroup.
/// Source: `memory.current`, `memory.stat`, `memory.events`.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CgroupMemory {
    /// Current memory usage (bytes). Gauge.
    pub current: u64,

    /// Anonymous memory (bytes). Gauge. Source: `anon` in `memory.stat`.
    pub anon: u64,

    /// Page cache memory (bytes). Gauge. Source: `file` in `memory.stat`.
    pub file: u64,

    /// OOM kills in this group since creation. Cumulative.
    /// Source: `oom_kill` in `memory.events`.
    pub oom_kill: u64,
}

/// Per-device I/O counters for one cgroup. Source: `io.stat`. Cumulative.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CgroupIo {
    /// Device major number.
    pub major: u32,

    /// Device minor number.
    pub minor: u32,

    /// Bytes read.
    pub rbytes: u64,

    /// Bytes written.
    pub wbytes: u64,

    /// Read operations.
    pub rios: u64,

    /// Write operations.
    pub wios: u64,
}

/// One node of the cgroup v2 tree.
///
/// Identity across two samples is `(name, inode)`: a node with the same name
/// but a different inode is a recreated group, not the same entity.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CgroupSample {
    /// Directory name within the parent (empty for the root).
    pub name: String,

    /// Full path relative to the cgroup mount (e.g. `system.slice/ssh.service`).
    pub path: String,

    /// Inode of the cgroup directory. Identity tie-breaker for recreated
    /// groups with the same name.
    pub inode: u64,

    /// Depth in the tree; the root is level 0.
    pub level: u32,

    /// CPU accounting.
    pub cpu: CgroupCpu,

    /// Memory accounting.
    pub memory: CgroupMemory,

    /// Per-device I/O counters.
    pub io: Vec<CgroupIo>,

    /// Number of processes in this group. Gauge. Source: `pids.current`.
    pub pids_current: u64,

    /// Child groups, keyed by directory name.
    pub children: BTreeMap<String, CgroupSample>,
}

impl CgroupSample {
    /// Total number of nodes in this subtree, including self.
    pub fn node_count(&self) -> usize {
        1 + self.children.values().map(|c| c.node_count()).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_count_includes_descendants() {
        let mut root = CgroupSample {
            name: String::new(),
            ..Default::default()
        };
        let mut slice = CgroupSample {
            name: "system.slice".into(),
            ..Default::default()
        };
        slice.children.insert(
            "ssh.service".into(),
            CgroupSample {
                name: "ssh.service".into(),
                ..Default::default()
            },
        );
        root.children.insert("system.slice".into(), slice);
        assert_eq!(root.node_count(), 3);
    }
}
