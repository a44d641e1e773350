//! Cgroup v2 tree collector.
//!
//! Walks the cgroup filesystem and builds a [`CgroupSample`] tree. Node
//! identity across samples is the directory inode, so a deleted-and-
//! recreated group with the same name is distinguishable downstream.

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::collector::traits::FileSystem;
use crate::model::{CgroupCpu, CgroupIo, CgroupMemory, CgroupSample};

/// Collector for the cgroup v2 hierarchy.
pub struct CgroupCollector<F: FileSystem> {
    fs: F,
    root: PathBuf,
}

impl<F: FileSystem> CgroupCollector<F> {
    /// `root` is the cgroup mount point, usually `/sys/fs/cgroup`.
    pub fn new(fs: F, root: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            root: root.into(),
        }
    }

    /// Collects the whole tree. Returns `None` when the root is not a
    /// cgroup v2 mount (no `cpu.stat`).
    pub fn collect(&self) -> Option<CgroupSample> {
        if !self.fs.exists(&self.root.join("cpu.stat")) {
            return None;
        }
        Some(self.collect_node(&self.root, String::new(), String::new(), 0))
    }

    /// Builds one node and recurses into child directories. Controller
    /// files a group does not expose (the root lacks several) contribute
    /// defaults.
    fn collect_node(&self, dir: &Path, name: String, rel_path: String, level: u32) -> CgroupSample {
        let inode = self.fs.inode(dir).unwrap_or(0);

        let mut node = CgroupSample {
            name,
            path: rel_path,
            inode,
            level,
            ..Default::default()
        };

        if let Ok(content) = self.fs.read_to_string(&dir.join("cpu.stat")) {
            node.cpu = parse_cpu_stat(&content);
        }
        if let Ok(content) = self.fs.read_to_string(&dir.join("memory.current")) {
            node.memory.current = parse_single_u64(&content);
        }
        if let Ok(content) = self.fs.read_to_string(&dir.join("memory.stat")) {
            parse_memory_stat(&content, &mut node.memory);
        }
        if let Ok(content) = self.fs.read_to_string(&dir.join("memory.events")) {
            parse_memory_events(&content, &mut node.memory);
        }
        if let Ok(content) = self.fs.read_to_string(&dir.join("io.stat")) {
            node.io = parse_io_stat(&content);
        }
        if let Ok(content) = self.fs.read_to_string(&dir.join("pids.current")) {
            node.pids_current = parse_single_u64(&content);
        }

        match self.fs.read_dir(dir) {
            Ok(entries) => {
                for entry in entries {
                    // Child cgroups are directories; controller files are not.
                    if !self.fs.exists(&entry.join("cgroup.procs"))
                        && !self.fs.exists(&entry.join("cpu.stat"))
                    {
                        continue;
                    }
                    let Some(child_name) = entry.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    let child_rel = if node.path.is_empty() {
                        child_name.to_string()
                    } else {
                        format!("{}/{}", node.path, child_name)
                    };
                    let child =
                        self.collect_node(&entry, child_name.to_string(), child_rel, level + 1);
                    node.children.insert(child.name.clone(), child);
                }
            }
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "cgroup read_dir failed");
            }
        }

        node
    }
}

fn parse_single_u64(content: &str) -> u64 {
    content.trim().parse().unwrap_or(0)
}

fn parse_keyed_u64(line: &str) -> Option<(&str, u64)> {
    let mut fields = line.split_whitespace();
    let key = fields.next()?;
    let value = fields.next()?.parse().ok()?;
    Some((key, value))
}

/// Parses `cpu.stat`.
pub fn parse_cpu_stat(content: &str) -> CgroupCpu {
    let mut cpu = CgroupCpu::default();
    for line in content.lines() {
        let Some((key, value)) = parse_keyed_u64(line) else {
            continue;
        };
        match key {
            "usage_usec" => cpu.usage_usec = value,
            "user_usec" => cpu.user_usec = value,
            "system_usec" => cpu.system_usec = value,
            "throttled_usec" => cpu.throttled_usec = value,
            "nr_throttled" => cpu.nr_throttled = value,
            _ => {}
        }
    }
    cpu
}

/// Fills the gauge fields of `mem` from `memory.stat`.
pub fn parse_memory_stat(content: &str, mem: &mut CgroupMemory) {
    for line in content.lines() {
        let Some((key, value)) = parse_keyed_u64(line) else {
            continue;
        };
        match key {
            "anon" => mem.anon = value,
            "file" => mem.file = value,
            _ => {}
        }
    }
}

/// Fills the event counters of `mem` from `memory.events`.
pub fn parse_memory_events(content: &str, mem: &mut CgroupMemory) {
    for line in content.lines() {
        if let Some(("oom_kill", value)) = parse_keyed_u64(line) {
            mem.oom_kill = value;
        }
    }
}

/// Parses `io.stat`: one line per device, `MAJ:MIN key=value ...`.
pub fn parse_io_stat(content: &str) -> Vec<CgroupIo> {
    let mut devices = Vec::new();
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let Some(dev) = fields.next() else {
            continue;
        };
        let Some((major, minor)) = dev.split_once(':') else {
            continue;
        };
        let (Ok(major), Ok(minor)) = (major.parse(), minor.parse()) else {
            continue;
        };

        let mut io = CgroupIo {
            major,
            minor,
            ..Default::default()
        };
        for kv in fields {
            let Some((key, value)) = kv.split_once('=') else {
                continue;
            };
            let Ok(value) = value.parse() else {
                continue;
            };
            match key {
                "rbytes" => io.rbytes = value,
                "wbytes" => io.wbytes = value,
                "rios" => io.rios = value,
                "wios" => io.wios = value,
                _ => {}
            }
        }
        devices.push(io);
    }
    devices
}
