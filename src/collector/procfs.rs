//! Whole-sample collector over `/proc` and the cgroup tree.

use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, warn};

use crate::collector::cgroup::CgroupCollector;
use crate::collector::parser::{
    parse_diskstats, parse_global_stat, parse_loadavg, parse_meminfo, parse_net_dev,
    parse_proc_io, parse_proc_stat, parse_vmstat,
};
use crate::collector::traits::FileSystem;
use crate::model::{Sample, SystemSample};

/// Error type for collection failures.
#[derive(Debug)]
pub enum CollectError {
    /// I/O error on a file the collection cannot proceed without.
    Io(std::io::Error),
    /// Parse error on a file the collection cannot proceed without.
    Parse(String),
}

impl std::fmt::Display for CollectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CollectError::Io(e) => write!(f, "I/O error: {}", e),
            CollectError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for CollectError {}

impl From<std::io::Error> for CollectError {
    fn from(e: std::io::Error) -> Self {
        CollectError::Io(e)
    }
}

/// Collects one [`Sample`] per call from `/proc` and (when present) the
/// cgroup v2 tree.
///
/// `/proc/stat` is load-bearing: it provides the boot time that anchors
/// reboot detection, so a failure there aborts the whole tick. Every other
/// subsystem degrades to default values with a logged warning.
pub struct SampleCollector<F: FileSystem + Clone> {
    fs: F,
    proc_path: PathBuf,
    cgroup: Option<CgroupCollector<F>>,
}

impl<F: FileSystem + Clone> SampleCollector<F> {
    /// `proc_path` is usually `/proc`; `cgroup_path` is the cgroup v2
    /// mount, or `None` to skip cgroup collection.
    pub fn new(fs: F, proc_path: impl Into<PathBuf>, cgroup_path: Option<PathBuf>) -> Self {
        let cgroup = cgroup_path.map(|p| CgroupCollector::new(fs.clone(), p));
        Self {
            fs,
            proc_path: proc_path.into(),
            cgroup,
        }
    }

    /// Collects a full sample, stamped with the current wall clock.
    pub fn collect(&self) -> Result<Sample, CollectError> {
        let timestamp = Utc::now().timestamp();

        let stat_content = self.fs.read_to_string(&self.proc_path.join("stat"))?;
        let stat = parse_global_stat(&stat_content).map_err(|e| CollectError::Parse(e.message))?;

        let mut system = SystemSample {
            cpus: stat.cpus,
            ctxt: stat.ctxt,
            forks: stat.forks,
            ..Default::default()
        };

        match self
            .fs
            .read_to_string(&self.proc_path.join("meminfo"))
            .map_err(CollectError::from)
            .and_then(|c| parse_meminfo(&c).map_err(|e| CollectError::Parse(e.message)))
        {
            Ok(mem) => system.mem = mem,
            Err(e) => warn!(error = %e, "meminfo collection failed, using defaults"),
        }
        if let Ok(content) = self.fs.read_to_string(&self.proc_path.join("vmstat")) {
            parse_vmstat(&content, &mut system.mem);
        } else {
            warn!("vmstat collection failed, paging counters stay zero");
        }

        match self
            .fs
            .read_to_string(&self.proc_path.join("loadavg"))
            .ok()
            .as_deref()
            .map(parse_loadavg)
        {
            Some(Ok(load)) => system.loadavg = load,
            _ => warn!("loadavg collection failed, using defaults"),
        }

        match self
            .fs
            .read_to_string(&self.proc_path.join("diskstats"))
            .ok()
            .as_deref()
            .map(parse_diskstats)
        {
            Some(Ok(disks)) => system.disks = disks,
            _ => warn!("diskstats collection failed, using defaults"),
        }

        match self
            .fs
            .read_to_string(&self.proc_path.join("net/dev"))
            .ok()
            .as_deref()
            .map(parse_net_dev)
        {
            Some(Ok(nets)) => system.nets = nets,
            _ => warn!("net/dev collection failed, using defaults"),
        }

        let mut sample = Sample {
            timestamp,
            boot_time: stat.btime,
            system,
            ..Default::default()
        };

        self.collect_processes(&mut sample);
        sample.cgroups = self.cgroup.as_ref().and_then(|c| c.collect());

        Ok(sample)
    }

    /// Scans `/proc/[pid]` directories. A process that disappears between
    /// the scan and the read is normal churn, not an error.
    fn collect_processes(&self, sample: &mut Sample) {
        let entries = match self.fs.read_dir(&self.proc_path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "process scan failed, sample has no processes");
                return;
            }
        };

        for entry in entries {
            let Some(pid) = entry
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            match self.collect_process(&entry, pid) {
                Some(p) => {
                    sample.processes.insert(pid, p);
                }
                None => debug!(pid, "process gone during collection"),
            }
        }
    }

    fn collect_process(&self, dir: &Path, pid: u32) -> Option<crate::model::ProcessSample> {
        let stat_content = self.fs.read_to_string(&dir.join("stat")).ok()?;
        let mut p = parse_proc_stat(&stat_content).ok()?;
        if p.pid != pid {
            return None;
        }
        // /proc/[pid]/io needs privileges; missing is fine.
        if let Ok(content) = self.fs.read_to_string(&dir.join("io")) {
            parse_proc_io(&content, &mut p);
        }
        Some(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::{typical_system, MockFs};

    fn collector(fs: MockFs) -> SampleCollector<MockFs> {
        SampleCollector::new(fs, "/proc", Some(PathBuf::from("/sys/fs/cgroup")))
    }

    #[test]
    fn collects_full_sample_from_fixture() {
        let sample = collector(typical_system()).collect().unwrap();

        assert_eq!(sample.boot_time, 1_700_000_000);
        assert_eq!(sample.system.cpus.len(), 3);
        assert_eq!(sample.system.cpus[0].cpu_id, -1);
        assert_eq!(sample.system.ctxt, 987_654);
        assert_eq!(sample.system.mem.total_kb, 16_384_000);
        assert_eq!(sample.system.mem.pswpout, 200);
        assert_eq!(sample.system.loadavg, [0.5, 0.75, 1.0]);
        assert_eq!(sample.system.disks.len(), 2);
        assert_eq!(sample.system.nets.len(), 2);

        assert_eq!(sample.processes.len(), 2);
        let worker = sample.processes.get(&42).unwrap();
        assert_eq!(worker.name, "worker thread");
        assert_eq!(worker.read_bytes, 1_048_576);

        let cgroups = sample.cgroups.as_ref().unwrap();
        assert_eq!(cgroups.children.len(), 1);
    }

    #[test]
    fn missing_proc_stat_aborts_tick() {
        let mut fs = typical_system();
        // Shadow /proc/stat with junk the parser rejects.
        fs.add_file("/proc/stat", "garbage\n");
        let err = collector(fs).collect().unwrap_err();
        assert!(matches!(err, CollectError::Parse(_)));
    }

    #[test]
    fn missing_subsystems_degrade_to_defaults() {
        let mut fs = MockFs::new();
        fs.add_file(
            "/proc/stat",
            "cpu  1 2 3 4 5 6 7 0 0 0\nctxt 10\nbtime 1700000000\nprocesses 5\n",
        );
        let sample = SampleCollector::new(fs, "/proc", None).collect().unwrap();
        assert_eq!(sample.system.mem.total_kb, 0);
        assert!(sample.system.disks.is_empty());
        assert!(sample.processes.is_empty());
        assert!(sample.cgroups.is_none());
    }
}
