//! Replay of recorded samples and plain-text rendering of derived rates.
//!
//! Rendering is deliberately simple line-oriented text; a richer frontend
//! would consume the same derived structs.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::model::Sample;
use crate::rates::cgroup::{diff, iterate, SortField};
use crate::rates::{derive_processes, derive_system, same_boot};
use crate::store::{SampleStore, StoreError};

/// Processes shown per interval.
const TOP_PROCESSES: usize = 10;
/// Cgroup nodes shown per interval.
const TOP_CGROUPS: usize = 10;

/// Renders one interval between two same-boot samples.
pub fn render_interval(prev: &Sample, curr: &Sample) -> String {
    let sys = derive_system(prev, curr);
    let procs = derive_processes(prev, curr);

    let mut out = String::new();
    let when = DateTime::<Utc>::from_timestamp(curr.timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| curr.timestamp.to_string());

    out.push_str(&format!(
        "--- {}  (interval {:.0}s)\n",
        when, sys.dt_secs
    ));
    out.push_str(&format!(
        "CPU  busy {:5.1}%  user {:5.1}%  sys {:5.1}%  iowait {:5.1}%  load {:.2} {:.2} {:.2}\n",
        sys.cpu_busy_pct,
        sys.cpu_user_pct,
        sys.cpu_system_pct,
        sys.cpu_iowait_pct,
        sys.loadavg[0],
        sys.loadavg[1],
        sys.loadavg[2],
    ));
    out.push_str(&format!(
        "MEM  free {} MB  avail {} MB  cached {} MB  pgfault/s {:.0}  majflt/s {:.1}\n",
        sys.mem.free_kb / 1024,
        sys.mem.available_kb / 1024,
        sys.mem.cached_kb / 1024,
        sys.pgfault_s,
        sys.pgmajfault_s,
    ));
    for d in &sys.disks {
        out.push_str(&format!(
            "DSK  {:<10} r/s {:7.1}  rKB/s {:9.1}  w/s {:7.1}  wKB/s {:9.1}  busy {:5.1}%\n",
            d.name, d.reads_s, d.read_kb_s, d.writes_s, d.write_kb_s, d.busy_pct,
        ));
    }
    for n in &sys.nets {
        out.push_str(&format!(
            "NET  {:<10} rxKB/s {:9.1}  txKB/s {:9.1}  rxpk/s {:8.1}  txpk/s {:8.1}\n",
            n.name, n.rx_kb_s, n.tx_kb_s, n.rx_packets_s, n.tx_packets_s,
        ));
    }

    if let Some(curr_tree) = &curr.cgroups {
        let delta = diff(prev.cgroups.as_ref(), curr_tree, sys.dt_secs);
        let nodes = iterate(&delta, None, SortField::Cpu, true, &BTreeSet::new());
        for node in nodes.iter().take(TOP_CGROUPS) {
            out.push_str(&format!(
                "CGR  {:<30} cpu {:5.1}%  mem {:7} MB  io r/w KB/s {:8.1}/{:8.1}\n",
                display_path(&node.path),
                node.cpu_pct,
                node.mem_current / (1024 * 1024),
                node.read_kb_s,
                node.write_kb_s,
            ));
        }
    }

    for p in procs.iter().take(TOP_PROCESSES) {
        out.push_str(&format!(
            "PRC  {:>7} {:<16} {}  cpu {:5.1}%  rss {:8} KB  io r/w KB/s {:7.1}/{:7.1}\n",
            p.pid, p.name, p.state, p.cpu_pct, p.rss_kb, p.read_kb_s, p.write_kb_s,
        ));
    }

    out
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// Replays a recording and writes rendered intervals to `out`.
///
/// `path` is either a single pair base (`.idx`/`.dat` accepted) or a store
/// directory, whose pairs are walked in date order with the previous
/// sample carried across pair boundaries. Running off the forward end is
/// the normal end of data, not an error. With `begin`, replay starts at
/// the first sample at or after that timestamp.
pub fn run_report(
    path: &Path,
    begin: Option<i64>,
    out: &mut impl Write,
) -> Result<usize, StoreError> {
    let bases: Vec<std::path::PathBuf> = if path.is_dir() {
        SampleStore::list_days(path)?
            .into_iter()
            .map(|(_, base)| base)
            .collect()
    } else {
        vec![path.to_path_buf()]
    };

    let mut prev: Option<Sample> = None;
    let mut intervals = 0;

    for base in bases {
        let mut store = SampleStore::open(&base)?;

        if let Some(begin) = begin {
            if store.last_timestamp().is_some_and(|last| last < begin) {
                continue;
            }
        }

        let mut next = match begin {
            Some(begin) if store.first_timestamp().is_some_and(|first| first < begin) => {
                store.jump_sample_by_timestamp(begin)
            }
            _ => store.next_sample(1),
        };

        loop {
            let curr = match next {
                Ok(sample) => sample,
                // End of this pair; move on to the next one.
                Err(StoreError::OutOfRange) => break,
                Err(e) => return Err(e),
            };

            match &prev {
                Some(p) if !same_boot(p, &curr) => {
                    // All cumulative counters restarted; skip this pair of
                    // samples and continue from the new boot.
                    warn!(timestamp = curr.timestamp, "reboot in recording, skipping interval");
                }
                Some(p) => {
                    out.write_all(render_interval(p, &curr).as_bytes())
                        .map_err(StoreError::Io)?;
                    intervals += 1;
                }
                None => {}
            }
            prev = Some(curr);
            next = store.next_sample(1);
        }
    }

    info!(intervals, "report complete");
    Ok(intervals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CpuTicks, ProcessSample, SystemSample};
    use tempfile::tempdir;

    const BASE_TS: i64 = 1_700_000_000;

    fn sample(ts: i64, boot: i64, busy_ticks: u64) -> Sample {
        let mut system = SystemSample::default();
        system.cpus.push(CpuTicks {
            cpu_id: -1,
            user: busy_ticks,
            idle: 10_000 + (ts - BASE_TS) as u64 * 100,
            ..Default::default()
        });
        let mut sample = Sample {
            timestamp: ts,
            boot_time: boot,
            system,
            ..Default::default()
        };
        sample.processes.insert(
            1,
            ProcessSample {
                pid: 1,
                start_time: 10,
                name: "init".into(),
                state: 'S',
                utime: busy_ticks,
                ..Default::default()
            },
        );
        sample
    }

    #[test]
    fn render_contains_all_sections() {
        let prev = sample(BASE_TS, 1, 100);
        let curr = sample(BASE_TS + 10, 1, 200);
        let text = render_interval(&prev, &curr);
        assert!(text.contains("CPU"));
        assert!(text.contains("MEM"));
        assert!(text.contains("PRC"));
        assert!(text.contains("init"));
    }

    #[test]
    fn report_walks_recording_and_counts_intervals() {
        let dir = tempdir().unwrap();
        let mut store = SampleStore::create(dir.path()).unwrap();
        for i in 0..4 {
            store.append(&sample(BASE_TS + i * 10, 1, 100 * i as u64)).unwrap();
        }
        drop(store);

        let mut out = Vec::new();
        let intervals = run_report(dir.path(), None, &mut out).unwrap();
        assert_eq!(intervals, 3);
        assert!(!out.is_empty());
    }

    #[test]
    fn reboot_pair_is_skipped_without_error() {
        let dir = tempdir().unwrap();
        let mut store = SampleStore::create(dir.path()).unwrap();
        store.append(&sample(BASE_TS, 1, 100)).unwrap();
        store.append(&sample(BASE_TS + 10, 1, 200)).unwrap();
        // Reboot: new boot_time, counters restart.
        store.append(&sample(BASE_TS + 20, 2, 10)).unwrap();
        store.append(&sample(BASE_TS + 30, 2, 20)).unwrap();
        drop(store);

        let mut out = Vec::new();
        let intervals = run_report(dir.path(), None, &mut out).unwrap();
        // Interval 1-2 and 3-4 render; the pair across the reboot does not.
        assert_eq!(intervals, 2);
    }

    #[test]
    fn begin_skips_earlier_samples() {
        let dir = tempdir().unwrap();
        let mut store = SampleStore::create(dir.path()).unwrap();
        for i in 0..4 {
            store.append(&sample(BASE_TS + i * 10, 1, 100 * i as u64)).unwrap();
        }
        drop(store);

        let mut out = Vec::new();
        let intervals = run_report(dir.path(), Some(BASE_TS + 20), &mut out).unwrap();
        // Replay starts at the third sample; one interval remains.
        assert_eq!(intervals, 1);
    }
}
