//! Rate and delta computation over pairs of samples.
//!
//! This module is the single source of truth for turning two cumulative
//! counter readings plus an elapsed interval into per-second rates and
//! interval percentages. The report and live frontends both delegate here.

use std::collections::BTreeMap;

use crate::model::{MemCounters, ProcessSample, Sample};

pub mod cgroup;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Kernel USER_HZ: /proc CPU tick counters advance at this frequency.
pub const TICKS_PER_SEC: u64 = 100;

/// Bytes per /proc/diskstats sector.
pub const SECTOR_BYTES: u64 = 512;

// ---------------------------------------------------------------------------
// Core rate functions
// ---------------------------------------------------------------------------

/// Per-second rate of a cumulative counter.
///
/// Returns 0 when the interval is not positive or the counter regressed
/// (stats reset / entity restart); never negative, never divide-by-zero.
pub fn rate(curr: u64, prev: u64, interval_secs: f64) -> f64 {
    if interval_secs <= 0.0 || curr < prev {
        return 0.0;
    }
    (curr - prev) as f64 / interval_secs
}

/// Percentage of an interval consumed by a cumulative counter delta, with
/// `interval_units` expressed in the counter's own units (ticks,
/// microseconds, milliseconds). Same guards as [`rate`]; clamped to
/// `[0, 100]`.
pub fn percent_of_interval(curr: u64, prev: u64, interval_units: u64) -> f64 {
    if interval_units == 0 || curr < prev {
        return 0.0;
    }
    let pct = (curr - prev) as f64 * 100.0 / interval_units as f64;
    pct.min(100.0)
}

// ---------------------------------------------------------------------------
// Identity predicates
// ---------------------------------------------------------------------------

/// Two process snapshots describe the same process only when both the pid
/// and the kernel start time match; a reused pid gets a fresh history.
pub fn same_process(prev: &ProcessSample, curr: &ProcessSample) -> bool {
    prev.pid == curr.pid && prev.start_time == curr.start_time
}

/// Two samples come from the same kernel instance. A mismatch invalidates
/// every cumulative counter at once; callers discard the pair instead of
/// diffing any field.
pub fn same_boot(prev: &Sample, curr: &Sample) -> bool {
    prev.boot_time == curr.boot_time
}

// ---------------------------------------------------------------------------
// Derived metric structs
// ---------------------------------------------------------------------------

/// System-wide rates for one interval.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SystemRates {
    pub dt_secs: f64,
    /// Aggregate CPU percentages, measured against elapsed aggregate ticks.
    pub cpu_busy_pct: f64,
    pub cpu_user_pct: f64,
    pub cpu_system_pct: f64,
    pub cpu_iowait_pct: f64,
    pub loadavg: [f64; 3],
    pub ctxt_s: f64,
    pub forks_s: f64,
    pub pswpin_s: f64,
    pub pswpout_s: f64,
    pub pgfault_s: f64,
    pub pgmajfault_s: f64,
    /// Memory gauges are instantaneous; carried through from the current
    /// sample.
    pub mem: MemCounters,
    pub disks: Vec<DiskRates>,
    pub nets: Vec<NetRates>,
}

/// Per-disk rates, matched across samples by device name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DiskRates {
    pub name: String,
    pub reads_s: f64,
    pub read_kb_s: f64,
    pub writes_s: f64,
    pub write_kb_s: f64,
    /// Share of the interval the device spent with I/O in flight.
    pub busy_pct: f64,
}

/// Per-interface rates, matched across samples by interface name.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct NetRates {
    pub name: String,
    pub rx_kb_s: f64,
    pub tx_kb_s: f64,
    pub rx_packets_s: f64,
    pub tx_packets_s: f64,
    pub rx_errs_s: f64,
    pub tx_errs_s: f64,
}

/// Per-process rates for one interval.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProcessRates {
    pub pid: u32,
    pub name: String,
    pub state: char,
    pub cpu_pct: f64,
    pub read_kb_s: f64,
    pub write_kb_s: f64,
    /// Gauges from the current sample.
    pub rss_kb: u64,
    pub vsize_kb: u64,
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive system-wide rates from a sample pair.
///
/// Callers must have checked [`same_boot`] first; this function assumes the
/// counters share a history.
pub fn derive_system(prev: &Sample, curr: &Sample) -> SystemRates {
    let dt = (curr.timestamp - prev.timestamp) as f64;

    let mut rates = SystemRates {
        dt_secs: dt,
        loadavg: curr.system.loadavg,
        ctxt_s: rate(curr.system.ctxt, prev.system.ctxt, dt),
        forks_s: rate(curr.system.forks, prev.system.forks, dt),
        pswpin_s: rate(curr.system.mem.pswpin, prev.system.mem.pswpin, dt),
        pswpout_s: rate(curr.system.mem.pswpout, prev.system.mem.pswpout, dt),
        pgfault_s: rate(curr.system.mem.pgfault, prev.system.mem.pgfault, dt),
        pgmajfault_s: rate(curr.system.mem.pgmajfault, prev.system.mem.pgmajfault, dt),
        mem: curr.system.mem.clone(),
        ..Default::default()
    };

    // Aggregate CPU line (cpu_id == -1), measured against its own elapsed
    // ticks so the math is independent of the CPU count.
    let prev_agg = prev.system.cpus.iter().find(|c| c.cpu_id == -1);
    let curr_agg = curr.system.cpus.iter().find(|c| c.cpu_id == -1);
    if let (Some(p), Some(c)) = (prev_agg, curr_agg) {
        let total_delta = c.total().saturating_sub(p.total());
        rates.cpu_busy_pct = percent_of_interval(c.busy(), p.busy(), total_delta);
        rates.cpu_user_pct = percent_of_interval(c.user + c.nice, p.user + p.nice, total_delta);
        rates.cpu_system_pct = percent_of_interval(c.system, p.system, total_delta);
        rates.cpu_iowait_pct = percent_of_interval(c.iowait, p.iowait, total_delta);
    }

    let prev_disks: BTreeMap<&str, _> = prev
        .system
        .disks
        .iter()
        .map(|d| (d.name.as_str(), d))
        .collect();
    for d in &curr.system.disks {
        // A device absent from prev gets a zero baseline.
        let zero = Default::default();
        let p = prev_disks.get(d.name.as_str()).copied().unwrap_or(&zero);
        rates.disks.push(DiskRates {
            name: d.name.clone(),
            reads_s: rate(d.reads, p.reads, dt),
            read_kb_s: rate(d.read_sectors, p.read_sectors, dt) * SECTOR_BYTES as f64 / 1024.0,
            writes_s: rate(d.writes, p.writes, dt),
            write_kb_s: rate(d.write_sectors, p.write_sectors, dt) * SECTOR_BYTES as f64 / 1024.0,
            busy_pct: percent_of_interval(d.io_ms, p.io_ms, (dt * 1000.0) as u64),
        });
    }

    let prev_nets: BTreeMap<&str, _> = prev
        .system
        .nets
        .iter()
        .map(|n| (n.name.as_str(), n))
        .collect();
    for n in &curr.system.nets {
        let zero = Default::default();
        let p = prev_nets.get(n.name.as_str()).copied().unwrap_or(&zero);
        rates.nets.push(NetRates {
            name: n.name.clone(),
            rx_kb_s: rate(n.rx_bytes, p.rx_bytes, dt) / 1024.0,
            tx_kb_s: rate(n.tx_bytes, p.tx_bytes, dt) / 1024.0,
            rx_packets_s: rate(n.rx_packets, p.rx_packets, dt),
            tx_packets_s: rate(n.tx_packets, p.tx_packets, dt),
            rx_errs_s: rate(n.rx_errs, p.rx_errs, dt),
            tx_errs_s: rate(n.tx_errs, p.tx_errs, dt),
        });
    }

    rates
}

/// Derive per-process rates from a sample pair, sorted by CPU share
/// descending (pid ascending as tie-break).
///
/// A pid present in both samples but with a different start time is a
/// reused pid: the previous snapshot is replaced by a zero baseline, so the
/// new process starts with "no history" instead of a nonsensical delta.
pub fn derive_processes(prev: &Sample, curr: &Sample) -> Vec<ProcessRates> {
    let dt = (curr.timestamp - prev.timestamp) as f64;
    let tick_units = (dt * TICKS_PER_SEC as f64) as u64;

    let mut out = Vec::with_capacity(curr.processes.len());
    for proc_curr in curr.processes.values() {
        let zero = ProcessSample::default();
        let p = match prev.processes.get(&proc_curr.pid) {
            Some(prev_proc) if same_process(prev_proc, proc_curr) => prev_proc,
            _ => &zero,
        };
        out.push(ProcessRates {
            pid: proc_curr.pid,
            name: proc_curr.name.clone(),
            state: proc_curr.state,
            cpu_pct: percent_of_interval(
                proc_curr.utime + proc_curr.stime,
                p.utime + p.stime,
                tick_units,
            ),
            read_kb_s: rate(proc_curr.read_bytes, p.read_bytes, dt) / 1024.0,
            write_kb_s: rate(proc_curr.write_bytes, p.write_bytes, dt) / 1024.0,
            rss_kb: proc_curr.rss_kb,
            vsize_kb: proc_curr.vsize_kb,
        });
    }

    out.sort_by(|a, b| {
        b.cpu_pct
            .partial_cmp(&a.cpu_pct)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.pid.cmp(&b.pid))
    });
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
