//! System-wide counters collected from the `/proc` filesystem.
//!
//! CPU tick, disk, network, and memory event counters are cumulative since
//! boot; load averages and memory occupancy values are instantaneous gauges.

use serde::{Deserialize, Serialize};

/// CPU time counters for one line of `/proc/stat` (jiffies).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct CpuTicks {
    /// CPU identifier: -1 for the aggregate `cpu` line, 0+ for `cpuN`.
    pub cpu_id: i16,

    /// Time in user mode.
    pub user: u64,

    /// Time in user mode at reduced priority.
    pub nice: u64,

    /// Time in kernel mode.
    pub system: u64,

    /// Idle time.
    pub idle: u64,

    /// Time waiting for I/O completion.
    pub iowait: u64,

    /// Time servicing hardware interrupts.
    pub irq: u64,

    /// Time servicing soft interrupts.
    pub softirq: u64,

    /// Time stolen by the hypervisor.
    pub steal: u64,
}

impl CpuTicks {
    /// Sum of all accounted ticks, busy and idle.
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Sum of non-idle ticks.
    pub fn busy(&self) -> u64 {
        self.total() - self.idle - self.iowait
    }
}

/// Memory gauges and paging event counters.
///
/// Source: `/proc/meminfo` (gauges, Kb) and `/proc/vmstat` (cumulative
/// event counters).
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct MemCounters {
    /// Total usable RAM (Kb). Gauge.
    pub total_kb: u64,

    /// Free memory (Kb). Gauge.
    pub free_kb: u64,

    /// Memory available for new workloads (Kb). Gauge.
    pub available_kb: u64,

    /// Block device buffer memory (Kb). Gauge.
    pub buffers_kb: u64,

    /// Page cache memory (Kb). Gauge.
    pub cached_kb: u64,

    /// Total swap (Kb). Gauge.
    pub swap_total_kb: u64,

    /// Free swap (Kb). Gauge.
    pub swap_free_kb: u64,

    /// Pages swapped in since boot. Source: `pswpin` in `/proc/vmstat`.
    pub pswpin: u64,

    /// Pages swapped out since boot. Source: `pswpout` in `/proc/vmstat`.
    pub pswpout: u64,

    /// Page faults since boot. Source: `pgfault` in `/proc/vmstat`.
    pub pgfault: u64,

    /// Major page faults since boot. Source: `pgmajfault` in `/proc/vmstat`.
    pub pgmajfault: u64,
}

/// Per-device block I/O counters from `/proc/diskstats`. Cumulative.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct DiskCounters {
    /// Device name (e.g. `sda`, `nvme0n1`).
    pub name: String,

    /// Reads completed. Field 4.
    pub reads: u64,

    /// Sectors read (512 bytes each). Field 6.
    pub read_sectors: u64,

    /// Writes completed. Field 8.
    pub writes: u64,

    /// Sectors written. Field 10.
    pub write_sectors: u64,

    /// Milliseconds spent doing I/O. Field 13.
    pub io_ms: u64,
}

/// Per-interface network counters from `/proc/net/dev`. Cumulative.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct NetCounters {
    /// Interface name (e.g. `eth0`).
    pub name: String,

    /// Bytes received.
    pub rx_bytes: u64,

    /// Packets received.
    pub rx_packets: u64,

    /// Receive errors.
    pub rx_errs: u64,

    /// Bytes transmitted.
    pub tx_bytes: u64,

    /// Packets transmitted.
    pub tx_packets: u64,

    /// Transmit errors.
    pub tx_errs: u64,
}

/// All system-wide counters of one sample.
#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Default)]
pub struct SystemSample {
    /// Aggregate plus per-CPU tick counters. The aggregate line
    /// (`cpu_id == -1`) is always first when present.
    pub cpus: Vec<CpuTicks>,

    /// 1/5/15 minute load averages. Instantaneous gauges.
    pub loadavg: [f64; 3],

    /// Context switches since boot. Source: `ctxt` in `/proc/stat`.
    pub ctxt: u64,

    /// Processes forked since boot. Source: `processes` in `/proc/stat`.
    pub forks: u64,

    /// Memory gauges and paging counters.
    pub mem: MemCounters,

    /// Block devices, in `/proc/diskstats` order.
    pub disks: Vec<DiskCounters>,

    /// Network interfaces, in `/proc/net/dev` order.
    pub nets: Vec<NetCounters>,
}
