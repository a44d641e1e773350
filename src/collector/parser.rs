//! Parsers for `/proc` files.
//!
//! Pure functions over string content, so every format quirk is testable
//! without a real procfs.

use crate::model::{CpuTicks, DiskCounters, MemCounters, NetCounters, ProcessSample};

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

fn field_u64(fields: &[&str], idx: usize, name: &str) -> Result<u64, ParseError> {
    fields
        .get(idx)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::new(format!("invalid {} field", name)))
}

/// Parsed data from `/proc/stat`.
#[derive(Debug, Clone, Default)]
pub struct GlobalStat {
    /// Aggregate line first (cpu_id == -1), then per-CPU lines.
    pub cpus: Vec<CpuTicks>,
    /// Context switches since boot (`ctxt`).
    pub ctxt: u64,
    /// Forks since boot (`processes`).
    pub forks: u64,
    /// Boot time, seconds since epoch (`btime`).
    pub btime: i64,
}

/// Parses `/proc/stat`: cpu tick lines plus the btime/ctxt/processes
/// counters.
pub fn parse_global_stat(content: &str) -> Result<GlobalStat, ParseError> {
    let mut stat = GlobalStat::default();

    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let Some(&key) = fields.first() else {
            continue;
        };
        if let Some(id) = key.strip_prefix("cpu") {
            let cpu_id: i16 = if id.is_empty() {
                -1
            } else {
                id.parse()
                    .map_err(|_| ParseError::new(format!("invalid cpu id: {}", key)))?
            };
            stat.cpus.push(CpuTicks {
                cpu_id,
                user: field_u64(&fields, 1, "user")?,
                nice: field_u64(&fields, 2, "nice")?,
                system: field_u64(&fields, 3, "system")?,
                idle: field_u64(&fields, 4, "idle")?,
                // Kernels before 2.6 omit the tail fields.
                iowait: field_u64(&fields, 5, "iowait").unwrap_or(0),
                irq: field_u64(&fields, 6, "irq").unwrap_or(0),
                softirq: field_u64(&fields, 7, "softirq").unwrap_or(0),
                steal: field_u64(&fields, 8, "steal").unwrap_or(0),
            });
        } else if key == "ctxt" {
            stat.ctxt = field_u64(&fields, 1, "ctxt")?;
        } else if key == "processes" {
            stat.forks = field_u64(&fields, 1, "processes")?;
        } else if key == "btime" {
            stat.btime = field_u64(&fields, 1, "btime")? as i64;
        }
    }

    if stat.cpus.is_empty() {
        return Err(ParseError::new("no cpu lines in stat"));
    }
    if stat.btime == 0 {
        return Err(ParseError::new("missing btime in stat"));
    }
    Ok(stat)
}

/// Parses `/proc/meminfo` into the gauge fields of `MemCounters`.
/// The paging event counters come from vmstat and stay zero here.
pub fn parse_meminfo(content: &str) -> Result<MemCounters, ParseError> {
    let mut mem = MemCounters::default();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let (Some(key), Some(value)) = (fields.first(), fields.get(1)) else {
            continue;
        };
        let value: u64 = value
            .parse()
            .map_err(|_| ParseError::new(format!("invalid value in meminfo: {}", line)))?;
        match *key {
            "MemTotal:" => mem.total_kb = value,
            "MemFree:" => mem.free_kb = value,
            "MemAvailable:" => mem.available_kb = value,
            "Buffers:" => mem.buffers_kb = value,
            "Cached:" => mem.cached_kb = value,
            "SwapTotal:" => mem.swap_total_kb = value,
            "SwapFree:" => mem.swap_free_kb = value,
            _ => {}
        }
    }
    if mem.total_kb == 0 {
        return Err(ParseError::new("missing MemTotal in meminfo"));
    }
    Ok(mem)
}

/// Fills the cumulative paging counters of `mem` from `/proc/vmstat`.
pub fn parse_vmstat(content: &str, mem: &mut MemCounters) {
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(value) = value.parse() else {
            continue;
        };
        match key {
            "pswpin" => mem.pswpin = value,
            "pswpout" => mem.pswpout = value,
            "pgfault" => mem.pgfault = value,
            "pgmajfault" => mem.pgmajfault = value,
            _ => {}
        }
    }
}

/// Parses `/proc/loadavg` into the three load averages.
pub fn parse_loadavg(content: &str) -> Result<[f64; 3], ParseError> {
    let fields: Vec<&str> = content.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(ParseError::new("too few fields in loadavg"));
    }
    let mut load = [0.0; 3];
    for (i, slot) in load.iter_mut().enumerate() {
        *slot = fields[i]
            .parse()
            .map_err(|_| ParseError::new(format!("invalid loadavg value: {}", fields[i])))?;
    }
    Ok(load)
}

/// Parses `/proc/diskstats`. Partition lines are kept; callers that only
/// want whole devices filter on the name.
pub fn parse_diskstats(content: &str) -> Result<Vec<DiskCounters>, ParseError> {
    let mut disks = Vec::new();
    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 13 {
            continue;
        }
        let name = fields[2].to_string();
        disks.push(DiskCounters {
            name,
            reads: field_u64(&fields, 3, "reads")?,
            read_sectors: field_u64(&fields, 5, "read sectors")?,
            writes: field_u64(&fields, 7, "writes")?,
            write_sectors: field_u64(&fields, 9, "write sectors")?,
            io_ms: field_u64(&fields, 12, "io ms")?,
        });
    }
    Ok(disks)
}

/// Parses `/proc/net/dev`, skipping the two header lines.
pub fn parse_net_dev(content: &str) -> Result<Vec<NetCounters>, ParseError> {
    let mut nets = Vec::new();
    for line in content.lines().skip(2) {
        let Some((name, counters)) = line.split_once(':') else {
            continue;
        };
        let fields: Vec<&str> = counters.split_whitespace().collect();
        if fields.len() < 11 {
            return Err(ParseError::new(format!(
                "too few fields in net/dev line: {}",
                line
            )));
        }
        nets.push(NetCounters {
            name: name.trim().to_string(),
            rx_bytes: field_u64(&fields, 0, "rx bytes")?,
            rx_packets: field_u64(&fields, 1, "rx packets")?,
            rx_errs: field_u64(&fields, 2, "rx errs")?,
            tx_bytes: field_u64(&fields, 8, "tx bytes")?,
            tx_packets: field_u64(&fields, 9, "tx packets")?,
            tx_errs: field_u64(&fields, 10, "tx errs")?,
        });
    }
    Ok(nets)
}

/// Page size used to convert the rss field of `/proc/[pid]/stat` to Kb.
const PAGE_SIZE: u64 = 4096;

/// Parses `/proc/[pid]/stat`.
///
/// The comm field is enclosed in parentheses and may contain spaces, so the
/// line is split around the last `)` before normal whitespace splitting.
/// The returned sample has zero I/O counters; `parse_proc_io` fills them.
pub fn parse_proc_stat(content: &str) -> Result<ProcessSample, ParseError> {
    let content = content.trim();
    let open = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;
    if close <= open {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let pid: u32 = content[..open]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid in stat"))?;
    let name = content[open + 1..close].to_string();

    // rest[0] is field 3 (state); field N of stat(5) is rest[N - 3].
    let rest: Vec<&str> = content[close + 1..].split_whitespace().collect();
    let state = rest
        .first()
        .and_then(|s| s.chars().next())
        .ok_or_else(|| ParseError::new("missing state in stat"))?;

    Ok(ProcessSample {
        pid,
        name,
        state,
        utime: field_u64(&rest, 11, "utime")?,
        stime: field_u64(&rest, 12, "stime")?,
        start_time: field_u64(&rest, 19, "starttime")?,
        vsize_kb: field_u64(&rest, 20, "vsize")? / 1024,
        rss_kb: field_u64(&rest, 21, "rss")?.saturating_mul(PAGE_SIZE) / 1024,
        read_bytes: 0,
        write_bytes: 0,
    })
}

/// Fills the storage I/O counters of `proc` from `/proc/[pid]/io`.
pub fn parse_proc_io(content: &str, proc: &mut ProcessSample) {
    for line in content.lines() {
        let mut fields = line.split_whitespace();
        let (Some(key), Some(value)) = (fields.next(), fields.next()) else {
            continue;
        };
        let Ok(value) = value.parse() else {
            continue;
        };
        match key {
            "read_bytes:" => proc.read_bytes = value,
            "write_bytes:" => proc.write_bytes = value,
            _ => {}
        }
    }
}
