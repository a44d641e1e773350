//! Hierarchical differ for cgroup sample trees.
//!
//! Applies the rate functions of the parent module recursively over two
//! snapshots of the cgroup hierarchy, then offers a filtered, sorted
//! depth-first traversal for rendering.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::model::CgroupSample;
use crate::rates::{percent_of_interval, rate};

/// Derived per-node metrics for one interval. Mirrors the shape of
/// [`CgroupSample`] with cumulative counters replaced by rates and gauges
/// carried through.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CgroupDelta {
    pub name: String,
    pub path: String,
    pub inode: u64,
    pub level: u32,
    /// CPU time percentages against elapsed wall-clock microseconds.
    pub cpu_pct: f64,
    pub cpu_user_pct: f64,
    pub cpu_system_pct: f64,
    pub throttled_pct: f64,
    pub nr_throttled_s: f64,
    /// Memory gauges (bytes) from the current sample.
    pub mem_current: u64,
    pub mem_anon: u64,
    pub mem_file: u64,
    /// OOM kills during the interval.
    pub oom_kills: u64,
    /// I/O rates summed over the node's devices.
    pub read_kb_s: f64,
    pub write_kb_s: f64,
    pub rios_s: f64,
    pub wios_s: f64,
    pub pids_current: u64,
    pub children: BTreeMap<String, CgroupDelta>,
}

/// Field to order siblings by during traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Cpu,
    Memory,
    Io,
    Name,
}

/// Diffs two snapshots of the cgroup tree.
///
/// Walks `curr` recursively; a node's previous counterpart is the
/// same-named child of the previous parent, accepted only when the inode
/// also matches. A name collision with a different inode means the cgroup
/// was replaced, so it is diffed against a zero baseline like a brand-new
/// node. Nodes present only in `prev` are dropped.
pub fn diff(prev: Option<&CgroupSample>, curr: &CgroupSample, interval_secs: f64) -> CgroupDelta {
    let prev = prev.filter(|p| p.name == curr.name && p.inode == curr.inode);
    let zero = CgroupSample::default();
    let base = prev.unwrap_or(&zero);

    // Elapsed wall-clock in the units of cpu.stat counters.
    let interval_usec = (interval_secs * 1_000_000.0) as u64;

    let mut read_kb_s = 0.0;
    let mut write_kb_s = 0.0;
    let mut rios_s = 0.0;
    let mut wios_s = 0.0;
    for dev in &curr.io {
        let prev_dev = base
            .io
            .iter()
            .find(|p| p.major == dev.major && p.minor == dev.minor);
        let zero_dev = Default::default();
        let p = prev_dev.unwrap_or(&zero_dev);
        read_kb_s += rate(dev.rbytes, p.rbytes, interval_secs) / 1024.0;
        write_kb_s += rate(dev.wbytes, p.wbytes, interval_secs) / 1024.0;
        rios_s += rate(dev.rios, p.rios, interval_secs);
        wios_s += rate(dev.wios, p.wios, interval_secs);
    }

    let mut node = CgroupDelta {
        name: curr.name.clone(),
        path: curr.path.clone(),
        inode: curr.inode,
        level: curr.level,
        cpu_pct: percent_of_interval(curr.cpu.usage_usec, base.cpu.usage_usec, interval_usec),
        cpu_user_pct: percent_of_interval(curr.cpu.user_usec, base.cpu.user_usec, interval_usec),
        cpu_system_pct: percent_of_interval(
            curr.cpu.system_usec,
            base.cpu.system_usec,
            interval_usec,
        ),
        throttled_pct: percent_of_interval(
            curr.cpu.throttled_usec,
            base.cpu.throttled_usec,
            interval_usec,
        ),
        nr_throttled_s: rate(curr.cpu.nr_throttled, base.cpu.nr_throttled, interval_secs),
        mem_current: curr.memory.current,
        mem_anon: curr.memory.anon,
        mem_file: curr.memory.file,
        oom_kills: curr.memory.oom_kill.saturating_sub(base.memory.oom_kill),
        read_kb_s,
        write_kb_s,
        rios_s,
        wios_s,
        pids_current: curr.pids_current,
        children: BTreeMap::new(),
    };

    for (name, child) in &curr.children {
        let prev_child = prev.and_then(|p| p.children.get(name));
        node.children
            .insert(name.clone(), diff(prev_child, child, interval_secs));
    }
    node
}

/// Depth-first traversal for rendering.
///
/// A node is emitted when the predicate matches it or any of its
/// descendants, so a filtered view keeps the ancestor path for context.
/// Nodes whose path is in `collapsed` are emitted but not recursed into.
/// Siblings are ordered by `sort_field` (name ascending as tie-break,
/// stable); an absent predicate matches everything.
pub fn iterate<'a>(
    root: &'a CgroupDelta,
    predicate: Option<&dyn Fn(&CgroupDelta) -> bool>,
    sort_field: SortField,
    descending: bool,
    collapsed: &BTreeSet<String>,
) -> Vec<&'a CgroupDelta> {
    let mut out = Vec::new();
    visit(root, predicate, sort_field, descending, collapsed, &mut out);
    out
}

fn subtree_matches(node: &CgroupDelta, predicate: Option<&dyn Fn(&CgroupDelta) -> bool>) -> bool {
    match predicate {
        None => true,
        Some(p) => p(node) || node.children.values().any(|c| subtree_matches(c, predicate)),
    }
}

fn visit<'a>(
    node: &'a CgroupDelta,
    predicate: Option<&dyn Fn(&CgroupDelta) -> bool>,
    sort_field: SortField,
    descending: bool,
    collapsed: &BTreeSet<String>,
    out: &mut Vec<&'a CgroupDelta>,
) {
    if !subtree_matches(node, predicate) {
        return;
    }
    out.push(node);
    if collapsed.contains(&node.path) {
        return;
    }

    let mut kids: Vec<&CgroupDelta> = node.children.values().collect();
    kids.sort_by(|a, b| {
        let ord = match sort_field {
            SortField::Name => a.name.cmp(&b.name),
            _ => sort_value(a, sort_field)
                .partial_cmp(&sort_value(b, sort_field))
                .unwrap_or(Ordering::Equal),
        };
        let ord = if descending { ord.reverse() } else { ord };
        ord.then_with(|| a.name.cmp(&b.name))
    });

    for kid in kids {
        visit(kid, predicate, sort_field, descending, collapsed, out);
    }
}

fn sort_value(node: &CgroupDelta, field: SortField) -> f64 {
    match field {
        SortField::Cpu => node.cpu_pct,
        SortField::Memory => node.mem_current as f64,
        SortField::Io => node.read_kb_s + node.write_kb_s,
        SortField::Name => 0.0,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
