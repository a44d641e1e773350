//! Exited-process capture interface.
//!
//! Processes that start and die between two ticks never show up in a
//! `/proc` scan. An external event source (eBPF, process accounting, a
//! netlink listener) can record them; the sampler only needs a
//! drain-and-clear call, so the source stays replaceable.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::ProcessSample;

/// A thread-safe source of processes that exited since the last drain.
pub trait ExitEventSource: Send + Sync {
    /// Returns the recorded exits and clears the internal buffer.
    fn drain_exits(&self) -> Vec<ProcessSample>;
}

/// Reference implementation: a mutex-guarded map written by a producer
/// thread and drained by the sampler. Keyed by `(pid, start_time)` so a
/// pid that is reused within one interval keeps both records.
#[derive(Debug, Default)]
pub struct ExitTracker {
    exits: Mutex<HashMap<(u32, u64), ProcessSample>>,
}

impl ExitTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one exited process, overwriting an earlier record of the
    /// same process.
    pub fn record(&self, process: ProcessSample) {
        let mut exits = match self.exits.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        exits.insert((process.pid, process.start_time), process);
    }
}

impl ExitEventSource for ExitTracker {
    fn drain_exits(&self) -> Vec<ProcessSample> {
        let mut exits = match self.exits.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        exits.drain().map(|(_, p)| p).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exited(pid: u32, start_time: u64) -> ProcessSample {
        ProcessSample {
            pid,
            start_time,
            name: "short-lived".into(),
            state: 'Z',
            ..Default::default()
        }
    }

    #[test]
    fn drain_returns_and_clears() {
        let tracker = ExitTracker::new();
        tracker.record(exited(100, 1));
        tracker.record(exited(101, 2));

        let drained = tracker.drain_exits();
        assert_eq!(drained.len(), 2);
        assert!(tracker.drain_exits().is_empty());
    }

    #[test]
    fn reused_pid_keeps_both_records() {
        let tracker = ExitTracker::new();
        tracker.record(exited(100, 1));
        tracker.record(exited(100, 9));
        assert_eq!(tracker.drain_exits().len(), 2);
    }

    #[test]
    fn rerecord_overwrites_same_process() {
        let tracker = ExitTracker::new();
        let mut first = exited(100, 1);
        first.utime = 10;
        tracker.record(first);
        let mut second = exited(100, 1);
        second.utime = 20;
        tracker.record(second);

        let drained = tracker.drain_exits();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].utime, 20);
    }
}
