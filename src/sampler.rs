//! Timed sampling loops for record and live modes.

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{Timelike, Utc};
use tracing::{debug, error, info, warn};

use crate::collector::{ExitEventSource, FileSystem, SampleCollector};
use crate::model::Sample;
use crate::rates::same_boot;
use crate::report;
use crate::store::{SampleStore, StoreError};

/// Knobs of the record loop.
#[derive(Debug, Clone)]
pub struct RecordConfig {
    /// Time between samples. Must be positive.
    pub interval: Duration,
    /// Retention by age in days (0 = unlimited).
    pub retain_days: u32,
    /// Retention by total size in bytes (0 = unlimited).
    pub retain_bytes: u64,
}

/// Collect-append-sleep until `running` goes false.
///
/// Collection failures log and skip the tick; store failures are fatal and
/// propagate. Retention runs once per hour change. The in-flight append
/// always finishes before shutdown, and the store is flushed on the way
/// out.
pub fn record_loop<F: FileSystem + Clone>(
    collector: &SampleCollector<F>,
    store: &mut SampleStore,
    exits: Option<&dyn ExitEventSource>,
    config: &RecordConfig,
    running: &AtomicBool,
) -> Result<(), StoreError> {
    let mut last_retention_hour: Option<u32> = None;
    let mut sample_count: u64 = 0;

    while running.load(Ordering::SeqCst) {
        let current_hour = Utc::now().hour();

        match collector.collect() {
            Ok(mut sample) => {
                if let Some(source) = exits {
                    merge_exits(&mut sample, source);
                }
                store.append(&sample)?;
                sample_count += 1;
                debug!(
                    sample = sample_count,
                    processes = sample.processes.len(),
                    "sample appended"
                );
            }
            Err(e) => {
                error!(error = %e, "collection failed, skipping tick");
            }
        }

        if last_retention_hour != Some(current_hour) {
            last_retention_hour = Some(current_hour);
            match store.clean_old_files(config.retain_days, config.retain_bytes) {
                Ok(result) => {
                    if result.pairs_removed_by_age > 0 || result.pairs_removed_by_size > 0 {
                        info!(
                            by_age = result.pairs_removed_by_age,
                            by_size = result.pairs_removed_by_size,
                            bytes_freed = result.bytes_freed,
                            remaining = result.pairs_remaining,
                            "retention pass"
                        );
                    }
                }
                Err(e) => error!(error = %e, "retention pass failed"),
            }
        }

        sleep_sliced(config.interval, running);
    }

    info!(samples = sample_count, "record loop stopping, flushing");
    store.flush()?;
    Ok(())
}

/// Collect-render-sleep without persistence.
///
/// Holds the previous sample and prints derived rates each tick. A reboot
/// between two samples (boot time changed) re-primes the history instead
/// of diffing across it.
pub fn live_loop<F: FileSystem + Clone>(
    collector: &SampleCollector<F>,
    interval: Duration,
    running: &AtomicBool,
    out: &mut impl Write,
) -> std::io::Result<()> {
    let mut prev: Option<Sample> = None;

    while running.load(Ordering::SeqCst) {
        match collector.collect() {
            Ok(curr) => {
                match &prev {
                    Some(p) if !same_boot(p, &curr) => {
                        warn!("reboot between samples, discarding history");
                    }
                    Some(p) => {
                        out.write_all(report::render_interval(p, &curr).as_bytes())?;
                        out.flush()?;
                    }
                    None => {}
                }
                prev = Some(curr);
            }
            Err(e) => {
                error!(error = %e, "collection failed, skipping tick");
            }
        }
        sleep_sliced(interval, running);
    }
    Ok(())
}

/// Folds drained exit records into the sample. A live scan entry wins over
/// an exit record with the same pid.
fn merge_exits(sample: &mut Sample, source: &dyn ExitEventSource) {
    for exited in source.drain_exits() {
        sample.processes.entry(exited.pid).or_insert(exited);
    }
}

/// Sleeps for `interval` in 100 ms slices so a shutdown request is
/// honored promptly.
fn sleep_sliced(interval: Duration, running: &AtomicBool) {
    let slice = Duration::from_millis(100);
    let mut remaining = interval;
    while remaining > Duration::ZERO && running.load(Ordering::SeqCst) {
        let step = remaining.min(slice);
        std::thread::sleep(step);
        remaining = remaining.saturating_sub(step);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::typical_system;
    use crate::collector::ExitTracker;
    use crate::model::ProcessSample;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tempfile::tempdir;

    #[test]
    fn merge_exits_prefers_live_scan() {
        let mut sample = Sample::default();
        sample.processes.insert(
            1,
            ProcessSample {
                pid: 1,
                name: "alive".into(),
                ..Default::default()
            },
        );

        let tracker = ExitTracker::new();
        tracker.record(ProcessSample {
            pid: 1,
            name: "stale".into(),
            ..Default::default()
        });
        tracker.record(ProcessSample {
            pid: 2,
            name: "gone".into(),
            state: 'Z',
            ..Default::default()
        });

        merge_exits(&mut sample, &tracker);
        assert_eq!(sample.processes.len(), 2);
        assert_eq!(sample.processes[&1].name, "alive");
        assert_eq!(sample.processes[&2].name, "gone");
    }

    #[test]
    fn record_loop_appends_and_flushes() {
        let dir = tempdir().unwrap();
        let collector = SampleCollector::new(typical_system(), "/proc", None);
        let mut store = SampleStore::create(dir.path()).unwrap();
        let config = RecordConfig {
            interval: Duration::from_millis(10),
            retain_days: 0,
            retain_bytes: 0,
        };

        let running = Arc::new(AtomicBool::new(true));
        let stopper = running.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(80));
            stopper.store(false, Ordering::SeqCst);
        });

        record_loop(&collector, &mut store, None, &config, &running).unwrap();
        handle.join().unwrap();

        assert!(store.len() >= 1);
    }

    #[test]
    fn live_loop_renders_after_second_sample() {
        let collector = SampleCollector::new(typical_system(), "/proc", None);
        let running = Arc::new(AtomicBool::new(true));
        let stopper = running.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(80));
            stopper.store(false, Ordering::SeqCst);
        });

        let mut out = Vec::new();
        live_loop(
            &collector,
            Duration::from_millis(10),
            &running,
            &mut out,
        )
        .unwrap();
        handle.join().unwrap();

        // Two identical mock samples produce zero rates but still render.
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("CPU"));
    }
}
