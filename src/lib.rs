//! sysrec - Linux resource recorder and replayer.
//!
//! Periodically samples kernel counters (CPU, memory, disks, network,
//! per-process, per-cgroup) and either renders them live or persists them
//! into compressed, time-indexed day files for later replay.
//!
//! Module map:
//! - [`model`]: the passive `Sample` snapshot types
//! - [`collector`]: `/proc` and cgroup v2 collection behind a mockable
//!   filesystem trait
//! - [`store`]: the append-only day-file store with cursor navigation,
//!   retention, and range export
//! - [`rates`]: the pure delta/rate engine and the hierarchical cgroup
//!   differ
//! - [`sampler`]: the timed record and live loops
//! - [`report`]: replay and plain-text rendering

pub mod collector;
pub mod model;
pub mod rates;
pub mod report;
pub mod sampler;
pub mod store;
