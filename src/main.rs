//! sysrec - Linux resource recorder.
//!
//! `record` persists periodic samples into compressed day files, `report`
//! replays a recording, `live` renders rates without persistence, and
//! `export` copies a time range into a fresh store directory.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use sysrec::collector::{RealFs, SampleCollector};
use sysrec::report;
use sysrec::sampler::{self, RecordConfig};
use sysrec::store::{export_range, SampleStore};

/// Linux resource recorder.
#[derive(Parser)]
#[command(name = "sysrec", about = "Linux resource recorder and replayer", version)]
struct Args {
    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode, only show errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Record samples into a store directory.
    Record {
        /// Sampling interval in seconds.
        #[arg(short, long, default_value = "10", value_parser = parse_interval)]
        interval: u64,

        /// Store directory for the day files.
        #[arg(short, long, default_value = "./data")]
        output_dir: PathBuf,

        /// Maximum retention in days (0 = unlimited).
        #[arg(long, default_value = "7")]
        max_days: u32,

        /// Maximum total store size, e.g. "1G", "500M" (0 = unlimited).
        #[arg(long, default_value = "1G", value_parser = parse_size)]
        max_size: u64,

        /// Path to the proc filesystem.
        #[arg(long, default_value = "/proc")]
        proc_path: PathBuf,

        /// Path to the cgroup v2 mount; omit to skip cgroup collection.
        #[arg(long)]
        cgroup_path: Option<PathBuf>,
    },

    /// Replay a recording as plain text.
    Report {
        /// A day pair base path (`.idx`/`.dat` accepted) or a store
        /// directory.
        path: PathBuf,

        /// Start replay at this unix timestamp.
        #[arg(long)]
        begin: Option<i64>,
    },

    /// Render rates live without persistence.
    Live {
        /// Sampling interval in seconds.
        #[arg(short, long, default_value = "5", value_parser = parse_interval)]
        interval: u64,

        /// Path to the proc filesystem.
        #[arg(long, default_value = "/proc")]
        proc_path: PathBuf,

        /// Path to the cgroup v2 mount; omit to skip cgroup collection.
        #[arg(long)]
        cgroup_path: Option<PathBuf>,
    },

    /// Copy a timestamp range into a fresh store directory.
    Export {
        /// Source store directory.
        src: PathBuf,

        /// Destination directory for the exported store.
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Range start (unix timestamp, inclusive).
        #[arg(long)]
        begin: Option<i64>,

        /// Range end (unix timestamp, inclusive).
        #[arg(long)]
        end: Option<i64>,
    },
}

/// Parses an interval, rejecting zero.
fn parse_interval(s: &str) -> Result<u64, String> {
    let secs: u64 = s.parse().map_err(|e| format!("invalid interval: {}", e))?;
    if secs == 0 {
        return Err("interval must be greater than zero".to_string());
    }
    Ok(secs)
}

/// Parses a human-readable size string (e.g. "1G", "500M", "1024K") into
/// bytes.
fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty size string".to_string());
    }

    let (num_str, multiplier) = if let Some(num) = s.strip_suffix('G') {
        (num, 1024 * 1024 * 1024)
    } else if let Some(num) = s.strip_suffix('M') {
        (num, 1024 * 1024)
    } else if let Some(num) = s.strip_suffix('K') {
        (num, 1024)
    } else {
        (s, 1)
    };

    num_str
        .trim()
        .parse::<u64>()
        .map(|n| n * multiplier)
        .map_err(|e| format!("invalid size '{}': {}", s, e))
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(level.into());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Installs a Ctrl-C handler that clears the returned flag.
fn shutdown_flag() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("received shutdown signal");
        r.store(false, Ordering::SeqCst);
    }) {
        warn!(error = %e, "failed to set Ctrl-C handler");
    }
    running
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    match run(args.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "fatal");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Record {
            interval,
            output_dir,
            max_days,
            max_size,
            proc_path,
            cgroup_path,
        } => {
            info!(
                "sysrec {} recording: interval={}s output={} retain_days={} retain_bytes={}",
                env!("CARGO_PKG_VERSION"),
                interval,
                output_dir.display(),
                max_days,
                max_size,
            );

            let collector = SampleCollector::new(RealFs::new(), proc_path, cgroup_path);
            let mut store = SampleStore::create(&output_dir)?;
            let config = RecordConfig {
                interval: Duration::from_secs(interval),
                retain_days: max_days,
                retain_bytes: max_size,
            };

            let running = shutdown_flag();
            sampler::record_loop(&collector, &mut store, None, &config, &running)?;
            info!("shutdown complete");
            Ok(())
        }

        Command::Report { path, begin } => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let intervals = report::run_report(&path, begin, &mut out)?;
            if intervals == 0 {
                warn!("recording contains no renderable intervals");
            }
            out.flush()?;
            Ok(())
        }

        Command::Live {
            interval,
            proc_path,
            cgroup_path,
        } => {
            let collector = SampleCollector::new(RealFs::new(), proc_path, cgroup_path);
            let running = shutdown_flag();
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            sampler::live_loop(
                &collector,
                Duration::from_secs(interval),
                &running,
                &mut out,
            )?;
            Ok(())
        }

        Command::Export {
            src,
            output_dir,
            begin,
            end,
        } => {
            let result = export_range(&src, &output_dir, begin, end)?;
            info!(
                samples = result.samples_copied,
                days = result.days_visited,
                dest = %output_dir.display(),
                "export finished"
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_parsing() {
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert_eq!(parse_size("1K").unwrap(), 1024);
        assert_eq!(parse_size("500M").unwrap(), 500 * 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert!(parse_size("").is_err());
        assert!(parse_size("abc").is_err());
    }

    #[test]
    fn interval_must_be_positive() {
        assert_eq!(parse_interval("10").unwrap(), 10);
        assert!(parse_interval("0").is_err());
        assert!(parse_interval("x").is_err());
    }
}
