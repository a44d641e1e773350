//! Range export: copy a time window of recorded samples into a fresh store.

use std::path::Path;

use tracing::{debug, info};

use super::{SampleStore, StoreError};

/// Outcome of an export run.
#[derive(Debug, Default)]
pub struct ExportResult {
    /// Samples written into the destination store.
    pub samples_copied: usize,
    /// Day pairs that contributed at least one sample.
    pub days_visited: usize,
}

/// Copies every sample of `src` with `begin <= timestamp <= end` into a
/// fresh store at `dest`, preserving day-pair layout. `None` bounds are
/// open ends.
///
/// The destination keeps the normal store format, so it can be read back
/// with the regular tooling or shipped off-host as-is.
pub fn export_range(
    src: &Path,
    dest: &Path,
    begin: Option<i64>,
    end: Option<i64>,
) -> Result<ExportResult, StoreError> {
    let mut writer = SampleStore::create(dest)?;
    let mut result = ExportResult::default();

    for (date, base) in SampleStore::list_days(src)? {
        let mut reader = SampleStore::open(&base)?;

        // Skip whole pairs outside the window using index timestamps only.
        if begin.is_some_and(|b| reader.last_timestamp().is_some_and(|last| last < b)) {
            debug!(%date, "pair ends before export window, skipping");
            continue;
        }
        if end.is_some_and(|e| reader.first_timestamp().is_some_and(|first| first > e)) {
            debug!(%date, "pair starts after export window, done");
            break;
        }

        // Position at the window start. A begin before the pair's first
        // sample just starts at the beginning.
        let needs_jump =
            begin.is_some_and(|b| reader.first_timestamp().is_some_and(|first| first < b));
        let mut current = if needs_jump {
            // begin is Some here by construction
            reader.jump_sample_by_timestamp(begin.unwrap_or(i64::MIN))
        } else {
            reader.next_sample(1)
        };

        let mut copied_from_pair = 0;
        loop {
            let sample = match current {
                Ok(s) => s,
                Err(StoreError::OutOfRange) => break,
                Err(e) => return Err(e),
            };
            if end.is_some_and(|e| sample.timestamp > e) {
                break;
            }
            writer.append(&sample)?;
            copied_from_pair += 1;
            current = reader.next_sample(1);
        }

        if copied_from_pair > 0 {
            result.samples_copied += copied_from_pair;
            result.days_visited += 1;
        }
    }

    writer.flush()?;
    info!(
        samples = result.samples_copied,
        days = result.days_visited,
        dest = %dest.display(),
        "export complete"
    );
    Ok(result)
}
