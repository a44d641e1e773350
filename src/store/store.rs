//! Day-file store: append path, cursor navigation, retention.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Days, NaiveDate, Utc};
use tracing::{debug, info, warn};

use super::codec;
use super::{IndexEntry, StoreError, INDEX_ENTRY_SIZE};
use crate::model::Sample;

/// Day file prefix: `sysrec_YYYYMMDD.idx` / `sysrec_YYYYMMDD.dat`.
const FILE_PREFIX: &str = "sysrec_";
const DATE_FORMAT: &str = "%Y%m%d";

/// The open (index, data) file pair.
struct OpenPair {
    /// Calendar date of the pair, when derivable from the filename.
    /// Writers always have one; readers opening an arbitrary pair may not.
    date: Option<NaiveDate>,
    idx_path: PathBuf,
    dat_path: PathBuf,
    idx: File,
    dat: File,
    /// Committed end of the data file. Only advanced after both the payload
    /// and its index record are fully written, so a failed append leaves it
    /// pointing at the last committed frame.
    next_offset: i64,
}

/// Result of a retention pass, for logging.
#[derive(Debug, Default)]
pub struct RetentionResult {
    /// Day pairs removed because they aged out.
    pub pairs_removed_by_age: usize,
    /// Day pairs removed to get under the size cap.
    pub pairs_removed_by_size: usize,
    /// Total bytes freed.
    pub bytes_freed: u64,
    /// Day pairs remaining (excluding the open one).
    pub pairs_remaining: usize,
    /// Total size of remaining pairs in bytes (excluding the open one).
    pub total_size_after: u64,
}

/// A handle on a sample store.
///
/// Created with [`SampleStore::create`] for appending (rolls day pairs
/// automatically) or [`SampleStore::open`] for reading one recorded pair.
/// Each handle owns a private cursor; handles never share state.
pub struct SampleStore {
    dir: PathBuf,
    writable: bool,
    pair: Option<OpenPair>,
    /// Loaded slice of the index. Append-only and timestamp-sorted on disk,
    /// so extension is a pure tail read and navigation is binary search.
    entries: Vec<IndexEntry>,
    /// Index of the last successfully read entry; -1 = before the first.
    pos: i64,
}

impl SampleStore {
    /// Opens a store directory for appending. The day pair is created
    /// lazily on the first append, dated by the sample's timestamp.
    pub fn create(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            writable: true,
            pair: None,
            entries: Vec::new(),
            pos: -1,
        })
    }

    /// Opens one recorded day pair read-only.
    ///
    /// `path` is the pair base (`.../sysrec_20260830`) or either of its
    /// files; the extension is ignored.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let base = match path.extension() {
            Some(ext) if ext == "idx" || ext == "dat" => path.with_extension(""),
            _ => path.to_path_buf(),
        };
        let idx_path = base.with_extension("idx");
        let dat_path = base.with_extension("dat");

        let idx = File::open(&idx_path)?;
        let dat = File::open(&dat_path)?;
        let next_offset = dat.metadata()?.len() as i64;
        let date = base
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_date_from_name);

        let mut store = Self {
            dir: base.parent().map(Path::to_path_buf).unwrap_or_default(),
            writable: false,
            pair: Some(OpenPair {
                date,
                idx_path,
                dat_path,
                idx,
                dat,
                next_offset,
            }),
            entries: Vec::new(),
            pos: -1,
        };
        store.extend_index()?;
        Ok(store)
    }

    /// Base path (without extension) of the pair for `date` in `dir`.
    pub fn day_base(dir: &Path, date: NaiveDate) -> PathBuf {
        dir.join(format!("{}{}", FILE_PREFIX, date.format(DATE_FORMAT)))
    }

    /// Lists the day pairs in `dir`, sorted by date.
    pub fn list_days(dir: &Path) -> io::Result<Vec<(NaiveDate, PathBuf)>> {
        let mut days = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "idx") {
                if let Some(date) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(parse_date_from_name)
                {
                    days.push((date, path.with_extension("")));
                }
            }
        }
        days.sort_by_key(|(date, _)| *date);
        Ok(days)
    }

    /// Number of index entries currently loaded.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries are loaded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Timestamp of the first loaded entry.
    pub fn first_timestamp(&self) -> Option<i64> {
        self.entries.first().map(|e| e.timestamp)
    }

    /// Timestamp of the last loaded entry.
    pub fn last_timestamp(&self) -> Option<i64> {
        self.entries.last().map(|e| e.timestamp)
    }

    /// Cursor position: index of the last read entry, or None before the
    /// first read.
    pub fn position(&self) -> Option<usize> {
        usize::try_from(self.pos).ok()
    }

    // ---------------------------------------------------------------
    // Append path
    // ---------------------------------------------------------------

    /// Appends one sample: payload frame into the data file first, then the
    /// 24-byte index record. Rolls to a new day pair when the sample's UTC
    /// date differs from the open pair's.
    ///
    /// On any error the committed offset stays put, so a retried append
    /// lands at the same place instead of duplicating bytes.
    pub fn append(&mut self, sample: &Sample) -> Result<(), StoreError> {
        if !self.writable {
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "store handle is read-only",
            )));
        }

        let date = date_of_timestamp(sample.timestamp)?;
        if self.pair.as_ref().map(|p| p.date) != Some(Some(date)) {
            self.roll_to(date)?;
        }

        let payload = codec::encode_sample(sample)?;
        let pair = self
            .pair
            .as_mut()
            .ok_or_else(|| StoreError::Io(io::Error::other("no open day pair")))?;

        let entry = IndexEntry {
            timestamp: sample.timestamp,
            offset: pair.next_offset,
            length: payload.len() as i64,
        };

        // Payload first. Seeking to the committed offset (instead of opening
        // in append mode) means a torn previous write gets overwritten, not
        // extended.
        pair.dat.seek(SeekFrom::Start(entry.offset as u64))?;
        pair.dat.write_all(&payload)?;
        // The index record must only ever point at durable payload bytes;
        // readers trust any record they can see.
        pair.dat.sync_data()?;

        pair.idx
            .seek(SeekFrom::Start((self.entries.len() * INDEX_ENTRY_SIZE) as u64))?;
        pair.idx.write_all(&entry.to_bytes())?;
        pair.idx.sync_data()?;

        pair.next_offset += entry.length;
        self.entries.push(entry);
        Ok(())
    }

    /// Flushes both files of the open pair.
    pub fn flush(&mut self) -> io::Result<()> {
        if let Some(pair) = &mut self.pair {
            pair.dat.sync_all()?;
            pair.idx.sync_all()?;
        }
        Ok(())
    }

    /// Opens (or reopens) the pair for `date` for appending, recovering
    /// from a previous crash by truncating torn trailing records.
    fn roll_to(&mut self, date: NaiveDate) -> Result<(), StoreError> {
        if let Some(pair) = &mut self.pair {
            pair.dat.sync_all()?;
            pair.idx.sync_all()?;
            info!(
                old = %pair.idx_path.display(),
                "day rollover, closing pair"
            );
        }

        let base = Self::day_base(&self.dir, date);
        let idx_path = base.with_extension("idx");
        let dat_path = base.with_extension("dat");

        let mut idx = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&idx_path)?;
        let dat = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&dat_path)?;

        // Recovery: drop a partial trailing index record, then drop any
        // records pointing past the end of the data file.
        let idx_len = idx.metadata()?.len();
        let mut valid_len = idx_len - idx_len % INDEX_ENTRY_SIZE as u64;
        if valid_len < idx_len {
            warn!(
                file = %idx_path.display(),
                garbage = idx_len - valid_len,
                "truncating partial index record"
            );
            idx.set_len(valid_len)?;
        }

        let mut entries = read_index(&mut idx, 0, (valid_len as usize) / INDEX_ENTRY_SIZE)?;
        let dat_len = dat.metadata()?.len() as i64;
        let mut dropped = 0;
        while entries
            .last()
            .is_some_and(|e| e.offset + e.length > dat_len)
        {
            entries.pop();
            valid_len -= INDEX_ENTRY_SIZE as u64;
            dropped += 1;
        }
        if dropped > 0 {
            warn!(
                file = %idx_path.display(),
                dropped,
                "dropping index records past end of data file"
            );
            idx.set_len(valid_len)?;
        }

        let next_offset = entries.last().map(|e| e.offset + e.length).unwrap_or(0);
        if dat_len > next_offset {
            warn!(
                file = %dat_path.display(),
                garbage = dat_len - next_offset,
                "truncating uncommitted data bytes"
            );
            dat.set_len(next_offset as u64)?;
        }

        if !entries.is_empty() {
            info!(
                file = %idx_path.display(),
                samples = entries.len(),
                "reopened existing day pair"
            );
        } else {
            debug!(file = %idx_path.display(), "opened new day pair");
        }

        self.entries = entries;
        self.pos = self.entries.len() as i64 - 1;
        self.pair = Some(OpenPair {
            date: Some(date),
            idx_path,
            dat_path,
            idx,
            dat,
            next_offset,
        });
        Ok(())
    }

    // ---------------------------------------------------------------
    // Read path
    // ---------------------------------------------------------------

    /// Moves the cursor by `step` entries relative to the last read one and
    /// decodes the entry there. A fresh cursor sits before the first entry,
    /// so `next_sample(1)` reads entry 0.
    ///
    /// Targets beyond the loaded window trigger repeated index extension
    /// (following a live writer) before failing with
    /// [`StoreError::OutOfRange`].
    pub fn next_sample(&mut self, step: i64) -> Result<Sample, StoreError> {
        let target = self.pos + step;
        if target < 0 {
            return Err(StoreError::OutOfRange);
        }
        while target as usize >= self.entries.len() {
            if self.extend_index()? == 0 {
                return Err(StoreError::OutOfRange);
            }
        }
        let sample = self.read_at(target as usize)?;
        self.pos = target;
        Ok(sample)
    }

    /// Positions the cursor at the first entry with `timestamp >= ts` and
    /// decodes it. Fails with [`StoreError::OutOfRange`] when `ts` precedes
    /// the first retained entry or no such entry exists even after
    /// extension.
    pub fn jump_sample_by_timestamp(&mut self, ts: i64) -> Result<Sample, StoreError> {
        // Follow a live writer before deciding the timestamp is past the end.
        while self.entries.last().is_none_or(|e| e.timestamp < ts) {
            if self.extend_index()? == 0 {
                break;
            }
        }

        match self.entries.first() {
            None => return Err(StoreError::OutOfRange),
            Some(first) if ts < first.timestamp => return Err(StoreError::OutOfRange),
            Some(_) => {}
        }

        let idx = self.entries.partition_point(|e| e.timestamp < ts);
        if idx == self.entries.len() {
            return Err(StoreError::OutOfRange);
        }
        let sample = self.read_at(idx)?;
        self.pos = idx as i64;
        Ok(sample)
    }

    /// Reads newly appended index records from disk. Returns the number of
    /// entries added.
    fn extend_index(&mut self) -> Result<usize, StoreError> {
        let Some(pair) = &mut self.pair else {
            return Ok(0);
        };
        let file_len = pair.idx.metadata()?.len() as usize;
        let available = file_len / INDEX_ENTRY_SIZE;
        let loaded = self.entries.len();
        if available <= loaded {
            return Ok(0);
        }
        let fresh = read_index(&mut pair.idx, loaded, available - loaded)?;
        let added = fresh.len();
        self.entries.extend(fresh);
        Ok(added)
    }

    /// Decodes the entry at `i` of the loaded index.
    fn read_at(&mut self, i: usize) -> Result<Sample, StoreError> {
        let entry = self.entries[i];
        let pair = self
            .pair
            .as_mut()
            .ok_or_else(|| StoreError::Io(io::Error::other("no open day pair")))?;

        pair.dat.seek(SeekFrom::Start(entry.offset as u64))?;
        let mut buf = vec![0u8; entry.length as usize];
        pair.dat.read_exact(&mut buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                StoreError::Corrupt {
                    file: pair.dat_path.clone(),
                    offset: entry.offset,
                    reason: "frame extends past end of data file".into(),
                }
            } else {
                StoreError::Io(e)
            }
        })?;

        codec::decode_sample(&buf).map_err(|e| StoreError::Corrupt {
            file: pair.dat_path.clone(),
            offset: entry.offset,
            reason: e.to_string(),
        })
    }

    // ---------------------------------------------------------------
    // Retention
    // ---------------------------------------------------------------

    /// Deletes whole day pairs by age and by total size.
    ///
    /// `retain_days` keeps the pairs of the most recent N calendar days
    /// (0 = unlimited). `retain_bytes` then removes oldest pairs while the
    /// total size of the remaining ones exceeds the cap (0 = unlimited).
    /// The currently open pair is never deleted and never counted.
    pub fn clean_old_files(
        &self,
        retain_days: u32,
        retain_bytes: u64,
    ) -> io::Result<RetentionResult> {
        let mut result = RetentionResult::default();
        let open_date = self.pair.as_ref().and_then(|p| p.date);

        struct PairInfo {
            date: NaiveDate,
            base: PathBuf,
            size: u64,
        }

        let mut pairs: Vec<PairInfo> = Vec::new();
        for (date, base) in Self::list_days(&self.dir)? {
            if Some(date) == open_date {
                continue;
            }
            let size = pair_size(&base)?;
            pairs.push(PairInfo { date, base, size });
        }
        // list_days returns oldest first

        let mut remaining: Vec<PairInfo> = Vec::new();
        if retain_days > 0 {
            let cutoff = Utc::now()
                .date_naive()
                .checked_sub_days(Days::new(retain_days as u64 - 1))
                .unwrap_or(NaiveDate::MIN);
            for pair in pairs {
                if pair.date < cutoff {
                    remove_pair(&pair.base)?;
                    result.pairs_removed_by_age += 1;
                    result.bytes_freed += pair.size;
                } else {
                    remaining.push(pair);
                }
            }
        } else {
            remaining = pairs;
        }

        let mut total: u64 = remaining.iter().map(|p| p.size).sum();
        if retain_bytes > 0 {
            while total > retain_bytes && !remaining.is_empty() {
                let oldest = remaining.remove(0);
                remove_pair(&oldest.base)?;
                result.pairs_removed_by_size += 1;
                result.bytes_freed += oldest.size;
                total -= oldest.size;
            }
        }

        result.pairs_remaining = remaining.len();
        result.total_size_after = total;
        Ok(result)
    }
}

impl Drop for SampleStore {
    fn drop(&mut self) {
        if self.writable {
            if let Err(e) = self.flush() {
                warn!(error = %e, "flush on close failed");
            }
        }
    }
}

/// Reads `count` index records starting at record `from`.
fn read_index(idx: &mut File, from: usize, count: usize) -> io::Result<Vec<IndexEntry>> {
    idx.seek(SeekFrom::Start((from * INDEX_ENTRY_SIZE) as u64))?;
    let mut buf = vec![0u8; count * INDEX_ENTRY_SIZE];
    idx.read_exact(&mut buf)?;

    let mut entries = Vec::with_capacity(count);
    for rec in buf.chunks_exact(INDEX_ENTRY_SIZE) {
        let arr: &[u8; INDEX_ENTRY_SIZE] = rec.try_into().map_err(io::Error::other)?;
        entries.push(IndexEntry::from_bytes(arr));
    }
    Ok(entries)
}

/// UTC calendar date for a unix timestamp.
fn date_of_timestamp(ts: i64) -> Result<NaiveDate, StoreError> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.date_naive())
        .ok_or_else(|| {
            StoreError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("timestamp {} out of range", ts),
            ))
        })
}

/// Parses `sysrec_YYYYMMDD` (any extension already stripped or present).
fn parse_date_from_name(name: &str) -> Option<NaiveDate> {
    let rest = name.strip_prefix(FILE_PREFIX)?;
    let digits = rest.split('.').next()?;
    NaiveDate::parse_from_str(digits, DATE_FORMAT).ok()
}

/// Combined size of both files of a pair.
fn pair_size(base: &Path) -> io::Result<u64> {
    let mut size = 0;
    for ext in ["idx", "dat"] {
        match std::fs::metadata(base.with_extension(ext)) {
            Ok(m) => size += m.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(size)
}

/// Removes both files of a pair.
fn remove_pair(base: &Path) -> io::Result<()> {
    info!(pair = %base.display(), "retention: removing day pair");
    for ext in ["idx", "dat"] {
        match std::fs::remove_file(base.with_extension(ext)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Sample;
    use tempfile::tempdir;

    /// Minimal sample at a given timestamp.
    fn sample(ts: i64) -> Sample {
        Sample {
            timestamp: ts,
            boot_time: 1_600_000_000,
            ..Default::default()
        }
    }

    const DAY: i64 = 86_400;
    // 2023-11-14 22:13:20 UTC
    const BASE_TS: i64 = 1_700_000_000;

    #[test]
    fn append_then_read_back() {
        let dir = tempdir().unwrap();
        let mut store = SampleStore::create(dir.path()).unwrap();
        for i in 0..5 {
            store.append(&sample(BASE_TS + i * 10)).unwrap();
        }
        assert_eq!(store.len(), 5);

        let mut reader = SampleStore::open(SampleStore::day_base(
            dir.path(),
            date_of_timestamp(BASE_TS).unwrap(),
        ))
        .unwrap();
        let first = reader.next_sample(1).unwrap();
        assert_eq!(first.timestamp, BASE_TS);
        let third = reader.next_sample(2).unwrap();
        assert_eq!(third.timestamp, BASE_TS + 20);
        let again = reader.next_sample(0).unwrap();
        assert_eq!(again.timestamp, BASE_TS + 20);
        let second = reader.next_sample(-1).unwrap();
        assert_eq!(second.timestamp, BASE_TS + 10);
    }

    #[test]
    fn index_is_monotonic_after_appends() {
        let dir = tempdir().unwrap();
        let mut store = SampleStore::create(dir.path()).unwrap();
        let n = 20;
        for i in 0..n {
            store.append(&sample(BASE_TS + i)).unwrap();
        }
        assert_eq!(store.len(), n as usize);
        let mut prev = i64::MIN;
        for e in &store.entries {
            assert!(e.timestamp >= prev);
            prev = e.timestamp;
        }
    }

    #[test]
    fn navigation_bounds_on_single_entry() {
        let dir = tempdir().unwrap();
        let mut store = SampleStore::create(dir.path()).unwrap();
        store.append(&sample(BASE_TS)).unwrap();

        let base = SampleStore::day_base(dir.path(), date_of_timestamp(BASE_TS).unwrap());
        let mut reader = SampleStore::open(&base).unwrap();

        // Fresh cursor sits before the first entry.
        assert!(matches!(
            reader.next_sample(-1),
            Err(StoreError::OutOfRange)
        ));
        assert_eq!(reader.next_sample(1).unwrap().timestamp, BASE_TS);
        // Forward past the last entry.
        assert!(matches!(reader.next_sample(1), Err(StoreError::OutOfRange)));
    }

    #[test]
    fn jump_by_timestamp_semantics() {
        let dir = tempdir().unwrap();
        let mut store = SampleStore::create(dir.path()).unwrap();
        for ts in [BASE_TS + 10, BASE_TS + 20, BASE_TS + 30] {
            store.append(&sample(ts)).unwrap();
        }

        let base = SampleStore::day_base(dir.path(), date_of_timestamp(BASE_TS).unwrap());
        let mut reader = SampleStore::open(&base).unwrap();

        let s = reader.jump_sample_by_timestamp(BASE_TS + 15).unwrap();
        assert_eq!(s.timestamp, BASE_TS + 20);
        let s = reader.jump_sample_by_timestamp(BASE_TS + 30).unwrap();
        assert_eq!(s.timestamp, BASE_TS + 30);
        assert!(matches!(
            reader.jump_sample_by_timestamp(BASE_TS + 31),
            Err(StoreError::OutOfRange)
        ));
        // Before the earliest retained sample.
        assert!(matches!(
            reader.jump_sample_by_timestamp(BASE_TS + 9),
            Err(StoreError::OutOfRange)
        ));
    }

    #[test]
    fn jump_then_step_backward() {
        let dir = tempdir().unwrap();
        let mut store = SampleStore::create(dir.path()).unwrap();
        for ts in [BASE_TS + 10, BASE_TS + 20, BASE_TS + 30] {
            store.append(&sample(ts)).unwrap();
        }
        let base = SampleStore::day_base(dir.path(), date_of_timestamp(BASE_TS).unwrap());
        let mut reader = SampleStore::open(&base).unwrap();

        reader.jump_sample_by_timestamp(BASE_TS + 20).unwrap();
        let prev = reader.next_sample(-1).unwrap();
        assert_eq!(prev.timestamp, BASE_TS + 10);
    }

    #[test]
    fn reader_follows_live_writer() {
        let dir = tempdir().unwrap();
        let mut writer = SampleStore::create(dir.path()).unwrap();
        writer.append(&sample(BASE_TS)).unwrap();

        let base = SampleStore::day_base(dir.path(), date_of_timestamp(BASE_TS).unwrap());
        let mut reader = SampleStore::open(&base).unwrap();
        assert_eq!(reader.next_sample(1).unwrap().timestamp, BASE_TS);
        assert!(matches!(reader.next_sample(1), Err(StoreError::OutOfRange)));

        // Writer appends; the reader extension picks the new entries up.
        writer.append(&sample(BASE_TS + 10)).unwrap();
        writer.append(&sample(BASE_TS + 20)).unwrap();
        assert_eq!(reader.next_sample(1).unwrap().timestamp, BASE_TS + 10);
        assert_eq!(reader.next_sample(1).unwrap().timestamp, BASE_TS + 20);

        // Step magnitude beyond the loaded window extends as well.
        writer.append(&sample(BASE_TS + 30)).unwrap();
        writer.append(&sample(BASE_TS + 40)).unwrap();
        assert_eq!(reader.next_sample(2).unwrap().timestamp, BASE_TS + 40);
    }

    #[test]
    fn day_rollover_creates_second_pair() {
        let dir = tempdir().unwrap();
        let mut store = SampleStore::create(dir.path()).unwrap();
        store.append(&sample(BASE_TS)).unwrap();
        store.append(&sample(BASE_TS + DAY)).unwrap();

        let days = SampleStore::list_days(dir.path()).unwrap();
        assert_eq!(days.len(), 2);
        assert!(days[0].0 < days[1].0);

        // Each pair holds its own day's sample.
        let mut first = SampleStore::open(&days[0].1).unwrap();
        assert_eq!(first.next_sample(1).unwrap().timestamp, BASE_TS);
        assert_eq!(first.len(), 1);
        let mut second = SampleStore::open(&days[1].1).unwrap();
        assert_eq!(second.next_sample(1).unwrap().timestamp, BASE_TS + DAY);
    }

    #[test]
    fn reopen_recovers_partial_index_record() {
        let dir = tempdir().unwrap();
        let base;
        {
            let mut store = SampleStore::create(dir.path()).unwrap();
            store.append(&sample(BASE_TS)).unwrap();
            store.append(&sample(BASE_TS + 10)).unwrap();
            base = SampleStore::day_base(dir.path(), date_of_timestamp(BASE_TS).unwrap());
        }

        // Simulate a torn index write: 10 garbage bytes after the records.
        let idx_path = base.with_extension("idx");
        let mut idx = OpenOptions::new().append(true).open(&idx_path).unwrap();
        idx.write_all(&[0xAB; 10]).unwrap();
        drop(idx);

        // Appending again recovers and continues at the right offset.
        let mut store = SampleStore::create(dir.path()).unwrap();
        store.append(&sample(BASE_TS + 20)).unwrap();
        assert_eq!(store.len(), 3);

        let mut reader = SampleStore::open(&base).unwrap();
        assert_eq!(reader.next_sample(1).unwrap().timestamp, BASE_TS);
        assert_eq!(reader.next_sample(1).unwrap().timestamp, BASE_TS + 10);
        assert_eq!(reader.next_sample(1).unwrap().timestamp, BASE_TS + 20);
    }

    #[test]
    fn reopen_drops_index_records_past_data_end() {
        let dir = tempdir().unwrap();
        let base;
        {
            let mut store = SampleStore::create(dir.path()).unwrap();
            store.append(&sample(BASE_TS)).unwrap();
            store.append(&sample(BASE_TS + 10)).unwrap();
            base = SampleStore::day_base(dir.path(), date_of_timestamp(BASE_TS).unwrap());
        }

        // Chop the tail off the data file: the last index record now points
        // past the end and must be dropped on reopen.
        let dat_path = base.with_extension("dat");
        let len = std::fs::metadata(&dat_path).unwrap().len();
        let dat = OpenOptions::new().write(true).open(&dat_path).unwrap();
        dat.set_len(len - 5).unwrap();
        drop(dat);

        let mut store = SampleStore::create(dir.path()).unwrap();
        store.append(&sample(BASE_TS + 20)).unwrap();
        assert_eq!(store.len(), 2); // first sample + the fresh one

        let mut reader = SampleStore::open(&base).unwrap();
        assert_eq!(reader.next_sample(1).unwrap().timestamp, BASE_TS);
        assert_eq!(reader.next_sample(1).unwrap().timestamp, BASE_TS + 20);
        assert!(matches!(reader.next_sample(1), Err(StoreError::OutOfRange)));
    }

    #[test]
    fn truncated_data_file_reports_corrupt() {
        let dir = tempdir().unwrap();
        let base;
        {
            let mut store = SampleStore::create(dir.path()).unwrap();
            store.append(&sample(BASE_TS)).unwrap();
            base = SampleStore::day_base(dir.path(), date_of_timestamp(BASE_TS).unwrap());
        }

        let dat_path = base.with_extension("dat");
        let len = std::fs::metadata(&dat_path).unwrap().len();
        let dat = OpenOptions::new().write(true).open(&dat_path).unwrap();
        dat.set_len(len - 3).unwrap();
        drop(dat);

        let mut reader = SampleStore::open(&base).unwrap();
        assert!(matches!(
            reader.next_sample(1),
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn retention_by_age_keeps_most_recent_days() {
        let dir = tempdir().unwrap();
        let store = SampleStore::create(dir.path()).unwrap();

        let today = Utc::now().date_naive();
        for age in 0..5u64 {
            let date = today.checked_sub_days(Days::new(age)).unwrap();
            let base = SampleStore::day_base(dir.path(), date);
            std::fs::write(base.with_extension("idx"), [0u8; 24]).unwrap();
            std::fs::write(base.with_extension("dat"), [0u8; 100]).unwrap();
        }

        let result = store.clean_old_files(2, 0).unwrap();
        assert_eq!(result.pairs_removed_by_age, 3);
        assert_eq!(result.pairs_remaining, 2);

        let days = SampleStore::list_days(dir.path()).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[1].0, today);
    }

    #[test]
    fn retention_by_size_removes_oldest_first() {
        let dir = tempdir().unwrap();
        let store = SampleStore::create(dir.path()).unwrap();

        let today = Utc::now().date_naive();
        for age in 1..=3u64 {
            let date = today.checked_sub_days(Days::new(age)).unwrap();
            let base = SampleStore::day_base(dir.path(), date);
            std::fs::write(base.with_extension("idx"), [0u8; 24]).unwrap();
            std::fs::write(base.with_extension("dat"), [0u8; 476]).unwrap();
        }
        // Each pair is 500 bytes; cap at 1000 keeps the two newest.

        let result = store.clean_old_files(0, 1000).unwrap();
        assert_eq!(result.pairs_removed_by_size, 1);
        assert_eq!(result.pairs_remaining, 2);
        assert!(result.total_size_after <= 1000);

        let days = SampleStore::list_days(dir.path()).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].0, today.checked_sub_days(Days::new(2)).unwrap());
    }

    #[test]
    fn retention_never_touches_open_pair() {
        let dir = tempdir().unwrap();
        let mut store = SampleStore::create(dir.path()).unwrap();
        // Open pair dated today.
        let now = Utc::now().timestamp();
        store.append(&sample(now)).unwrap();

        // Size cap of 1 byte would otherwise delete everything.
        let result = store.clean_old_files(1, 1).unwrap();
        assert_eq!(result.pairs_removed_by_size, 0);

        let days = SampleStore::list_days(dir.path()).unwrap();
        assert_eq!(days.len(), 1);
    }

    #[test]
    fn zero_disables_each_policy() {
        let dir = tempdir().unwrap();
        let store = SampleStore::create(dir.path()).unwrap();

        let today = Utc::now().date_naive();
        for age in 1..=4u64 {
            let date = today.checked_sub_days(Days::new(age)).unwrap();
            let base = SampleStore::day_base(dir.path(), date);
            std::fs::write(base.with_extension("idx"), [0u8; 24]).unwrap();
            std::fs::write(base.with_extension("dat"), [0u8; 100]).unwrap();
        }

        let result = store.clean_old_files(0, 0).unwrap();
        assert_eq!(result.pairs_removed_by_age, 0);
        assert_eq!(result.pairs_removed_by_size, 0);
        assert_eq!(SampleStore::list_days(dir.path()).unwrap().len(), 4);
    }

    #[test]
    fn parse_date_from_day_file_names() {
        assert_eq!(
            parse_date_from_name("sysrec_20260830"),
            NaiveDate::from_ymd_opt(2026, 8, 30)
        );
        assert_eq!(
            parse_date_from_name("sysrec_20260830.idx"),
            NaiveDate::from_ymd_opt(2026, 8, 30)
        );
        assert_eq!(parse_date_from_name("other_20260830.idx"), None);
        assert_eq!(parse_date_from_name("sysrec_notadate.idx"), None);
    }
}
