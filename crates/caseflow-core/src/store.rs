//! Backing stores for replacement active files and multipass reading.
//!
//! A store accepts cases through [`CaseStore::append`] and is then sealed
//! into a [`Replay`], which hands out any number of independent readers over
//! the same cases. Disk-backed stores write each case as a fixed-width binary
//! record: eight little-endian bytes per number and the declared width per
//! string.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;
use std::sync::Arc;

use caseflow_model::{Case, CaseProto, NUMERIC_WIDTH, Value};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{PipelineError, Result};
use crate::options::{PipelineOptions, StoreKind};
use crate::stream::{CaseSink, CaseSource};

/// Append-only case storage.
pub trait CaseStore {
    /// Shape of stored cases.
    fn proto(&self) -> &CaseProto;

    /// Store one more case.
    fn append(&mut self, case: Case) -> Result<()>;

    /// Cases successfully appended so far.
    fn len(&self) -> u64;

    /// True if nothing has been appended.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Seal the store for reading.
    fn into_replay(self: Box<Self>) -> Result<Replay>;
}

/// Creates backing stores.
pub trait StoreFactory {
    /// Create an empty store for cases shaped like `proto`.
    fn create_store(&self, proto: CaseProto) -> Result<Box<dyn CaseStore>>;
}

impl StoreFactory for PipelineOptions {
    fn create_store(&self, proto: CaseProto) -> Result<Box<dyn CaseStore>> {
        let dir = self.temp_dir.as_deref();
        Ok(match self.store {
            StoreKind::Memory => Box::new(MemoryStore::new(proto)),
            StoreKind::Disk => Box::new(DiskStore::new(proto, dir)?),
            StoreKind::Auto => Box::new(AutoPagingStore::new(
                proto,
                self.workspace_cases,
                self.temp_dir.clone(),
            )),
        })
    }
}

/// Store keeping every case in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    proto: CaseProto,
    cases: Vec<Case>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(proto: CaseProto) -> Self {
        Self {
            proto,
            cases: Vec::new(),
        }
    }
}

impl CaseStore for MemoryStore {
    fn proto(&self) -> &CaseProto {
        &self.proto
    }

    fn append(&mut self, case: Case) -> Result<()> {
        self.proto.check(&case)?;
        self.cases.push(case);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.cases.len() as u64
    }

    fn into_replay(self: Box<Self>) -> Result<Replay> {
        let Self { proto, cases } = *self;
        let len = cases.len() as u64;
        let segments = if cases.is_empty() {
            Vec::new()
        } else {
            vec![Segment::Memory(cases.into())]
        };
        Ok(Replay {
            proto,
            segments,
            len,
        })
    }
}

/// Store writing every case to a temporary file.
#[derive(Debug)]
pub struct DiskStore {
    proto: CaseProto,
    writer: BufWriter<NamedTempFile>,
    record: Vec<u8>,
    len: u64,
}

impl DiskStore {
    /// Create a store spilling into `dir` (system temp dir when `None`).
    pub fn new(proto: CaseProto, dir: Option<&Path>) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("caseflow-").suffix(".cases");
        let file = match dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        debug!(path = %file.path().display(), "disk store created");
        Ok(Self {
            record: Vec::with_capacity(proto.record_len()),
            proto,
            writer: BufWriter::new(file),
            len: 0,
        })
    }
}

impl CaseStore for DiskStore {
    fn proto(&self) -> &CaseProto {
        &self.proto
    }

    fn append(&mut self, case: Case) -> Result<()> {
        self.proto.check(&case)?;
        self.record.clear();
        encode_case(&case, &mut self.record);
        self.writer.write_all(&self.record)?;
        self.len += 1;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.len
    }

    fn into_replay(self: Box<Self>) -> Result<Replay> {
        let Self {
            proto, writer, len, ..
        } = *self;
        let file = writer.into_inner().map_err(io::IntoInnerError::into_error)?;
        let segments = if len == 0 {
            Vec::new()
        } else {
            vec![Segment::Disk {
                file: Arc::new(file),
                cases: len,
            }]
        };
        Ok(Replay {
            proto,
            segments,
            len,
        })
    }
}

/// Store that keeps up to a budget of cases in memory and writes the rest
/// to a temporary file.
#[derive(Debug)]
pub struct AutoPagingStore {
    memory: MemoryStore,
    disk: Option<DiskStore>,
    budget: usize,
    temp_dir: Option<std::path::PathBuf>,
}

impl AutoPagingStore {
    /// Create a store holding at most `budget` cases in memory.
    #[must_use]
    pub fn new(proto: CaseProto, budget: usize, temp_dir: Option<std::path::PathBuf>) -> Self {
        Self {
            memory: MemoryStore::new(proto),
            disk: None,
            budget,
            temp_dir,
        }
    }

    /// Whether the store has started writing to disk.
    #[must_use]
    pub fn is_paged(&self) -> bool {
        self.disk.is_some()
    }
}

impl CaseStore for AutoPagingStore {
    fn proto(&self) -> &CaseProto {
        &self.memory.proto
    }

    fn append(&mut self, case: Case) -> Result<()> {
        if let Some(disk) = &mut self.disk {
            return disk.append(case);
        }
        if self.memory.cases.len() < self.budget {
            return self.memory.append(case);
        }
        debug!(
            budget = self.budget,
            "workspace exhausted, paging cases to disk"
        );
        let mut disk = DiskStore::new(self.memory.proto.clone(), self.temp_dir.as_deref())?;
        disk.append(case)?;
        self.disk = Some(disk);
        Ok(())
    }

    fn len(&self) -> u64 {
        self.memory.len() + self.disk.as_ref().map_or(0, |disk| disk.len())
    }

    fn into_replay(self: Box<Self>) -> Result<Replay> {
        let Self { memory, disk, .. } = *self;
        let mut replay = Box::new(memory).into_replay()?;
        if let Some(disk) = disk {
            let tail = Box::new(disk).into_replay()?;
            replay.len += tail.len;
            replay.segments.extend(tail.segments);
        }
        Ok(replay)
    }
}

#[derive(Debug, Clone)]
enum Segment {
    Memory(Arc<[Case]>),
    Disk { file: Arc<NamedTempFile>, cases: u64 },
}

/// Sealed, repeatable case store.
///
/// Cloning a replay is cheap and shares the underlying storage, which is
/// released when the last clone and reader are dropped.
#[derive(Debug, Clone)]
pub struct Replay {
    proto: CaseProto,
    segments: Vec<Segment>,
    len: u64,
}

impl Replay {
    /// Shape of stored cases.
    #[must_use]
    pub fn proto(&self) -> &CaseProto {
        &self.proto
    }

    /// Number of stored cases.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.len
    }

    /// True if no cases are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Whether any cases live on disk.
    #[must_use]
    pub fn is_on_disk(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Disk { .. }))
    }

    /// Open a new reader positioned at the first case.
    pub fn reader(&self) -> Result<ReplayReader> {
        Ok(ReplayReader {
            proto: self.proto.clone(),
            pending: self.segments.iter().rev().cloned().collect(),
            current: None,
            expected: self.len,
            yielded: 0,
            record: vec![0; self.proto.record_len()],
        })
    }

    /// Release the stored cases.
    pub fn release(self) {
        debug!(cases = self.len, "replay released");
    }
}

enum Cursor {
    Memory { cases: Arc<[Case]>, next: usize },
    Disk { reader: BufReader<File>, left: u64 },
}

/// A reader over a [`Replay`].
pub struct ReplayReader {
    proto: CaseProto,
    pending: Vec<Segment>,
    current: Option<Cursor>,
    expected: u64,
    yielded: u64,
    record: Vec<u8>,
}

impl ReplayReader {
    fn open(segment: Segment) -> Result<Cursor> {
        Ok(match segment {
            Segment::Memory(cases) => Cursor::Memory { cases, next: 0 },
            Segment::Disk { file, cases } => Cursor::Disk {
                reader: BufReader::new(file.reopen()?),
                left: cases,
            },
        })
    }

}

impl CaseSource for ReplayReader {
    fn proto(&self) -> &CaseProto {
        &self.proto
    }

    fn read(&mut self) -> Result<Option<Case>> {
        let truncated = PipelineError::TruncatedStore {
            expected: self.expected,
            actual: self.yielded,
        };
        loop {
            let Some(cursor) = &mut self.current else {
                match self.pending.pop() {
                    Some(segment) => self.current = Some(Self::open(segment)?),
                    None if self.yielded < self.expected => return Err(truncated),
                    None => return Ok(None),
                }
                continue;
            };
            let case = match cursor {
                Cursor::Memory { cases, next } => {
                    let case = cases.get(*next).cloned();
                    *next += 1;
                    case
                }
                Cursor::Disk { left: 0, .. } => None,
                Cursor::Disk { reader, left } => {
                    match reader.read_exact(&mut self.record) {
                        Ok(()) => {}
                        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                            return Err(truncated);
                        }
                        Err(e) => return Err(e.into()),
                    }
                    *left -= 1;
                    Some(decode_case(&self.record, &self.proto))
                }
            };
            match case {
                Some(case) => {
                    self.yielded += 1;
                    return Ok(Some(case));
                }
                None => self.current = None,
            }
        }
    }
}

/// Sink that appends into a store.
pub struct StoreSink {
    store: Box<dyn CaseStore>,
}

impl StoreSink {
    /// Wrap `store`.
    #[must_use]
    pub fn new(store: Box<dyn CaseStore>) -> Self {
        Self { store }
    }

    /// Cases written so far.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.store.len()
    }

    /// True if nothing has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Seal the underlying store.
    pub fn into_replay(self) -> Result<Replay> {
        self.store.into_replay()
    }
}

impl CaseSink for StoreSink {
    fn write(&mut self, case: Case) -> Result<()> {
        self.store.append(case)
    }
}

/// Read all of `source` into a store from `factory`, returning a handle that
/// can be read any number of times.
///
/// Any read or append failure is returned as an error; no handle is produced
/// for partially stored input.
pub fn materialize<S, F>(source: &mut S, factory: &F) -> Result<Replay>
where
    S: CaseSource + ?Sized,
    F: StoreFactory + ?Sized,
{
    let mut store = factory.create_store(source.proto().clone())?;
    while let Some(case) = source.read()? {
        store.append(case)?;
    }
    let replay = store.into_replay()?;
    debug!(
        cases = replay.len(),
        on_disk = replay.is_on_disk(),
        "cases materialized"
    );
    Ok(replay)
}

fn encode_case(case: &Case, out: &mut Vec<u8>) {
    for value in case.values() {
        match value {
            Value::Number(x) => out.extend_from_slice(&x.to_le_bytes()),
            Value::String(bytes) => out.extend_from_slice(bytes),
        }
    }
}

fn decode_case(record: &[u8], proto: &CaseProto) -> Case {
    let mut pos = 0;
    let values = proto
        .widths()
        .iter()
        .map(|&width| {
            if width == NUMERIC_WIDTH {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&record[pos..pos + 8]);
                pos += 8;
                Value::Number(f64::from_le_bytes(raw))
            } else {
                let bytes = record[pos..pos + width].to_vec().into_boxed_slice();
                pos += width;
                Value::String(bytes)
            }
        })
        .collect();
    Case::new(values)
}
