//! Test support: a fixture pak writer and an instrumented in-memory archive.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::archive::{ArchiveHandle, EntryMap, OpenError, TransferError};
use crate::header::{
    PakHeader, DATA_START, INDEX_PADDING_LEN, INDEX_PATH_LEN, MAGIC_BYTES, MAGIC_FIELD_LEN,
};
use crate::record::FileRecord;

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .expect("deflating into memory cannot fail");
    encoder.finish().expect("deflating into memory cannot fail")
}

struct FixtureEntry {
    path: String,
    payload: Vec<u8>,
    decompressed_size: u64,
}

/// Writes synthetic pak archives.
#[derive(Default)]
pub struct PakBuilder {
    entries: Vec<FixtureEntry>,
}

impl PakBuilder {
    pub fn new() -> PakBuilder {
        PakBuilder::default()
    }

    /// Add an entry with `data` as its content.
    pub fn file(mut self, path: &str, data: Vec<u8>) -> Self {
        self.entries.push(FixtureEntry {
            path: path.to_string(),
            payload: deflate(&data),
            decompressed_size: data.len() as u64,
        });
        self
    }

    /// Add an entry whose payload is stored verbatim, e.g. to fake corruption.
    pub fn raw(mut self, path: &str, payload: Vec<u8>, decompressed_size: u64) -> Self {
        self.entries.push(FixtureEntry {
            path: path.to_string(),
            payload,
            decompressed_size,
        });
        self
    }

    pub fn write<W: Write>(&self, mut w: W) -> io::Result<()> {
        let payload_len: u64 = self.entries.iter().map(|e| e.payload.len() as u64).sum();
        let header = PakHeader::new(self.entries.len() as u32, (DATA_START + payload_len) as u32);

        let mut magic = [0u8; MAGIC_FIELD_LEN];
        magic[..MAGIC_BYTES.len()].copy_from_slice(MAGIC_BYTES);
        w.write_all(&magic)?;
        w.write_u32::<LittleEndian>(header.version)?;
        w.write_u32::<LittleEndian>(header.file_count)?;
        w.write_u32::<LittleEndian>(header.index_offset)?;
        w.write_all(&vec![0u8; DATA_START as usize - PakHeader::SIZE])?;

        for entry in &self.entries {
            w.write_all(&entry.payload)?;
        }

        let mut offset = DATA_START;
        for entry in &self.entries {
            let (encoded, _, _) = encoding_rs::EUC_KR.encode(&entry.path);
            let mut path = [0u8; INDEX_PATH_LEN];
            let len = encoded.len().min(INDEX_PATH_LEN - 1);
            path[..len].copy_from_slice(&encoded[..len]);
            w.write_all(&path)?;

            let size = entry.payload.len() as u32;
            w.write_u32::<LittleEndian>(size)?;
            w.write_u32::<LittleEndian>(entry.decompressed_size as u32)?;
            w.write_u32::<LittleEndian>(size)?;
            w.write_u32::<LittleEndian>(offset as u32)?;
            w.write_u32::<LittleEndian>(0)?;
            w.write_all(&[0u8; INDEX_PADDING_LEN])?;
            offset += size as u64;
        }

        w.flush()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write(&mut out).expect("writing into memory cannot fail");
        out
    }

    pub fn write_to_path(&self, path: &Path) -> io::Result<()> {
        let file = std::fs::File::create(path)?;
        self.write(io::BufWriter::new(file))
    }
}

type OpenHook = Box<dyn Fn() + Send + Sync>;

/// An [ArchiveHandle] backed by memory, counting lifecycle calls and able to
/// inject the failures a real archive can produce.
pub struct MemoryArchive {
    name: String,
    entries: EntryMap,
    payloads: HashMap<String, Vec<u8>>,
    next_offset: u64,

    open: AtomicBool,
    opens: AtomicUsize,
    reopens: AtomicUsize,
    closes: AtomicUsize,

    fail_open: bool,
    fail_close: bool,
    transient_failures: AtomicUsize,
    failing_paths: HashSet<String>,
    on_open: Option<OpenHook>,
}

impl fmt::Debug for MemoryArchive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryArchive")
            .field("name", &self.name)
            .field("entries", &self.entries.len())
            .field("open", &self.is_open())
            .finish()
    }
}

impl MemoryArchive {
    pub fn new(name: &str) -> MemoryArchive {
        MemoryArchive {
            name: name.to_string(),
            entries: EntryMap::new(),
            payloads: HashMap::new(),
            next_offset: DATA_START,
            open: AtomicBool::new(false),
            opens: AtomicUsize::new(0),
            reopens: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
            fail_open: false,
            fail_close: false,
            transient_failures: AtomicUsize::new(0),
            failing_paths: HashSet::new(),
            on_open: None,
        }
    }

    fn insert(&mut self, path: &str, payload: Vec<u8>, decompressed_size: u64) {
        let size = payload.len() as u64;
        let record = FileRecord::new(path, self.next_offset, size, size, decompressed_size, 0);
        self.next_offset += size;
        self.payloads.insert(path.to_string(), payload);
        self.entries.insert(path.to_string(), record);
    }

    pub fn with_file(mut self, path: &str, data: &[u8]) -> Self {
        self.insert(path, deflate(data), data.len() as u64);
        self
    }

    /// An entry whose payload is not a zlib stream.
    pub fn with_corrupt_file(mut self, path: &str, decompressed_size: u64) -> Self {
        self.insert(path, vec![0xde, 0xad, 0xbe, 0xef, 0x01, 0x02], decompressed_size);
        self
    }

    /// An entry whose index claims a different size than its content.
    pub fn with_misreported_file(mut self, path: &str, data: &[u8], claimed: u64) -> Self {
        self.insert(path, deflate(data), claimed);
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// The next `count` transfers write part of their payload, then close the
    /// archive and report [TransferError::ChannelClosed].
    pub fn with_transient_failures(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Every transfer of `path` fails with an I/O error.
    pub fn failing_transfer(mut self, path: &str) -> Self {
        self.failing_paths.insert(path.to_string());
        self
    }

    /// Run `hook` each time the archive goes from closed to open.
    pub fn on_open<F: Fn() + Send + Sync + 'static>(mut self, hook: F) -> Self {
        self.on_open = Some(Box::new(hook));
        self
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn reopen_count(&self) -> usize {
        self.reopens.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    fn open_error(&self) -> OpenError {
        OpenError::ReadFailed(
            io::Error::new(io::ErrorKind::PermissionDenied, "injected open failure"),
            PathBuf::from(&self.name),
        )
    }
}

impl ArchiveHandle for MemoryArchive {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_if_not_open(&self) -> Result<(), OpenError> {
        if self.fail_open {
            return Err(self.open_error());
        }
        if !self.open.swap(true, Ordering::SeqCst) {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if let Some(hook) = &self.on_open {
                hook();
            }
        }
        Ok(())
    }

    fn reopen(&self) -> Result<(), OpenError> {
        if self.fail_open {
            return Err(self.open_error());
        }
        self.reopens.fetch_add(1, Ordering::SeqCst);
        self.open.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> io::Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        self.open.store(false, Ordering::SeqCst);
        if self.fail_close {
            return Err(io::Error::other("injected close failure"));
        }
        Ok(())
    }

    fn entry_map(&self) -> Result<&EntryMap, OpenError> {
        if self.open_count() + self.reopen_count() == 0 {
            return Err(OpenError::NotOpen(self.name.clone()));
        }
        Ok(&self.entries)
    }

    fn transfer_raw_bytes_to(
        &self,
        record: &FileRecord,
        sink: &mut dyn Write,
    ) -> Result<u64, TransferError> {
        if !self.is_open() {
            return Err(TransferError::ChannelClosed);
        }
        if self.failing_paths.contains(&record.full_path) {
            let msg = format!("injected failure reading `{}`", record.full_path);
            return Err(io::Error::other(msg).into());
        }
        let payload = self.payloads.get(&record.full_path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, record.full_path.clone())
        })?;

        let transient = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if transient {
            sink.write_all(&payload[..payload.len() / 2])?;
            self.open.store(false, Ordering::SeqCst);
            return Err(TransferError::ChannelClosed);
        }

        sink.write_all(payload)?;
        Ok(payload.len() as u64)
    }
}
