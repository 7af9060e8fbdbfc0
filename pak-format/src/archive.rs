use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::PathBuf;

use crate::record::FileRecord;

/// Index entries keyed by the raw path string stored in the archive.
pub type EntryMap = BTreeMap<String, FileRecord>;

#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("Failed to read pak file. Path: '{}'", .1.display())]
    ReadFailed(#[source] std::io::Error, PathBuf),

    #[error("Could not read header. Is this a valid pak archive?")]
    MissingHeader(#[source] std::io::Error),

    #[error("Unrecognised magic string. Is this a valid pak archive?")]
    InvalidMagic,

    #[error("Invalid index (the table that describes where all the files are is invalid).")]
    InvalidIndex(#[source] std::io::Error),

    #[error("Archive `{0}` has not been opened yet")]
    NotOpen(String),
}

/// Failure of a raw byte transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The underlying channel was closed while the transfer was running, usually
    /// by another caller. Reopening the archive and retrying is expected to work.
    #[error("archive channel was closed during transfer")]
    ChannelClosed,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TransferError {
    #[inline(always)]
    pub fn is_transient(&self) -> bool {
        matches!(self, TransferError::ChannelClosed)
    }
}

/// Owner of one archive's storage.
///
/// Handles are shared between threads; implementations keep their open/closed
/// state and read cursor behind interior mutability. A handle has a single read
/// cursor, so callers must not run transfers on the same handle concurrently.
pub trait ArchiveHandle: fmt::Debug + Send + Sync {
    /// A short display name, normally the archive's file name.
    fn name(&self) -> &str;

    /// Open the underlying storage and read the index, unless already open.
    fn open_if_not_open(&self) -> Result<(), OpenError>;

    /// Drop the current storage handle, if any, and open a fresh one.
    fn reopen(&self) -> Result<(), OpenError>;

    /// Release the underlying storage. Closing a closed handle is a no-op.
    fn close(&self) -> std::io::Result<()>;

    /// The archive's index. Available once the handle has been opened at least once.
    fn entry_map(&self) -> Result<&EntryMap, OpenError>;

    /// Copy the raw, still compressed payload of `record` into `sink`.
    ///
    /// Returns the number of bytes written.
    fn transfer_raw_bytes_to(
        &self,
        record: &FileRecord,
        sink: &mut dyn Write,
    ) -> Result<u64, TransferError>;
}
