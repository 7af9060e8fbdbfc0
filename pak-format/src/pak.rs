use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use crate::archive::{ArchiveHandle, EntryMap, OpenError, TransferError};
use crate::de::{read_header, read_index};
use crate::header::PakHeader;
use crate::record::FileRecord;

const CHUNK_SIZE: usize = 64 * 1024;

/// A pak archive on disk.
///
/// Nothing is read until [ArchiveHandle::open_if_not_open] is called. The index
/// is parsed on the first open and kept for the lifetime of the value; later
/// reopens only replace the file handle.
pub struct PakFile {
    path: PathBuf,
    name: String,
    file: Mutex<Option<File>>,
    header: OnceLock<PakHeader>,
    entries: OnceLock<EntryMap>,
}

impl fmt::Debug for PakFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PakFile")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("header", &self.header.get())
            .finish()
    }
}

impl PakFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> PakFile {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        PakFile {
            path,
            name,
            file: Mutex::new(None),
            header: OnceLock::new(),
            entries: OnceLock::new(),
        }
    }

    #[inline(always)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The header, once the archive has been opened.
    pub fn header(&self) -> Option<&PakHeader> {
        self.header.get()
    }

    pub fn is_open(&self) -> bool {
        self.lock_file().is_some()
    }

    fn lock_file(&self) -> MutexGuard<'_, Option<File>> {
        self.file.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_file(&self) -> Result<File, OpenError> {
        let file =
            File::open(&self.path).map_err(|e| OpenError::ReadFailed(e, self.path.clone()))?;

        if self.entries.get().is_none() {
            let mut reader = BufReader::new(&file);
            let header = read_header(&mut reader)?;
            let entries = read_index(&mut reader, &header)?;
            let _ = self.header.set(header);
            let _ = self.entries.set(entries);
        }

        Ok(file)
    }
}

impl ArchiveHandle for PakFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn open_if_not_open(&self) -> Result<(), OpenError> {
        let mut guard = self.lock_file();
        if guard.is_none() {
            *guard = Some(self.open_file()?);
            tracing::debug!(archive = %self.name, "opened pak");
        }
        Ok(())
    }

    fn reopen(&self) -> Result<(), OpenError> {
        let mut guard = self.lock_file();
        drop(guard.take());
        *guard = Some(self.open_file()?);
        tracing::debug!(archive = %self.name, "reopened pak");
        Ok(())
    }

    fn close(&self) -> std::io::Result<()> {
        if let Some(file) = self.lock_file().take() {
            drop(file);
            tracing::debug!(archive = %self.name, "closed pak");
        }
        Ok(())
    }

    fn entry_map(&self) -> Result<&EntryMap, OpenError> {
        self.entries
            .get()
            .ok_or_else(|| OpenError::NotOpen(self.name.clone()))
    }

    fn transfer_raw_bytes_to(
        &self,
        record: &FileRecord,
        sink: &mut dyn Write,
    ) -> Result<u64, TransferError> {
        let mut buf = vec![0u8; CHUNK_SIZE.min(record.compressed_size as usize).max(1)];
        let mut done = 0u64;

        while done < record.compressed_size {
            let want = (record.compressed_size - done).min(buf.len() as u64) as usize;

            // The lock is only held per chunk, so close() can land mid-transfer.
            let n = {
                let mut guard = self.lock_file();
                let file = guard.as_mut().ok_or(TransferError::ChannelClosed)?;
                file.seek(SeekFrom::Start(record.disk_offset + done))?;
                file.read(&mut buf[..want])?
            };

            if n == 0 {
                return Err(TransferError::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    format!(
                        "payload of `{}` ends after {} of {} bytes",
                        record.full_path, done, record.compressed_size
                    ),
                )));
            }

            sink.write_all(&buf[..n])?;
            done += n as u64;
        }

        Ok(done)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::Inflater;
    use crate::testing::PakBuilder;

    fn fixture(dir: &Path) -> PathBuf {
        let path = dir.join("resource00.pak");
        PakBuilder::new()
            .file(r"\Data\icon.png", vec![7u8; 100])
            .file(r"\Data\Sub\readme.txt", b"twenty bytes of text".to_vec())
            .write_to_path(&path)
            .unwrap();
        path
    }

    #[test]
    fn opens_lazily() {
        let dir = tempfile::tempdir().unwrap();
        let pak = PakFile::new(fixture(dir.path()));
        assert_eq!(pak.name(), "resource00.pak");
        assert!(!pak.is_open());
        assert!(matches!(pak.entry_map(), Err(OpenError::NotOpen(_))));

        pak.open_if_not_open().unwrap();
        assert!(pak.is_open());
        assert_eq!(pak.header().unwrap().file_count, 2);
        assert_eq!(pak.entry_map().unwrap().len(), 2);
    }

    #[test]
    fn transfers_and_inflates() {
        let dir = tempfile::tempdir().unwrap();
        let pak = PakFile::new(fixture(dir.path()));
        pak.open_if_not_open().unwrap();

        let record = pak.entry_map().unwrap()[r"\Data\Sub\readme.txt"].clone();
        let mut inflater = Inflater::new(Vec::new());
        let raw = pak.transfer_raw_bytes_to(&record, &mut inflater).unwrap();
        assert_eq!(raw, record.compressed_size);

        let (out, written) = inflater.finish().unwrap();
        assert_eq!(out, b"twenty bytes of text");
        assert_eq!(written, record.decompressed_size);
    }

    #[test]
    fn closed_handle_reports_channel_closed() {
        let dir = tempfile::tempdir().unwrap();
        let pak = PakFile::new(fixture(dir.path()));
        pak.open_if_not_open().unwrap();
        let record = pak.entry_map().unwrap()[r"\Data\icon.png"].clone();

        pak.close().unwrap();
        pak.close().unwrap();
        // The index survives a close.
        assert_eq!(pak.entry_map().unwrap().len(), 2);

        let err = pak
            .transfer_raw_bytes_to(&record, &mut Vec::new())
            .unwrap_err();
        assert!(err.is_transient());

        pak.reopen().unwrap();
        let mut raw = Vec::new();
        pak.transfer_raw_bytes_to(&record, &mut raw).unwrap();
        assert_eq!(raw.len() as u64, record.compressed_size);
    }

    #[test]
    fn missing_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let pak = PakFile::new(dir.path().join("absent.pak"));
        let err = pak.open_if_not_open().unwrap_err();
        assert!(matches!(err, OpenError::ReadFailed(_, _)));
        assert!(!pak.is_open());
    }

    #[test]
    fn not_a_pak() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("junk.pak");
        std::fs::write(&path, vec![b'x'; 600]).unwrap();
        let err = PakFile::new(path).open_if_not_open().unwrap_err();
        assert!(matches!(err, OpenError::InvalidMagic));
    }
}
