use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};

use pak_format::{Inflater, OpenError, TransferError};
use tokio_util::sync::CancellationToken;

use crate::namespace::VirtualNamespace;
use crate::node::FileNode;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("No archive backs `{path}` in this namespace")]
    UnknownArchive { path: String },

    #[error("Opening archive `{archive}` failed while extracting `{path}`")]
    OpenFailed {
        archive: String,
        path: String,
        #[source]
        source: OpenError,
    },

    #[error("Reading `{path}` from archive `{archive}` failed")]
    ReadFailed {
        archive: String,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Decompressing `{path}` from archive `{archive}` failed")]
    DecompressionFailed {
        archive: String,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Writing `{path}` from archive `{archive}` failed")]
    WriteFailed {
        archive: String,
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("`{path}` from archive `{archive}` inflated to {actual} bytes, the index says {expected}")]
    SizeMismatch {
        archive: String,
        path: String,
        expected: u64,
        actual: u64,
    },
}

/// Destination of an extraction. A sink must be able to discard partial output
/// so that a retried transfer starts clean.
pub trait ExtractSink: Write {
    fn reset(&mut self) -> io::Result<()>;
}

impl ExtractSink for Vec<u8> {
    fn reset(&mut self) -> io::Result<()> {
        self.clear();
        Ok(())
    }
}

/// A file on disk, truncated on reset.
#[derive(Debug)]
pub struct FileSink {
    file: File,
    path: PathBuf,
}

impl FileSink {
    pub fn create<P: Into<PathBuf>>(path: P) -> io::Result<FileSink> {
        let path = path.into();
        let file = File::create(&path)?;
        Ok(FileSink { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn into_file(self) -> File {
        self.file
    }
}

impl Write for FileSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl ExtractSink for FileSink {
    fn reset(&mut self) -> io::Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        Ok(())
    }
}

/// Result of an extraction that did not fail.
#[derive(Debug)]
pub enum ExtractOutcome<S> {
    /// The sink holds exactly the entry's content.
    Complete { sink: S, bytes: u64 },
    /// The token was cancelled. Whatever the sink received has been dropped.
    Cancelled,
}

impl<S> ExtractOutcome<S> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ExtractOutcome::Cancelled)
    }

    pub fn into_sink(self) -> Option<S> {
        match self {
            ExtractOutcome::Complete { sink, .. } => Some(sink),
            ExtractOutcome::Cancelled => None,
        }
    }
}

/// The read path into a namespace's archives.
///
/// Transfers take the namespace's extraction lock, so at most one runs at a
/// time across every archive of the namespace, no matter how many pipelines
/// were built over it.
#[derive(Debug, Clone)]
pub struct ExtractionPipeline {
    namespace: Arc<VirtualNamespace>,
}

impl ExtractionPipeline {
    pub fn new(namespace: Arc<VirtualNamespace>) -> ExtractionPipeline {
        ExtractionPipeline { namespace }
    }

    #[inline(always)]
    pub fn namespace(&self) -> &Arc<VirtualNamespace> {
        &self.namespace
    }

    /// Inflate `node` into memory.
    pub fn extract_to_vec(
        &self,
        node: &FileNode,
        cancel: &CancellationToken,
    ) -> Result<ExtractOutcome<Vec<u8>>, ExtractError> {
        let sink = Vec::with_capacity(node.record.capacity_hint());
        self.extract_to(node, sink, cancel)
    }

    /// Inflate `node` into `sink`.
    ///
    /// A closed archive channel is reopened and the transfer retried from the
    /// start until it succeeds or `cancel` fires. Any other failure ends the
    /// extraction.
    pub fn extract_to<S: ExtractSink>(
        &self,
        node: &FileNode,
        mut sink: S,
        cancel: &CancellationToken,
    ) -> Result<ExtractOutcome<S>, ExtractError> {
        let record = &node.record;
        let archive = self
            .namespace
            .archive(node.archive)
            .ok_or_else(|| ExtractError::UnknownArchive {
                path: record.full_path.clone(),
            })?;
        let context = || (archive.name().to_string(), record.full_path.clone());

        let mut attempt = 0u32;
        let bytes = loop {
            if cancel.is_cancelled() {
                tracing::debug!(path = %record.full_path, "extraction cancelled");
                return Ok(ExtractOutcome::Cancelled);
            }
            attempt += 1;

            let _guard = self
                .namespace
                .extraction_lock()
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            archive.open_if_not_open().map_err(|source| {
                let (archive, path) = context();
                ExtractError::OpenFailed {
                    archive,
                    path,
                    source,
                }
            })?;
            sink.reset().map_err(|source| {
                let (archive, path) = context();
                ExtractError::WriteFailed {
                    archive,
                    path,
                    source,
                }
            })?;

            let mut inflater = Inflater::new(&mut sink);
            match archive.transfer_raw_bytes_to(record, &mut inflater) {
                Ok(_) => {
                    let (_, bytes) = inflater.finish().map_err(|source| {
                        let (archive, path) = context();
                        ExtractError::DecompressionFailed {
                            archive,
                            path,
                            source,
                        }
                    })?;
                    break bytes;
                }
                Err(TransferError::ChannelClosed) => {
                    drop(inflater);
                    tracing::debug!(
                        archive = archive.name(),
                        path = %record.full_path,
                        attempt,
                        "archive channel closed mid-transfer, reopening"
                    );
                    archive.reopen().map_err(|source| {
                        let (archive, path) = context();
                        ExtractError::OpenFailed {
                            archive,
                            path,
                            source,
                        }
                    })?;
                }
                Err(TransferError::Io(source)) => {
                    let (archive, path) = context();
                    return Err(if inflater.is_corrupt() {
                        ExtractError::DecompressionFailed {
                            archive,
                            path,
                            source,
                        }
                    } else if inflater.sink_failed() {
                        ExtractError::WriteFailed {
                            archive,
                            path,
                            source,
                        }
                    } else {
                        ExtractError::ReadFailed {
                            archive,
                            path,
                            source,
                        }
                    });
                }
            }
        };

        if bytes != record.decompressed_size {
            let (archive, path) = context();
            return Err(ExtractError::SizeMismatch {
                archive,
                path,
                expected: record.decompressed_size,
                actual: bytes,
            });
        }

        Ok(ExtractOutcome::Complete { sink, bytes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NamespaceBuilder;
    use pak_format::testing::MemoryArchive;
    use pak_format::{ArchiveHandle, EntryMap, FileRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pipeline(archive: Arc<MemoryArchive>) -> ExtractionPipeline {
        let ns = NamespaceBuilder::new().archive(archive).build().unwrap();
        ExtractionPipeline::new(Arc::new(ns))
    }

    fn file<'a>(p: &'a ExtractionPipeline, path: &str) -> &'a FileNode {
        let ns = p.namespace();
        ns.file(ns.find(path).unwrap()).unwrap()
    }

    #[test]
    fn extracts_into_memory() {
        let data = b"[sector]\nsize=128\n".repeat(50);
        let p = pipeline(Arc::new(MemoryArchive::new("a.pak").with_file(r"\map\sectorsize.ini", &data)));
        let out = p
            .extract_to_vec(file(&p, "map/sectorsize.ini"), &CancellationToken::new())
            .unwrap();
        match out {
            ExtractOutcome::Complete { sink, bytes } => {
                assert_eq!(bytes, data.len() as u64);
                assert_eq!(sink, data);
            }
            ExtractOutcome::Cancelled => panic!("not cancelled"),
        }
    }

    #[test]
    fn retry_is_invisible() {
        let data: Vec<u8> = (0..4096u32).map(|i| (i * 7) as u8).collect();
        let archive = Arc::new(
            MemoryArchive::new("a.pak")
                .with_file(r"\x.bin", &data)
                .with_transient_failures(1),
        );
        let p = pipeline(archive.clone());

        let sink = p
            .extract_to_vec(file(&p, "x.bin"), &CancellationToken::new())
            .unwrap()
            .into_sink()
            .unwrap();
        assert_eq!(sink, data);
        assert_eq!(archive.reopen_count(), 1);
    }

    #[test]
    fn cancelled_before_start() {
        let archive = Arc::new(MemoryArchive::new("a.pak").with_file(r"\x", b"x"));
        let p = pipeline(archive.clone());
        let token = CancellationToken::new();
        token.cancel();
        let out = p.extract_to_vec(file(&p, "x"), &token).unwrap();
        assert!(out.is_cancelled());
    }

    #[test]
    fn cancellation_stops_retrying() {
        let token = CancellationToken::new();
        let archive = Arc::new(
            MemoryArchive::new("a.pak")
                .with_file(r"\x", b"content")
                .with_transient_failures(usize::MAX),
        );
        let p = pipeline(archive.clone());
        archive.close().unwrap();

        let t = token.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(20));
            t.cancel();
        });
        let out = p.extract_to_vec(file(&p, "x"), &token).unwrap();
        handle.join().unwrap();
        assert!(out.is_cancelled());
        assert!(archive.reopen_count() >= 1);
    }

    #[test]
    fn corrupt_payload_is_a_decompression_error() {
        let p = pipeline(Arc::new(MemoryArchive::new("a.pak").with_corrupt_file(r"\bad.dds", 64)));
        let err = p
            .extract_to_vec(file(&p, "bad.dds"), &CancellationToken::new())
            .unwrap_err();
        match err {
            ExtractError::DecompressionFailed { archive, path, .. } => {
                assert_eq!(archive, "a.pak");
                assert_eq!(path, r"\bad.dds");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn io_failure_is_not_retried() {
        let archive = Arc::new(
            MemoryArchive::new("a.pak")
                .with_file(r"\x", b"x")
                .failing_transfer(r"\x"),
        );
        let p = pipeline(archive.clone());
        let err = p
            .extract_to_vec(file(&p, "x"), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, ExtractError::ReadFailed { .. }));
        assert_eq!(archive.reopen_count(), 0);
    }

    #[test]
    fn size_mismatch_is_reported() {
        let p = pipeline(Arc::new(MemoryArchive::new("a.pak").with_misreported_file(
            r"\x",
            b"short",
            99,
        )));
        let err = p
            .extract_to_vec(file(&p, "x"), &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ExtractError::SizeMismatch {
                expected: 99,
                actual: 5,
                ..
            }
        ));
    }

    /// Counts transfers in flight and holds each one open for a while.
    #[derive(Debug)]
    struct Overlap {
        inner: MemoryArchive,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl ArchiveHandle for Overlap {
        fn name(&self) -> &str {
            self.inner.name()
        }

        fn open_if_not_open(&self) -> Result<(), OpenError> {
            self.inner.open_if_not_open()
        }

        fn reopen(&self) -> Result<(), OpenError> {
            self.inner.reopen()
        }

        fn close(&self) -> io::Result<()> {
            self.inner.close()
        }

        fn entry_map(&self) -> Result<&EntryMap, OpenError> {
            self.inner.entry_map()
        }

        fn transfer_raw_bytes_to(
            &self,
            record: &FileRecord,
            sink: &mut dyn Write,
        ) -> Result<u64, TransferError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(std::time::Duration::from_millis(30));
            let result = self.inner.transfer_raw_bytes_to(record, sink);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[test]
    fn transfers_never_overlap() {
        let archive = Arc::new(Overlap {
            inner: MemoryArchive::new("a.pak")
                .with_file(r".txt", b"first file")
                .with_file(r".txt", b"second file"),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        });
        let ns = Arc::new(NamespaceBuilder::new().archive(archive.clone()).build().unwrap());

        let shared = ExtractionPipeline::new(ns.clone());
        let pipelines = [
            shared.clone(),
            shared,
            ExtractionPipeline::new(ns.clone()),
            ExtractionPipeline::new(ns.clone()),
        ];

        let workers: Vec<_> = pipelines
            .into_iter()
            .enumerate()
            .map(|(i, p)| {
                std::thread::spawn(move || {
                    let path = if i % 2 == 0 { "a.txt" } else { "b.txt" };
                    p.extract_to_vec(file(&p, path), &CancellationToken::new())
                        .unwrap()
                        .into_sink()
                        .unwrap()
                })
            })
            .collect();
        let outputs: Vec<Vec<u8>> = workers.into_iter().map(|w| w.join().unwrap()).collect();

        assert_eq!(outputs[0], b"first file");
        assert_eq!(outputs[1], b"second file");
        assert_eq!(outputs[2], b"first file");
        assert_eq!(archive.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn file_sink_reset_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = FileSink::create(dir.path().join("out.bin")).unwrap();
        sink.write_all(b"partial output").unwrap();
        sink.reset().unwrap();
        sink.write_all(b"ok").unwrap();
        sink.flush().unwrap();
        assert_eq!(std::fs::read(sink.path()).unwrap(), b"ok");
    }
}
