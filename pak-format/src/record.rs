use std::fmt;

use crate::path::components;

/// Descriptor of one entry in a pak index.
///
/// Records are built once while reading the index and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// The leaf name of the entry.
    pub name: String,

    /// The archive-relative path exactly as stored in the index, `\` separated,
    /// usually with a leading separator.
    pub full_path: String,

    /// The position of the compressed payload in the archive.
    pub disk_offset: u64,

    /// Bytes reserved for the payload on disk. May exceed `compressed_size`.
    pub disk_size: u64,

    /// The exact length of the compressed payload.
    pub compressed_size: u64,

    /// The length of the content once inflated.
    pub decompressed_size: u64,

    /// Opaque index field, carried through untouched.
    pub reserved: u32,
}

impl FileRecord {
    pub fn new(
        full_path: impl Into<String>,
        disk_offset: u64,
        disk_size: u64,
        compressed_size: u64,
        decompressed_size: u64,
        reserved: u32,
    ) -> FileRecord {
        let full_path = full_path.into();
        let name = components(&full_path).last().unwrap_or_default().to_string();
        FileRecord {
            name,
            full_path,
            disk_offset,
            disk_size,
            compressed_size,
            decompressed_size,
            reserved,
        }
    }

    #[inline(always)]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline(always)]
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    /// Initial capacity for an in-memory buffer receiving this entry.
    #[inline(always)]
    pub fn capacity_hint(&self) -> usize {
        self.decompressed_size.max(self.compressed_size) as usize
    }

    /// One-line description of the index fields, in hex.
    pub fn summary(&self) -> String {
        format!(
            "CmpSz 0x{:08X} | DskSz 0x{:08X} | DcmSz 0x{:08X} | Off 0x{:08X} | Unk 0x{:08X}",
            self.compressed_size,
            self.disk_size,
            self.decompressed_size,
            self.disk_offset,
            self.reserved,
        )
    }
}

impl fmt::Display for FileRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_path)
    }
}
