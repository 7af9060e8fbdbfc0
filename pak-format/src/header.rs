//! Pak file header types and constants.

/// The magic string at the start of every pak file. The on-disk field is
/// [MAGIC_FIELD_LEN] bytes long and padded with NULs.
pub const MAGIC_BYTES: &[u8] = b"EyedentityGames Packing File 0.1";

/// Length of the NUL-padded magic field.
pub const MAGIC_FIELD_LEN: usize = 256;

/// The format version written by current game clients.
pub const VERSION: u32 = 11;

/// Length of the NUL-padded path field of an index entry.
pub const INDEX_PATH_LEN: usize = 256;

/// Length of the padding that closes each index entry.
pub const INDEX_PADDING_LEN: usize = 40;

/// Size of one index entry in bytes.
pub const INDEX_ENTRY_SIZE: usize = INDEX_PATH_LEN + 5 * 4 + INDEX_PADDING_LEN;

/// Offset at which game clients start laying out payloads.
pub const DATA_START: u64 = 0x400;

/// The pak file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PakHeader {
    /// Format version number.
    pub version: u32,

    /// Number of entries in the index.
    pub file_count: u32,

    /// Offset to the index.
    pub index_offset: u32,
}

impl PakHeader {
    /// Size of the header in bytes.
    pub const SIZE: usize = MAGIC_FIELD_LEN + 3 * 4;

    pub const fn new(file_count: u32, index_offset: u32) -> PakHeader {
        PakHeader {
            version: VERSION,
            file_count,
            index_offset,
        }
    }

    /// Check a raw magic field: the magic string followed by NULs only.
    pub fn is_valid_magic(field: &[u8]) -> bool {
        field.len() == MAGIC_FIELD_LEN
            && field.starts_with(MAGIC_BYTES)
            && field[MAGIC_BYTES.len()..].iter().all(|b| *b == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_entry_is_316_bytes() {
        assert_eq!(INDEX_ENTRY_SIZE, 316);
        assert_eq!(PakHeader::SIZE, 268);
    }

    #[test]
    fn magic_must_be_nul_padded() {
        let mut field = [0u8; MAGIC_FIELD_LEN];
        field[..MAGIC_BYTES.len()].copy_from_slice(MAGIC_BYTES);
        assert!(PakHeader::is_valid_magic(&field));

        field[MAGIC_FIELD_LEN - 1] = b'x';
        assert!(!PakHeader::is_valid_magic(&field));
        assert!(!PakHeader::is_valid_magic(MAGIC_BYTES));
    }
}
