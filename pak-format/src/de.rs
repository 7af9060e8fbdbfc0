use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::archive::{EntryMap, OpenError};
use crate::header::{
    PakHeader, INDEX_ENTRY_SIZE, INDEX_PADDING_LEN, INDEX_PATH_LEN, MAGIC_FIELD_LEN,
};
use crate::record::FileRecord;

pub(crate) fn read_header<R: Read + Seek>(reader: &mut R) -> Result<PakHeader, OpenError> {
    reader
        .seek(SeekFrom::Start(0))
        .map_err(OpenError::MissingHeader)?;

    let mut magic = [0u8; MAGIC_FIELD_LEN];
    reader
        .read_exact(&mut magic)
        .map_err(OpenError::MissingHeader)?;
    if !PakHeader::is_valid_magic(&magic) {
        return Err(OpenError::InvalidMagic);
    }

    let mut fields = || -> std::io::Result<PakHeader> {
        Ok(PakHeader {
            version: reader.read_u32::<LittleEndian>()?,
            file_count: reader.read_u32::<LittleEndian>()?,
            index_offset: reader.read_u32::<LittleEndian>()?,
        })
    };
    let header = fields().map_err(OpenError::MissingHeader)?;

    tracing::debug!(
        version = header.version,
        file_count = header.file_count,
        index_offset = format_args!("{:#x}", header.index_offset),
        "read pak header"
    );
    Ok(header)
}

/// Decode a NUL-padded, EUC-KR encoded path field.
fn decode_path(field: &[u8]) -> String {
    let end = field.iter().position(|b| *b == 0).unwrap_or(field.len());
    let (path, _) = encoding_rs::EUC_KR.decode_without_bom_handling(&field[..end]);
    path.into_owned()
}

fn read_index_entry<R: Read>(reader: &mut R) -> std::io::Result<FileRecord> {
    let mut path = [0u8; INDEX_PATH_LEN];
    reader.read_exact(&mut path)?;
    let disk_size = reader.read_u32::<LittleEndian>()?;
    let decompressed_size = reader.read_u32::<LittleEndian>()?;
    let compressed_size = reader.read_u32::<LittleEndian>()?;
    let disk_offset = reader.read_u32::<LittleEndian>()?;
    let reserved = reader.read_u32::<LittleEndian>()?;
    let mut padding = [0u8; INDEX_PADDING_LEN];
    reader.read_exact(&mut padding)?;

    Ok(FileRecord::new(
        decode_path(&path),
        disk_offset as u64,
        disk_size as u64,
        compressed_size as u64,
        decompressed_size as u64,
        reserved,
    ))
}

pub(crate) fn read_index<R: Read + Seek>(
    reader: &mut R,
    header: &PakHeader,
) -> Result<EntryMap, OpenError> {
    reader
        .seek(SeekFrom::Start(header.index_offset as u64))
        .map_err(OpenError::InvalidIndex)?;

    let mut entries = EntryMap::new();
    for _ in 0..header.file_count {
        let record = read_index_entry(reader).map_err(OpenError::InvalidIndex)?;
        if record.name.is_empty() {
            tracing::warn!(offset = record.disk_offset, "skipping index entry without a path");
            continue;
        }
        // Duplicate paths inside a single index resolve to the later entry.
        entries.insert(record.full_path.clone(), record);
    }

    tracing::debug!(
        count = entries.len(),
        bytes = header.file_count as usize * INDEX_ENTRY_SIZE,
        "read pak index"
    );
    Ok(entries)
}
