//! Reading support for Eyedentity `.pak` game archives.
//!
//! [PakFile] opens an archive lazily and streams raw entry payloads. Anything
//! that wants to read entries goes through the [ArchiveHandle] trait, so the
//! namespace layer never depends on the on-disk container directly.

mod archive;
mod compression;
mod counting;
mod de;
pub mod header;
mod pak;
pub mod path;
mod record;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use archive::{ArchiveHandle, EntryMap, OpenError, TransferError};
pub use compression::Inflater;
pub use counting::CountingWriter;
pub use header::PakHeader;
pub use pak::PakFile;
pub use path::PakPath;
pub use record::FileRecord;
