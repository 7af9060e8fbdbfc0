//! A read-only virtual filesystem over Eyedentity `.pak` archives.
//!
//! Several archives are merged by [NamespaceBuilder] into one
//! [VirtualNamespace], later archives overriding earlier ones. Content is read
//! back through an [ExtractionPipeline], either one file at a time with a
//! [LoadTask] or in bulk with a [BatchExport].

mod builder;
mod export;
mod extract;
mod load;
mod namespace;
mod node;
mod task;
mod viewer;

pub use builder::{BuildError, NamespaceBuilder};
pub use export::{BatchExport, ExportError, ExportOptions, ExportProgress, ExportStats};
pub use extract::{ExtractError, ExtractOutcome, ExtractSink, ExtractionPipeline, FileSink};
pub use load::{discover_virtual_pak, load_paks, load_paks_in_background, LoadProgress, PAK_EXTENSION};
pub use namespace::VirtualNamespace;
pub use node::{ArchiveId, DirectoryNode, FileNode, NamespaceNode, NodeIndex};
pub use task::{LoadError, LoadHandle, LoadTask, PreviewConsumer, TaskState};
pub use viewer::{StageIni, ViewerKind, ViewerRegistry};

pub use tokio_util::sync::CancellationToken;
