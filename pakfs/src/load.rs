use std::path::{Path, PathBuf};
use std::sync::Arc;

use pak_format::{ArchiveHandle, PakFile};
use tokio::sync::mpsc::UnboundedSender;

use crate::builder::{BuildError, NamespaceBuilder};
use crate::namespace::VirtualNamespace;

/// Extension of pak archives picked up from a virtual pak directory.
pub const PAK_EXTENSION: &str = ".pak";

/// Progress updates from loading one or more paks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadProgress {
    /// An archive is being opened. `index` counts from 1.
    Opening {
        name: String,
        index: usize,
        total: usize,
    },
    /// Entries are being merged into the tree.
    Consolidating { indexed: usize, total: usize },
    /// The namespace is ready.
    Done,
}

impl LoadProgress {
    pub fn status(&self) -> String {
        match self {
            LoadProgress::Opening { name, index, total } if *total > 1 => {
                format!("Loading {name} ({index}/{total})")
            }
            LoadProgress::Opening { name, .. } => format!("Loading {name}"),
            LoadProgress::Consolidating { indexed, total } => {
                format!("Building file tree ({indexed}/{total})")
            }
            LoadProgress::Done => "Loaded".to_string(),
        }
    }
}

/// Open every pak in `paths`, in order, and merge them into one namespace.
///
/// Later paths override earlier ones. If any archive fails to open, every
/// archive of the batch is closed and no namespace is produced.
pub fn load_paks<P: AsRef<Path>>(
    paths: &[P],
    progress: Option<UnboundedSender<LoadProgress>>,
) -> Result<VirtualNamespace, BuildError> {
    let send = |event: LoadProgress| {
        if let Some(p) = progress.as_ref() {
            let _ = p.send(event);
        }
    };

    let total = paths.len();
    let mut archives: Vec<Arc<dyn ArchiveHandle>> = Vec::with_capacity(total);
    for (i, path) in paths.iter().enumerate() {
        let pak = Arc::new(PakFile::new(path.as_ref()));
        send(LoadProgress::Opening {
            name: pak.name().to_string(),
            index: i + 1,
            total,
        });
        archives.push(pak.clone());

        if let Err(source) = pak.open_if_not_open() {
            for archive in &archives {
                if let Err(e) = archive.close() {
                    tracing::warn!(archive = archive.name(), error = %e, "failed to close archive");
                }
            }
            return Err(BuildError::OpenFailed {
                archive: pak.name().to_string(),
                source,
            });
        }
        tracing::debug!(path = %path.as_ref().display(), "opened archive");
    }

    let mut builder = NamespaceBuilder::new().archives(archives);
    if let Some(p) = progress.clone() {
        builder = builder.on_progress(move |indexed, total| {
            let _ = p.send(LoadProgress::Consolidating { indexed, total });
        });
    }
    let namespace = builder.build()?;

    tracing::info!(paks = total, files = namespace.file_count(), "loaded paks");
    send(LoadProgress::Done);
    Ok(namespace)
}

/// [load_paks] on the blocking pool.
pub async fn load_paks_in_background(
    paths: Vec<PathBuf>,
    progress: Option<UnboundedSender<LoadProgress>>,
) -> Result<VirtualNamespace, BuildError> {
    tokio::task::spawn_blocking(move || load_paks(&paths, progress)).await?
}

/// List the paks that make up a virtual pak: every non-directory entry of
/// `dir` whose name ends in `.pak`, without descending, sorted by file name.
pub fn discover_virtual_pak<P: AsRef<Path>>(dir: P) -> std::io::Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let mut paks = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_pak = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.ends_with(PAK_EXTENSION));
        if is_pak && !path.is_dir() {
            paks.push(path);
        }
    }
    paks.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    tracing::info!(dir = %dir.display(), count = paks.len(), "found pak files");
    Ok(paks)
}
