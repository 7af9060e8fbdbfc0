use std::collections::HashMap;
use std::sync::Arc;

use pak_format::path::components;
use pak_format::{ArchiveHandle, FileRecord, OpenError, PakPath};

use crate::namespace::VirtualNamespace;
use crate::node::{ArchiveId, DirectoryNode, FileNode, NamespaceNode, NodeIndex};

/// How often, in entries, consolidation progress is reported.
const PROGRESS_STRIDE: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Failed to open archive `{archive}`")]
    OpenFailed {
        archive: String,
        #[source]
        source: OpenError,
    },

    #[error("Load stopped unexpectedly")]
    Join(#[from] tokio::task::JoinError),
}

type ProgressFn = Box<dyn FnMut(usize, usize) + Send>;

/// Merges the indexes of several archives into one [VirtualNamespace].
///
/// Archives are applied in the order they were added. A file path present in
/// more than one archive resolves to the last archive that has it.
#[derive(Default)]
pub struct NamespaceBuilder {
    archives: Vec<Arc<dyn ArchiveHandle>>,
    progress: Option<ProgressFn>,
}

impl NamespaceBuilder {
    pub fn new() -> NamespaceBuilder {
        NamespaceBuilder::default()
    }

    pub fn archive(mut self, archive: Arc<dyn ArchiveHandle>) -> Self {
        self.archives.push(archive);
        self
    }

    pub fn archives<I: IntoIterator<Item = Arc<dyn ArchiveHandle>>>(mut self, archives: I) -> Self {
        self.archives.extend(archives);
        self
    }

    /// Called with `(indexed, total)` entry counts while consolidating.
    pub fn on_progress<F: FnMut(usize, usize) + Send + 'static>(mut self, f: F) -> Self {
        self.progress = Some(Box::new(f));
        self
    }

    pub fn build(self) -> Result<VirtualNamespace, BuildError> {
        let NamespaceBuilder {
            archives,
            mut progress,
        } = self;

        let total = match open_all(&archives) {
            Ok(total) => total,
            Err(e) => {
                close_all(&archives);
                return Err(e);
            }
        };

        let mut tree = TreeBuilder::new();
        let mut indexed = 0usize;
        for (id, archive) in archives.iter().enumerate() {
            let entries = match archive.entry_map() {
                Ok(entries) => entries,
                Err(source) => {
                    close_all(&archives);
                    return Err(BuildError::OpenFailed {
                        archive: archive.name().to_string(),
                        source,
                    });
                }
            };

            for (raw, record) in entries {
                tree.insert(raw, record, ArchiveId(id), archive.name());
                indexed += 1;
                if indexed % PROGRESS_STRIDE == 0 {
                    if let Some(f) = progress.as_mut() {
                        f(indexed, total);
                    }
                }
            }
        }
        if let Some(f) = progress.as_mut() {
            f(indexed, total);
        }

        let nodes = tree.finish();
        let namespace = VirtualNamespace::from_parts(nodes, archives);
        tracing::info!(
            archives = namespace.archives().len(),
            files = namespace.file_count(),
            nodes = namespace.len(),
            "consolidated namespace"
        );
        Ok(namespace)
    }
}

fn open_all(archives: &[Arc<dyn ArchiveHandle>]) -> Result<usize, BuildError> {
    let mut total = 0;
    for archive in archives {
        let opened = archive
            .open_if_not_open()
            .and_then(|_| archive.entry_map().map(|entries| entries.len()));
        match opened {
            Ok(count) => total += count,
            Err(source) => {
                return Err(BuildError::OpenFailed {
                    archive: archive.name().to_string(),
                    source,
                })
            }
        }
    }
    Ok(total)
}

fn close_all(archives: &[Arc<dyn ArchiveHandle>]) {
    for archive in archives {
        if let Err(e) = archive.close() {
            tracing::warn!(archive = archive.name(), error = %e, "failed to close archive");
        }
    }
}

/// Arena under construction plus a lookup from normalized path to node.
///
/// The lookup only lives for one build.
struct TreeBuilder {
    nodes: Vec<NamespaceNode>,
    lookup: HashMap<PakPath, NodeIndex>,
}

impl TreeBuilder {
    fn new() -> TreeBuilder {
        let root = NamespaceNode::Directory(DirectoryNode {
            name: String::new(),
            path: PakPath::root(),
            children: Vec::new(),
        });
        let mut lookup = HashMap::new();
        lookup.insert(PakPath::root(), NodeIndex::ROOT);
        TreeBuilder {
            nodes: vec![root],
            lookup,
        }
    }

    fn node_mut(&mut self, idx: NodeIndex) -> &mut NamespaceNode {
        &mut self.nodes[idx.to_array_index()]
    }

    fn push(&mut self, parent: NodeIndex, node: NamespaceNode) -> NodeIndex {
        let idx = NodeIndex::from_array_index(self.nodes.len());
        self.lookup.insert(node.path().clone(), idx);
        self.nodes.push(node);
        if let Some(dir) = self.node_mut(parent).as_dir_mut() {
            dir.children.push(idx);
        }
        idx
    }

    fn ensure_dir(&mut self, parent: NodeIndex, path: PakPath, name: &str) -> NodeIndex {
        let dir = NamespaceNode::Directory(DirectoryNode {
            name: name.to_string(),
            path: path.clone(),
            children: Vec::new(),
        });

        match self.lookup.get(&path).copied() {
            None => self.push(parent, dir),
            Some(idx) => {
                let node = self.node_mut(idx);
                if !node.is_dir() {
                    tracing::warn!(path = %path, "directory replaces a file of the same name");
                    *node = dir;
                }
                idx
            }
        }
    }

    fn insert(&mut self, raw: &str, record: &FileRecord, archive: ArchiveId, archive_name: &str) {
        let names: Vec<&str> = components(raw).collect();
        let Some((leaf, dirs)) = names.split_last() else {
            tracing::warn!(archive = archive_name, raw, "ignoring entry with an empty path");
            return;
        };

        let mut parent = NodeIndex::ROOT;
        let mut path = PakPath::root();
        for name in dirs {
            path.push(name);
            parent = self.ensure_dir(parent, path.clone(), name);
        }

        path.push(leaf);
        match self.lookup.get(&path).copied() {
            None => {
                let file = NamespaceNode::File(FileNode {
                    name: leaf.to_string(),
                    path,
                    record: record.clone(),
                    archive,
                });
                self.push(parent, file);
            }
            Some(idx) => match self.node_mut(idx) {
                NamespaceNode::File(existing) => {
                    tracing::trace!(path = %existing.path, archive = archive_name, "overriding entry");
                    existing.record = record.clone();
                    existing.archive = archive;
                }
                NamespaceNode::Directory(_) => {
                    tracing::warn!(path = %path, archive = archive_name, "file collides with a directory, skipped");
                }
            },
        }
    }

    /// Sort every directory: directories first, then case-insensitive by name.
    fn finish(mut self) -> Vec<NamespaceNode> {
        for i in 0..self.nodes.len() {
            let mut children = match self.nodes[i].as_dir_mut() {
                Some(dir) => std::mem::take(&mut dir.children),
                None => continue,
            };
            let nodes = &self.nodes;
            children.sort_by_cached_key(|idx| {
                let node = &nodes[idx.to_array_index()];
                (!node.is_dir(), node.name().to_lowercase(), node.name().to_string())
            });
            if let Some(dir) = self.nodes[i].as_dir_mut() {
                dir.children = children;
            }
        }
        self.nodes
    }
}
