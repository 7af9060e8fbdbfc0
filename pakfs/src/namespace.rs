use std::fmt;
use std::sync::{Arc, Mutex};

use pak_format::path::components;
use pak_format::ArchiveHandle;

use crate::node::{ArchiveId, FileNode, NamespaceNode, NodeIndex};

/// The consolidated tree of one or more archives.
///
/// Built once by [crate::NamespaceBuilder] and read-only afterwards. The
/// namespace owns the archive handles its file nodes point into, and the one
/// lock that every extraction from them takes.
pub struct VirtualNamespace {
    nodes: Vec<NamespaceNode>,
    archives: Vec<Arc<dyn ArchiveHandle>>,
    file_count: usize,
    extraction_lock: Mutex<()>,
}

impl fmt::Debug for VirtualNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualNamespace")
            .field("nodes", &self.nodes.len())
            .field("files", &self.file_count)
            .field("archives", &self.archives)
            .finish()
    }
}

impl VirtualNamespace {
    pub(crate) fn from_parts(
        nodes: Vec<NamespaceNode>,
        archives: Vec<Arc<dyn ArchiveHandle>>,
    ) -> VirtualNamespace {
        let file_count = nodes.iter().filter(|n| !n.is_dir()).count();
        VirtualNamespace {
            nodes,
            archives,
            file_count,
            extraction_lock: Mutex::new(()),
        }
    }

    /// Held for a whole transfer attempt, whichever pipeline runs it.
    pub(crate) fn extraction_lock(&self) -> &Mutex<()> {
        &self.extraction_lock
    }

    #[inline(always)]
    pub fn root(&self) -> NodeIndex {
        NodeIndex::ROOT
    }

    pub fn node(&self, idx: NodeIndex) -> Option<&NamespaceNode> {
        self.nodes.get(idx.to_array_index())
    }

    pub fn file(&self, idx: NodeIndex) -> Option<&FileNode> {
        self.node(idx).and_then(NamespaceNode::as_file)
    }

    /// Child indices of a directory, in display order. Empty for files.
    pub fn children(&self, idx: NodeIndex) -> &[NodeIndex] {
        match self.node(idx) {
            Some(NamespaceNode::Directory(d)) => &d.children,
            _ => &[],
        }
    }

    /// Resolve a `/` or `\` separated path, one component at a time.
    ///
    /// The empty path is the root. Matching is exact.
    pub fn find(&self, path: &str) -> Option<NodeIndex> {
        let mut current = self.root();
        for name in components(path) {
            current = self
                .children(current)
                .iter()
                .copied()
                .find(|child| self.node(*child).is_some_and(|n| n.name() == name))?;
        }
        Some(current)
    }

    pub fn archive(&self, id: ArchiveId) -> Option<&Arc<dyn ArchiveHandle>> {
        self.archives.get(id.get())
    }

    pub fn archives(&self) -> &[Arc<dyn ArchiveHandle>] {
        &self.archives
    }

    /// Number of file nodes in the tree.
    #[inline(always)]
    pub fn file_count(&self) -> usize {
        self.file_count
    }

    /// Number of nodes, the root included.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// All file nodes at or below `idx`, depth first in display order.
    pub fn files_under(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out = Vec::new();
        let mut stack = vec![idx];
        while let Some(current) = stack.pop() {
            match self.node(current) {
                Some(NamespaceNode::File(_)) => out.push(current),
                Some(NamespaceNode::Directory(d)) => stack.extend(d.children.iter().rev()),
                None => {}
            }
        }
        out
    }

    /// Close every archive. Failures are logged and otherwise ignored.
    pub fn unload(&self) {
        for archive in &self.archives {
            if let Err(e) = archive.close() {
                tracing::warn!(archive = archive.name(), error = %e, "failed to close archive");
            }
        }
        tracing::info!(archives = self.archives.len(), "unloaded namespace");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NamespaceBuilder;
    use pak_format::testing::MemoryArchive;

    fn scenario_one() -> VirtualNamespace {
        let a = MemoryArchive::new("a.pak")
            .with_file(r"\Data\icon.png", &[0u8; 100])
            .with_file(r"\Data\Sub\readme.txt", &[b'r'; 20]);
        NamespaceBuilder::new().archive(Arc::new(a)).build().unwrap()
    }

    #[test]
    fn find_accepts_either_separator() {
        let ns = scenario_one();
        let by_slash = ns.find("Data/Sub/readme.txt").unwrap();
        assert_eq!(ns.find(r"\Data\Sub\readme.txt"), Some(by_slash));
        assert_eq!(ns.find("/Data/Sub/readme.txt"), Some(by_slash));
        assert_eq!(ns.file(by_slash).unwrap().record.decompressed_size, 20);
        assert_eq!(ns.find(""), Some(ns.root()));
    }

    #[test]
    fn find_missing_is_none() {
        let ns = scenario_one();
        assert_eq!(ns.find("nope/nope"), None);
        assert_eq!(ns.find("Data/icon.png/deeper"), None);
        assert_eq!(ns.find("data/icon.png"), None);
    }

    #[test]
    fn files_under_walks_in_display_order() {
        let ns = scenario_one();
        let data = ns.find("Data").unwrap();
        let names: Vec<_> = ns
            .files_under(data)
            .into_iter()
            .map(|idx| ns.node(idx).unwrap().path().to_string())
            .collect();
        assert_eq!(names, ["Data/Sub/readme.txt", "Data/icon.png"]);
        assert_eq!(ns.file_count(), 2);
        assert_eq!(ns.len(), 5);
    }

    #[test]
    fn unload_closes_everything_and_swallows_failures() {
        let a = Arc::new(MemoryArchive::new("a.pak").with_file("x", b"x"));
        let b = Arc::new(MemoryArchive::new("b.pak").with_file("y", b"y").failing_close());
        let ns = NamespaceBuilder::new()
            .archive(a.clone())
            .archive(b.clone())
            .build()
            .unwrap();

        ns.unload();
        assert!(!a.is_open());
        assert_eq!(a.close_count(), 1);
        assert_eq!(b.close_count(), 1);
    }
}
