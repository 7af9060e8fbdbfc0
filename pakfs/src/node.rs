use std::num::NonZeroUsize;

use pak_format::{FileRecord, PakPath};

/// Position of a node in a namespace's arena.
///
/// One-based so that `Option<NodeIndex>` stays pointer sized. The root is
/// always index 1.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NodeIndex(NonZeroUsize);

impl NodeIndex {
    pub const ROOT: NodeIndex = NodeIndex(NonZeroUsize::MIN);

    pub fn new(value: usize) -> Option<NodeIndex> {
        NonZeroUsize::new(value).map(NodeIndex)
    }

    #[inline(always)]
    pub fn get(self) -> usize {
        self.0.get()
    }

    #[inline(always)]
    pub(crate) fn to_array_index(self) -> usize {
        self.0.get() - 1
    }

    #[inline(always)]
    pub(crate) fn from_array_index(idx: usize) -> NodeIndex {
        NodeIndex(NonZeroUsize::MIN.saturating_add(idx))
    }
}

/// Position of an archive in a namespace's archive list.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct ArchiveId(pub(crate) usize);

impl ArchiveId {
    #[inline(always)]
    pub fn get(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct DirectoryNode {
    pub name: String,
    pub path: PakPath,
    pub children: Vec<NodeIndex>,
}

#[derive(Debug, Clone)]
pub struct FileNode {
    pub name: String,
    pub path: PakPath,
    pub record: FileRecord,
    /// The archive that supplies this file's bytes.
    pub archive: ArchiveId,
}

#[derive(Debug, Clone)]
pub enum NamespaceNode {
    Directory(DirectoryNode),
    File(FileNode),
}

impl NamespaceNode {
    #[inline(always)]
    pub fn name(&self) -> &str {
        match self {
            NamespaceNode::Directory(d) => &d.name,
            NamespaceNode::File(f) => &f.name,
        }
    }

    #[inline(always)]
    pub fn path(&self) -> &PakPath {
        match self {
            NamespaceNode::Directory(d) => &d.path,
            NamespaceNode::File(f) => &f.path,
        }
    }

    #[inline(always)]
    pub fn is_dir(&self) -> bool {
        matches!(self, NamespaceNode::Directory(_))
    }

    #[inline(always)]
    pub fn as_dir(&self) -> Option<&DirectoryNode> {
        match self {
            NamespaceNode::Directory(d) => Some(d),
            _ => None,
        }
    }

    #[inline(always)]
    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            NamespaceNode::File(f) => Some(f),
            _ => None,
        }
    }

    pub(crate) fn as_dir_mut(&mut self) -> Option<&mut DirectoryNode> {
        match self {
            NamespaceNode::Directory(d) => Some(d),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_is_one() {
        assert_eq!(NodeIndex::ROOT.get(), 1);
        assert_eq!(NodeIndex::ROOT.to_array_index(), 0);
        assert_eq!(NodeIndex::from_array_index(4).get(), 5);
        assert!(NodeIndex::new(0).is_none());
        assert_eq!(
            std::mem::size_of::<Option<NodeIndex>>(),
            std::mem::size_of::<usize>()
        );
    }
}
