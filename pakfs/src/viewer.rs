use std::collections::HashMap;
use std::fmt;

use crate::namespace::VirtualNamespace;
use crate::node::{NamespaceNode, NodeIndex};

/// Stage layout tables, each stored as its own `.ini` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageIni {
    SectorSize,
    GridInfo,
    Default,
    TexTable,
    Height,
    HeightAttribute,
    GrassTable,
    AlphaTable,
    TriggerDefine,
    PropInfo,
    Trigger,
}

impl StageIni {
    pub const ALL: [StageIni; 11] = [
        StageIni::SectorSize,
        StageIni::GridInfo,
        StageIni::Default,
        StageIni::TexTable,
        StageIni::Height,
        StageIni::HeightAttribute,
        StageIni::GrassTable,
        StageIni::AlphaTable,
        StageIni::TriggerDefine,
        StageIni::PropInfo,
        StageIni::Trigger,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            StageIni::SectorSize => "sectorsize.ini",
            StageIni::GridInfo => "gridinfo.ini",
            StageIni::Default => "default.ini",
            StageIni::TexTable => "textable.ini",
            StageIni::Height => "height.ini",
            StageIni::HeightAttribute => "heightattribute.ini",
            StageIni::GrassTable => "grasstable.ini",
            StageIni::AlphaTable => "alphatable.ini",
            StageIni::TriggerDefine => "triggerdefine.ini",
            StageIni::PropInfo => "propinfo.ini",
            StageIni::Trigger => "trigger.ini",
        }
    }
}

/// The kind of viewer a node should be shown with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewerKind {
    Image,
    Dds,
    Text,
    /// Text stored as EUC-KR.
    EucKrText,
    Environment,
    Mesh,
    Skin,
    Animation,
    Camera,
    StageIni(StageIni),
    Shaders,
    /// Hex dump or nothing at all.
    Default,
}

impl ViewerKind {
    pub fn is_text(self) -> bool {
        matches!(self, ViewerKind::Text | ViewerKind::EucKrText)
    }
}

impl fmt::Display for ViewerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewerKind::Image => f.write_str("image"),
            ViewerKind::Dds => f.write_str("dds texture"),
            ViewerKind::Text => f.write_str("text"),
            ViewerKind::EucKrText => f.write_str("text (EUC-KR)"),
            ViewerKind::Environment => f.write_str("environment"),
            ViewerKind::Mesh => f.write_str("mesh"),
            ViewerKind::Skin => f.write_str("skin"),
            ViewerKind::Animation => f.write_str("animation"),
            ViewerKind::Camera => f.write_str("camera"),
            ViewerKind::StageIni(ini) => write!(f, "stage table ({})", ini.file_name()),
            ViewerKind::Shaders => f.write_str("shader bundle"),
            ViewerKind::Default => f.write_str("binary"),
        }
    }
}

type Matcher = Box<dyn Fn(&NamespaceNode) -> bool + Send + Sync>;

/// Resolves which viewer a node gets.
///
/// Matchers run first, in registration order. Files no matcher claims are
/// looked up by extension, ignoring case. Everything else is
/// [ViewerKind::Default].
#[derive(Default)]
pub struct ViewerRegistry {
    matchers: Vec<(Matcher, ViewerKind)>,
    extensions: HashMap<String, ViewerKind>,
}

impl fmt::Debug for ViewerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewerRegistry")
            .field("matchers", &self.matchers.len())
            .field("extensions", &self.extensions)
            .finish()
    }
}

fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_ascii_lowercase()
}

impl ViewerRegistry {
    pub fn new() -> ViewerRegistry {
        ViewerRegistry::default()
    }

    /// The table the desktop tool ships with.
    pub fn with_defaults() -> ViewerRegistry {
        let mut registry = ViewerRegistry::new();
        for ext in ["png", "jpg", "jpeg", "tga"] {
            registry.register_extension(ext, ViewerKind::Image);
        }
        registry.register_extension("dds", ViewerKind::Dds);
        registry.register_extension("lua", ViewerKind::EucKrText);
        for ext in ["cfg", "txt", "xml", "dmv"] {
            registry.register_extension(ext, ViewerKind::Text);
        }
        registry.register_extension("env", ViewerKind::Environment);
        registry.register_extension("msh", ViewerKind::Mesh);
        registry.register_extension("skn", ViewerKind::Skin);
        registry.register_extension("ani", ViewerKind::Animation);
        registry.register_extension("cam", ViewerKind::Camera);

        for ini in StageIni::ALL {
            registry.register_name(ini.file_name(), ViewerKind::StageIni(ini));
        }
        registry.register_name("dnshaders.dat", ViewerKind::Shaders);
        registry
    }

    /// Map files ending in `ext` (with or without the dot) to `kind`.
    pub fn register_extension(&mut self, ext: &str, kind: ViewerKind) -> &mut Self {
        self.extensions.insert(normalize_extension(ext), kind);
        self
    }

    pub fn register_matcher<F>(&mut self, matcher: F, kind: ViewerKind) -> &mut Self
    where
        F: Fn(&NamespaceNode) -> bool + Send + Sync + 'static,
    {
        self.matchers.push((Box::new(matcher), kind));
        self
    }

    /// Match files named exactly `name`.
    pub fn register_name(&mut self, name: &str, kind: ViewerKind) -> &mut Self {
        let name = name.to_string();
        self.register_matcher(move |node| !node.is_dir() && node.name() == name, kind)
    }

    pub fn resolve(&self, node: &NamespaceNode) -> ViewerKind {
        if let Some((_, kind)) = self.matchers.iter().find(|(m, _)| m(node)) {
            return *kind;
        }
        if node.is_dir() {
            return ViewerKind::Default;
        }
        node.name()
            .rsplit_once('.')
            .and_then(|(_, ext)| self.extensions.get(&ext.to_ascii_lowercase()))
            .copied()
            .unwrap_or(ViewerKind::Default)
    }

    pub fn resolve_index(&self, namespace: &VirtualNamespace, idx: NodeIndex) -> ViewerKind {
        namespace
            .node(idx)
            .map(|node| self.resolve(node))
            .unwrap_or(ViewerKind::Default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ArchiveId, DirectoryNode, FileNode};
    use pak_format::{FileRecord, PakPath};

    fn file(name: &str) -> NamespaceNode {
        NamespaceNode::File(FileNode {
            name: name.to_string(),
            path: PakPath::new(name),
            record: FileRecord::new(name, 0, 0, 0, 0, 0),
            archive: ArchiveId(0),
        })
    }

    #[test]
    fn default_table() {
        let r = ViewerRegistry::with_defaults();
        assert_eq!(r.resolve(&file("icon.png")), ViewerKind::Image);
        assert_eq!(r.resolve(&file("ICON.PNG")), ViewerKind::Image);
        assert_eq!(r.resolve(&file("skill.lua")), ViewerKind::EucKrText);
        assert_eq!(r.resolve(&file("a.dmv")), ViewerKind::Text);
        assert_eq!(r.resolve(&file("warrior.skn")), ViewerKind::Skin);
        assert_eq!(r.resolve(&file("noext")), ViewerKind::Default);
        assert_eq!(r.resolve(&file("x.unknown")), ViewerKind::Default);
    }

    #[test]
    fn matchers_beat_extensions() {
        let r = ViewerRegistry::with_defaults();
        assert_eq!(
            r.resolve(&file("gridinfo.ini")),
            ViewerKind::StageIni(StageIni::GridInfo)
        );
        assert_eq!(r.resolve(&file("dnshaders.dat")), ViewerKind::Shaders);
        assert_eq!(r.resolve(&file("other.ini")), ViewerKind::Default);

        let mut custom = ViewerRegistry::new();
        custom
            .register_extension(".txt", ViewerKind::Text)
            .register_matcher(|n| n.name().starts_with("readme"), ViewerKind::EucKrText)
            .register_matcher(|n| n.name().ends_with(".txt"), ViewerKind::Image);
        assert_eq!(custom.resolve(&file("readme.txt")), ViewerKind::EucKrText);
        assert_eq!(custom.resolve(&file("other.txt")), ViewerKind::Image);
    }

    #[test]
    fn directories_get_the_default() {
        let dir = NamespaceNode::Directory(DirectoryNode {
            name: "textures.png".into(),
            path: PakPath::new("textures.png"),
            children: Vec::new(),
        });
        assert_eq!(
            ViewerRegistry::with_defaults().resolve(&dir),
            ViewerKind::Default
        );
    }
}
