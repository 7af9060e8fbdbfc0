use std::fmt;
use std::path::PathBuf;

/// The separator used by paths stored in a pak index.
pub const PAK_SEP: char = '\\';

/// The separator used when printing a `PakPath`.
pub const PATH_NAMESPACE_SEP: &str = "/";

fn is_sep(c: char) -> bool {
    c == PAK_SEP || c == '/'
}

/// Strip a single leading separator from a raw index path.
///
/// Only one separator is removed; `\\a` becomes `\a`, which then splits into an
/// empty component that [components] drops.
pub fn strip_leading_sep(raw: &str) -> &str {
    match raw.chars().next() {
        Some(c) if is_sep(c) => &raw[c.len_utf8()..],
        _ => raw,
    }
}

/// Split a raw index path into its components.
///
/// Both `\` and `/` are accepted as separators. Empty, `.` and `..`
/// components are dropped, so no path can climb above the root.
pub fn components(raw: &str) -> impl Iterator<Item = &str> {
    strip_leading_sep(raw)
        .split(is_sep)
        .filter(|c| !c.is_empty() && *c != "." && *c != "..")
}

/// A normalized path inside a namespace. The empty path is the root.
#[derive(Debug, Clone, Default, PartialOrd, Ord, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PakPath(String);

impl PakPath {
    pub fn root() -> PakPath {
        PakPath(String::new())
    }

    /// Parse any `\` or `/` separated path, with or without a leading separator.
    pub fn new(raw: &str) -> PakPath {
        let mut out = PakPath::root();
        for component in components(raw) {
            out.push(component);
        }
        out
    }

    #[inline(always)]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline(always)]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn push(&mut self, name: &str) {
        if !self.0.is_empty() {
            self.0.push_str(PATH_NAMESPACE_SEP);
        }
        self.0.push_str(name);
    }

    pub fn join(&self, name: &str) -> PakPath {
        let mut out = self.clone();
        out.push(name);
        out
    }

    pub fn parent(&self) -> Option<PakPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind(PATH_NAMESPACE_SEP) {
            Some(idx) => Some(PakPath(self.0[..idx].to_string())),
            None => Some(PakPath::root()),
        }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.iter().last()
    }

    pub fn depth(&self) -> usize {
        self.iter().count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.split(PATH_NAMESPACE_SEP).filter(|c| !c.is_empty())
    }

    /// The path relative to `base`, or `None` if `base` is not an ancestor.
    pub fn strip_prefix(&self, base: &PakPath) -> Option<PakPath> {
        if base.is_root() {
            return Some(self.clone());
        }
        let rest = self.0.strip_prefix(base.as_str())?;
        if rest.is_empty() {
            return Some(PakPath::root());
        }
        rest.strip_prefix(PATH_NAMESPACE_SEP)
            .map(|r| PakPath(r.to_string()))
    }

    /// Convert to a relative platform path, for use under an export directory.
    pub fn to_path_buf(&self) -> PathBuf {
        self.iter().collect()
    }
}

impl fmt::Display for PakPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PakPath {
    fn from(raw: &str) -> Self {
        PakPath::new(raw)
    }
}
