//! Tree entries and their rewrite results.

use std::fmt;

use bstr::{BString, ByteVec};
use git2::Oid;

/// Name of the synthetic entry that stands for a commit's root tree.
///
/// No real tree entry can carry this name since git forbids `/` in names.
pub const ROOT_NAME: &str = "/";

/// The kind of object a tree entry points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryMode {
    /// a subdirectory
    Tree,
    /// a regular, non-executable file
    Blob,
    /// an executable file
    BlobExecutable,
    /// a symbolic link (the blob holds the link target)
    Link,
    /// a submodule commit (gitlink)
    Commit,
}

impl EntryMode {
    /// Interpret a raw tree-entry mode.
    ///
    /// Legacy group-writable modes such as `100664` are read as regular
    /// files, the same normalization git applies.
    pub fn from_raw(mode: i32) -> Option<Self> {
        match mode {
            0o040000 => Some(Self::Tree),
            0o120000 => Some(Self::Link),
            0o160000 => Some(Self::Commit),
            m if m & 0o170000 == 0o100000 => {
                if m & 0o111 != 0 {
                    Some(Self::BlobExecutable)
                } else {
                    Some(Self::Blob)
                }
            }
            _ => None,
        }
    }

    /// The canonical octal spelling used inside tree objects.
    pub fn as_octal(&self) -> &'static str {
        match self {
            Self::Tree => "40000",
            Self::Blob => "100644",
            Self::BlobExecutable => "100755",
            Self::Link => "120000",
            Self::Commit => "160000",
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, Self::Tree)
    }

    /// regular files, executables and symlinks all store their content in a blob
    pub fn is_blob(&self) -> bool {
        matches!(self, Self::Blob | Self::BlobExecutable | Self::Link)
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_octal())
    }
}

/// One child of a tree, as seen from a particular directory.
///
/// Two entries are the same cache key only when mode, name, id and path
/// context all match. With path context disabled (`path == None`) identical
/// content shares one rewrite result wherever it appears in history.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    pub mode: EntryMode,
    pub name: BString,
    pub id: Oid,
    /// directory containing this entry, relative to the root (`""` for
    /// top-level entries), or `None` when path context is disabled
    pub path: Option<BString>,
}

impl Entry {
    pub fn new(mode: EntryMode, name: impl Into<BString>, id: Oid, path: Option<BString>) -> Self {
        Self {
            mode,
            name: name.into(),
            id,
            path,
        }
    }

    /// The synthetic entry standing for a commit's root tree.
    pub fn root(tree_id: Oid, path_context: bool) -> Self {
        Self {
            mode: EntryMode::Tree,
            name: BString::from(ROOT_NAME),
            id: tree_id,
            path: path_context.then(BString::default),
        }
    }

    pub fn is_root(&self) -> bool {
        self.mode.is_tree() && self.name == ROOT_NAME
    }

    /// Path context to hand to this entry's children.
    pub fn child_path(&self) -> Option<BString> {
        let parent = self.path.as_ref()?;
        if self.is_root() {
            return Some(BString::default());
        }
        if parent.is_empty() {
            return Some(self.name.clone());
        }
        let mut path = parent.clone();
        path.push_byte(b'/');
        path.push_str(&self.name);
        Some(path)
    }

    /// Full path of this entry, when path context is enabled.
    pub fn full_path(&self) -> Option<BString> {
        let parent = self.path.as_ref()?;
        if parent.is_empty() {
            return Some(self.name.clone());
        }
        let mut path = parent.clone();
        path.push_byte(b'/');
        path.push_str(&self.name);
        Some(path)
    }

    /// A copy of this entry with a different name, same directory.
    pub fn renamed(&self, name: impl Into<BString>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    /// A copy of this entry pointing at different content.
    pub fn with_id(&self, id: Oid) -> Self {
        Self { id, ..self.clone() }
    }
}

impl fmt::Display for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.full_path() {
            Some(path) => write!(f, "{} {} {}", self.mode, self.id, path),
            None => write!(f, "{} {} {}", self.mode, self.id, self.name),
        }
    }
}

/// What one entry becomes after rewriting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EntrySet {
    /// the entry maps to exactly one entry (possibly itself)
    One(Entry),
    /// the entry fans out into several entries, in this order
    Many(Vec<Entry>),
    /// the entry is dropped from its parent
    #[default]
    Empty,
}

impl EntrySet {
    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(entries) => entries.len(),
            Self::Empty => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        match self {
            Self::One(entry) => std::slice::from_ref(entry).iter(),
            Self::Many(entries) => entries.iter(),
            Self::Empty => (&[]).iter(),
        }
    }

    /// Append every entry of this set to `out`, preserving order.
    pub fn flatten_into(self, out: &mut Vec<Entry>) {
        match self {
            Self::One(entry) => out.push(entry),
            Self::Many(entries) => out.extend(entries),
            Self::Empty => {}
        }
    }
}

impl From<Entry> for EntrySet {
    fn from(entry: Entry) -> Self {
        Self::One(entry)
    }
}

impl From<Vec<Entry>> for EntrySet {
    fn from(mut entries: Vec<Entry>) -> Self {
        match entries.len() {
            0 => Self::Empty,
            1 => Self::One(entries.remove(0)),
            _ => Self::Many(entries),
        }
    }
}

impl From<Option<Entry>> for EntrySet {
    fn from(entry: Option<Entry>) -> Self {
        entry.map_or(Self::Empty, Self::One)
    }
}

impl IntoIterator for EntrySet {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        let mut out = Vec::with_capacity(self.len());
        self.flatten_into(&mut out);
        out.into_iter()
    }
}

impl<'a> IntoIterator for &'a EntrySet {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
