//! Refs and their rewrite results.

use std::fmt;

use git2::Oid;

/// A ref as read from, or written to, a repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefEntry {
    /// a ref naming an object directly
    Direct { name: String, id: Oid },
    /// a ref naming another ref (e.g. `HEAD -> refs/heads/main`)
    Symbolic { name: String, target: String },
    /// the ref must not exist in the output
    Empty,
}

impl RefEntry {
    pub fn direct(name: impl Into<String>, id: Oid) -> Self {
        Self::Direct {
            name: name.into(),
            id,
        }
    }

    pub fn symbolic(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::Symbolic {
            name: name.into(),
            target: target.into(),
        }
    }

    /// Full ref name, or `None` for the empty ref.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Direct { name, .. } | Self::Symbolic { name, .. } => Some(name),
            Self::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Whether both refs point at the same thing, ignoring their names.
    pub fn same_target(&self, other: &RefEntry) -> bool {
        match (self, other) {
            (Self::Direct { id: a, .. }, Self::Direct { id: b, .. }) => a == b,
            (Self::Symbolic { target: a, .. }, Self::Symbolic { target: b, .. }) => a == b,
            (Self::Empty, Self::Empty) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RefEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { name, id } => write!(f, "{} -> {}", name, id),
            Self::Symbolic { name, target } => write!(f, "{} -> ref: {}", name, target),
            Self::Empty => write!(f, "(deleted)"),
        }
    }
}

/// Which namespace a ref name lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind<'a> {
    /// `HEAD`
    Head,
    /// `refs/heads/<short>`
    Branch(&'a str),
    /// `refs/tags/<short>`
    Tag(&'a str),
    /// anything else (remotes, notes, stash, ...)
    Other,
}

impl<'a> RefKind<'a> {
    pub const HEAD: &'static str = "HEAD";
    pub const HEADS_PREFIX: &'static str = "refs/heads/";
    pub const TAGS_PREFIX: &'static str = "refs/tags/";

    pub fn classify(name: &'a str) -> Self {
        if name == Self::HEAD {
            Self::Head
        } else if let Some(short) = name.strip_prefix(Self::HEADS_PREFIX) {
            Self::Branch(short)
        } else if let Some(short) = name.strip_prefix(Self::TAGS_PREFIX) {
            Self::Tag(short)
        } else {
            Self::Other
        }
    }

    /// HEAD, branches and tags seed the walk and get rewritten.
    pub fn is_rewritable(&self) -> bool {
        !matches!(self, Self::Other)
    }
}
