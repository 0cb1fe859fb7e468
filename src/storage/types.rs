//! core type-safe wrappers around git primitives for the storage layer.

use std::fmt;
use std::fmt::Formatter;

use bstr::{BStr, BString, ByteSlice};
use chrono::{DateTime, FixedOffset, Offset, TimeZone, Utc};
use git2::Oid;

/// This makes sure we don't accidentally pass a blob ID where a commit ID
/// is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid
    pub fn raw(&self) -> Oid {
        self.0
    }

    /// parse CommitId from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(CommitId)
    }

    /// short form of the commit ID
    pub fn short(&self) -> String {
        self.0.to_string()[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Git tree identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(pub(crate) Oid);

impl TreeId {
    pub fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Git annotated tag identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagId(pub(crate) Oid);

impl TagId {
    pub fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for TagId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// git signature (author/committer/tagger info)
///
/// Names and emails are kept as raw bytes so an unmodified identity
/// re-encodes to exactly the bytes it was read from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub name: BString,
    pub email: BString,
    pub when: DateTime<FixedOffset>,
    /// a zero offset written as `-0000`
    negative_utc: bool,
}

impl Signature {
    /// create a new signature
    pub fn new(name: impl Into<BString>, email: impl Into<BString>, when: DateTime<FixedOffset>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            when,
            negative_utc: false,
        }
    }

    /// read a signature out of a git2 object
    pub(crate) fn from_git2(sig: &git2::Signature<'_>) -> Self {
        let time = sig.when();
        let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or_else(|| Utc.fix());
        let when = offset
            .timestamp_opt(time.seconds(), 0)
            .single()
            .unwrap_or_else(|| DateTime::<Utc>::UNIX_EPOCH.with_timezone(&offset));

        Self {
            name: BString::from(sig.name_bytes()),
            email: BString::from(sig.email_bytes()),
            when,
            negative_utc: time.offset_minutes() == 0 && time.sign() == '-',
        }
    }

    pub fn name(&self) -> &BStr {
        self.name.as_bstr()
    }

    pub fn email(&self) -> &BStr {
        self.email.as_bstr()
    }

    fn offset_minutes(&self) -> i32 {
        self.when.offset().local_minus_utc() / 60
    }

    /// Append the canonical `name <email> seconds +hhmm` form.
    pub(crate) fn encode_into(&self, out: &mut Vec<u8>) {
        let minutes = self.offset_minutes();
        let sign = if minutes < 0 || (minutes == 0 && self.negative_utc) { '-' } else { '+' };
        let minutes = minutes.abs();

        out.extend_from_slice(&self.name);
        out.extend_from_slice(b" <");
        out.extend_from_slice(&self.email);
        out.extend_from_slice(b"> ");
        out.extend_from_slice(
            format!("{} {}{:02}{:02}", self.when.timestamp(), sign, minutes / 60, minutes % 60).as_bytes(),
        );
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_id_short() {
        let id = CommitId::from_hex("0123456789abcdef0123456789abcdef01234567").unwrap();
        assert_eq!(id.short(), "0123456");
    }

    #[test]
    fn test_signature_encoding() {
        let when = FixedOffset::east_opt(2 * 3600 + 30 * 60)
            .unwrap()
            .timestamp_opt(1_700_000_000, 0)
            .unwrap();
        let sig = Signature::new("Ada", "ada@example.com", when);

        let mut out = Vec::new();
        sig.encode_into(&mut out);
        assert_eq!(out.as_bstr(), "Ada <ada@example.com> 1700000000 +0230");
    }

    #[test]
    fn test_signature_negative_offset() {
        let when = FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .timestamp_opt(1_700_000_000, 0)
            .unwrap();
        let sig = Signature::new("Bob", "bob@example.com", when);

        let mut out = Vec::new();
        sig.encode_into(&mut out);
        assert_eq!(out.as_bstr(), "Bob <bob@example.com> 1700000000 -0500");
    }

    #[test]
    fn test_signature_git2_roundtrip() {
        let original = git2::Signature::new("Test", "test@test.com", &git2::Time::new(1_700_000_000, -90)).unwrap();
        let sig = Signature::from_git2(&original);
        assert_eq!(sig.name(), "Test");
        assert_eq!(sig.when.timestamp(), 1_700_000_000);

        assert_eq!(sig.email(), "test@test.com");

        let mut out = Vec::new();
        sig.encode_into(&mut out);
        assert_eq!(out.as_bstr(), "Test <test@test.com> 1700000000 -0130");
    }

    #[test]
    fn test_signature_keeps_negative_utc() {
        let dir = tempfile::TempDir::new().unwrap();
        let repo = git2::Repository::init(dir.path()).unwrap();
        let tree = repo.treebuilder(None).unwrap().write().unwrap();
        let raw = format!(
            "tree {}\nauthor Eve <eve@example.com> 1700000000 -0000\ncommitter Eve <eve@example.com> 1700000000 +0000\n\nmsg\n",
            tree
        );
        let id = repo.odb().unwrap().write(git2::ObjectType::Commit, raw.as_bytes()).unwrap();
        let commit = repo.find_commit(id).unwrap();

        let mut author = Vec::new();
        Signature::from_git2(&commit.author()).encode_into(&mut author);
        assert_eq!(author.as_bstr(), "Eve <eve@example.com> 1700000000 -0000");

        let mut committer = Vec::new();
        Signature::from_git2(&commit.committer()).encode_into(&mut committer);
        assert_eq!(committer.as_bstr(), "Eve <eve@example.com> 1700000000 +0000");
    }
}
