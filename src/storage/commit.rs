//!  Commit and tag reading, and canonical commit/tag encoding.
//!
//! commits and annotated tags are small text objects. Reading goes through
//! libgit2; writing encodes the object here so dry-run hashing and real
//! insertion see the same bytes:
//!
//! ```text
//! tree <hex>                     object <hex>
//! parent <hex>   (0..n)          type commit
//! author <sig>                   tag <name>
//! committer <sig>                tagger <sig>   (optional)
//! encoding <enc> (optional)
//!                                <message>
//! <message>
//! ```

use bstr::{BStr, BString, ByteSlice};
use git2::{ObjectType, Oid, Repository};

use crate::storage::error::{StorageError, StorageResult};
use crate::storage::inserter::Inserter;
use crate::storage::types::{CommitId, Signature, TagId, TreeId};

/// information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub tree_id: TreeId,
    pub parent_ids: Vec<CommitId>,
    pub author: Signature,
    pub committer: Signature,
    pub message: BString,
    pub encoding: Option<String>,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        Self {
            id: CommitId::new(commit.id()),
            tree_id: TreeId::new(commit.tree_id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            author: Signature::from_git2(&commit.author()),
            committer: Signature::from_git2(&commit.committer()),
            message: BString::from(commit.message_raw_bytes()),
            encoding: commit.message_encoding().map(str::to_string),
        }
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &BStr {
        self.message.lines().next().unwrap_or_default().as_bstr()
    }
}

/// information about an annotated tag object
#[derive(Debug, Clone)]
pub struct TagInfo {
    pub id: TagId,
    pub target: Oid,
    pub target_kind: ObjectType,
    pub name: BString,
    pub tagger: Option<Signature>,
    pub message: BString,
}

impl TagInfo {
    pub(crate) fn from_git2(tag: &git2::Tag<'_>) -> StorageResult<Self> {
        let target_kind = tag.target_type().ok_or_else(|| StorageError::CorruptedData {
            path: tag.id().to_string(),
            reason: "tag has no target type".to_string(),
        })?;

        Ok(Self {
            id: TagId::new(tag.id()),
            target: tag.target_id(),
            target_kind,
            name: BString::from(tag.name_bytes()),
            tagger: tag.tagger().as_ref().map(Signature::from_git2),
            message: BString::from(tag.message_bytes().unwrap_or_default()),
        })
    }

    pub fn targets_commit(&self) -> bool {
        self.target_kind == ObjectType::Commit
    }
}

/// What an object id names once one level of tag indirection is peeled.
#[derive(Debug, Clone)]
pub enum Peeled {
    Commit(CommitId),
    Tag(TagInfo),
    /// a tree or blob reached directly by a ref
    Other(ObjectType),
}

/// builder for creating commits with a fluent interface
#[derive(Debug, Clone)]
pub struct CommitBuilder {
    tree_id: Option<TreeId>,
    parents: Vec<CommitId>,
    author: Option<Signature>,
    committer: Option<Signature>,
    message: BString,
    encoding: Option<String>,
}

impl CommitBuilder {
    /// create a new CommitBuilder
    pub fn new() -> Self {
        Self {
            tree_id: None,
            parents: Vec::new(),
            author: None,
            committer: None,
            message: BString::default(),
            encoding: None,
        }
    }

    /// set the tree for this commit
    pub fn tree(mut self, tree_id: TreeId) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    /// set multiple parents (for merge commits)
    pub fn parents(mut self, parents: Vec<CommitId>) -> Self {
        self.parents = parents;
        self
    }

    pub fn author(mut self, author: Signature) -> Self {
        self.author = Some(author);
        self
    }

    pub fn committer(mut self, committer: Signature) -> Self {
        self.committer = Some(committer);
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<BString>) -> Self {
        self.message = message.into();
        self
    }

    /// set the `encoding` header
    pub fn encoding(mut self, encoding: Option<String>) -> Self {
        self.encoding = encoding;
        self
    }

    /// encode the commit object content
    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        let tree_id = self
            .tree_id
            .ok_or_else(|| StorageError::Internal("commit requires a tree".to_string()))?;
        let author = self
            .author
            .as_ref()
            .ok_or_else(|| StorageError::Internal("commit requires an author".to_string()))?;
        let committer = self
            .committer
            .as_ref()
            .ok_or_else(|| StorageError::Internal("commit requires a committer".to_string()))?;

        let mut out = Vec::with_capacity(256 + self.message.len());
        out.extend_from_slice(format!("tree {}\n", tree_id).as_bytes());
        for parent in &self.parents {
            out.extend_from_slice(format!("parent {}\n", parent).as_bytes());
        }
        out.extend_from_slice(b"author ");
        author.encode_into(&mut out);
        out.extend_from_slice(b"\ncommitter ");
        committer.encode_into(&mut out);
        out.push(b'\n');
        if let Some(encoding) = &self.encoding {
            out.extend_from_slice(format!("encoding {}\n", encoding).as_bytes());
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        Ok(out)
    }

    /// create the commit and return its ID
    pub fn write(&self, inserter: &Inserter<'_>) -> StorageResult<CommitId> {
        let oid = inserter.insert(ObjectType::Commit, &self.encode()?)?;
        Ok(CommitId::new(oid))
    }
}

impl Default for CommitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// builder for annotated tag objects
#[derive(Debug, Clone)]
pub struct TagBuilder {
    target: Oid,
    target_kind: ObjectType,
    name: BString,
    tagger: Option<Signature>,
    message: BString,
}

impl TagBuilder {
    pub fn new(target: Oid, target_kind: ObjectType, name: impl Into<BString>) -> Self {
        Self {
            target,
            target_kind,
            name: name.into(),
            tagger: None,
            message: BString::default(),
        }
    }

    pub fn tagger(mut self, tagger: Option<Signature>) -> Self {
        self.tagger = tagger;
        self
    }

    pub fn message(mut self, message: impl Into<BString>) -> Self {
        self.message = message.into();
        self
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(160 + self.message.len());
        out.extend_from_slice(format!("object {}\ntype {}\ntag ", self.target, self.target_kind).as_bytes());
        out.extend_from_slice(&self.name);
        out.push(b'\n');
        if let Some(tagger) = &self.tagger {
            out.extend_from_slice(b"tagger ");
            tagger.encode_into(&mut out);
            out.push(b'\n');
        }
        out.push(b'\n');
        out.extend_from_slice(&self.message);
        out
    }

    pub fn write(&self, inserter: &Inserter<'_>) -> StorageResult<TagId> {
        let oid = inserter.insert(ObjectType::Tag, &self.encode())?;
        Ok(TagId::new(oid))
    }
}

/// get information about a commit
pub fn read_commit(repo: &Repository, id: CommitId) -> StorageResult<CommitInfo> {
    let commit = repo
        .find_commit(id.raw())
        .map_err(|_| StorageError::ObjectNotFound(id.raw()))?;

    Ok(CommitInfo::from_git2(&commit))
}

/// get information about an annotated tag
pub fn read_tag(repo: &Repository, id: TagId) -> StorageResult<TagInfo> {
    let tag = repo
        .find_tag(id.raw())
        .map_err(|_| StorageError::ObjectNotFound(id.raw()))?;

    TagInfo::from_git2(&tag)
}

/// Look at what `id` names, unwrapping an annotated tag into its description.
pub fn peel(repo: &Repository, id: Oid) -> StorageResult<Peeled> {
    let object = repo.find_object(id, None).map_err(|e| {
        if e.code() == git2::ErrorCode::NotFound {
            StorageError::ObjectNotFound(id)
        } else {
            StorageError::Git(e)
        }
    })?;

    match object.kind() {
        Some(ObjectType::Commit) => Ok(Peeled::Commit(CommitId::new(id))),
        Some(ObjectType::Tag) => {
            let tag = object.as_tag().ok_or_else(|| StorageError::UnexpectedObjectType {
                id,
                expected: "tag".to_string(),
                found: format!("{:?}", object.kind()),
            })?;
            Ok(Peeled::Tag(TagInfo::from_git2(tag)?))
        }
        Some(kind) => Ok(Peeled::Other(kind)),
        None => Err(StorageError::CorruptedData {
            path: id.to_string(),
            reason: "object has no type".to_string(),
        }),
    }
}

/// provenance stamp prepended to rewritten commit messages
pub fn stamp_provenance(original: CommitId, message: &BStr) -> BString {
    let mut stamped = BString::from(format!("[{}] ", original.short()));
    stamped.extend_from_slice(message);
    stamped
}
