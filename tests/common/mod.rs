//! Shared helpers for building small on-disk repositories.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::Path;

use git2::{FileMode, ObjectType, Oid, Repository, Signature, Time};
use tempfile::TempDir;

pub struct TestRepo {
    pub dir: TempDir,
    pub repo: Repository,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo }
    }

    pub fn bare() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init_bare(dir.path()).unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn signature() -> Signature<'static> {
        Signature::new("Test User", "test@example.com", &Time::new(1_700_000_000, 60)).unwrap()
    }

    /// Build a tree from `(path, content)` pairs; `/` in a path makes directories.
    pub fn tree(&self, files: &[(&str, &[u8])]) -> Oid {
        build_tree(&self.repo, files)
    }

    /// Commit `files` on top of `parents` and point `refname` at the result.
    pub fn commit(&self, refname: &str, files: &[(&str, &[u8])], parents: &[Oid], message: &str) -> Oid {
        let tree = self.tree(files);
        self.commit_tree(refname, tree, parents, message)
    }

    pub fn commit_tree(&self, refname: &str, tree: Oid, parents: &[Oid], message: &str) -> Oid {
        let tree = self.repo.find_tree(tree).unwrap();
        let sig = Self::signature();
        let parents: Vec<_> = parents.iter().map(|p| self.repo.find_commit(*p).unwrap()).collect();
        let parent_refs: Vec<_> = parents.iter().collect();
        let id = self.repo.commit(None, &sig, &sig, message, &tree, &parent_refs).unwrap();
        self.repo.reference(refname, id, true, "test").unwrap();
        id
    }

    pub fn annotated_tag(&self, name: &str, target: Oid, message: &str) -> Oid {
        let object = self.repo.find_object(target, None).unwrap();
        self.repo.tag(name, &object, &Self::signature(), message, true).unwrap()
    }

    pub fn set_head(&self, refname: &str) {
        self.repo.set_head(refname).unwrap();
    }

    pub fn ref_target(&self, name: &str) -> Option<Oid> {
        self.repo.find_reference(name).ok().and_then(|r| r.target())
    }

    pub fn symbolic_target(&self, name: &str) -> Option<String> {
        self.repo
            .find_reference(name)
            .ok()
            .and_then(|r| r.symbolic_target().map(str::to_string))
    }

    /// Every blob of a commit's tree as `(path, content)`, sorted by path.
    pub fn files_of(&self, commit: Oid) -> Vec<(String, Vec<u8>)> {
        files_of(&self.repo, commit)
    }

    /// Top-level entry names of a commit's tree, in tree order.
    pub fn top_level_names(&self, commit: Oid) -> Vec<String> {
        let tree = self.repo.find_commit(commit).unwrap().tree().unwrap();
        tree.iter().map(|e| e.name().unwrap().to_string()).collect()
    }

    pub fn has_object(&self, id: Oid) -> bool {
        self.repo.odb().unwrap().exists(id)
    }
}

pub fn build_tree(repo: &Repository, files: &[(&str, &[u8])]) -> Oid {
    let mut builder = repo.treebuilder(None).unwrap();
    let mut dirs: BTreeMap<&str, Vec<(&str, &[u8])>> = BTreeMap::new();

    for (path, content) in files {
        match path.split_once('/') {
            Some((dir, rest)) => dirs.entry(dir).or_default().push((rest, *content)),
            None => {
                let blob = repo.blob(content).unwrap();
                builder.insert(*path, blob, FileMode::Blob.into()).unwrap();
            }
        }
    }

    for (dir, children) in dirs {
        let sub = build_tree(repo, &children);
        builder.insert(dir, sub, FileMode::Tree.into()).unwrap();
    }

    builder.write().unwrap()
}

pub fn files_of(repo: &Repository, commit: Oid) -> Vec<(String, Vec<u8>)> {
    let tree = repo.find_commit(commit).unwrap().tree().unwrap();
    let mut files = Vec::new();
    tree.walk(git2::TreeWalkMode::PreOrder, |dir, entry| {
        if entry.kind() == Some(ObjectType::Blob) {
            let blob = repo.find_blob(entry.id()).unwrap();
            files.push((format!("{}{}", dir, entry.name().unwrap()), blob.content().to_vec()));
        }
        git2::TreeWalkResult::Ok
    })
    .unwrap();
    files.sort();
    files
}
