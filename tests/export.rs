//! Exporting into a separate repository, collisions and aborted sessions.

mod common;

use bstr::BString;
use treeshift::model::Entry;
use treeshift::rewrite::{DefaultPolicy, RewriteConfig, RewriteError, RewritePolicy, RewriteResult, RewriteSession};
use treeshift::storage::{CollisionPolicy, CommitId, StoreHandle};

use common::{files_of, TestRepo};

/// Renames every `.txt` file to `same.txt`.
struct Collapse;

impl RewritePolicy for Collapse {
    fn rewrite_name(&self, entry: &Entry) -> RewriteResult<BString> {
        if entry.mode.is_blob() && entry.name.ends_with(b".txt") {
            return Ok(BString::from("same.txt"));
        }
        Ok(entry.name.clone())
    }
}

struct Poisoned;

impl RewritePolicy for Poisoned {
    fn rewrite_name(&self, entry: &Entry) -> RewriteResult<BString> {
        if entry.name == "poison.txt" {
            return Err(RewriteError::policy(format!("refusing {}", entry)));
        }
        Ok(entry.name.clone())
    }
}

#[test]
fn export_writes_a_complete_graph() {
    let source = TestRepo::new();
    let c1 = source.commit("refs/heads/main", &[("src/lib.rs", b"lib"), ("README", b"readme")], &[], "one\n");
    let c2 = source.commit("refs/heads/main", &[("src/lib.rs", b"lib v2"), ("README", b"readme")], &[c1], "two\n");
    source.annotated_tag("v1", c1, "first\n");
    source.set_head("refs/heads/main");

    let destination = TestRepo::bare();
    let config = RewriteConfig::new(source.path()).destination(destination.path());
    let session = RewriteSession::new(config, DefaultPolicy).unwrap();
    let report = session.run().unwrap();
    assert_eq!(report.commits_rewritten, 2);

    let new_c2 = session.mapped_commit(CommitId::new(c2)).unwrap().raw();
    assert_eq!(destination.ref_target("refs/heads/main"), Some(new_c2));
    assert_eq!(destination.symbolic_target("HEAD").as_deref(), Some("refs/heads/main"));
    assert_eq!(files_of(&destination.repo, new_c2), source.files_of(c2));

    let new_c1 = session.mapped_commit(CommitId::new(c1)).unwrap().raw();
    let tag = destination.repo.find_tag(destination.ref_target("refs/tags/v1").unwrap()).unwrap();
    assert_eq!(tag.target_id(), new_c1);

    // the source is untouched
    assert_eq!(source.ref_target("refs/heads/main"), Some(c2));
    assert!(!source.has_object(new_c2));
}

/// Leaves everything reachable from one commit out of the rewrite.
struct HideFrom(git2::Oid);

impl RewritePolicy for HideFrom {
    fn uninteresting(&self, _handle: &StoreHandle<'_>) -> RewriteResult<Vec<CommitId>> {
        Ok(vec![CommitId::new(self.0)])
    }
}

#[test]
fn export_copies_history_outside_the_range() {
    let source = TestRepo::new();
    let root = source.commit("refs/heads/old", &[("src/lib.rs", b"v0"), ("README", b"readme")], &[], "root\n");
    let base = source.commit("refs/heads/old", &[("src/lib.rs", b"v1"), ("README", b"readme")], &[root], "base\n");
    let tip = source.commit("refs/heads/main", &[("src/lib.rs", b"v2")], &[base], "tip\n");
    let tag = source.annotated_tag("v0", root, "first\n");
    source.set_head("refs/heads/main");

    let destination = TestRepo::bare();
    let config = RewriteConfig::new(source.path()).destination(destination.path());
    let session = RewriteSession::new(config, HideFrom(base)).unwrap();
    let report = session.run().unwrap();
    assert_eq!(report.commits_rewritten, 1);

    // the branch outside the range keeps its id and brings its history along
    assert_eq!(destination.ref_target("refs/heads/old"), Some(base));
    assert!(destination.has_object(root));
    assert_eq!(files_of(&destination.repo, base), source.files_of(base));
    assert_eq!(files_of(&destination.repo, root), source.files_of(root));

    let copied = destination.repo.find_tag(destination.ref_target("refs/tags/v0").unwrap()).unwrap();
    assert_eq!(copied.id(), tag);
    assert_eq!(copied.target_id(), root);

    let new_tip = session.mapped_commit(CommitId::new(tip)).unwrap().raw();
    assert_eq!(destination.ref_target("refs/heads/main"), Some(new_tip));
    assert_eq!(files_of(&destination.repo, new_tip), source.files_of(tip));
}

#[test]
fn dry_run_export_leaves_destination_empty() {
    let source = TestRepo::new();
    source.commit("refs/heads/main", &[("a", b"a")], &[], "one\n");
    source.set_head("refs/heads/main");
    let destination = TestRepo::bare();

    let config = RewriteConfig::new(source.path()).destination(destination.path()).dry_run(true);
    let report = RewriteSession::new(config, DefaultPolicy).unwrap().run().unwrap();

    assert_eq!(report.commits_rewritten, 1);
    // HEAD and main would be written
    assert_eq!(report.refs_updated, 2);
    assert!(destination.ref_target("refs/heads/main").is_none());
}

#[test]
fn collision_policies() {
    let cases = [
        (CollisionPolicy::LastWins, Some(b"second".to_vec())),
        (CollisionPolicy::FirstWins, Some(b"first".to_vec())),
        (CollisionPolicy::Error, None),
    ];

    for (collision, expected) in cases {
        let repo = TestRepo::new();
        let commit = repo.commit("refs/heads/main", &[("a.txt", b"first"), ("b.txt", b"second")], &[], "one\n");

        let config = RewriteConfig::new(repo.path()).collision(collision);
        let session = RewriteSession::new(config, Collapse).unwrap();
        let result = session.run();

        match expected {
            Some(content) => {
                result.unwrap();
                let rewritten = session.mapped_commit(CommitId::new(commit)).unwrap().raw();
                assert_eq!(repo.files_of(rewritten), vec![("same.txt".to_string(), content)]);
            }
            None => {
                let err = result.unwrap_err();
                assert!(err.is_duplicate_entry(), "unexpected error: {}", err);
                assert_eq!(repo.ref_target("refs/heads/main"), Some(commit));
            }
        }
    }
}

#[test]
fn policy_failure_aborts_before_refs_move() {
    let repo = TestRepo::new();
    let first = repo.commit("refs/heads/main", &[("ok.txt", b"ok")], &[], "one\n");
    repo.commit("refs/heads/main", &[("ok.txt", b"ok"), ("poison.txt", b"!")], &[first], "two\n");
    let before = repo.ref_target("refs/heads/main");

    for concurrent in [false, true] {
        let config = RewriteConfig::new(repo.path()).concurrent(concurrent);
        let err = RewriteSession::new(config, Poisoned).unwrap().run().unwrap_err();
        assert!(err.is_policy_failure());
        assert!(err.to_string().contains("poison.txt"));
        assert_eq!(repo.ref_target("refs/heads/main"), before);
    }
}

#[test]
fn missing_destination_is_a_storage_error() {
    let source = TestRepo::new();
    let config = RewriteConfig::new(source.path()).destination(source.path().join("does-not-exist"));
    let err = RewriteSession::new(config, DefaultPolicy).unwrap_err();
    assert!(err.is_storage_failure());
}
