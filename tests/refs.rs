//! Phase 2: branches, tags and symbolic refs.

mod common;

use treeshift::rewrite::{DefaultPolicy, RewriteConfig, RewritePolicy, RewriteResult, RewriteSession};
use treeshift::storage::{CommitId, StoreHandle};

use common::TestRepo;

struct TagAndBranchRenames;

impl RewritePolicy for TagAndBranchRenames {
    fn rewrite_branch_name(&self, name: &str) -> RewriteResult<Option<String>> {
        Ok(match name {
            "scratch" => None,
            other => Some(other.to_string()),
        })
    }

    fn rewrite_tag_name(&self, name: &str) -> RewriteResult<Option<String>> {
        Ok(Some(format!("release-{}", name.trim_start_matches('v'))))
    }
}

#[test]
fn annotated_tag_follows_its_commit() {
    let repo = TestRepo::new();
    let commit = repo.commit("refs/heads/main", &[("a", b"a")], &[], "first\n");
    repo.annotated_tag("v1", commit, "first release\n");

    let session = RewriteSession::new(RewriteConfig::new(repo.path()), DefaultPolicy).unwrap();
    session.run().unwrap();
    let rewritten = session.mapped_commit(CommitId::new(commit)).unwrap().raw();

    let tag_id = repo.ref_target("refs/tags/v1").unwrap();
    let tag = repo.repo.find_tag(tag_id).unwrap();
    assert_eq!(tag.target_id(), rewritten);
    assert_eq!(tag.name(), Some("v1"));
    assert_eq!(tag.message(), Some("first release\n"));
    assert_eq!(tag.tagger().unwrap().name(), Some("Test User"));
}

#[test]
fn renamed_tags_and_dropped_branches() {
    let repo = TestRepo::new();
    let commit = repo.commit("refs/heads/main", &[("a", b"a")], &[], "first\n");
    repo.commit("refs/heads/scratch", &[("b", b"b")], &[commit], "wip\n");
    repo.annotated_tag("v2", commit, "annotated\n");
    repo.repo.reference("refs/tags/v3", commit, true, "lightweight").unwrap();
    repo.set_head("refs/heads/main");

    let session = RewriteSession::new(RewriteConfig::new(repo.path()), TagAndBranchRenames).unwrap();
    let report = session.run().unwrap();
    let rewritten = session.mapped_commit(CommitId::new(commit)).unwrap().raw();

    assert!(repo.repo.find_reference("refs/heads/scratch").is_err());
    assert!(repo.repo.find_reference("refs/tags/v2").is_err());
    assert!(repo.repo.find_reference("refs/tags/v3").is_err());

    let tag = repo.repo.find_tag(repo.ref_target("refs/tags/release-2").unwrap()).unwrap();
    assert_eq!(tag.name(), Some("release-2"));
    assert_eq!(tag.target_id(), rewritten);
    assert_eq!(repo.ref_target("refs/tags/release-3"), Some(rewritten));

    assert_eq!(report.refs_deleted, 1);
    // main, release-2, release-3; HEAD keeps pointing at main
    assert_eq!(report.refs_updated, 3);
    assert_eq!(report.refs_unchanged, 1);
}

#[test]
fn refs_outside_the_range_keep_their_target() {
    struct HideBase(git2::Oid);

    impl RewritePolicy for HideBase {
        fn uninteresting(&self, _handle: &StoreHandle<'_>) -> RewriteResult<Vec<CommitId>> {
            Ok(vec![CommitId::new(self.0)])
        }
    }

    let repo = TestRepo::new();
    let base = repo.commit("refs/heads/old", &[("a", b"a")], &[], "base\n");
    let tip = repo.commit("refs/heads/main", &[("a", b"b")], &[base], "tip\n");

    let session = RewriteSession::new(RewriteConfig::new(repo.path()), HideBase(base)).unwrap();
    let report = session.run().unwrap();

    assert_eq!(report.commits_rewritten, 1);
    assert_eq!(session.mapped_commit(CommitId::new(base)), None);
    assert_eq!(repo.ref_target("refs/heads/old"), Some(base));

    // the hidden parent is not part of the rewrite and is dropped
    let new_tip = repo.repo.find_commit(repo.ref_target("refs/heads/main").unwrap()).unwrap();
    assert_ne!(new_tip.id(), tip);
    assert_eq!(new_tip.parent_count(), 0);
}

#[test]
fn other_namespaces_are_left_alone() {
    let repo = TestRepo::new();
    let commit = repo.commit("refs/heads/main", &[("a", b"a")], &[], "first\n");
    repo.repo.reference("refs/remotes/origin/main", commit, true, "fetch").unwrap();

    let session = RewriteSession::new(RewriteConfig::new(repo.path()), DefaultPolicy).unwrap();
    session.run().unwrap();

    assert_eq!(repo.ref_target("refs/remotes/origin/main"), Some(commit));
    assert_ne!(repo.ref_target("refs/heads/main"), Some(commit));
}

#[test]
fn symbolic_chain_is_followed() {
    struct Rename;
    impl RewritePolicy for Rename {
        fn rewrite_branch_name(&self, name: &str) -> RewriteResult<Option<String>> {
            Ok(Some(name.replace("main", "trunk")))
        }
    }

    let repo = TestRepo::new();
    let commit = repo.commit("refs/heads/main", &[("a", b"a")], &[], "first\n");
    repo.repo
        .reference_symbolic("refs/heads/current", "refs/heads/main", true, "alias")
        .unwrap();
    repo.repo
        .reference_symbolic("HEAD", "refs/heads/current", true, "alias")
        .unwrap();

    let session = RewriteSession::new(RewriteConfig::new(repo.path()), Rename).unwrap();
    session.run().unwrap();
    let rewritten = session.mapped_commit(CommitId::new(commit)).unwrap().raw();

    assert_eq!(repo.symbolic_target("HEAD").as_deref(), Some("refs/heads/current"));
    assert_eq!(repo.symbolic_target("refs/heads/current").as_deref(), Some("refs/heads/trunk"));
    assert_eq!(repo.ref_target("refs/heads/trunk"), Some(rewritten));
}

#[test]
fn unborn_head_is_kept() {
    let repo = TestRepo::new();
    let session = RewriteSession::new(RewriteConfig::new(repo.path()), DefaultPolicy).unwrap();
    let report = session.run().unwrap();

    assert_eq!(report.commits_rewritten, 0);
    assert!(repo.symbolic_target("HEAD").is_some());
}

/// Swaps the names of branches `a` and `b`.
struct SwapBranches;

impl RewritePolicy for SwapBranches {
    fn rewrite_branch_name(&self, name: &str) -> RewriteResult<Option<String>> {
        Ok(Some(match name {
            "a" => "b".to_string(),
            "b" => "a".to_string(),
            other => other.to_string(),
        }))
    }
}

#[test]
fn swapped_branch_names_keep_both_histories() {
    let repo = TestRepo::new();
    let a = repo.commit("refs/heads/a", &[("a", b"a")], &[], "on a\n");
    let b = repo.commit("refs/heads/b", &[("b", b"b")], &[], "on b\n");

    let session = RewriteSession::new(RewriteConfig::new(repo.path()), SwapBranches).unwrap();
    let report = session.run().unwrap();
    let new_a = session.mapped_commit(CommitId::new(a)).unwrap().raw();
    let new_b = session.mapped_commit(CommitId::new(b)).unwrap().raw();

    assert_eq!(repo.ref_target("refs/heads/b"), Some(new_a));
    assert_eq!(repo.ref_target("refs/heads/a"), Some(new_b));
    assert_eq!(report.refs_updated, 2);
    assert_eq!(report.refs_deleted, 0);
}

#[test]
fn two_refs_renamed_to_one_name_are_rejected() {
    struct Merge;
    impl RewritePolicy for Merge {
        fn rewrite_branch_name(&self, _name: &str) -> RewriteResult<Option<String>> {
            Ok(Some("all".to_string()))
        }
    }

    let repo = TestRepo::new();
    let a = repo.commit("refs/heads/a", &[("a", b"a")], &[], "on a\n");
    let b = repo.commit("refs/heads/b", &[("b", b"b")], &[], "on b\n");

    let err = RewriteSession::new(RewriteConfig::new(repo.path()), Merge)
        .unwrap()
        .run()
        .unwrap_err();

    assert!(err.is_policy_failure());
    assert!(err.to_string().contains("refs/heads/all"));
    assert_eq!(repo.ref_target("refs/heads/a"), Some(a));
    assert_eq!(repo.ref_target("refs/heads/b"), Some(b));
    assert!(repo.ref_target("refs/heads/all").is_none());
}
