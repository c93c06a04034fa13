//! End-to-end write scenarios against the in-memory repository.
//!
//! Each test drives `SyncWriter::write` through pull, clean update,
//! reconciliation, commit, and push, and checks what reached the fake remote.

use std::fs;

use hgdest::ErrorKind;
use hgdest::core::types::EffectType;
use hgdest::destination::HgDestination;
use hgdest::io::config::DestinationConfig;
use hgdest::io::hgrc::hgrc_path;
use hgdest::io::repository::RepositoryHandle;
use hgdest::io::snapshot::SNAPSHOT_PREFIX;
use hgdest::test_support::{FakeRepository, RecordingConsole, read_files, transform, workdir_with};

const URL: &str = "file:///srv/hg/dest";

fn destination(force: bool) -> HgDestination {
    let mut cfg = DestinationConfig::for_url(URL);
    cfg.force = force;
    HgDestination::new(cfg).expect("valid config")
}

/// R0 = {a.txt=old, c.txt=x}, workdir = {a.txt=new, b.txt=added}.
///
/// Expected: add b.txt, overwrite a.txt, remove c.txt, one commit, one push,
/// and a `Created` effect naming the new tip.
#[test]
fn write_adds_modifies_removes_commits_and_pushes() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workdir =
        workdir_with(&temp, &[("a.txt", "new"), ("b.txt", "added")]).expect("workdir");
    let mut repo = FakeRepository::with_files(&[("a.txt", "old"), ("c.txt", "x")]).expect("repo");
    let console = RecordingConsole::default();

    let effect = destination(false)
        .new_writer(&console)
        .write(&mut repo, &transform(&workdir))
        .expect("write");

    let mutations: Vec<String> = repo
        .successful_mutations()
        .iter()
        .map(|args| args.join(" "))
        .collect();
    assert_eq!(mutations.len(), 4, "{mutations:?}");
    assert_eq!(mutations[0], "add -- path:b.txt");
    assert_eq!(mutations[1], "remove -- path:c.txt");
    assert!(mutations[2].starts_with("commit --user Jane Doe <jane@example.com> --date "));
    assert_eq!(mutations[3], format!("push --rev default {URL}"));

    let tip = repo.tip_revision();
    assert_eq!(repo.revisions().len(), 2);
    assert_eq!(tip.files.get("a.txt").map(String::as_str), Some("new"));
    assert_eq!(tip.files.get("b.txt").map(String::as_str), Some("added"));
    assert!(!tip.files.contains_key("c.txt"));
    assert_eq!(
        tip.message.as_deref(),
        Some("Import upstream changes\n\nGitOrigin-RevId: abc123\n")
    );

    assert_eq!(repo.pushes().len(), 1);
    assert_eq!(repo.pushes()[0].tip, tip.id);
    assert_eq!(repo.pushes()[0].url, URL);

    assert_eq!(effect.effect_type, EffectType::Created);
    assert_eq!(effect.destination_ref.id, tip.id);
    assert_eq!(effect.destination_ref.kind, "commit");
    assert_eq!(effect.destination_ref.url, URL);
    assert_eq!(effect.summary, format!("Created revision {}", tip.id));
    assert_eq!(effect.origin_refs.len(), 1);
    assert_eq!(effect.origin_refs[0].id, "abc123");
    assert!(console.warnings().is_empty());
}

#[test]
fn effect_serializes_with_type_tag() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workdir = workdir_with(&temp, &[("a.txt", "new")]).expect("workdir");
    let mut repo = FakeRepository::with_files(&[]).expect("repo");

    let effect = destination(false)
        .new_writer(RecordingConsole::default())
        .write(&mut repo, &transform(&workdir))
        .expect("write");
    let json = serde_json::to_value(&effect).expect("json");
    assert_eq!(json["type"], "CREATED");
    assert_eq!(json["destination_ref"]["kind"], "commit");
}

#[test]
fn missing_fetch_ref_without_force_is_validation_error() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workdir = workdir_with(&temp, &[("a.txt", "new")]).expect("workdir");
    let mut repo = FakeRepository::with_files(&[("a.txt", "old")]).expect("repo");
    repo.remove_remote_ref("default");

    let err = destination(false)
        .new_writer(RecordingConsole::default())
        .write(&mut repo, &transform(&workdir))
        .expect_err("ref missing");

    assert_eq!(err.kind(), ErrorKind::Validation);
    let message = err.to_string();
    assert!(message.contains("'default' doesn't exist in"), "{message}");
    assert!(message.contains("--force"), "{message}");
    assert_eq!(repo.command_names(), vec!["pull"]);
    assert!(repo.successful_mutations().is_empty());
}

#[test]
fn missing_fetch_ref_with_force_continues_on_cached_checkout() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workdir = workdir_with(&temp, &[("a.txt", "new")]).expect("workdir");
    let mut repo = FakeRepository::with_files(&[("a.txt", "old")]).expect("repo");
    repo.mark_pulled("default");
    repo.remove_remote_ref("default");
    let console = RecordingConsole::default();

    let effect = destination(true)
        .new_writer(&console)
        .write(&mut repo, &transform(&workdir))
        .expect("forced write");

    assert_eq!(console.warnings().len(), 1);
    assert!(console.warnings()[0].contains("doesn't exist"));
    assert_eq!(repo.pushes().len(), 1);
    assert_eq!(effect.destination_ref.id, repo.tip_revision().id);
}

/// `--force` only skips the pull failure. A fresh cache that never fetched the
/// reference cannot check it out, so the write still fails.
#[test]
fn missing_fetch_ref_with_force_fails_on_fresh_cache() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workdir = workdir_with(&temp, &[("a.txt", "new")]).expect("workdir");
    let mut repo = FakeRepository::with_files(&[("a.txt", "old")]).expect("repo");
    repo.remove_remote_ref("default");
    let console = RecordingConsole::default();

    let err = destination(true)
        .new_writer(&console)
        .write(&mut repo, &transform(&workdir))
        .expect_err("nothing to check out");

    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(err.to_string().contains("unknown revision 'default'"), "{err}");
    assert_eq!(console.warnings().len(), 1);
    assert_eq!(repo.command_names(), vec!["pull", "update"]);
    assert!(repo.successful_mutations().is_empty());
}

#[test]
fn reconcile_failure_prevents_commit_and_push() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workdir = workdir_with(&temp, &[("b.txt", "added")]).expect("workdir");
    let mut repo = FakeRepository::with_files(&[("a.txt", "old")]).expect("repo");
    repo.fail_command("add", "abort: lock held by another process");

    let err = destination(false)
        .new_writer(RecordingConsole::default())
        .write(&mut repo, &transform(&workdir))
        .expect_err("add fails");

    assert_eq!(err.kind(), ErrorKind::Execution);
    let names = repo.command_names();
    assert!(!names.iter().any(|c| c == "commit"), "{names:?}");
    assert!(!names.iter().any(|c| c == "push"), "{names:?}");
    assert_eq!(repo.revisions().len(), 1);
}

#[test]
fn commit_failure_prevents_push() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workdir = workdir_with(&temp, &[("a.txt", "new")]).expect("workdir");
    let mut repo = FakeRepository::with_files(&[("a.txt", "old")]).expect("repo");
    repo.fail_command("commit", "abort: no username supplied");

    let err = destination(false)
        .new_writer(RecordingConsole::default())
        .write(&mut repo, &transform(&workdir))
        .expect_err("commit fails");

    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(!repo.command_names().iter().any(|c| c == "push"));
    assert!(repo.pushes().is_empty());
}

#[test]
fn snapshot_directory_is_removed_on_success_and_failure() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workdir = workdir_with(&temp, &[("a.txt", "new")]).expect("workdir");

    let mut ok_repo = FakeRepository::with_files(&[("a.txt", "old")]).expect("repo");
    destination(false)
        .new_writer(RecordingConsole::default())
        .write(&mut ok_repo, &transform(&workdir))
        .expect("write");
    assert_eq!(snapshot_dirs(temp.path()), 0);

    let mut failing_repo = FakeRepository::with_files(&[("c.txt", "x")]).expect("repo");
    failing_repo.fail_command("add", "abort: disk quota exceeded");
    destination(false)
        .new_writer(RecordingConsole::default())
        .write(&mut failing_repo, &transform(&workdir))
        .expect_err("add fails");
    assert_eq!(snapshot_dirs(temp.path()), 0);
}

#[test]
fn hgrc_points_default_path_at_destination() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workdir = workdir_with(&temp, &[("a.txt", "new")]).expect("workdir");
    let mut repo = FakeRepository::with_files(&[]).expect("repo");

    destination(false)
        .new_writer(RecordingConsole::default())
        .write(&mut repo, &transform(&workdir))
        .expect("write");

    let hgrc = fs::read_to_string(hgrc_path(repo.checkout_dir())).expect("hgrc");
    assert_eq!(hgrc, format!("[paths]\ndefault = {URL}\n"));
}

#[test]
fn stale_trailer_value_is_replaced_not_duplicated() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workdir = workdir_with(&temp, &[("a.txt", "new")]).expect("workdir");
    let mut repo = FakeRepository::with_files(&[]).expect("repo");
    let mut t = transform(&workdir);
    t.summary = "Import upstream changes\n\nGitOrigin-RevId: stale000\nReviewed-by: kim".to_string();

    destination(false)
        .new_writer(RecordingConsole::default())
        .write(&mut repo, &t)
        .expect("write");

    assert_eq!(
        repo.tip_revision().message.as_deref(),
        Some("Import upstream changes\n\nGitOrigin-RevId: abc123\nReviewed-by: kim\n")
    );
}

#[test]
fn residue_from_an_aborted_write_is_discarded() {
    let temp = tempfile::tempdir().expect("tempdir");
    let workdir = workdir_with(&temp, &[("a.txt", "new")]).expect("workdir");
    let mut repo = FakeRepository::with_files(&[("a.txt", "old")]).expect("repo");
    repo.dirty_checkout(&[("leftover.txt", "half-applied")])
        .expect("dirty");

    destination(false)
        .new_writer(RecordingConsole::default())
        .write(&mut repo, &transform(&workdir))
        .expect("write");

    let tip = repo.tip_revision();
    assert!(!tip.files.contains_key("leftover.txt"));
    let checkout = read_files(repo.checkout_dir()).expect("read");
    assert_eq!(checkout.keys().collect::<Vec<_>>(), vec!["a.txt"]);
}

fn snapshot_dirs(parent: &std::path::Path) -> usize {
    fs::read_dir(parent)
        .expect("read_dir")
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with(SNAPSHOT_PREFIX))
        .count()
}
