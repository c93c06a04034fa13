//! Investigation tests against a real Mercurial installation.
//!
//! Excluded from regular runs because they need `hg` on `PATH`.
//!
//! Run with: `cargo test -p hgdest --test investigation_hg -- --ignored`

use std::path::Path;
use std::process::Command;

use hgdest::destination::HgDestination;
use hgdest::io::config::DestinationConfig;
use hgdest::io::hg::{HgOptions, HgRepository};
use hgdest::test_support::{RecordingConsole, transform, workdir_with, write_files};

fn hg(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("hg")
        .args(args)
        .current_dir(dir)
        .env("HGPLAIN", "1")
        .output()
        .expect("run hg");
    assert!(
        output.status.success(),
        "hg {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
#[ignore = "requires hg"]
fn writes_and_pushes_to_local_remote() {
    let temp = tempfile::tempdir().expect("tempdir");
    let remote = temp.path().join("remote");
    std::fs::create_dir(&remote).expect("mkdir");
    hg(&remote, &["init"]);
    write_files(&remote, &[("a.txt", "old"), ("c.txt", "x")]).expect("seed");
    hg(&remote, &["add", "a.txt", "c.txt"]);
    hg(&remote, &["commit", "--user", "seed <seed@example.com>", "-m", "seed"]);

    let url = format!("file://{}", remote.display());
    let workdir = workdir_with(&temp, &[("a.txt", "new"), ("b.txt", "added")]).expect("workdir");
    let mut repo = HgRepository::new(temp.path().join("checkout"), HgOptions::default());

    let effect = HgDestination::new(DestinationConfig::for_url(&url))
        .expect("config")
        .new_writer(RecordingConsole::default())
        .write(&mut repo, &transform(&workdir))
        .expect("write");

    let tip = hg(&remote, &["log", "--rev", "tip", "--template", "{node}\n{desc}\n{files}"]);
    let mut lines = tip.lines();
    assert_eq!(lines.next(), Some(effect.destination_ref.id.as_str()));
    assert_eq!(lines.next(), Some("Import upstream changes"));
    assert!(tip.contains("GitOrigin-RevId: abc123"), "{tip}");
    let manifest = hg(&remote, &["manifest", "--rev", "tip"]);
    assert_eq!(manifest, "a.txt\nb.txt\n");
}
