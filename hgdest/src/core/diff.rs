//! Deterministic classification of differences between two file manifests.
//!
//! A manifest maps every file path of a tree to a content [`Fingerprint`].
//! Diffing a snapshot manifest against a workdir manifest yields exactly one
//! [`DiffEntry`] per differing path:
//!
//! - only in the workdir → [`DiffOp::Add`]
//! - only in the snapshot → [`DiffOp::Delete`]
//! - in both with different fingerprints → [`DiffOp::Modified`]
//!
//! Identical paths produce no entry.

use std::collections::BTreeMap;

use crate::core::types::{DiffEntry, DiffOp};

/// Content identity of a single tree entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fingerprint {
    /// Regular file: hex SHA-256 of the bytes plus the executable bit.
    File { digest: String, executable: bool },
    /// Symbolic link, compared by target.
    Symlink { target: String },
}

/// Relative path (`/`-separated) → fingerprint, ordered by path.
pub type Manifest = BTreeMap<String, Fingerprint>;

/// Compute the diff between `snapshot` and `workdir`, ordered by path.
pub fn diff_manifests(snapshot: &Manifest, workdir: &Manifest) -> Vec<DiffEntry> {
    let mut entries = Vec::new();

    for (path, fingerprint) in workdir {
        match snapshot.get(path) {
            None => entries.push(DiffEntry {
                path: path.clone(),
                op: DiffOp::Add,
            }),
            Some(existing) if existing != fingerprint => entries.push(DiffEntry {
                path: path.clone(),
                op: DiffOp::Modified,
            }),
            Some(_) => {}
        }
    }
    for path in snapshot.keys() {
        if !workdir.contains_key(path) {
            entries.push(DiffEntry {
                path: path.clone(),
                op: DiffOp::Delete,
            });
        }
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    entries
}

/// Order entries for application: all adds, then modifications, then deletes.
///
/// Within one operation, entries keep path order.
pub fn in_apply_order(entries: &[DiffEntry]) -> Vec<&DiffEntry> {
    let mut ordered: Vec<&DiffEntry> = entries.iter().collect();
    ordered.sort_by(|a, b| a.op.cmp(&b.op).then_with(|| a.path.cmp(&b.path)));
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn file(digest: &str) -> Fingerprint {
        Fingerprint::File {
            digest: digest.to_string(),
            executable: false,
        }
    }

    fn manifest(entries: &[(&str, Fingerprint)]) -> Manifest {
        entries
            .iter()
            .map(|(path, fp)| (path.to_string(), fp.clone()))
            .collect()
    }

    #[test]
    fn identical_manifests_produce_no_entries() {
        let tree = manifest(&[("a.txt", file("1")), ("dir/b.txt", file("2"))]);
        assert!(diff_manifests(&tree, &tree).is_empty());
    }

    #[test]
    fn classifies_add_modify_delete() {
        let snapshot = manifest(&[("a.txt", file("old")), ("c.txt", file("x"))]);
        let workdir = manifest(&[("a.txt", file("new")), ("b.txt", file("added"))]);

        let diff = diff_manifests(&snapshot, &workdir);
        assert_eq!(
            diff,
            vec![
                DiffEntry {
                    path: "a.txt".to_string(),
                    op: DiffOp::Modified
                },
                DiffEntry {
                    path: "b.txt".to_string(),
                    op: DiffOp::Add
                },
                DiffEntry {
                    path: "c.txt".to_string(),
                    op: DiffOp::Delete
                },
            ]
        );
    }

    #[test]
    fn every_differing_path_appears_exactly_once() {
        let snapshot = manifest(&[
            ("same", file("s")),
            ("changed", file("1")),
            ("gone", file("g")),
            ("gone/too", file("g2")),
            ("mode", file("m")),
        ]);
        let workdir = manifest(&[
            ("same", file("s")),
            ("changed", file("2")),
            ("new", file("n")),
            (
                "mode",
                Fingerprint::File {
                    digest: "m".to_string(),
                    executable: true,
                },
            ),
        ]);

        let diff = diff_manifests(&snapshot, &workdir);
        let paths: Vec<&str> = diff.iter().map(|e| e.path.as_str()).collect();
        let unique: BTreeSet<&str> = paths.iter().copied().collect();
        assert_eq!(paths.len(), unique.len(), "paths must be unique");
        assert_eq!(
            unique,
            BTreeSet::from(["changed", "gone", "gone/too", "mode", "new"])
        );
        assert!(!unique.contains("same"));
    }

    #[test]
    fn file_replaced_by_symlink_is_modified() {
        let snapshot = manifest(&[("link", file("abc"))]);
        let workdir = manifest(&[(
            "link",
            Fingerprint::Symlink {
                target: "a.txt".to_string(),
            },
        )]);
        let diff = diff_manifests(&snapshot, &workdir);
        assert_eq!(diff.len(), 1);
        assert_eq!(diff[0].op, DiffOp::Modified);
    }

    #[test]
    fn apply_order_groups_by_operation() {
        let snapshot = manifest(&[("a", file("1")), ("z", file("z"))]);
        let workdir = manifest(&[("a", file("2")), ("b", file("b")), ("c", file("c"))]);

        let diff = diff_manifests(&snapshot, &workdir);
        let ordered: Vec<(DiffOp, &str)> = in_apply_order(&diff)
            .into_iter()
            .map(|e| (e.op, e.path.as_str()))
            .collect();
        assert_eq!(
            ordered,
            vec![
                (DiffOp::Add, "b"),
                (DiffOp::Add, "c"),
                (DiffOp::Modified, "a"),
                (DiffOp::Delete, "z"),
            ]
        );
    }
}
