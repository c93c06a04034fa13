//! Test-only helpers: an in-memory repository fake, a recording console, and
//! small tree utilities.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::DateTime;
use sha2::{Digest, Sha256};
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::console::Console;
use crate::core::types::{OriginRef, OriginRevision, TransformResult};
use crate::io::repository::{ARCHIVAL_FILE, RepoError, RepositoryHandle};

/// Write `files` (relative path, contents) under `root`, creating directories.
pub fn write_files(root: &Path, files: &[(&str, &str)]) -> io::Result<()> {
    fs::create_dir_all(root)?;
    for (path, contents) in files {
        let path = root.join(path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
    }
    Ok(())
}

/// Read every regular file under `root` (skipping a top-level `.hg`).
pub fn read_files(root: &Path) -> io::Result<BTreeMap<String, String>> {
    let mut files = BTreeMap::new();
    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !(e.depth() == 1 && e.file_name() == ".hg"));
    for entry in walker {
        let entry = entry.map_err(io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(io::Error::other)?
            .to_string_lossy()
            .replace('\\', "/");
        files.insert(relative, fs::read_to_string(entry.path())?);
    }
    Ok(files)
}

/// Deterministic transform rooted at `workdir`, carrying a git origin label.
pub fn transform(workdir: &Path) -> TransformResult {
    TransformResult {
        workdir: workdir.to_path_buf(),
        author: "Jane Doe <jane@example.com>".to_string(),
        timestamp: DateTime::parse_from_rfc3339("2024-03-01T12:00:00+01:00")
            .expect("fixed timestamp"),
        summary: "Import upstream changes".to_string(),
        origin_revision: Some(OriginRevision {
            label_name: "GitOrigin-RevId".to_string(),
            value: "abc123".to_string(),
        }),
        changes: vec![OriginRef::new("abc123")],
    }
}

/// A committed revision in a [`FakeRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeRevision {
    pub id: String,
    pub files: BTreeMap<String, String>,
    pub user: Option<String>,
    pub date: Option<String>,
    pub message: Option<String>,
}

/// A push recorded by a [`FakeRepository`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakePush {
    /// Tip id at the time of the push.
    pub tip: String,
    pub reference: String,
    pub url: String,
}

#[derive(Debug, Clone)]
struct FakeCommand {
    args: Vec<String>,
    ok: bool,
}

/// In-memory stand-in for an `hg` checkout.
///
/// The working copy lives in a real temporary directory so the reconciler can
/// copy files into it; history, tracking, and the remote are simulated.
#[derive(Debug)]
pub struct FakeRepository {
    dir: TempDir,
    remote_refs: BTreeSet<String>,
    /// References fetched into the local repository by a successful pull.
    local_refs: BTreeSet<String>,
    revisions: Vec<FakeRevision>,
    tracked: BTreeSet<String>,
    failures: BTreeMap<String, String>,
    pushes: Vec<FakePush>,
    commands: RefCell<Vec<FakeCommand>>,
}

impl FakeRepository {
    /// Repository whose single revision (and remote `default`) holds `files`.
    pub fn with_files(files: &[(&str, &str)]) -> io::Result<Self> {
        let dir = tempfile::tempdir()?;
        fs::create_dir_all(dir.path().join(".hg"))?;
        write_files(dir.path(), files)?;
        let files: BTreeMap<String, String> = files
            .iter()
            .map(|(path, contents)| (path.to_string(), contents.to_string()))
            .collect();
        let initial = FakeRevision {
            id: revision_id("", "initial", &files),
            files,
            user: None,
            date: None,
            message: None,
        };
        Ok(Self {
            dir,
            remote_refs: BTreeSet::from(["default".to_string()]),
            local_refs: BTreeSet::new(),
            tracked: initial.files.keys().cloned().collect(),
            revisions: vec![initial],
            failures: BTreeMap::new(),
            pushes: Vec::new(),
            commands: RefCell::new(Vec::new()),
        })
    }

    /// Record `reference` as already fetched, as a cached checkout from an
    /// earlier write would have it.
    pub fn mark_pulled(&mut self, reference: &str) {
        self.local_refs.insert(reference.to_string());
    }

    /// Make every invocation of `subcommand` fail with `stderr`.
    ///
    /// Applies to `run` subcommands and to `pull`, `update`, `archive`, `identify`.
    pub fn fail_command(&mut self, subcommand: &str, stderr: &str) {
        self.failures
            .insert(subcommand.to_string(), stderr.to_string());
    }

    /// Drop `reference` from the simulated remote.
    pub fn remove_remote_ref(&mut self, reference: &str) {
        self.remote_refs.remove(reference);
    }

    /// Modify the working copy as an aborted earlier write would have.
    pub fn dirty_checkout(&mut self, files: &[(&str, &str)]) -> io::Result<()> {
        write_files(self.dir.path(), files)?;
        for (path, _) in files {
            self.tracked.insert(path.to_string());
        }
        Ok(())
    }

    pub fn revisions(&self) -> &[FakeRevision] {
        &self.revisions
    }

    pub fn tip_revision(&self) -> &FakeRevision {
        // `with_files` always creates the initial revision.
        &self.revisions[self.revisions.len() - 1]
    }

    pub fn pushes(&self) -> &[FakePush] {
        &self.pushes
    }

    pub fn is_tracked(&self, path: &str) -> bool {
        self.tracked.contains(path)
    }

    /// Subcommand names in invocation order, including failed ones.
    pub fn command_names(&self) -> Vec<String> {
        self.commands
            .borrow()
            .iter()
            .filter_map(|c| c.args.first().cloned())
            .collect()
    }

    /// Full argument lists of invocations named `subcommand`.
    pub fn invocations(&self, subcommand: &str) -> Vec<Vec<String>> {
        self.commands
            .borrow()
            .iter()
            .filter(|c| c.args.first().map(String::as_str) == Some(subcommand))
            .map(|c| c.args.clone())
            .collect()
    }

    /// Successful invocations that changed tracking, history, or the remote.
    pub fn successful_mutations(&self) -> Vec<Vec<String>> {
        self.commands
            .borrow()
            .iter()
            .filter(|c| c.ok)
            .filter(|c| {
                matches!(
                    c.args.first().map(String::as_str),
                    Some("add" | "remove" | "commit" | "push")
                )
            })
            .map(|c| c.args.clone())
            .collect()
    }

    fn record(&self, args: &[&str], ok: bool) {
        self.commands.borrow_mut().push(FakeCommand {
            args: args.iter().map(|a| a.to_string()).collect(),
            ok,
        });
    }

    fn check_failure(&self, args: &[&str]) -> Result<(), RepoError> {
        let name = args.first().copied().unwrap_or_default();
        if let Some(stderr) = self.failures.get(name) {
            self.record(args, false);
            return Err(RepoError::Command {
                command: args.join(" "),
                stderr: stderr.clone(),
                exit_code: Some(255),
            });
        }
        Ok(())
    }

    fn io_err(&self, source: io::Error) -> RepoError {
        RepoError::Io {
            path: self.dir.path().to_path_buf(),
            source,
        }
    }

    fn add(&mut self, paths: &[&str]) -> Result<(), String> {
        for path in paths {
            if fs::symlink_metadata(self.dir.path().join(path)).is_err() {
                return Err(format!("{path}: No such file or directory"));
            }
            self.tracked.insert(path.to_string());
        }
        Ok(())
    }

    fn remove(&mut self, paths: &[&str]) -> Result<(), String> {
        for path in paths {
            let full = self.dir.path().join(path);
            if fs::symlink_metadata(&full).is_err() {
                return Err(format!("{path}: No such file or directory"));
            }
            if !self.tracked.contains(*path) {
                return Err(format!("not removing {path}: file is untracked"));
            }
            fs::remove_file(&full).map_err(|e| e.to_string())?;
            self.tracked.remove(*path);
        }
        Ok(())
    }

    fn commit(&mut self, args: &[&str]) -> Result<(), String> {
        let mut files = BTreeMap::new();
        for path in &self.tracked {
            let contents = fs::read_to_string(self.dir.path().join(path))
                .map_err(|e| format!("{path}: {e}"))?;
            files.insert(path.clone(), contents);
        }
        let message = flag_value(args, "-m");
        let parent = self.tip_revision().id.clone();
        let id = revision_id(&parent, message.unwrap_or_default(), &files);
        self.revisions.push(FakeRevision {
            id,
            files,
            user: flag_value(args, "--user").map(str::to_string),
            date: flag_value(args, "--date").map(str::to_string),
            message: message.map(str::to_string),
        });
        Ok(())
    }

    fn push(&mut self, args: &[&str]) -> Result<(), String> {
        let reference = flag_value(args, "--rev").unwrap_or("default").to_string();
        let url = args
            .last()
            .filter(|arg| !arg.starts_with('-') && **arg != reference)
            .map(|arg| arg.to_string())
            .unwrap_or_default();
        self.pushes.push(FakePush {
            tip: self.tip_revision().id.clone(),
            reference,
            url,
        });
        Ok(())
    }
}

impl RepositoryHandle for FakeRepository {
    fn checkout_dir(&self) -> &Path {
        self.dir.path()
    }

    fn pull(&mut self, url: &str, reference: &str) -> Result<(), RepoError> {
        let args = ["pull", "--rev", reference, url];
        self.check_failure(&args)?;
        if !self.remote_refs.contains(reference) {
            self.record(&args, false);
            return Err(RepoError::CannotResolveReference {
                reference: reference.to_string(),
                url: url.to_string(),
            });
        }
        self.local_refs.insert(reference.to_string());
        self.record(&args, true);
        Ok(())
    }

    fn clean_update(&mut self, reference: &str) -> Result<(), RepoError> {
        let args = ["update", "--clean", "--rev", reference];
        self.check_failure(&args)?;
        if !self.local_refs.contains(reference) {
            self.record(&args, false);
            return Err(RepoError::Command {
                command: args.join(" "),
                stderr: format!("abort: unknown revision '{reference}'"),
                exit_code: Some(255),
            });
        }
        for entry in fs::read_dir(self.dir.path()).map_err(|e| self.io_err(e))? {
            let entry = entry.map_err(|e| self.io_err(e))?;
            if entry.file_name() == ".hg" {
                continue;
            }
            let path = entry.path();
            let removed = if entry.file_type().map_err(|e| self.io_err(e))?.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|e| self.io_err(e))?;
        }
        let tip = self.tip_revision().clone();
        for (path, contents) in &tip.files {
            write_files(self.dir.path(), &[(path.as_str(), contents.as_str())])
                .map_err(|e| self.io_err(e))?;
        }
        self.tracked = tip.files.keys().cloned().collect();
        self.record(&args, true);
        Ok(())
    }

    fn snapshot(&self, dest: &Path) -> Result<(), RepoError> {
        let dest_arg = dest.to_string_lossy();
        let args = ["archive", "--type", "files", dest_arg.as_ref()];
        self.check_failure(&args)?;
        let tip = self.tip_revision();
        for (path, contents) in &tip.files {
            write_files(dest, &[(path.as_str(), contents.as_str())]).map_err(|e| self.io_err(e))?;
        }
        let archival = format!("repo: fake\nnode: {}\nbranch: default\n", tip.id);
        fs::write(dest.join(ARCHIVAL_FILE), archival).map_err(|e| self.io_err(e))?;
        self.record(&args, true);
        Ok(())
    }

    fn run(&mut self, args: &[&str]) -> Result<String, RepoError> {
        self.check_failure(args)?;
        let rest: Vec<&str> = args.iter().skip(1).copied().collect();
        let paths: Vec<&str> = rest
            .iter()
            .copied()
            .filter(|a| *a != "--")
            .map(|a| a.strip_prefix("path:").unwrap_or(a))
            .collect();
        let result = match args.first().copied() {
            Some("add") => self.add(&paths),
            Some("remove") => self.remove(&paths),
            Some("commit") => self.commit(&rest),
            Some("push") => self.push(&rest),
            _ => Ok(()),
        };
        match result {
            Ok(()) => {
                self.record(args, true);
                Ok(String::new())
            }
            Err(stderr) => {
                self.record(args, false);
                Err(RepoError::Command {
                    command: args.join(" "),
                    stderr,
                    exit_code: Some(1),
                })
            }
        }
    }

    fn identify(&self, reference: &str) -> Result<String, RepoError> {
        let args = ["identify", "--rev", reference];
        self.check_failure(&args)?;
        if reference != "tip" && reference != "." && !self.remote_refs.contains(reference) {
            self.record(&args, false);
            return Err(RepoError::Command {
                command: args.join(" "),
                stderr: format!("abort: unknown revision '{reference}'"),
                exit_code: Some(255),
            });
        }
        self.record(&args, true);
        Ok(self.tip_revision().id.clone())
    }
}

fn flag_value<'a>(args: &[&'a str], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| *arg == flag)
        .and_then(|i| args.get(i + 1))
        .copied()
}

fn revision_id(parent: &str, message: &str, files: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(parent.as_bytes());
    hasher.update(message.as_bytes());
    for (path, contents) in files {
        hasher.update(path.as_bytes());
        hasher.update([0]);
        hasher.update(contents.as_bytes());
        hasher.update([0]);
    }
    let mut id = hex::encode(hasher.finalize());
    id.truncate(40);
    id
}

/// Console that records messages for assertions.
#[derive(Debug, Default)]
pub struct RecordingConsole {
    progress: RefCell<Vec<String>>,
    warnings: RefCell<Vec<String>>,
}

impl RecordingConsole {
    pub fn progress_messages(&self) -> Vec<String> {
        self.progress.borrow().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.borrow().clone()
    }
}

impl Console for RecordingConsole {
    fn progress(&self, message: &str) {
        self.progress.borrow_mut().push(message.to_string());
    }

    fn warn(&self, message: &str) {
        self.warnings.borrow_mut().push(message.to_string());
    }
}

/// Workdir directory inside `temp` named `workdir`, populated with `files`.
pub fn workdir_with(temp: &TempDir, files: &[(&str, &str)]) -> io::Result<PathBuf> {
    let workdir = temp.path().join("workdir");
    write_files(&workdir, files)?;
    Ok(workdir)
}
