//! Tree scanning: find files with conflict markers and rewrite them.
//!
//! The [`Scanner`] walks a root directory sequentially, asks the
//! [`FilePolicy`] which files to read, pre-checks each for marker lines, runs
//! the [`Resolver`] on the ones that have them, and writes the result back in
//! place. Per-file failures are recorded in the [`ScanReport`] and never stop
//! the walk.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::conflict::detector;
use crate::conflict::resolver::{ResolveOptions, Resolver};
use crate::errors::ScanError;
use crate::file_policy::FilePolicy;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// What happened to one file that had markers or could not be processed.
#[derive(Debug)]
pub enum FileOutcome {
    /// Markers were found and resolved (and written, unless dry-run).
    Resolved {
        path: PathBuf,
        blocks: usize,
        stray_markers: usize,
        converged: bool,
    },
    /// The file (or a directory) could not be read or written.
    Failed { path: PathBuf, error: ScanError },
}

impl FileOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::Resolved { path, .. } | Self::Failed { path, .. } => path,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Summary of a whole scan.
#[derive(Debug, Default)]
pub struct ScanReport {
    /// Per-file outcomes, in walk order. Clean files are not listed.
    pub outcomes: Vec<FileOutcome>,
    /// Files the policy allowed and that were read.
    pub files_visited: usize,
    /// Files rejected by the policy (extension, ignore pattern, size).
    pub files_skipped: usize,
    /// No file was written.
    pub dry_run: bool,
}

impl ScanReport {
    pub fn resolved(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.is_failure())
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.is_failure())
    }

    pub fn resolved_count(&self) -> usize {
        self.resolved().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// No file had markers and none failed. Unreadable files do not count
    /// as clean.
    pub fn is_clean(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Total conflict blocks collapsed across all files.
    pub fn blocks_resolved(&self) -> usize {
        self.outcomes
            .iter()
            .map(|o| match o {
                FileOutcome::Resolved { blocks, .. } => *blocks,
                FileOutcome::Failed { .. } => 0,
            })
            .sum()
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Writes resolved content back to a file.
type WriteBack = fn(&Path, &str) -> std::io::Result<()>;

/// Sequential tree scanner.
#[derive(Clone)]
pub struct Scanner {
    policy: FilePolicy,
    resolver: Resolver,
    dry_run: bool,
    write_back: WriteBack,
}

impl std::fmt::Debug for Scanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scanner")
            .field("policy", &self.policy)
            .field("resolver", &self.resolver)
            .field("dry_run", &self.dry_run)
            .finish_non_exhaustive()
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new(FilePolicy::default(), ResolveOptions::default())
    }
}

impl Scanner {
    pub fn new(policy: FilePolicy, options: ResolveOptions) -> Self {
        Self {
            policy,
            resolver: Resolver::new(options),
            dry_run: false,
            write_back: write_atomic,
        }
    }

    /// Resolve in memory only; never write files back.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Scan `root` and return the report.
    pub fn scan(&self, root: &Path) -> Result<ScanReport, ScanError> {
        self.scan_with(root, |_| {})
    }

    /// Scan `root`, calling `on_file` as soon as each outcome is known.
    ///
    /// Fails only when `root` itself is missing, not a directory, or cannot
    /// be listed.
    pub fn scan_with<F>(&self, root: &Path, mut on_file: F) -> Result<ScanReport, ScanError>
    where
        F: FnMut(&FileOutcome),
    {
        if !root.exists() {
            return Err(ScanError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        info!(
            root = %root.display(),
            dry_run = self.dry_run,
            prefer = %self.resolver.options().prefer,
            "starting scan"
        );

        let mut report = ScanReport {
            dry_run: self.dry_run,
            ..Default::default()
        };
        let entries = read_dir_sorted(root)?;
        self.walk_entries(root, entries, &mut report, &mut on_file);

        info!(
            visited = report.files_visited,
            skipped = report.files_skipped,
            resolved = report.resolved_count(),
            failed = report.failure_count(),
            "scan complete"
        );
        Ok(report)
    }

    fn walk_entries<F>(
        &self,
        root: &Path,
        entries: Vec<std::fs::DirEntry>,
        report: &mut ScanReport,
        on_file: &mut F,
    ) where
        F: FnMut(&FileOutcome),
    {
        for entry in entries {
            let path = entry.path();
            let file_type = match entry.file_type() {
                Ok(ft) => ft,
                Err(source) => {
                    record(report, on_file, FileOutcome::Failed {
                        error: ScanError::Read {
                            path: path.clone(),
                            source,
                        },
                        path,
                    });
                    continue;
                }
            };

            // Replacing a symlink with a regular file would break the link;
            // leave them alone.
            if file_type.is_symlink() {
                debug!(path = %path.display(), "skipping symlink");
                continue;
            }

            if file_type.is_dir() {
                let name = entry.file_name();
                if self.policy.is_excluded_dir(&name.to_string_lossy()) {
                    debug!(path = %path.display(), "skipping excluded directory");
                    continue;
                }
                match read_dir_sorted(&path) {
                    Ok(children) => self.walk_entries(root, children, report, on_file),
                    Err(error) => record(report, on_file, FileOutcome::Failed { path, error }),
                }
                continue;
            }

            let rel = relative_path(root, &path);
            let decision = self.policy.evaluate_path(root, &rel);
            if !decision.should_scan() {
                debug!(path = %rel, decision = decision.label(), "file skipped");
                report.files_skipped += 1;
                continue;
            }

            report.files_visited += 1;
            if let Some(outcome) = self.process_file(&path) {
                record(report, on_file, outcome);
            }
        }
    }

    /// Read, resolve and write back one file. Returns `None` for files
    /// without markers.
    fn process_file(&self, path: &Path) -> Option<FileOutcome> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(source) => {
                return Some(FileOutcome::Failed {
                    path: path.to_path_buf(),
                    error: ScanError::Read {
                        path: path.to_path_buf(),
                        source,
                    },
                });
            }
        };

        if !detector::has_conflict_markers(&content) {
            return None;
        }

        info!(path = %path.display(), "cleaning conflict markers");
        let resolution = self.resolver.resolve(&content);
        if !resolution.converged {
            warn!(
                path = %path.display(),
                "pass bound reached; residual markers were swept and the result may be partial"
            );
        }

        if !self.dry_run {
            if let Err(source) = (self.write_back)(path, &resolution.content) {
                return Some(FileOutcome::Failed {
                    path: path.to_path_buf(),
                    error: ScanError::Write {
                        path: path.to_path_buf(),
                        source,
                    },
                });
            }
        }

        Some(FileOutcome::Resolved {
            path: path.to_path_buf(),
            blocks: resolution.blocks_resolved,
            stray_markers: resolution.stray_markers_removed,
            converged: resolution.converged,
        })
    }
}

fn record<F: FnMut(&FileOutcome)>(report: &mut ScanReport, on_file: &mut F, outcome: FileOutcome) {
    if let FileOutcome::Failed { path, error } = &outcome {
        warn!(path = %path.display(), error = %error, "file failed");
    }
    on_file(&outcome);
    report.outcomes.push(outcome);
}

/// List a directory with entries sorted by name, for a stable walk order.
fn read_dir_sorted(dir: &Path) -> Result<Vec<std::fs::DirEntry>, ScanError> {
    let read_dir_err = |source: std::io::Error| ScanError::ReadDir {
        path: dir.to_path_buf(),
        source,
    };
    let mut entries = std::fs::read_dir(dir)
        .map_err(read_dir_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_dir_err)?;
    entries.sort_by_key(|e| e.file_name());
    Ok(entries)
}

/// `path` relative to `root`, forward-slash separated.
fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Replace `path` with `content` via a temporary file in the same directory,
/// so a crash never leaves a half-written file. Permissions are carried over.
fn write_atomic(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    let permissions = std::fs::metadata(path)?.permissions();
    tmp.as_file().set_permissions(permissions)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::resolver::Side;

    const CONFLICTED: &str = "a\n<<<<<<< HEAD\nold\n=======\nnew\n>>>>>>> 1a2b3c\nz\n";

    fn write(root: &Path, rel: &str, content: &str) -> PathBuf {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_resolves_and_writes_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "src/app.js", CONFLICTED);

        let report = Scanner::default().scan(dir.path()).unwrap();
        assert_eq!(report.resolved_count(), 1);
        assert_eq!(report.blocks_resolved(), 1);
        assert_eq!(report.outcomes[0].path(), path.as_path());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nnew\nz\n");
    }

    #[test]
    fn test_prefer_ours() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "index.html", CONFLICTED);

        let options = ResolveOptions {
            prefer: Side::Ours,
            ..Default::default()
        };
        Scanner::new(FilePolicy::default(), options)
            .scan(dir.path())
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nold\nz\n");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "README.md", CONFLICTED);

        let report = Scanner::default().dry_run(true).scan(dir.path()).unwrap();
        assert!(report.dry_run);
        assert_eq!(report.resolved_count(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), CONFLICTED);
    }

    #[test]
    fn test_clean_files_not_reported() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "clean.md", "Title\n=======\n\nbody\n");

        let report = Scanner::default().scan(dir.path()).unwrap();
        assert!(report.outcomes.is_empty());
        assert!(report.is_clean());
        assert_eq!(report.files_visited, 1);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("clean.md")).unwrap(),
            "Title\n=======\n\nbody\n"
        );
    }

    #[test]
    fn test_skips_excluded_dirs_and_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let in_git = write(dir.path(), ".git/MERGE_MSG.md", CONFLICTED);
        let in_deps = write(dir.path(), "node_modules/pkg/index.js", CONFLICTED);
        let rust = write(dir.path(), "src/main.rs", CONFLICTED);

        let report = Scanner::default().scan(dir.path()).unwrap();
        assert!(report.outcomes.is_empty());
        assert_eq!(report.files_skipped, 1);
        for path in [in_git, in_deps, rust] {
            assert_eq!(std::fs::read_to_string(path).unwrap(), CONFLICTED);
        }
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = Scanner::default().scan(&dir.path().join("nope"));
        assert!(matches!(result, Err(ScanError::RootNotFound(_))));
    }

    #[test]
    fn test_root_is_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = write(dir.path(), "a.md", "x\n");
        let result = Scanner::default().scan(&file);
        assert!(matches!(result, Err(ScanError::NotADirectory(_))));
    }

    #[test]
    fn test_non_utf8_file_fails_and_scan_continues() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.json"), [0xff, 0xfe, 0x00, b'\n']).unwrap();
        let good = write(dir.path(), "b.json", CONFLICTED);

        let mut seen = Vec::new();
        let report = Scanner::default()
            .scan_with(dir.path(), |o| seen.push(o.path().to_path_buf()))
            .unwrap();

        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.resolved_count(), 1);
        assert!(!report.is_clean());
        assert!(matches!(
            report.outcomes[0],
            FileOutcome::Failed {
                error: ScanError::Read { .. },
                ..
            }
        ));
        assert_eq!(seen.len(), 2);
        assert_eq!(std::fs::read_to_string(good).unwrap(), "a\nnew\nz\n");
    }

    #[test]
    fn test_write_failure_recorded_and_scan_continues() {
        fn refuse_b(path: &Path, content: &str) -> std::io::Result<()> {
            if path.ends_with("b.md") {
                return Err(std::io::Error::other("disk full"));
            }
            write_atomic(path, content)
        }

        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "a.md", CONFLICTED);
        let b = write(dir.path(), "b.md", CONFLICTED);
        let c = write(dir.path(), "c.md", CONFLICTED);

        let scanner = Scanner {
            write_back: refuse_b,
            ..Scanner::default()
        };
        let report = scanner.scan(dir.path()).unwrap();

        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.resolved_count(), 2);
        match &report.outcomes[1] {
            FileOutcome::Failed {
                path,
                error: ScanError::Write { source, .. },
            } => {
                assert_eq!(path, &b);
                assert_eq!(source.to_string(), "disk full");
            }
            other => panic!("expected a write failure, got {other:?}"),
        }
        assert_eq!(report.blocks_resolved(), 2);
        assert!(!report.is_clean());

        assert_eq!(std::fs::read_to_string(&a).unwrap(), "a\nnew\nz\n");
        assert_eq!(std::fs::read_to_string(&b).unwrap(), CONFLICTED);
        assert_eq!(std::fs::read_to_string(&c).unwrap(), "a\nnew\nz\n");
    }

    #[test]
    fn test_write_atomic_missing_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone").join("a.md");
        assert!(write_atomic(&path, "x\n").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_write_atomic_replaces_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "a.md", "old\n");
        write_atomic(&path, "new\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
        // No temp files left behind.
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_relative_path() {
        let root = Path::new("/repo");
        assert_eq!(relative_path(root, Path::new("/repo/src/a.js")), "src/a.js");
    }

    #[cfg(unix)]
    #[test]
    fn test_permissions_preserved() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "run.js", CONFLICTED);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        Scanner::default().scan(dir.path()).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }
}
