//! File selection for tree scans.
//!
//! Provides [`FilePolicy`] which encapsulates the extension allow-list,
//! excluded directory names, `ignore_patterns` and `max_file_size` from
//! [`ScanConfig`] and evaluates candidate files before they are read.
//!
//! # Decision model
//!
//! For each candidate file the policy returns a [`FilePolicyDecision`]:
//!
//! | Condition | Decision |
//! |-----------|----------|
//! | Path matches an ignore pattern | `Ignored` |
//! | File name lacks an allowed extension | `UnsupportedExtension` |
//! | Size exceeds `max_file_size` (when > 0) | `Oversize` |
//! | None of the above | `Allow` |

use std::path::Path;

use tracing::{debug, warn};

use crate::config::ScanConfig;

// ---------------------------------------------------------------------------
// Decision enum
// ---------------------------------------------------------------------------

/// The outcome of evaluating a file against the policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilePolicyDecision {
    /// File passes all checks; scan it.
    Allow,
    /// File matches an ignore pattern; skip it.
    Ignored { pattern: String },
    /// File name does not end in an allowed extension; skip it.
    UnsupportedExtension,
    /// File exceeds the configured `max_file_size`; skip it.
    Oversize { size: u64, limit: u64 },
}

impl FilePolicyDecision {
    /// `true` if the file should be read and checked for markers.
    pub fn should_scan(&self) -> bool {
        matches!(self, Self::Allow)
    }

    /// Short human-readable label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Ignored { .. } => "ignored",
            Self::UnsupportedExtension => "unsupported-extension",
            Self::Oversize { .. } => "oversize",
        }
    }
}

// ---------------------------------------------------------------------------
// FilePolicy
// ---------------------------------------------------------------------------

/// Evaluates candidate files and directories during a scan.
#[derive(Debug, Clone)]
pub struct FilePolicy {
    /// Allowed extensions without the leading dot (e.g. `js`, `env`).
    extensions: Vec<String>,
    /// Directory names that are never descended into.
    exclude_dirs: Vec<String>,
    /// Glob patterns to exclude. Matched against the *relative* path.
    ignore_patterns: Vec<String>,
    /// Maximum file size in bytes. 0 = no limit.
    max_file_size: u64,
}

impl Default for FilePolicy {
    fn default() -> Self {
        Self::from(&ScanConfig::default())
    }
}

impl FilePolicy {
    pub fn new(extensions: Vec<String>, exclude_dirs: Vec<String>) -> Self {
        Self {
            extensions,
            exclude_dirs,
            ignore_patterns: Vec::new(),
            max_file_size: 0,
        }
    }

    pub fn with_ignore_patterns(mut self, patterns: Vec<String>) -> Self {
        self.ignore_patterns = patterns;
        self
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Evaluate a file.
    ///
    /// `rel_path` is the file's path relative to the scan root (forward-slash
    /// separated). `size` is the file size in bytes.
    pub fn evaluate(&self, rel_path: &str, size: u64) -> FilePolicyDecision {
        // 1. Ignore patterns first.
        for pattern in &self.ignore_patterns {
            if matches_pattern(rel_path, pattern) {
                debug!(
                    path = rel_path,
                    pattern = pattern.as_str(),
                    "file matches ignore pattern"
                );
                return FilePolicyDecision::Ignored {
                    pattern: pattern.clone(),
                };
            }
        }

        // 2. Extension allow-list.
        let file_name = rel_path.rsplit('/').next().unwrap_or(rel_path);
        if !self.has_allowed_extension(file_name) {
            return FilePolicyDecision::UnsupportedExtension;
        }

        // 3. max_file_size (0 = unlimited).
        if self.max_file_size > 0 && size > self.max_file_size {
            warn!(
                path = rel_path,
                size,
                limit = self.max_file_size,
                "file exceeds max_file_size, skipping"
            );
            return FilePolicyDecision::Oversize {
                size,
                limit: self.max_file_size,
            };
        }

        FilePolicyDecision::Allow
    }

    /// Evaluate a file on disk (reads metadata for size).
    ///
    /// If the file cannot be stat'd, returns the decision for size 0 and lets
    /// the read itself report the I/O error.
    pub fn evaluate_path(&self, root: &Path, rel_path: &str) -> FilePolicyDecision {
        let size = std::fs::metadata(root.join(rel_path))
            .map(|m| m.len())
            .unwrap_or(0);
        self.evaluate(rel_path, size)
    }

    /// Whether a directory with this name is pruned from the walk.
    pub fn is_excluded_dir(&self, name: &str) -> bool {
        self.exclude_dirs.iter().any(|d| d == name)
    }

    /// Extensions match as a file-name suffix, so `env` covers both
    /// `app.env` and a bare `.env`.
    fn has_allowed_extension(&self, file_name: &str) -> bool {
        self.extensions.iter().any(|ext| {
            file_name
                .strip_suffix(ext.as_str())
                .is_some_and(|stem| stem.ends_with('.'))
        })
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn exclude_dirs(&self) -> &[String] {
        &self.exclude_dirs
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}

/// Test whether `rel_path` matches a glob `pattern`.
fn matches_pattern(rel_path: &str, pattern: &str) -> bool {
    // Normalize to forward slashes for consistent matching.
    let path = rel_path.replace('\\', "/");
    let pat = pattern.replace('\\', "/");
    glob_match::glob_match(&pat, &path)
}

// ---------------------------------------------------------------------------
// Construct from ScanConfig
// ---------------------------------------------------------------------------

impl From<&ScanConfig> for FilePolicy {
    fn from(scan: &ScanConfig) -> Self {
        Self::new(scan.extensions.clone(), scan.exclude_dirs.clone())
            .with_ignore_patterns(scan.ignore_patterns.clone())
            .with_max_file_size(scan.max_file_size)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(exts: &[&str]) -> FilePolicy {
        FilePolicy::new(
            exts.iter().map(|e| e.to_string()).collect(),
            vec![".git".into(), "node_modules".into()],
        )
    }

    #[test]
    fn test_allowed_extension() {
        let policy = policy(&["js", "css"]);
        let decision = policy.evaluate("src/app.js", 100);
        assert_eq!(decision, FilePolicyDecision::Allow);
        assert!(decision.should_scan());
        assert_eq!(decision.label(), "allow");
        assert_eq!(policy.evaluate("styles/index.css", 100), FilePolicyDecision::Allow);
    }

    #[test]
    fn test_unsupported_extension() {
        let policy = policy(&["js"]);
        let decision = policy.evaluate("logo.png", 100);
        assert_eq!(decision, FilePolicyDecision::UnsupportedExtension);
        assert!(!decision.should_scan());
        // `.js` must be a real suffix, not just trailing letters.
        assert!(!policy.evaluate("notjs", 10).should_scan());
        assert!(!policy.evaluate("app.mjs", 10).should_scan());
    }

    #[test]
    fn test_bare_dotfile_extension() {
        let policy = policy(&["env"]);
        assert!(policy.evaluate(".env", 10).should_scan());
        assert!(policy.evaluate("config/prod.env", 10).should_scan());
        assert!(!policy.evaluate("environment", 10).should_scan());
    }

    #[test]
    fn test_ignore_pattern() {
        let policy = policy(&["js"]).with_ignore_patterns(vec!["dist/**".into()]);
        let decision = policy.evaluate("dist/bundle.js", 10);
        assert!(matches!(decision, FilePolicyDecision::Ignored { .. }));
        assert_eq!(decision.label(), "ignored");
        assert!(policy.evaluate("src/bundle.js", 10).should_scan());
    }

    #[test]
    fn test_ignore_checked_before_extension() {
        let policy = policy(&["js"]).with_ignore_patterns(vec!["**/*.png".into()]);
        assert!(matches!(
            policy.evaluate("img/logo.png", 10),
            FilePolicyDecision::Ignored { .. }
        ));
    }

    #[test]
    fn test_oversize() {
        let policy = policy(&["json"]).with_max_file_size(1000);
        assert!(matches!(
            policy.evaluate("data.json", 2000),
            FilePolicyDecision::Oversize {
                size: 2000,
                limit: 1000
            }
        ));
        // Exactly at the limit passes.
        assert_eq!(policy.evaluate("data.json", 1000), FilePolicyDecision::Allow);
    }

    #[test]
    fn test_excluded_dirs() {
        let policy = FilePolicy::default();
        assert!(policy.is_excluded_dir(".git"));
        assert!(policy.is_excluded_dir("node_modules"));
        assert!(!policy.is_excluded_dir("src"));
    }

    #[test]
    fn test_default_extensions() {
        let policy = FilePolicy::default();
        for name in ["a.jsx", "a.js", "a.css", "a.json", "a.html", "a.md", ".env"] {
            assert!(policy.evaluate(name, 1).should_scan(), "{name} should be scanned");
        }
        assert!(!policy.evaluate("main.rs", 1).should_scan());
    }

    #[test]
    fn test_evaluate_path_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("small.md"), "hello").unwrap();
        std::fs::write(dir.path().join("big.md"), vec![b'x'; 2000]).unwrap();

        let policy = policy(&["md"]).with_max_file_size(1000);
        assert_eq!(
            policy.evaluate_path(dir.path(), "small.md"),
            FilePolicyDecision::Allow
        );
        assert!(matches!(
            policy.evaluate_path(dir.path(), "big.md"),
            FilePolicyDecision::Oversize { .. }
        ));
        assert_eq!(
            policy.evaluate_path(dir.path(), "missing.md"),
            FilePolicyDecision::Allow
        );
    }
}
