//! Source tree walk with directory pruning and per-file recovery.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::{DirEntry, WalkBuilder};

use crate::error::{IndexError, Result};
use crate::languages::{LanguageStrategyMap, extension_of};

pub const DEFAULT_IGNORED_DIRS: &[&str] = &[
    "node_modules",
    ".next",
    "dist",
    "build",
    ".vercel",
    "venv",
    ".venv",
    "__pycache__",
    "mediafiles",
    "staticfiles",
    "static",
    ".ruff_cache",
    ".mypy_cache",
    ".pytest_cache",
    ".cursor",
    ".husky",
    ".git",
    ".github",
    ".vscode",
    "_TMP",
    ".brv",
    ".ci",
    "cypress",
    "tests",
    "target",
];

pub const DEFAULT_IGNORED_FILES: &[&str] = &[
    ".env",
    ".env.example",
    ".env.local",
    ".env.backup",
    ".env.production.local",
    "sample.env",
    "db.sqlite3",
    "yarn.lock",
    "package-lock.json",
    "uv.lock",
    "tsconfig.strict.tsbuildinfo",
    ".eslintrc.json",
    ".prettierrc.json",
    ".eslintignore",
    ".prettierignore",
    ".cursorignore",
    ".gitignore",
    ".dockerignore",
    ".vercelignore",
    "docker-compose.yml",
    "Dockerfile",
    ".flake8",
    ".ruffignore",
];

/// Exact-match (not glob) names excluded from the walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRules {
    /// Directory names pruned before descent, at any depth.
    pub dirs: HashSet<String>,
    /// File names never read.
    pub files: HashSet<String>,
}

impl Default for IgnoreRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_IGNORED_DIRS.iter().copied(),
            DEFAULT_IGNORED_FILES.iter().copied(),
        )
    }
}

impl IgnoreRules {
    #[must_use]
    pub fn new<D, F, S, T>(dirs: D, files: F) -> Self
    where
        D: IntoIterator<Item = S>,
        F: IntoIterator<Item = T>,
        S: Into<String>,
        T: Into<String>,
    {
        Self {
            dirs: dirs.into_iter().map(Into::into).collect(),
            files: files.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn is_ignored_dir(&self, name: &str) -> bool {
        self.dirs.contains(name)
    }

    #[must_use]
    pub fn is_ignored_file(&self, name: &str) -> bool {
        self.files.contains(name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScannerConfig {
    /// Additionally honour `.gitignore` / `.git/info/exclude`.
    pub respect_gitignore: bool,
    /// Files larger than this are skipped without reading.
    pub max_file_bytes: Option<u64>,
}

/// One readable, non-blank file selected by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    /// Path relative to the scan root, `/`-separated.
    pub relative_path: String,
    pub filename: String,
    /// Lowercase, without the dot; empty for extensionless files.
    pub extension: String,
    pub text: String,
}

/// Walks one root directory.
///
/// [`TreeScanner::scan`] can be called any number of times; each call starts a
/// fresh lazy walk.
#[derive(Debug, Clone)]
pub struct TreeScanner {
    root: PathBuf,
    rules: Arc<IgnoreRules>,
    strategies: LanguageStrategyMap,
    config: ScannerConfig,
}

impl TreeScanner {
    /// # Errors
    ///
    /// Returns [`IndexError::Scan`] if `root` is not a readable directory.
    pub fn new(
        root: impl Into<PathBuf>,
        rules: IgnoreRules,
        strategies: LanguageStrategyMap,
        config: ScannerConfig,
    ) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(IndexError::Scan {
                path: root.display().to_string(),
                message: "not a directory".into(),
            });
        }
        Ok(Self {
            root,
            rules: Arc::new(rules),
            strategies,
            config,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn strategies(&self) -> &LanguageStrategyMap {
        &self.strategies
    }

    /// Lazily yield every selected file.
    ///
    /// Entries are visited depth-first, sorted by name within a directory.
    /// Unreadable files are logged and skipped.
    pub fn scan(&self) -> impl Iterator<Item = ScannedFile> + '_ {
        let rules = Arc::clone(&self.rules);

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .git_ignore(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .follow_links(false)
            .max_filesize(self.config.max_file_bytes)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
                    return true;
                }
                !rules.is_ignored_dir(&entry.file_name().to_string_lossy())
            });

        builder.build().filter_map(move |entry| match entry {
            Ok(entry) => self.read_entry(&entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unwalkable entry");
                None
            }
        })
    }

    fn read_entry(&self, entry: &DirEntry) -> Option<ScannedFile> {
        if !entry.file_type().is_some_and(|ft| ft.is_file()) {
            return None;
        }
        let filename = entry.file_name().to_string_lossy().into_owned();
        if self.rules.is_ignored_file(&filename) {
            return None;
        }
        let extension = extension_of(entry.path());
        if !self.strategies.is_allowed(&extension) {
            return None;
        }

        let relative_path = relative_path(&self.root, entry.path());
        let text = match std::fs::read_to_string(entry.path()) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = %relative_path, error = %e, "skipping unreadable file");
                return None;
            }
        };
        if text.trim().is_empty() {
            return None;
        }

        Some(ScannedFile {
            relative_path,
            filename,
            extension,
            text,
        })
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    fn write(root: &Path, rel: &str, content: &[u8]) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn scanner(root: &Path) -> TreeScanner {
        TreeScanner::new(
            root,
            IgnoreRules::default(),
            LanguageStrategyMap::default(),
            ScannerConfig::default(),
        )
        .unwrap()
    }

    fn paths(scanner: &TreeScanner) -> Vec<String> {
        scanner.scan().map(|f| f.relative_path).collect()
    }

    #[test]
    fn ignored_dirs_pruned_at_any_depth() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "src/app.py", b"print('hi')");
        write(dir.path(), "node_modules/pkg/index.js", b"module.exports = 1;");
        write(dir.path(), "web/node_modules/dep/lib.js", b"var x = 1;");
        write(dir.path(), "a/b/c/__pycache__/mod.py", b"x = 1");
        write(dir.path(), ".git/HEAD.md", b"ref");

        let found = paths(&scanner(dir.path()));
        assert_eq!(found, vec!["src/app.py".to_owned()]);
    }

    #[test]
    fn ignored_files_and_extensions_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "package-lock.json", b"{}");
        write(dir.path(), ".env", b"SECRET=1");
        write(dir.path(), "logo.png", b"\x89PNG");
        write(dir.path(), "notes.md", b"# Notes");

        assert_eq!(paths(&scanner(dir.path())), vec!["notes.md".to_owned()]);
    }

    #[test]
    fn blank_files_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "empty.py", b"");
        write(dir.path(), "blank.md", b"  \n\t\n");
        write(dir.path(), "real.sql", b"select 1;");

        assert_eq!(paths(&scanner(dir.path())), vec!["real.sql".to_owned()]);
    }

    #[test]
    fn unreadable_file_does_not_stop_scan() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.txt", b"fine");
        write(dir.path(), "b.txt", &[0xff, 0xfe, 0x00, 0xc3]);
        write(dir.path(), "c.txt", b"also fine");

        assert_eq!(
            paths(&scanner(dir.path())),
            vec!["a.txt".to_owned(), "c.txt".to_owned()]
        );
    }

    #[test]
    fn extensionless_files_are_generic() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "LICENSE", b"MIT");
        let files: Vec<ScannedFile> = scanner(dir.path()).scan().collect();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].filename, "LICENSE");
        assert_eq!(files[0].extension, "");
    }

    #[test]
    fn scan_is_restartable_and_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["z.py", "a.py", "m/b.md", "m/a.json"] {
            write(dir.path(), name, b"content");
        }
        let s = scanner(dir.path());
        let first = paths(&s);
        let second = paths(&s);
        assert_eq!(first, second);
        assert_eq!(first, vec!["a.py", "m/a.json", "m/b.md", "z.py"]);
    }

    #[test]
    fn custom_rules_replace_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "tests/test_app.py", b"assert True");
        write(dir.path(), "vendor/lib.py", b"x = 1");

        let rules = IgnoreRules::new(["vendor"], Vec::<String>::new());
        let s = TreeScanner::new(
            dir.path(),
            rules,
            LanguageStrategyMap::default(),
            ScannerConfig::default(),
        )
        .unwrap();
        assert_eq!(paths(&s), vec!["tests/test_app.py".to_owned()]);
    }

    #[test]
    fn max_file_bytes_skips_large_files() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "small.txt", b"ok");
        write(dir.path(), "large.txt", &[b'a'; 4096]);

        let s = TreeScanner::new(
            dir.path(),
            IgnoreRules::default(),
            LanguageStrategyMap::default(),
            ScannerConfig {
                max_file_bytes: Some(1024),
                ..ScannerConfig::default()
            },
        )
        .unwrap();
        assert_eq!(paths(&s), vec!["small.txt".to_owned()]);
    }

    #[test]
    fn missing_root_is_scan_error() {
        let err = TreeScanner::new(
            "/definitely/not/here",
            IgnoreRules::default(),
            LanguageStrategyMap::default(),
            ScannerConfig::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Scan);
    }
}
