//! Directory-scan checks. A scan walks the project root, skipping dependency
//! and VCS directories, and reports findings as lines. Per-file failures are
//! findings too; a scan never returns an error.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

pub mod config_syntax;
pub mod dependencies;
pub mod dockerfile;
pub mod lint;
pub mod python;
pub mod secrets;
pub mod terraform;

pub use config_syntax::check_config_syntax;
pub use dependencies::check_dependency_pins;
pub use dockerfile::check_dockerfile_security;
pub use lint::run_static_analysis;
pub use python::check_python_syntax;
pub use secrets::scan_secrets;
pub use terraform::check_terraform;

/// Directory names never descended into.
pub const EXCLUDED_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "node_modules",
    "bower_components",
    "__pycache__",
    ".mypy_cache",
    ".pytest_cache",
    ".tox",
    "venv",
    ".venv",
    "env",
];

/// Files larger than this are reported instead of read.
pub const MAX_FILE_SIZE_BYTES: u64 = 4 * 1024 * 1024;

/// Ordered list of finding lines produced by one scan.
#[derive(Debug, Default)]
pub struct Findings {
    lines: Vec<String>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, path: &Path, message: impl AsRef<str>) {
        self.lines
            .push(format!("{}: {}", path.display(), message.as_ref()));
    }

    pub fn push_line(&mut self, path: &Path, line: usize, message: impl AsRef<str>) {
        self.lines
            .push(format!("{}:{line}: {}", path.display(), message.as_ref()));
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Joined findings, or `clean` when nothing was found.
    pub fn render(self, clean: &str) -> String {
        if self.lines.is_empty() {
            clean.to_string()
        } else {
            self.lines.join("\n")
        }
    }
}

/// Files under `root` accepted by `matches`, in walk order (sorted by file
/// name per directory). Walk errors, including a missing root, are recorded
/// in `findings`.
pub fn collect_files(
    root: &Path,
    findings: &mut Findings,
    matches: impl Fn(&Path) -> bool,
) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry));

    for result in walker {
        match result {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                if matches(entry.path()) {
                    files.push(entry.into_path());
                }
            }
            Err(err) => {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| root.to_path_buf());
                warn!("Failed to read entry under {}: {err}", root.display());
                findings.push(&path, format!("walk error: {err}"));
            }
        }
    }
    debug!("Collected {} files under {}", files.len(), root.display());
    files
}

/// Read a file as UTF-8, reporting oversize, unreadable and non-UTF-8 files
/// as findings.
pub fn read_text(path: &Path, findings: &mut Findings) -> Option<String> {
    if let Ok(meta) = fs::metadata(path) {
        if meta.len() > MAX_FILE_SIZE_BYTES {
            findings.push(
                path,
                format!("skipped, file is {} bytes (limit {MAX_FILE_SIZE_BYTES})", meta.len()),
            );
            return None;
        }
    }
    match fs::read(path) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(err) => {
                findings.push(path, format!("read error: invalid UTF-8: {}", err.utf8_error()));
                None
            }
        },
        Err(err) => {
            findings.push(path, format!("read error: {err}"));
            None
        }
    }
}

pub fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|name| name.to_str()).unwrap_or("")
}

pub fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            extensions
                .iter()
                .any(|candidate| ext.eq_ignore_ascii_case(candidate))
        })
        .unwrap_or(false)
}

fn is_excluded(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| EXCLUDED_DIRS.contains(&name))
            .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn walk_skips_excluded_directories() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::create_dir_all(dir.path().join(".git")).unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(dir.path().join(".git/config"), "x").unwrap();
        fs::write(dir.path().join("src/app.js"), "x").unwrap();
        fs::write(dir.path().join("b.js"), "x").unwrap();
        fs::write(dir.path().join("a.js"), "x").unwrap();

        let mut findings = Findings::new();
        let files = collect_files(dir.path(), &mut findings, |_| true);
        let names: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();

        assert_eq!(names, vec!["a.js", "b.js", "src/app.js"]);
        assert!(findings.is_empty());
    }

    #[test]
    fn missing_root_is_a_finding() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("does-not-exist");
        let mut findings = Findings::new();
        let files = collect_files(&missing, &mut findings, |_| true);
        assert!(files.is_empty());
        assert_eq!(findings.len(), 1);
        assert!(findings.render("clean").contains("walk error"));
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.py");
        fs::write(&path, [0xff, 0xfe, 0x00, 0x41]).unwrap();
        let mut findings = Findings::new();
        assert!(read_text(&path, &mut findings).is_none());
        let rendered = findings.render("clean");
        assert!(rendered.contains("bad.py: read error: invalid UTF-8"));
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert!(has_extension(Path::new("a/B.YML"), &["yml", "yaml"]));
        assert!(!has_extension(Path::new("a/Dockerfile"), &["yml"]));
    }
}
