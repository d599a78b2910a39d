use std::io::ErrorKind;
use std::path::Path;
use std::process::{Command, Output};

use tracing::debug;

use super::{collect_files, Findings};

pub const CLEAN: &str = "No static analysis issues found.";

/// Maximum number of output lines kept per linted file.
const MAX_OUTPUT_LINES: usize = 20;

/// External linter invoked for one file extension. The file path is appended
/// to `args`.
#[derive(Debug, Clone, Copy)]
pub struct Linter {
    pub extensions: &'static [&'static str],
    pub program: &'static str,
    pub args: &'static [&'static str],
}

pub const LINTERS: &[Linter] = &[
    Linter {
        extensions: &["py"],
        program: "flake8",
        args: &[],
    },
    Linter {
        extensions: &["js"],
        program: "eslint",
        args: &["--no-eslintrc"],
    },
    Linter {
        extensions: &["go"],
        program: "golint",
        args: &[],
    },
    Linter {
        extensions: &["java"],
        program: "checkstyle",
        args: &["-c", "/google_checks.xml"],
    },
    Linter {
        extensions: &["php"],
        program: "php",
        args: &["-l"],
    },
    Linter {
        extensions: &["c", "cpp", "cc", "cxx", "h", "hpp"],
        program: "cppcheck",
        args: &["--quiet", "--enable=warning,style"],
    },
];

/// First linter in `linters` claiming the file's extension.
pub fn linter_for<'a>(linters: &'a [Linter], path: &Path) -> Option<&'a Linter> {
    let ext = path.extension()?.to_str()?;
    linters.iter().find(|linter| {
        linter
            .extensions
            .iter()
            .any(|candidate| ext.eq_ignore_ascii_case(candidate))
    })
}

pub fn run_static_analysis(root: &Path) -> String {
    run_with_linters(root, LINTERS)
}

/// Runs the linter table against every matching file. A linter that is not
/// installed is reported per file.
pub fn run_with_linters(root: &Path, linters: &[Linter]) -> String {
    let mut findings = Findings::new();
    let files = collect_files(root, &mut findings, |path| linter_for(linters, path).is_some());

    for path in files {
        let Some(linter) = linter_for(linters, &path) else {
            continue;
        };
        debug!("Running {} on {}", linter.program, path.display());
        match Command::new(linter.program)
            .args(linter.args)
            .arg(&path)
            .output()
        {
            Ok(output) => {
                if let Some(report) = failure_report(&output) {
                    findings.push(&path, format!("{} reported:\n{report}", linter.program));
                }
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                findings.push(&path, format!("tool not found: {}", linter.program));
            }
            Err(err) => {
                findings.push(&path, format!("failed to run {}: {err}", linter.program));
            }
        }
    }

    findings.render(CLEAN)
}

/// Linter output worth reporting: non-zero exit or anything on stdout/stderr
/// for tools that exit zero on warnings.
fn failure_report(output: &Output) -> Option<String> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let combined: Vec<&str> = stdout
        .lines()
        .chain(stderr.lines())
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.starts_with("No syntax errors detected"))
        .collect();

    if combined.is_empty() {
        return (!output.status.success())
            .then(|| format!("exited with {}", output.status));
    }
    let mut lines: Vec<String> = combined
        .iter()
        .take(MAX_OUTPUT_LINES)
        .map(|line| format!("  {line}"))
        .collect();
    if combined.len() > MAX_OUTPUT_LINES {
        lines.push(format!("  ... {} more lines", combined.len() - MAX_OUTPUT_LINES));
    }
    Some(lines.join("\n"))
}
