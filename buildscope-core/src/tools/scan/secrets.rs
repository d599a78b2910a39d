use std::ops::Range;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::{collect_files, file_name, has_extension, read_text, Findings};

pub const CLEAN: &str = "No hard-coded secrets found.";

const CREDENTIAL_ASSIGNMENT: &str = "credential assignment";
const VISIBLE_PREFIX: usize = 4;
const MIN_PREFIXED_LEN: usize = 16;

const SCANNED_EXTENSIONS: &[&str] = &["env", "py", "js", "yml", "yaml", "json"];

struct SecretPattern {
    label: &'static str,
    regex: Regex,
}

static PATTERNS: LazyLock<Vec<SecretPattern>> = LazyLock::new(|| {
    let patterns = [
        ("AWS access key id", r"\b(AKIA|ASIA)[0-9A-Z]{16}\b"),
        ("private key", r"-----BEGIN (RSA |EC |DSA |OPENSSH |PGP )?PRIVATE KEY( BLOCK)?-----"),
        ("GitHub token", r"\bgh[pousr]_[A-Za-z0-9]{36,}\b"),
        ("OpenAI API key", r"\bsk-(proj-)?[A-Za-z0-9_-]{20,}\b"),
        ("Slack token", r"\bxox[baprs]-[A-Za-z0-9-]{10,}\b"),
        (
            CREDENTIAL_ASSIGNMENT,
            r#"(?i)\b[a-z0-9_.-]*(api[_-]?key|secret|passwd|password|token)[a-z0-9_.-]*["']?\s*[:=]\s*["']?([^\s"'#,;]{8,})"#,
        ),
    ];
    patterns
        .into_iter()
        .map(|(label, pattern)| SecretPattern {
            label,
            regex: Regex::new(pattern).expect("secret pattern"),
        })
        .collect()
});

/// `.env`, `.env.local`, `prod.env` and the like.
fn is_env_file(path: &Path) -> bool {
    let name = file_name(path);
    name == ".env" || name.starts_with(".env.") || has_extension(path, &["env"])
}

fn is_scanned(path: &Path) -> bool {
    is_env_file(path) || has_extension(path, SCANNED_EXTENSIONS)
}

pub fn scan_secrets(root: &Path) -> String {
    let mut findings = Findings::new();
    let files = collect_files(root, &mut findings, is_scanned);

    for path in files {
        let Some(content) = read_text(&path, &mut findings) else {
            continue;
        };
        for (idx, line) in content.lines().enumerate() {
            let spans = secret_spans(line);
            if let Some((label, _)) = spans.first() {
                findings.push_line(
                    &path,
                    idx + 1,
                    format!("possible {label}: {}", redact(line, &spans)),
                );
            }
        }
    }

    findings.render(CLEAN)
}

/// Every secret on the line, in pattern order.
fn secret_spans(line: &str) -> Vec<(&'static str, Range<usize>)> {
    let mut spans = Vec::new();
    for pattern in PATTERNS.iter() {
        for caps in pattern.regex.captures_iter(line) {
            if let Some(span) = secret_span(pattern, &caps) {
                spans.push((pattern.label, span));
            }
        }
    }
    spans
}

/// The bytes to mask: the assigned value for credential assignments, the
/// whole match otherwise.
fn secret_span(pattern: &SecretPattern, caps: &Captures<'_>) -> Option<Range<usize>> {
    if pattern.label == CREDENTIAL_ASSIGNMENT {
        let value = caps.get(2)?;
        if is_placeholder(value.as_str()) {
            return None;
        }
        return Some(value.range());
    }
    caps.get(0).map(|m| m.range())
}

fn is_placeholder(value: &str) -> bool {
    let lower = value.to_lowercase();
    lower.starts_with("${")
        || lower.starts_with("os.environ")
        || lower.starts_with("process.env")
        || lower.starts_with("env(")
        || lower.starts_with("getenv")
        || lower.contains("changeme")
        || lower.contains("your_")
        || lower.contains("your-")
        || lower.contains("example")
        || lower.chars().all(|c| c == '*' || c == 'x')
}

fn redact(line: &str, spans: &[(&str, Range<usize>)]) -> String {
    let mut ranges: Vec<Range<usize>> = spans.iter().map(|(_, span)| span.clone()).collect();
    ranges.sort_by_key(|span| span.start);

    let mut merged: Vec<Range<usize>> = Vec::with_capacity(ranges.len());
    for span in ranges {
        match merged.last_mut() {
            Some(last) if span.start <= last.end => last.end = last.end.max(span.end),
            _ => merged.push(span),
        }
    }

    let mut out = String::with_capacity(line.len());
    let mut cursor = 0;
    for span in merged {
        out.push_str(&line[cursor..span.start]);
        out.push_str(&mask(&line[span.clone()]));
        cursor = span.end;
    }
    out.push_str(&line[cursor..]);
    out.trim().to_string()
}

/// Long secrets keep a short prefix so the key type stays recognizable.
fn mask(secret: &str) -> String {
    if secret.chars().count() < MIN_PREFIXED_LEN {
        return "****".to_string();
    }
    let visible: String = secret.chars().take(VISIBLE_PREFIX).collect();
    format!("{visible}****")
}
