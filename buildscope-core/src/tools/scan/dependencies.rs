use std::path::Path;

use serde_json::Value;

use super::{collect_files, file_name, read_text, Findings};

pub const CLEAN: &str = "All dependencies are pinned.";

const PACKAGE_SECTIONS: &[&str] = &[
    "dependencies",
    "devDependencies",
    "peerDependencies",
    "optionalDependencies",
];

pub fn check_dependency_pins(root: &Path) -> String {
    let mut findings = Findings::new();
    let files = collect_files(root, &mut findings, |path| {
        matches!(file_name(path), "requirements.txt" | "package.json")
    });

    for path in files {
        let Some(content) = read_text(&path, &mut findings) else {
            continue;
        };
        if file_name(&path) == "requirements.txt" {
            check_requirements(&path, &content, &mut findings);
        } else {
            check_package_json(&path, &content, &mut findings);
        }
    }

    findings.render(CLEAN)
}

fn check_requirements(path: &Path, content: &str, findings: &mut Findings) {
    for (idx, raw) in content.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() || line.starts_with('-') {
            continue;
        }
        // `pkg @ url` and VCS requirements are pinned by reference.
        if line.contains(" @ ") || line.contains("://") {
            continue;
        }
        let requirement = line.split(';').next().unwrap_or(line).trim();
        if !requirement.contains("==") {
            findings.push_line(path, idx + 1, format!("unpinned requirement: {requirement}"));
        }
    }
}

fn check_package_json(path: &Path, content: &str, findings: &mut Findings) {
    let manifest: Value = match serde_json::from_str(content) {
        Ok(manifest) => manifest,
        Err(err) => {
            findings.push(path, format!("parse error: {err}"));
            return;
        }
    };

    for section in PACKAGE_SECTIONS {
        let Some(deps) = manifest.get(*section).and_then(Value::as_object) else {
            continue;
        };
        for (name, version) in deps {
            let version = version.as_str().unwrap_or("");
            if is_loose_range(version) {
                findings.push(path, format!("{section}.{name} uses loose version \"{version}\""));
            }
        }
    }
}

fn is_loose_range(version: &str) -> bool {
    let version = version.trim();
    if version.is_empty() || version == "*" || version.eq_ignore_ascii_case("latest") {
        return true;
    }
    // Local paths, git and tarball references are not registry ranges.
    if version.starts_with("file:")
        || version.starts_with("link:")
        || version.starts_with("git")
        || version.starts_with("http")
        || version.starts_with("workspace:")
    {
        return false;
    }
    version.starts_with('^')
        || version.starts_with('~')
        || version.contains('>')
        || version.contains('<')
        || version.contains("||")
        || version
            .split('.')
            .any(|part| part.eq_ignore_ascii_case("x") || part == "*")
}
