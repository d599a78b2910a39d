use std::path::Path;

use serde::Deserialize;

use super::{collect_files, has_extension, read_text, Findings};

pub const CLEAN: &str = "No YAML/JSON syntax errors found.";

pub fn check_config_syntax(root: &Path) -> String {
    let mut findings = Findings::new();
    let files = collect_files(root, &mut findings, |path| {
        has_extension(path, &["yml", "yaml", "json"])
    });

    for path in files {
        let Some(content) = read_text(&path, &mut findings) else {
            continue;
        };
        let result = if has_extension(&path, &["json"]) {
            validate_json(&content)
        } else {
            validate_yaml(&content)
        };
        if let Err(message) = result {
            findings.push(&path, message);
        }
    }

    findings.render(CLEAN)
}

fn validate_json(content: &str) -> Result<(), String> {
    serde_json::from_str::<serde_json::Value>(content)
        .map(|_| ())
        .map_err(|err| format!("invalid JSON: {err}"))
}

/// Every document in a multi-document stream must parse.
fn validate_yaml(content: &str) -> Result<(), String> {
    for document in serde_yaml::Deserializer::from_str(content) {
        serde_yaml::Value::deserialize(document).map_err(|err| format!("invalid YAML: {err}"))?;
    }
    Ok(())
}
