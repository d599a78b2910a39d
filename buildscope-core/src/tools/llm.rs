//! Prompt builders for the LLM-backed tools and the pipeline config lookup
//! feeding `explain_config`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::scan::{has_extension, MAX_FILE_SIZE_BYTES};

pub const NO_PIPELINE_CONFIG: &str = "No CI/CD pipeline configuration found.";

/// Fixed pipeline files, probed in this order before `.github/workflows`.
const PIPELINE_FILES: &[&str] = &[
    "Jenkinsfile",
    ".gitlab-ci.yml",
    "azure-pipelines.yml",
    ".circleci/config.yml",
    "bitbucket-pipelines.yml",
];

const WORKFLOWS_DIR: &str = ".github/workflows";

pub fn suggest_fix_prompt(errors: &str) -> String {
    format!("Suggest fixes for the following Jenkins build errors:\n{errors}")
}

pub fn pr_text_prompt(fix_summary: &str) -> String {
    format!("Create a GitHub PR title and body for the following fix:\n{fix_summary}")
}

pub fn explain_config_prompt(config: &str) -> String {
    format!("Explain this CI/CD pipeline configuration file:\n{config}")
}

/// A pipeline definition read from the project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    pub path: PathBuf,
    pub content: String,
}

impl PipelineConfig {
    /// The prompt input: file path header followed by the file content.
    pub fn render(&self) -> String {
        format!("# {}\n{}", self.path.display(), self.content)
    }
}

/// First readable pipeline definition under `root`, if any.
pub fn locate_pipeline_config(root: &Path) -> Option<PipelineConfig> {
    candidates(root).into_iter().find_map(|path| {
        let meta = fs::metadata(&path).ok()?;
        if !meta.is_file() || meta.len() > MAX_FILE_SIZE_BYTES {
            return None;
        }
        let bytes = fs::read(&path).ok()?;
        let content = String::from_utf8_lossy(&bytes).into_owned();
        debug!("Using pipeline config {}", path.display());
        Some(PipelineConfig { path, content })
    })
}

fn candidates(root: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = PIPELINE_FILES.iter().map(|name| root.join(name)).collect();
    if let Ok(entries) = fs::read_dir(root.join(WORKFLOWS_DIR)) {
        let mut workflows: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| has_extension(path, &["yml", "yaml"]))
            .collect();
        workflows.sort();
        paths.extend(workflows);
    }
    paths
}
