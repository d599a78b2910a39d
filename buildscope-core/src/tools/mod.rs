//! The tool registry: an ordered list of named checks. Log-text and
//! directory-scan tools are plain functions; LLM tools pair a prompt builder
//! with the source of their input.

use std::collections::HashSet;
use std::path::Path;

use strum_macros::Display;
use tracing::debug;

use crate::invoker::ResilientInvoker;
use crate::prelude::*;
use crate::types::{ToolOutput, ToolPayload, ELAPSED_TIME_KEY, SUMMARY_KEY};

pub mod llm;
pub mod log;
pub mod scan;

pub mod names {
    pub const BUILD_STATUS: &str = "build_status";
    pub const ERROR_LINES: &str = "error_lines";
    pub const LOG_SUMMARY: &str = "log_summary";
    pub const SLOW_TESTS: &str = "slow_tests";
    pub const FAILED_TESTS: &str = "failed_tests";
    pub const DEPRECATION_WARNINGS: &str = "deprecation_warnings";
    pub const PYTHON_SYNTAX: &str = "python_syntax";
    pub const DOCKERFILE_SECURITY: &str = "dockerfile_security";
    pub const SECRET_SCAN: &str = "secret_scan";
    pub const DEPENDENCY_PINS: &str = "dependency_pins";
    pub const CONFIG_SYNTAX: &str = "config_syntax";
    pub const TERRAFORM_CHECK: &str = "terraform_check";
    pub const STATIC_ANALYSIS: &str = "static_analysis";
    pub const SUGGEST_FIX: &str = "suggest_fix";
    pub const GENERATE_PR_TEXT: &str = "generate_pr_text";
    pub const EXPLAIN_CONFIG: &str = "explain_config";
}

/// Where an LLM tool takes its prompt input from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSource {
    /// Output of an earlier tool in the same run.
    ToolOutput(&'static str),
    /// Pipeline definition found under the project root.
    PipelineConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct LlmTool {
    pub source: PromptSource,
    pub prompt: fn(&str) -> String,
}

impl LlmTool {
    /// Builds the prompt from `payload` and asks the invoker. A missing
    /// pipeline config short-circuits to a sentinel without an LLM call.
    pub async fn run(&self, payload: &ToolPayload, invoker: &ResilientInvoker) -> ToolOutput {
        let input = match (self.source, payload) {
            (PromptSource::ToolOutput(_), ToolPayload::LogText(text)) => text.clone(),
            (PromptSource::PipelineConfig, ToolPayload::FileRoot(root)) => {
                match llm::locate_pipeline_config(root) {
                    Some(config) => config.render(),
                    None => return ToolOutput::Text(llm::NO_PIPELINE_CONFIG.to_string()),
                }
            }
            (source, payload) => {
                return ToolOutput::Text(format!(
                    "payload mismatch: {source:?} cannot use {}",
                    payload_label(payload)
                ))
            }
        };
        ToolOutput::Llm(invoker.invoke(&(self.prompt)(&input)).await)
    }
}

fn payload_label(payload: &ToolPayload) -> &'static str {
    match payload {
        ToolPayload::LogText(_) => "log text",
        ToolPayload::FileRoot(_) => "a file root",
    }
}

#[derive(Debug, Clone, Copy, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ToolKind {
    LogText(fn(&str) -> String),
    DirectoryScan(fn(&Path) -> String),
    Llm(LlmTool),
}

#[derive(Debug, Clone, Copy)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ToolKind,
}

impl ToolSpec {
    pub const fn log_text(
        name: &'static str,
        description: &'static str,
        run: fn(&str) -> String,
    ) -> Self {
        Self {
            name,
            description,
            kind: ToolKind::LogText(run),
        }
    }

    pub const fn directory_scan(
        name: &'static str,
        description: &'static str,
        run: fn(&Path) -> String,
    ) -> Self {
        Self {
            name,
            description,
            kind: ToolKind::DirectoryScan(run),
        }
    }

    pub const fn llm(
        name: &'static str,
        description: &'static str,
        source: PromptSource,
        prompt: fn(&str) -> String,
    ) -> Self {
        Self {
            name,
            description,
            kind: ToolKind::Llm(LlmTool { source, prompt }),
        }
    }

    /// Runs a log-text or directory-scan tool in place. LLM tools and
    /// mismatched payloads yield `None`.
    pub fn run_sync(&self, payload: &ToolPayload) -> Option<String> {
        match (self.kind, payload) {
            (ToolKind::LogText(run), ToolPayload::LogText(text)) => Some(run(text)),
            (ToolKind::DirectoryScan(run), ToolPayload::FileRoot(root)) => Some(run(root)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolRegistry {
    tools: Vec<ToolSpec>,
}

impl ToolRegistry {
    /// Validates the tool list: names are unique, none collides with a
    /// reserved result key, and every `ToolOutput` source names an earlier
    /// log-text tool or an earlier tool-sourced LLM tool.
    pub fn new(tools: Vec<ToolSpec>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut resolvable = HashSet::new();
        for tool in &tools {
            if tool.name == SUMMARY_KEY || tool.name == ELAPSED_TIME_KEY {
                return Err(BuildScopeError::registry(format!(
                    "tool name {:?} is reserved",
                    tool.name
                )));
            }
            if !seen.insert(tool.name) {
                return Err(BuildScopeError::registry(format!(
                    "duplicate tool name {:?}",
                    tool.name
                )));
            }
            match tool.kind {
                ToolKind::LogText(_) => {
                    resolvable.insert(tool.name);
                }
                ToolKind::Llm(LlmTool {
                    source: PromptSource::ToolOutput(source),
                    ..
                }) => {
                    if !resolvable.contains(source) {
                        return Err(BuildScopeError::registry(format!(
                            "tool {:?} reads {source:?}, which is not an earlier log or LLM tool",
                            tool.name
                        )));
                    }
                    resolvable.insert(tool.name);
                }
                ToolKind::DirectoryScan(_) | ToolKind::Llm(_) => {}
            }
        }
        debug!("Registered {} tools", tools.len());
        Ok(Self { tools })
    }

    /// The built-in tool battery.
    pub fn standard() -> Self {
        Self {
            tools: standard_tools(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|tool| tool.name).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn log_tools(&self) -> impl Iterator<Item = (&'static str, fn(&str) -> String)> + '_ {
        self.tools.iter().filter_map(|tool| match tool.kind {
            ToolKind::LogText(run) => Some((tool.name, run)),
            _ => None,
        })
    }

    pub fn scan_tools(&self) -> impl Iterator<Item = (&'static str, fn(&Path) -> String)> + '_ {
        self.tools.iter().filter_map(|tool| match tool.kind {
            ToolKind::DirectoryScan(run) => Some((tool.name, run)),
            _ => None,
        })
    }

    /// LLM tools fed by another tool's output, in declaration order.
    pub fn dependent_llm_tools(&self) -> impl Iterator<Item = (&'static str, LlmTool)> + '_ {
        self.llm_tools()
            .filter(|(_, tool)| matches!(tool.source, PromptSource::ToolOutput(_)))
    }

    /// LLM tools fed by the project's pipeline config.
    pub fn pipeline_llm_tools(&self) -> impl Iterator<Item = (&'static str, LlmTool)> + '_ {
        self.llm_tools()
            .filter(|(_, tool)| tool.source == PromptSource::PipelineConfig)
    }

    fn llm_tools(&self) -> impl Iterator<Item = (&'static str, LlmTool)> + '_ {
        self.tools.iter().filter_map(|tool| match tool.kind {
            ToolKind::Llm(llm_tool) => Some((tool.name, llm_tool)),
            _ => None,
        })
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_tools() -> Vec<ToolSpec> {
    use names::*;

    vec![
        ToolSpec::log_text(
            BUILD_STATUS,
            "Checks if the Jenkins build failed.",
            log::check_build_status,
        ),
        ToolSpec::log_text(
            ERROR_LINES,
            "Returns error-related lines from the build log.",
            log::extract_error_lines,
        ),
        ToolSpec::log_text(
            LOG_SUMMARY,
            "Counts lines, errors, warnings and failures in the log.",
            log::summarize_log,
        ),
        ToolSpec::log_text(
            SLOW_TESTS,
            "Lists tests that took five seconds or longer.",
            log::detect_slow_tests,
        ),
        ToolSpec::log_text(
            FAILED_TESTS,
            "Lists failing test lines.",
            log::extract_failed_tests,
        ),
        ToolSpec::log_text(
            DEPRECATION_WARNINGS,
            "Lists deprecation warnings.",
            log::detect_deprecation_warnings,
        ),
        ToolSpec::directory_scan(
            PYTHON_SYNTAX,
            "Parses every Python file and reports the first syntax error.",
            scan::check_python_syntax,
        ),
        ToolSpec::directory_scan(
            DOCKERFILE_SECURITY,
            "Flags insecure Dockerfile instructions.",
            scan::check_dockerfile_security,
        ),
        ToolSpec::directory_scan(
            SECRET_SCAN,
            "Finds hard-coded credentials.",
            scan::scan_secrets,
        ),
        ToolSpec::directory_scan(
            DEPENDENCY_PINS,
            "Flags unpinned Python and npm dependencies.",
            scan::check_dependency_pins,
        ),
        ToolSpec::directory_scan(
            CONFIG_SYNTAX,
            "Validates YAML and JSON files.",
            scan::check_config_syntax,
        ),
        ToolSpec::directory_scan(
            TERRAFORM_CHECK,
            "Identifies common misconfigurations in Terraform files.",
            scan::check_terraform,
        ),
        ToolSpec::directory_scan(
            STATIC_ANALYSIS,
            "Runs the language linter for each source file.",
            scan::run_static_analysis,
        ),
        ToolSpec::llm(
            SUGGEST_FIX,
            "Suggests fixes for the extracted errors.",
            PromptSource::ToolOutput(ERROR_LINES),
            llm::suggest_fix_prompt,
        ),
        ToolSpec::llm(
            GENERATE_PR_TEXT,
            "Creates GitHub PR content for the suggested fix.",
            PromptSource::ToolOutput(SUGGEST_FIX),
            llm::pr_text_prompt,
        ),
        ToolSpec::llm(
            EXPLAIN_CONFIG,
            "Explains the project's CI/CD pipeline configuration.",
            PromptSource::PipelineConfig,
            llm::explain_config_prompt,
        ),
    ]
}
