use std::path::PathBuf;
use std::time::Duration;

use buildscope_core::config::{
    AnalysisSettings, LlmSettings, DEFAULT_HOSTED_MODEL, DEFAULT_LOCAL_MODEL, DEFAULT_TIMEOUT_SECS,
};
use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "buildscope-app")]
#[command(about = "Build log analysis service and CLI", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
    #[command(flatten)]
    pub llm: LlmArgs,
    #[command(flatten)]
    pub analysis: AnalysisArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Analyze a single build log and print the result.
    Analyze {
        #[arg(long)]
        log: PathBuf,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Html,
}

#[derive(Args, Debug)]
pub struct LlmArgs {
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,
    #[arg(long, env = "OPENAI_MODEL", default_value = DEFAULT_HOSTED_MODEL)]
    pub openai_model: String,
    #[arg(long, env = "OLLAMA_BASE_URL")]
    pub ollama_base_url: Option<String>,
    #[arg(long, env = "OLLAMA_MODEL", default_value = DEFAULT_LOCAL_MODEL)]
    pub ollama_model: String,
    #[arg(long, env = "LLM_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECS)]
    pub llm_timeout_secs: u64,
}

impl LlmArgs {
    pub fn settings(&self) -> LlmSettings {
        LlmSettings {
            openai_api_key: non_blank(self.openai_api_key.as_deref()),
            openai_model: Some(self.openai_model.clone()),
            ollama_base_url: non_blank(self.ollama_base_url.as_deref()),
            ollama_model: Some(self.ollama_model.clone()),
            timeout_secs: Some(self.llm_timeout_secs),
        }
    }
}

#[derive(Args, Debug)]
pub struct AnalysisArgs {
    /// Directory scanned by the directory tools.
    #[arg(long, env = "PROJECT_ROOT", default_value = ".")]
    pub project_root: PathBuf,
    /// Deadline for each tool and LLM call. Unset waits indefinitely.
    #[arg(long, env = "PHASE_TIMEOUT_SECS")]
    pub phase_timeout_secs: Option<u64>,
}

impl AnalysisArgs {
    pub fn settings(&self) -> AnalysisSettings {
        AnalysisSettings {
            project_root: self.project_root.clone(),
            unit_timeout: self
                .phase_timeout_secs
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

// An exported but empty variable counts as unset.
fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_backends() {
        let cli = Cli::try_parse_from(["buildscope-app"]).unwrap();
        let llm = cli.llm.settings();
        assert_eq!(llm.openai_model.as_deref(), Some("gpt-4"));
        assert_eq!(llm.ollama_model.as_deref(), Some("llama3.2"));
        assert_eq!(llm.timeout_secs, Some(60));
        let analysis = cli.analysis.settings();
        assert_eq!(analysis.project_root, PathBuf::from("."));
        assert_eq!(analysis.unit_timeout, None);
        assert!(cli.command.is_none());
    }

    #[test]
    fn analyze_subcommand_and_flags() {
        let cli = Cli::try_parse_from([
            "buildscope-app",
            "--ollama-base-url",
            "http://localhost:11434",
            "--openai-api-key",
            "  ",
            "--phase-timeout-secs",
            "30",
            "analyze",
            "--log",
            "build.log",
            "--format",
            "json",
        ])
        .unwrap();

        let llm = cli.llm.settings();
        assert_eq!(llm.openai_api_key, None);
        assert_eq!(llm.ollama_base_url.as_deref(), Some("http://localhost:11434"));
        assert_eq!(llm.provider_configs().len(), 1);
        assert_eq!(
            cli.analysis.settings().unit_timeout,
            Some(Duration::from_secs(30))
        );
        match cli.command {
            Some(Command::Analyze { log, format }) => {
                assert_eq!(log, PathBuf::from("build.log"));
                assert_eq!(format, OutputFormat::Json);
            }
            None => panic!("expected analyze subcommand"),
        }
    }
}
