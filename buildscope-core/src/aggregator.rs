//! Fans one analysis request out over the tool registry and synthesizes the
//! results into a single diagnosis.
//!
//! Phases run in order and each ends at a `join_all` barrier:
//! 1. log-text tools on the blocking pool,
//! 2. LLM tools fed by another tool's output, one after another,
//! 3. directory scans on the blocking pool next to the pipeline-config LLM
//!    tools,
//! 4. the synthesis call.
//!
//! A unit that panics or overruns the configured deadline is recorded as
//! `"<tool> failed: ..."` under its own name; `run` itself never fails.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::AnalysisSettings;
use crate::invoker::ResilientInvoker;
use crate::tools::{PromptSource, ToolRegistry};
use crate::types::{AnalysisRun, InvocationResult, ToolOutput, ToolPayload};

const SYNTHESIS_TEMPLATE: &str = include_str!("../prompts/synthesis.txt");
const TOOL_RESULTS_PLACEHOLDER: &str = "{{TOOL_RESULTS}}";
const LOG_PLACEHOLDER: &str = "{{LOG}}";
const LOG_NOTE_PLACEHOLDER: &str = "{{LOG_NOTE}}";

/// Only the tail of the log goes into the synthesis prompt.
pub const SYNTHESIS_LOG_TAIL_BYTES: usize = 16 * 1024;

/// Model name recorded when the synthesis task itself did not complete.
const UNFINISHED_MODEL: &str = "unknown";

type Pending = (&'static str, JoinHandle<ToolOutput>);

#[derive(Debug, Clone)]
pub struct Aggregator {
    registry: Arc<ToolRegistry>,
    invoker: ResilientInvoker,
    settings: AnalysisSettings,
}

impl Aggregator {
    pub fn new(
        registry: ToolRegistry,
        invoker: ResilientInvoker,
        settings: AnalysisSettings,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            invoker,
            settings,
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn invoker(&self) -> &ResilientInvoker {
        &self.invoker
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    /// Runs against the configured project root.
    pub async fn analyze(&self, log_text: &str) -> AnalysisRun {
        let root = self.settings.project_root.clone();
        self.run(log_text, &root).await
    }

    #[tracing::instrument(
        level = "INFO",
        skip_all,
        fields(log_bytes = log_text.len(), root = %project_root.display())
    )]
    pub async fn run(&self, log_text: &str, project_root: &Path) -> AnalysisRun {
        let started = Instant::now();
        let mut tool_results = BTreeMap::new();

        let log: Arc<str> = Arc::from(log_text);
        let pending: Vec<Pending> = self
            .registry
            .log_tools()
            .map(|(name, run)| {
                let log = log.clone();
                let handle = tokio::task::spawn_blocking(move || ToolOutput::Text(run(&log)));
                (name, handle)
            })
            .collect();
        tool_results.extend(self.settle_all(pending).await);
        debug!("Log phase finished after {:?}", started.elapsed());

        for (name, tool) in self.registry.dependent_llm_tools() {
            let PromptSource::ToolOutput(source) = tool.source else {
                continue;
            };
            let input = tool_results
                .get(source)
                .map(ToolOutput::display_text)
                .unwrap_or_default();
            let invoker = self.invoker.clone();
            let handle = tokio::spawn(async move {
                tool.run(&ToolPayload::LogText(input), &invoker).await
            });
            let output = self.settle(name, handle).await;
            tool_results.insert(name.to_string(), output);
        }
        debug!("Dependent LLM phase finished after {:?}", started.elapsed());

        let root = project_root.to_path_buf();
        let mut pending: Vec<Pending> = self
            .registry
            .scan_tools()
            .map(|(name, run)| {
                let root = root.clone();
                let handle = tokio::task::spawn_blocking(move || ToolOutput::Text(run(&root)));
                (name, handle)
            })
            .collect();
        pending.extend(self.registry.pipeline_llm_tools().map(|(name, tool)| {
            let invoker = self.invoker.clone();
            let payload = ToolPayload::FileRoot(root.clone());
            let handle = tokio::spawn(async move { tool.run(&payload, &invoker).await });
            (name, handle)
        }));
        tool_results.extend(self.settle_all(pending).await);
        debug!("Directory phase finished after {:?}", started.elapsed());

        let prompt = self.synthesis_prompt(log_text, &tool_results);
        let invoker = self.invoker.clone();
        let handle = tokio::spawn(async move { invoker.invoke(&prompt).await });
        let summary = match self.join_with_deadline("summary", handle).await {
            Ok(result) => degrade(result),
            Err(detail) => degrade(InvocationResult::failure(UNFINISHED_MODEL, detail)),
        };

        let elapsed = started.elapsed();
        info!(
            "Analysis finished in {:.2}s, synthesis succeeded: {}",
            elapsed.as_secs_f64(),
            summary.succeeded
        );
        AnalysisRun {
            tool_results,
            summary,
            elapsed,
        }
    }

    /// Synthesis prompt: tool results in registry order, then the log tail.
    pub fn synthesis_prompt(
        &self,
        log_text: &str,
        results: &BTreeMap<String, ToolOutput>,
    ) -> String {
        let sections: Vec<String> = self
            .registry
            .iter()
            .filter_map(|tool| {
                let output = results.get(tool.name)?;
                Some(format!("### {}\n{}", tool.name, output.display_text().trim_end()))
            })
            .collect();
        let (tail, truncated) = log_tail(log_text, SYNTHESIS_LOG_TAIL_BYTES);
        let note = if truncated {
            format!(" (last {} bytes of {})", tail.len(), log_text.len())
        } else {
            String::new()
        };
        SYNTHESIS_TEMPLATE
            .replace(TOOL_RESULTS_PLACEHOLDER, &sections.join("\n\n"))
            .replace(LOG_NOTE_PLACEHOLDER, &note)
            .replace(LOG_PLACEHOLDER, tail.trim_end())
    }

    async fn settle_all(&self, pending: Vec<Pending>) -> Vec<(String, ToolOutput)> {
        join_all(pending.into_iter().map(|(name, handle)| async move {
            (name.to_string(), self.settle(name, handle).await)
        }))
        .await
    }

    async fn settle(&self, name: &str, handle: JoinHandle<ToolOutput>) -> ToolOutput {
        self.join_with_deadline(name, handle)
            .await
            .unwrap_or_else(ToolOutput::Text)
    }

    /// Awaits a unit, turning a panic, cancellation or missed deadline into
    /// the failure text recorded for it.
    async fn join_with_deadline<T>(
        &self,
        name: &str,
        handle: JoinHandle<T>,
    ) -> std::result::Result<T, String> {
        let joined = match self.settings.unit_timeout {
            Some(limit) => {
                let abort = handle.abort_handle();
                match tokio::time::timeout(limit, handle).await {
                    Ok(joined) => joined,
                    Err(_) => {
                        abort.abort();
                        warn!("{name} exceeded its {limit:?} deadline");
                        return Err(format!(
                            "{name} failed: timed out after {}",
                            format_secs(limit)
                        ));
                    }
                }
            }
            None => handle.await,
        };
        joined.map_err(|err| {
            warn!("{name} did not complete: {err}");
            format!("{name} failed: {err}")
        })
    }
}

/// A failed synthesis still carries readable text.
fn degrade(mut result: InvocationResult) -> InvocationResult {
    if !result.succeeded {
        result.text = result.display_text();
    }
    result
}

fn format_secs(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}

/// Last `max_bytes` of `text`, cut at a line start when one is available.
fn log_tail(text: &str, max_bytes: usize) -> (&str, bool) {
    if text.len() <= max_bytes {
        return (text, false);
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    let tail = &text[start..];
    let tail = match tail.find('\n') {
        Some(pos) if pos + 1 < tail.len() => &tail[pos + 1..],
        _ => tail,
    };
    (tail, true)
}
