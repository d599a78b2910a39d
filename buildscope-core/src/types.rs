use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key under which the synthesis is stored in a flattened result map.
pub const SUMMARY_KEY: &str = "summary";
/// Key under which the run's elapsed time is stored in a flattened result map.
pub const ELAPSED_TIME_KEY: &str = "elapsed_time";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<::llm::chat::Usage> for LlmUsage {
    fn from(value: ::llm::chat::Usage) -> Self {
        Self {
            prompt_tokens: value.prompt_tokens,
            completion_tokens: value.completion_tokens,
            total_tokens: value.total_tokens,
        }
    }
}

/// Raw provider answer before it is normalized into an [`InvocationResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<LlmUsage>,
}

impl Completion {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }

    pub fn with_usage(mut self, usage: LlmUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationResult {
    pub text: String,
    pub model_name: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
    pub succeeded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl InvocationResult {
    pub fn success(model_name: impl Into<String>, completion: Completion) -> Self {
        let usage = completion.usage.unwrap_or_default();
        Self {
            text: completion.text,
            model_name: model_name.into(),
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
            succeeded: true,
            error_detail: None,
        }
    }

    pub fn failure(model_name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            model_name: model_name.into(),
            input_tokens: 0,
            output_tokens: 0,
            total_tokens: 0,
            succeeded: false,
            error_detail: Some(detail.into()),
        }
    }

    /// Text to show a reader: the model output, or the failure explanation.
    pub fn display_text(&self) -> String {
        if self.succeeded {
            self.text.clone()
        } else {
            format!(
                "LLM call failed: {}",
                self.error_detail.as_deref().unwrap_or("unknown error")
            )
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolPayload {
    LogText(String),
    FileRoot(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolOutput {
    Text(String),
    Llm(InvocationResult),
}

impl ToolOutput {
    pub fn display_text(&self) -> String {
        match self {
            ToolOutput::Text(text) => text.clone(),
            ToolOutput::Llm(result) => result.display_text(),
        }
    }
}

impl From<String> for ToolOutput {
    fn from(value: String) -> Self {
        ToolOutput::Text(value)
    }
}

impl From<InvocationResult> for ToolOutput {
    fn from(value: InvocationResult) -> Self {
        ToolOutput::Llm(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRun {
    pub tool_results: BTreeMap<String, ToolOutput>,
    pub summary: InvocationResult,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

impl AnalysisRun {
    pub fn result(&self, tool: &str) -> Option<&ToolOutput> {
        self.tool_results.get(tool)
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Flatten into a single map: one key per tool plus the reserved
    /// `summary` and `elapsed_time` keys.
    pub fn to_result_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        for (name, output) in &self.tool_results {
            let value = serde_json::to_value(output).unwrap_or(Value::Null);
            map.insert(name.clone(), value);
        }
        map.insert(
            SUMMARY_KEY.to_string(),
            serde_json::to_value(&self.summary).unwrap_or(Value::Null),
        );
        map.insert(
            ELAPSED_TIME_KEY.to_string(),
            Value::String(format!("{:.2}s", self.elapsed_secs())),
        );
        map
    }
}

fn serialize_secs<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64(value.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_copies_usage() {
        let completion = Completion::new("fixed").with_usage(LlmUsage {
            prompt_tokens: 3,
            completion_tokens: 4,
            total_tokens: 7,
        });
        let result = InvocationResult::success("gpt-4", completion);
        assert!(result.succeeded);
        assert_eq!(result.text, "fixed");
        assert_eq!(result.input_tokens, 3);
        assert_eq!(result.output_tokens, 4);
        assert_eq!(result.total_tokens, 7);
        assert_eq!(result.error_detail, None);
    }

    #[test]
    fn success_without_usage_reports_zero_tokens() {
        let result = InvocationResult::success("llama3.2", Completion::new("ok"));
        assert_eq!(result.total_tokens, 0);
    }

    #[test]
    fn failure_display_text_explains_error() {
        let result = InvocationResult::failure("none", "boom");
        assert!(!result.succeeded);
        assert_eq!(result.display_text(), "LLM call failed: boom");
    }

    #[test]
    fn result_map_contains_reserved_keys() {
        let mut tool_results = BTreeMap::new();
        tool_results.insert(
            "build_status".to_string(),
            ToolOutput::Text("Build passed.".to_string()),
        );
        let run = AnalysisRun {
            tool_results,
            summary: InvocationResult::success("gpt-4", Completion::new("all good")),
            elapsed: Duration::from_millis(1500),
        };
        let map = run.to_result_map();
        assert_eq!(map["build_status"], Value::String("Build passed.".into()));
        assert_eq!(map[SUMMARY_KEY]["text"], Value::String("all good".into()));
        assert_eq!(map[ELAPSED_TIME_KEY], Value::String("1.50s".into()));
    }
}
