use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use buildscope_core::aggregator::Aggregator;
use buildscope_core::config::AnalysisSettings;
use buildscope_core::invoker::{ResilientInvoker, NO_BACKEND_MESSAGE};
use buildscope_core::prelude::*;
use buildscope_core::provider::Provider;
use buildscope_core::tools::{log, names, scan, ToolRegistry};
use buildscope_core::types::{Completion, ToolOutput, ELAPSED_TIME_KEY, SUMMARY_KEY};
use tempfile::tempdir;

struct FixedProvider {
    name: &'static str,
    answer: std::result::Result<&'static str, &'static str>,
    calls: AtomicUsize,
}

impl FixedProvider {
    fn new(
        name: &'static str,
        answer: std::result::Result<&'static str, &'static str>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            answer,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Provider for FixedProvider {
    fn label(&self) -> String {
        self.name.to_string()
    }

    fn model_name(&self) -> &str {
        self.name
    }

    async fn complete(&self, _prompt: &str) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.answer {
            Ok(text) => Ok(Completion::new(text)),
            Err(message) => Err(BuildScopeError::provider(message)),
        }
    }
}

#[tokio::test]
async fn secondary_answers_when_primary_fails() {
    let primary = FixedProvider::new("hosted", Err("401 unauthorized"));
    let secondary = FixedProvider::new("local", Ok("restart the agent"));
    let invoker = ResilientInvoker::new(vec![primary.clone(), secondary.clone()]);

    let result = invoker.invoke("why did it fail?").await;

    assert!(result.succeeded);
    assert_eq!(result.text, "restart the agent");
    assert_eq!(result.model_name, "local");
    assert_eq!(primary.calls.load(Ordering::SeqCst), 1);
    assert_eq!(secondary.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn scan_reports_unreadable_file_and_continues() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.py"), [0xc3, 0x28, 0x0a]).unwrap();
    fs::write(dir.path().join("b.py"), "def broken(:\n    pass\n").unwrap();

    let output = scan::check_python_syntax(dir.path());
    let lines: Vec<&str> = output.lines().collect();

    assert_eq!(lines.len(), 2, "{output}");
    assert!(lines[0].contains("a.py: read error"));
    assert!(lines[1].contains("b.py:1: syntax error"));
}

#[tokio::test(flavor = "multi_thread")]
async fn full_run_over_a_project() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::write(root.join("Dockerfile"), "FROM python:latest\nRUN pip install flask\n").unwrap();
    fs::write(root.join("requirements.txt"), "flask\n").unwrap();
    fs::write(root.join("Jenkinsfile"), "pipeline { agent any }\n").unwrap();

    let provider = FixedProvider::new("stub", Ok("Add a null check in Foo.java line 10."));
    let aggregator = Aggregator::new(
        ToolRegistry::standard(),
        ResilientInvoker::new(vec![provider.clone()]),
        AnalysisSettings {
            project_root: root.to_path_buf(),
            unit_timeout: None,
        },
    );

    let run = aggregator
        .analyze("[INFO] compiling\nBUILD FAILURE: NullPointerException at Foo.java:10\n")
        .await;

    assert_eq!(run.tool_results.len(), aggregator.registry().len());
    assert_eq!(
        run.result(names::BUILD_STATUS),
        Some(&ToolOutput::Text(log::BUILD_FAILED.to_string()))
    );
    assert!(run
        .result(names::DOCKERFILE_SECURITY)
        .unwrap()
        .display_text()
        .contains("Dockerfile"));
    assert!(run
        .result(names::DEPENDENCY_PINS)
        .unwrap()
        .display_text()
        .contains("unpinned requirement: flask"));
    let ToolOutput::Llm(explained) = run.result(names::EXPLAIN_CONFIG).unwrap() else {
        panic!("explain_config should have called the LLM");
    };
    assert!(explained.succeeded);
    // suggest_fix, generate_pr_text, explain_config and the synthesis.
    assert_eq!(provider.calls.load(Ordering::SeqCst), 4);
    assert!(run.summary.text.contains("Foo.java"));

    let map = run.to_result_map();
    assert!(map.contains_key(SUMMARY_KEY));
    assert!(map[ELAPSED_TIME_KEY].as_str().unwrap().ends_with('s'));
}

#[tokio::test(flavor = "multi_thread")]
async fn run_without_backend_is_still_complete() {
    let dir = tempdir().unwrap();
    let aggregator = Aggregator::new(
        ToolRegistry::standard(),
        ResilientInvoker::new(Vec::new()),
        AnalysisSettings::default(),
    );

    let run = aggregator.run("", dir.path()).await;

    assert_eq!(run.tool_results.len(), aggregator.registry().len());
    assert_eq!(
        run.result(names::LOG_SUMMARY).unwrap().display_text(),
        log::EMPTY_LOG
    );
    assert!(!run.summary.succeeded);
    assert!(run.summary.text.contains(NO_BACKEND_MESSAGE));
}
