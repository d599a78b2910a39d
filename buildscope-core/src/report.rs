use chrono::{DateTime, Utc};

use crate::types::AnalysisRun;

const REPORT_TEMPLATE: &str = include_str!("report.html");

/// Renders a run as a standalone HTML page stamped with the current time.
pub fn render_html(run: &AnalysisRun) -> String {
    render_html_at(run, Utc::now())
}

pub fn render_html_at(run: &AnalysisRun, generated_at: DateTime<Utc>) -> String {
    let rows: Vec<String> = run
        .tool_results
        .iter()
        .map(|(name, output)| {
            format!(
                "      <tr><th>{}</th><td><pre>{}</pre></td></tr>",
                escape_html(name),
                escape_html(&output.display_text())
            )
        })
        .collect();
    let summary_class = if run.summary.succeeded { "" } else { " failed" };

    REPORT_TEMPLATE
        .replace(
            "{{GENERATED_AT}}",
            &generated_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
        .replace("{{MODEL}}", &escape_html(&run.summary.model_name))
        .replace("{{ELAPSED}}", &format!("{:.2}s", run.elapsed_secs()))
        .replace("{{SUMMARY_CLASS}}", summary_class)
        .replace("{{SUMMARY}}", &escape_html(&run.summary.display_text()))
        .replace("{{ROWS}}", &rows.join("\n"))
}

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            // Braces are escaped so dynamic text can never form a placeholder.
            '{' => escaped.push_str("&#123;"),
            '}' => escaped.push_str("&#125;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
