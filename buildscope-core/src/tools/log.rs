//! Checks that run over the raw build log text. Every function here is total:
//! it never panics and never returns an empty string.

use std::sync::LazyLock;

use regex::Regex;

pub const BUILD_FAILED: &str = "Build failed.";
pub const BUILD_PASSED: &str = "Build passed.";
pub const NO_ERRORS: &str = "No errors found.";
pub const EMPTY_LOG: &str = "Log is empty.";
pub const NO_SLOW_TESTS: &str = "No slow tests detected.";
pub const NO_FAILED_TESTS: &str = "No failed tests found.";
pub const NO_DEPRECATIONS: &str = "No deprecation warnings found.";

/// Durations at or above this many seconds count as slow.
pub const SLOW_TEST_THRESHOLD_SECS: f64 = 5.0;

const FAILURE_MARKERS: &[&str] = &["BUILD FAILURE", "FAILURE", "Error:", "Exception", "Traceback"];

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:time elapsed|took|duration|finished in|elapsed)[:=]?\s*\(?([0-9]+(?:\.[0-9]+)?)\s*(ms|milliseconds|s|sec|secs|seconds|m|min|mins|minutes)\b|\(([0-9]+(?:\.[0-9]+)?)\s*(ms|s)\)",
    )
    .expect("duration regex")
});

static FAILED_TEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<<< FAILURE!|<<< ERROR!|--- FAIL:|\bFAILED\b|tests? failed|\bFAIL\b\s+\S")
        .expect("failed test regex")
});

pub fn check_build_status(log: &str) -> String {
    if FAILURE_MARKERS.iter().any(|marker| log.contains(marker)) {
        BUILD_FAILED.to_string()
    } else {
        BUILD_PASSED.to_string()
    }
}

pub fn extract_error_lines(log: &str) -> String {
    let errors: Vec<&str> = log
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("error") || lower.contains("exception")
        })
        .collect();
    join_or(errors, NO_ERRORS)
}

pub fn summarize_log(log: &str) -> String {
    if log.trim().is_empty() {
        return EMPTY_LOG.to_string();
    }

    let mut total = 0usize;
    let mut errors = 0usize;
    let mut warnings = 0usize;
    let mut failures = 0usize;
    let mut last_line = "";
    for line in log.lines() {
        total += 1;
        let lower = line.to_lowercase();
        if lower.contains("error") || lower.contains("exception") {
            errors += 1;
        }
        if lower.contains("warn") {
            warnings += 1;
        }
        if FAILED_TEST_RE.is_match(line) {
            failures += 1;
        }
        if !line.trim().is_empty() {
            last_line = line.trim();
        }
    }

    format!(
        "{} Log has {total} lines: {errors} error lines, {warnings} warning lines, \
{failures} failed test lines. Last line: {last_line}",
        check_build_status(log)
    )
}

pub fn detect_slow_tests(log: &str) -> String {
    let slow: Vec<String> = log
        .lines()
        .filter_map(|line| {
            let secs = max_duration_secs(line)?;
            (secs >= SLOW_TEST_THRESHOLD_SECS).then(|| format!("{:.1}s: {}", secs, line.trim()))
        })
        .collect();
    if slow.is_empty() {
        return NO_SLOW_TESTS.to_string();
    }
    format!(
        "Slow tests (>= {SLOW_TEST_THRESHOLD_SECS}s):\n{}",
        slow.join("\n")
    )
}

pub fn extract_failed_tests(log: &str) -> String {
    let failed: Vec<&str> = log
        .lines()
        .filter(|line| FAILED_TEST_RE.is_match(line))
        .map(str::trim)
        .collect();
    join_or(failed, NO_FAILED_TESTS)
}

pub fn detect_deprecation_warnings(log: &str) -> String {
    let deprecations: Vec<&str> = log
        .lines()
        .filter(|line| line.to_lowercase().contains("deprecat"))
        .map(str::trim)
        .collect();
    join_or(deprecations, NO_DEPRECATIONS)
}

fn max_duration_secs(line: &str) -> Option<f64> {
    DURATION_RE
        .captures_iter(line)
        .filter_map(|caps| {
            let (value, unit) = match (caps.get(1), caps.get(2)) {
                (Some(value), Some(unit)) => (value, unit),
                _ => (caps.get(3)?, caps.get(4)?),
            };
            let value: f64 = value.as_str().parse().ok()?;
            Some(to_secs(value, unit.as_str()))
        })
        .reduce(f64::max)
}

fn to_secs(value: f64, unit: &str) -> f64 {
    match unit.to_lowercase().as_str() {
        "ms" | "milliseconds" => value / 1000.0,
        "m" | "min" | "mins" | "minutes" => value * 60.0,
        _ => value,
    }
}

fn join_or(lines: Vec<&str>, sentinel: &str) -> String {
    let joined = lines.join("\n");
    if joined.trim().is_empty() {
        sentinel.to_string()
    } else {
        joined
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: &[(&str, fn(&str) -> String)] = &[
        ("build_status", check_build_status),
        ("error_lines", extract_error_lines),
        ("log_summary", summarize_log),
        ("slow_tests", detect_slow_tests),
        ("failed_tests", extract_failed_tests),
        ("deprecation_warnings", detect_deprecation_warnings),
    ];

    fn assert_total(input: &str) {
        for (name, tool) in ALL {
            let output = tool(input);
            assert!(!output.trim().is_empty(), "{name} returned empty output");
        }
    }

    #[test]
    fn tools_are_total_on_empty_input() {
        assert_total("");
        assert_eq!(check_build_status(""), BUILD_PASSED);
        assert_eq!(extract_error_lines(""), NO_ERRORS);
        assert_eq!(summarize_log(""), EMPTY_LOG);
        assert_eq!(detect_slow_tests(""), NO_SLOW_TESTS);
        assert_eq!(extract_failed_tests(""), NO_FAILED_TESTS);
        assert_eq!(detect_deprecation_warnings(""), NO_DEPRECATIONS);
    }

    #[test]
    fn tools_are_total_on_garbage() {
        let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
        let garbage = String::from_utf8_lossy(&bytes).into_owned();
        assert_total(&garbage);
        assert_total("\u{0}\u{FFFD}\r\n\r\n\t");
    }

    #[test]
    fn tools_are_total_on_large_log() {
        let line = "[INFO] Running com.example.FooTest Tests run: 4, Time elapsed: 0.2 s\n";
        let log = line.repeat((1024 * 1024) / line.len() + 1);
        assert!(log.len() >= 1024 * 1024);
        assert_total(&log);
    }

    #[test]
    fn whitespace_error_lines_fall_back_to_sentinel() {
        assert_eq!(extract_error_lines("ok\nall good"), NO_ERRORS);
    }

    #[test]
    fn build_failure_line_is_detected() {
        let log = "BUILD FAILURE: NullPointerException at Foo.java:10";
        assert_eq!(check_build_status(log), BUILD_FAILED);
        assert_eq!(extract_error_lines(log), log);
    }

    #[test]
    fn error_lines_are_case_insensitive() {
        let log = "compiling\nERROR: missing symbol\nrunning\njava.lang.IllegalStateException\n";
        assert_eq!(
            extract_error_lines(log),
            "ERROR: missing symbol\njava.lang.IllegalStateException"
        );
    }

    #[test]
    fn slow_tests_use_threshold() {
        let log = "\
Tests run: 3, Failures: 0, Errors: 0, Skipped: 0, Time elapsed: 12.5 s - in com.example.SlowTest
Tests run: 1, Failures: 0, Errors: 0, Skipped: 0, Time elapsed: 0.4 s - in com.example.FastTest
test_upload (8500 ms)
test_ping (12 ms)
integration suite took 2 minutes";
        let output = detect_slow_tests(log);
        assert!(output.contains("com.example.SlowTest"));
        assert!(output.contains("test_upload"));
        assert!(output.contains("integration suite"));
        assert!(!output.contains("FastTest"));
        assert!(!output.contains("test_ping"));
    }

    #[test]
    fn failed_tests_are_extracted() {
        let log = "\
testLogin(com.example.AuthTest)  Time elapsed: 0.01 s  <<< FAILURE!
--- FAIL: TestParse (0.00s)
tests/test_api.py::test_get FAILED
all checks passed";
        let output = extract_failed_tests(log);
        assert_eq!(output.lines().count(), 3);
        assert!(!output.contains("all checks passed"));
    }

    #[test]
    fn deprecations_are_reported() {
        let log = "warning: `foo` is deprecated\nDeprecationWarning: bar\nfine";
        assert_eq!(
            detect_deprecation_warnings(log),
            "warning: `foo` is deprecated\nDeprecationWarning: bar"
        );
    }

    #[test]
    fn summary_counts_lines() {
        let log = "start\nWARNING: slow disk\nError: boom\nfinish\n";
        let summary = summarize_log(log);
        assert!(summary.starts_with(BUILD_FAILED));
        assert!(summary.contains("4 lines"));
        assert!(summary.contains("1 error lines"));
        assert!(summary.contains("1 warning lines"));
        assert!(summary.ends_with("Last line: finish"));
    }
}
