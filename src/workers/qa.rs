//! QA role - runs tests and linters, reports failures and coverage
//!
//! Counts come from the output of the last command that printed a test
//! summary, so a re-run after a fix replaces the earlier numbers.

use serde_json::json;

use super::profile::RoleProfile;
use super::tool_loop::Transcript;
use crate::domain::{AgentRole, Artifacts, ReportStatus};

const SYSTEM_PROMPT: &str = "You are the QA engineer on a small software team. You verify changes; you do not \
fix them.

How to work:
- Find out how the project is tested (look for test directories, package manifests, CI files).
- Run the test suite with run_command, and the linter when the project has one. Run with coverage if it is set up.
- Look at the diff (git_diff) to check the changed code is actually exercised.
- Do not edit source files. If something fails, describe exactly what failed and where.
- Finish by calling submit_report. Use status \"success\" only when everything passes, \"warning\" when tests or \
lint fail, and \"error\" when you could not run them at all.";

const TOOLS: &[&str] = &[
    "read_file",
    "list_directory",
    "repo_tree",
    "glob",
    "grep",
    "run_command",
    "git_status",
    "git_diff",
    "git_log",
    "submit_report",
];

pub struct Qa;

impl RoleProfile for Qa {
    fn role(&self) -> AgentRole {
        AgentRole::Qa
    }

    fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    fn tools(&self) -> &'static [&'static str] {
        TOOLS
    }

    fn artifacts(&self, transcript: &Transcript, _written_files: &[String]) -> Artifacts {
        let mut artifacts = Artifacts::new();
        let outputs: Vec<&str> = transcript.calls_to("run_command").map(|inv| inv.content.as_str()).collect();

        let counts = outputs.iter().rev().find_map(|out| test_counts(out));
        let lint_errors = outputs.iter().rev().find_map(|out| lint_error_count(out));
        let coverage = outputs.iter().rev().find_map(|out| coverage_percent(out));

        if let Some((passed, failed)) = counts {
            artifacts.insert("tests_passed".to_string(), json!(passed));
            artifacts.insert("tests_failed".to_string(), json!(failed));
            artifacts.insert(
                "qa_approved".to_string(),
                json!(failed == 0 && lint_errors.unwrap_or(0) == 0),
            );
        }
        if let Some(errors) = lint_errors {
            artifacts.insert("lint_errors".to_string(), json!(errors));
        }
        if let Some(percent) = coverage {
            artifacts.insert("coverage_percent".to_string(), json!(percent));
        }
        artifacts
    }

    fn infer_status(&self, transcript: &Transcript, artifacts: &Artifacts) -> ReportStatus {
        match artifacts.get("qa_approved").and_then(|v| v.as_bool()) {
            Some(false) => ReportStatus::Warning,
            Some(true) => ReportStatus::Success,
            None => transcript.inferred_status(),
        }
    }
}

/// Sum of the numbers written right before `word` (ignoring trailing punctuation)
fn count_before(text: &str, words: &[&str]) -> Option<u64> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut total = None;
    for pair in tokens.windows(2) {
        let word = pair[1].trim_end_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
        if !words.contains(&word.as_str()) {
            continue;
        }
        if let Ok(n) = pair[0].trim_start_matches(|c: char| !c.is_ascii_digit()).parse::<u64>() {
            total = Some(total.unwrap_or(0) + n);
        }
    }
    total
}

/// `(passed, failed)` from a pytest, cargo, jest or go style summary
fn test_counts(output: &str) -> Option<(u64, u64)> {
    let passed = count_before(output, &["passed", "passing"]);
    let failed = count_before(output, &["failed", "failing"]);
    match (passed, failed) {
        (None, None) => None,
        (p, f) => Some((p.unwrap_or(0), f.unwrap_or(0))),
    }
}

/// Lint errors from a "Found N errors" line
fn lint_error_count(output: &str) -> Option<u64> {
    output
        .lines()
        .filter(|line| line.trim_start().to_lowercase().starts_with("found"))
        .filter_map(|line| count_before(line, &["error", "errors"]))
        .last()
}

/// Total coverage from a `TOTAL ... 87%` or `coverage: 87.5%` line
fn coverage_percent(output: &str) -> Option<f64> {
    output
        .lines()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.starts_with("total") || lower.contains("coverage")
        })
        .filter_map(|line| {
            line.split_whitespace()
                .rev()
                .find_map(|token| token.trim_end_matches(|c: char| c == ',' || c == '.').strip_suffix('%'))
                .and_then(|n| n.parse::<f64>().ok())
        })
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerConfig;
    use crate::llm::{CompletionResponse, MockLlmClient, ToolCall};
    use crate::workers::{AgentWorker, Assignment, ToolInvocation, Worker};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn ran(content: &str, is_error: bool) -> ToolInvocation {
        ToolInvocation {
            name: "run_command".to_string(),
            input: json!({"command": "make test"}),
            content: content.to_string(),
            is_error,
        }
    }

    #[test]
    fn test_summary_formats() {
        assert_eq!(test_counts("===== 3 passed, 1 failed in 0.21s ====="), Some((3, 1)));
        assert_eq!(
            test_counts("test result: ok. 12 passed; 0 failed; 0 ignored"),
            Some((12, 0))
        );
        assert_eq!(test_counts("Tests: 2 failed, 8 passed, 10 total"), Some((8, 2)));
        assert_eq!(test_counts("no tests ran"), None);
    }

    #[test]
    fn test_lint_and_coverage() {
        assert_eq!(lint_error_count("x.py:1:1: F401 unused\nFound 3 errors."), Some(3));
        assert_eq!(lint_error_count("All checks passed!"), None);
        assert_eq!(coverage_percent("Name  Stmts  Miss  Cover\nTOTAL   120    18    85%"), Some(85.0));
        assert_eq!(coverage_percent("coverage: 72.5% of statements"), Some(72.5));
    }

    #[test]
    fn test_last_summary_wins() {
        let transcript = Transcript {
            invocations: vec![ran("Exit code: 1\n2 passed, 1 failed", true), ran("3 passed", false)],
            ..Default::default()
        };
        let artifacts = Qa.artifacts(&transcript, &[]);
        assert_eq!(artifacts["tests_passed"], json!(3));
        assert_eq!(artifacts["tests_failed"], json!(0));
        assert_eq!(artifacts["qa_approved"], json!(true));
        assert_eq!(Qa.infer_status(&transcript, &artifacts), ReportStatus::Success);
    }

    #[test]
    fn test_lint_errors_block_approval() {
        let transcript = Transcript {
            invocations: vec![ran("5 passed", false), ran("Exit code: 1\nFound 2 errors.", true)],
            ..Default::default()
        };
        let artifacts = Qa.artifacts(&transcript, &[]);
        assert_eq!(artifacts["lint_errors"], json!(2));
        assert_eq!(artifacts["qa_approved"], json!(false));
        assert_eq!(Qa.infer_status(&transcript, &artifacts), ReportStatus::Warning);
    }

    #[tokio::test]
    async fn test_qa_worker_runs_tests() {
        let dir = tempdir().unwrap();
        let llm = Arc::new(MockLlmClient::new());
        llm.push_response(CompletionResponse::with_tool_calls(
            "",
            vec![ToolCall::new(
                "c1",
                "run_command",
                json!({"command": "echo '4 passed, 1 failed in 0.1s'; exit 1"}),
            )],
        ));
        llm.push_text("One test fails in test_config.py.");

        let worker = AgentWorker::new(Qa, llm, WorkerConfig::default());
        let report = worker
            .run(&Assignment {
                instruction: "Run the tests".to_string(),
                repo_path: dir.path().to_path_buf(),
                task: "t".to_string(),
                session_id: "s1".to_string(),
                changed_files: vec!["config.py".to_string()],
            })
            .await
            .unwrap();

        assert_eq!(report.status, ReportStatus::Warning);
        assert_eq!(report.text, "One test fails in test_config.py.");
        assert_eq!(report.artifacts["tests_passed"], json!(4));
        assert_eq!(report.artifacts["tests_failed"], json!(1));
        assert_eq!(report.artifacts["qa_approved"], json!(false));
    }
}
