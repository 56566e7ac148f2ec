//! Prompt rendering for the supervisor
//!
//! Every history rendering is windowed and truncated so prompt size stays
//! bounded no matter how long a run gets.

use std::fmt::Write;
use std::path::Path;

use crate::config::SupervisorConfig;
use crate::domain::{AgentRole, Artifacts, HumanApproval, RunState, TERMINAL};

use super::parser::truncate_chars;

/// System prompt shared by planning and routing calls
pub fn system_prompt(valid: &[AgentRole]) -> String {
    let mut team = String::new();
    for role in valid {
        let _ = writeln!(team, "- {}: {}", role, role.capability());
    }

    format!(
        r#"You are the engineering manager of a small software team. You do not write code yourself. You plan the work, hand each step to exactly one specialist, read their reports and decide what happens next.

## Your team
{team}
## Routing rules
1. Any code change must be verified by qa before the task is finished.
2. When qa reports failures, send developer the exact failing tests and error output.
3. Significant changes go to reviewer before finishing.
4. Use devops only for build, CI, container or dependency work, and docs only when documentation has to change.
5. Choose {terminal} once the task is done and verified, or when the team is stuck on an error it cannot fix.
6. Each instruction must be a concrete, self-contained step: which files, what change, how to check it.

Always answer with a single JSON object and nothing else."#,
        team = team,
        terminal = TERMINAL
    )
}

/// User prompt for the opening plan
pub fn planning_prompt(task: &str, repo_path: &Path, repo_summary: &str, valid: &[AgentRole]) -> String {
    format!(
        r#"## Task
{task}

## Repository
Path: {path}
```
{tree}
```

Break the task into steps and pick who starts. Respond with this JSON object:
{{"thinking": "your analysis", "plan": "numbered steps, one per line", "first_agent": "one of: {agents}", "first_instruction": "concrete instruction for that agent", "complexity": "low | medium | high", "estimated_steps": 3}}"#,
        task = task,
        path = repo_path.display(),
        tree = repo_summary.trim_end(),
        agents = agent_list(valid),
    )
}

/// User prompt for a routing decision
pub fn routing_prompt(state: &RunState, config: &SupervisorConfig, valid: &[AgentRole]) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "## Task\n{}\n", state.task);
    let _ = writeln!(prompt, "## Plan\n{}\n", state.plan);

    let _ = writeln!(prompt, "## Progress");
    let _ = writeln!(prompt, "Iteration {} of {}", state.iteration, config.max_iterations);
    let remaining = config.max_iterations.saturating_sub(state.iteration);
    if remaining <= 1 {
        let _ = writeln!(
            prompt,
            "The iteration limit is about to be reached. Choose {} unless one essential step remains.",
            TERMINAL
        );
    }
    prompt.push('\n');

    let _ = writeln!(prompt, "## Latest agent reports (most recent first)");
    prompt.push_str(&format_agent_outputs(state, config.output_window, config.output_chars));
    prompt.push('\n');

    let _ = writeln!(prompt, "## Routing history");
    prompt.push_str(&format_routing_history(state, config.history_window, config.history_chars));
    prompt.push('\n');

    let _ = writeln!(prompt, "## Artifacts");
    prompt.push_str(&format_artifacts(&state.artifacts, config.artifact_window, config.artifact_chars));
    prompt.push('\n');

    if let HumanApproval::Rejected { feedback } = &state.human_approval {
        let _ = writeln!(prompt, "## Human feedback");
        let target = state.next_agent.map(|n| n.to_string()).unwrap_or_default();
        let _ = writeln!(
            prompt,
            "A human reviewer rejected the planned dispatch to {} with this instruction:\n> {}\n",
            target, state.current_instruction
        );
        let _ = writeln!(prompt, "Their feedback, which you must follow:\n{}\n", feedback);
    }

    let _ = write!(
        prompt,
        r#"Decide the next step. Respond with this JSON object:
{{"thinking": "what the reports tell you", "next_agent": "one of: {agents} or {terminal}", "instruction": "concrete instruction for that agent", "reason": "one line on why", "plan_update": null}}"#,
        agents = agent_list(valid),
        terminal = TERMINAL
    );

    prompt
}

/// Last `window` outputs, newest first, each cut to `max_chars`
pub fn format_agent_outputs(state: &RunState, window: usize, max_chars: usize) -> String {
    if state.agent_outputs.is_empty() {
        return "(no reports yet)\n".to_string();
    }

    let mut out = String::new();
    for entry in state.agent_outputs.iter().rev().take(window) {
        let _ = writeln!(
            out,
            "### [iteration {}] {} {} {}",
            entry.iteration,
            entry.agent.as_str().to_uppercase(),
            entry.status.icon(),
            entry.status
        );
        let _ = writeln!(out, "{}\n", truncate_chars(entry.output.trim(), max_chars));
    }
    out
}

/// Last `window` routing entries in chronological order, reasons cut to `max_chars`
pub fn format_routing_history(state: &RunState, window: usize, max_chars: usize) -> String {
    if state.routing_history.is_empty() {
        return "(none)\n".to_string();
    }

    let skip = state.routing_history.len().saturating_sub(window);
    let mut out = String::new();
    for entry in state.routing_history.iter().skip(skip) {
        let _ = writeln!(
            out,
            "- [{}] {}: {}",
            entry.iteration,
            entry.agent,
            truncate_chars(&entry.reason, max_chars)
        );
    }
    out
}

/// Artifact keys the workers themselves produce; rendered ahead of anything else
const KNOWN_ARTIFACTS: &[&str] = &[
    "files_changed",
    "code_changed",
    "commit_message",
    "tests_passed",
    "tests_failed",
    "qa_approved",
    "lint_errors",
    "coverage_percent",
    "review_verdict",
    "review_done",
    "config_files_changed",
    "packages_installed",
    "docs_files_updated",
    "readme_updated",
    "changelog_updated",
    "docstrings_added",
];

/// At most `window` artifact lines, values cut to `max_chars`
pub fn format_artifacts(artifacts: &Artifacts, window: usize, max_chars: usize) -> String {
    if artifacts.is_empty() {
        return "(none)\n".to_string();
    }

    let known = KNOWN_ARTIFACTS
        .iter()
        .filter_map(|key| artifacts.get_key_value(*key));
    let other = artifacts
        .iter()
        .filter(|(key, _)| !KNOWN_ARTIFACTS.contains(&key.as_str()));

    let mut out = String::new();
    for (key, value) in known.chain(other).take(window) {
        let rendered = match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let _ = writeln!(
            out,
            "- {}: {}",
            truncate_chars(key, max_chars),
            truncate_chars(&rendered, max_chars)
        );
    }
    if artifacts.len() > window {
        let _ = writeln!(out, "({} more)", artifacts.len() - window);
    }
    out
}

fn agent_list(valid: &[AgentRole]) -> String {
    valid.iter().map(|r| r.as_str()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgentOutput, AgentRole, NextAgent, ReportStatus, RoutingEntry};
    use chrono::Utc;
    use serde_json::json;

    fn state_with_outputs(n: u32) -> RunState {
        let mut state = RunState::new("s1", "add input validation to parse_config", "/repo");
        state.plan = "1. code\n2. test".to_string();
        state.iteration = n + 1;
        for i in 1..=n {
            state.agent_outputs.push(AgentOutput {
                agent: if i % 2 == 0 { AgentRole::Qa } else { AgentRole::Developer },
                output: format!("report number {} {}", i, "x".repeat(2000)),
                status: ReportStatus::Success,
                timestamp: Utc::now(),
                iteration: i,
            });
            state.routing_history.push(RoutingEntry {
                iteration: i - 1,
                agent: NextAgent::Worker(AgentRole::Developer),
                reason: format!("reason {} {}", i, "y".repeat(200)),
                timestamp: Utc::now(),
            });
        }
        state
    }

    #[test]
    fn test_system_prompt_lists_team() {
        let prompt = system_prompt(&[AgentRole::Developer, AgentRole::Qa]);
        assert!(prompt.contains("- developer:"));
        assert!(prompt.contains("- qa:"));
        assert!(!prompt.contains("- docs:"));
        assert!(prompt.contains("FINISH"));
    }

    #[test]
    fn test_planning_prompt_embeds_task_and_tree() {
        let prompt = planning_prompt(
            "add tests for auth.py",
            Path::new("/srv/app"),
            "app/\n  auth.py\n",
            &AgentRole::ALL,
        );
        assert!(prompt.contains("add tests for auth.py"));
        assert!(prompt.contains("/srv/app"));
        assert!(prompt.contains("auth.py"));
        assert!(prompt.contains("\"first_agent\""));
    }

    #[test]
    fn test_outputs_windowed_newest_first_and_truncated() {
        let state = state_with_outputs(10);
        let rendered = format_agent_outputs(&state, 6, 800);

        assert!(rendered.contains("report number 10"));
        assert!(rendered.contains("report number 5"));
        assert!(!rendered.contains("report number 4 "));
        let newest = rendered.find("report number 10").unwrap();
        let older = rendered.find("report number 9").unwrap();
        assert!(newest < older);
        // 6 entries of at most 800 chars plus headers
        assert!(rendered.len() < 6 * (800 + 100));
    }

    #[test]
    fn test_history_window_and_reason_cut() {
        let state = state_with_outputs(10);
        let rendered = format_routing_history(&state, 8, 80);
        assert_eq!(rendered.lines().count(), 8);
        assert!(rendered.contains("reason 10"));
        assert!(!rendered.contains("reason 2 "));
        assert!(rendered.lines().all(|l| l.chars().count() < 120));
    }

    #[test]
    fn test_artifacts_rendering() {
        let mut artifacts = Artifacts::new();
        artifacts.insert("files_changed".to_string(), json!(["config.py"]));
        artifacts.insert("commit_message".to_string(), json!("x".repeat(500)));
        let rendered = format_artifacts(&artifacts, 20, 100);
        assert!(rendered.contains("- files_changed: [\"config.py\"]"));
        assert!(rendered.lines().all(|l| l.chars().count() < 130));
        assert_eq!(format_artifacts(&Artifacts::new(), 20, 100), "(none)\n");
    }

    #[test]
    fn test_artifacts_rendering_is_windowed() {
        let mut artifacts = Artifacts::new();
        for i in 0..2000 {
            artifacts.insert(format!("aaa_note_{:04}", i), json!("z".repeat(50)));
        }
        artifacts.insert("qa_approved".to_string(), json!(true));

        let rendered = format_artifacts(&artifacts, 5, 100);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "- qa_approved: true");
        assert_eq!(lines[5], "(1996 more)");

        let mut state = RunState::new("s1", "t", "/repo");
        state.artifacts = artifacts;
        let prompt = routing_prompt(&state, &SupervisorConfig::default(), &AgentRole::ALL);
        assert!(prompt.contains("(1981 more)"));
        assert!(prompt.chars().count() < 10_000);
    }

    #[test]
    fn test_routing_prompt_sections() {
        let state = state_with_outputs(2);
        let prompt = routing_prompt(&state, &SupervisorConfig::default(), &AgentRole::ALL);
        assert!(prompt.contains("## Task\nadd input validation to parse_config"));
        assert!(prompt.contains("Iteration 3 of 12"));
        assert!(prompt.contains("## Latest agent reports"));
        assert!(prompt.contains("## Routing history"));
        assert!(!prompt.contains("## Human feedback"));
        assert!(!prompt.contains("iteration limit"));
    }

    #[test]
    fn test_routing_prompt_warns_near_ceiling() {
        let mut state = state_with_outputs(1);
        state.iteration = 11;
        let prompt = routing_prompt(&state, &SupervisorConfig::default(), &AgentRole::ALL);
        assert!(prompt.contains("iteration limit is about to be reached"));
    }

    #[test]
    fn test_routing_prompt_includes_feedback_verbatim() {
        let mut state = state_with_outputs(1);
        state.next_agent = Some(NextAgent::Worker(AgentRole::Developer));
        state.current_instruction = "Refactor auth.py".to_string();
        state.human_approval = HumanApproval::Rejected {
            feedback: "do not touch auth.py".to_string(),
        };
        let prompt = routing_prompt(&state, &SupervisorConfig::default(), &AgentRole::ALL);
        assert!(prompt.contains("do not touch auth.py"));
        assert!(prompt.contains("> Refactor auth.py"));
        assert!(prompt.contains("dispatch to developer"));
    }
}
