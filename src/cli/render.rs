//! Terminal rendering of runs and session listings

use colored::*;

use itdept::domain::{NextAgent, ReportStatus, RunState, RunStatus};
use itdept::store::SessionSummary;

/// Colored one-word status label
pub fn status_label(status: &RunStatus) -> ColoredString {
    let label = status.as_str();
    match status {
        RunStatus::Running => label.cyan(),
        RunStatus::Paused { .. } => label.yellow(),
        RunStatus::Finished => label.green(),
        RunStatus::CeilingReached => label.red(),
        RunStatus::Cancelled => label.magenta(),
    }
}

/// Why the run stopped where it did
pub fn stop_reason(state: &RunState) -> String {
    match state.status {
        RunStatus::Running => format!("still running at iteration {}", state.iteration),
        RunStatus::Paused { agent } => format!("paused for approval before the {} agent", agent),
        RunStatus::Cancelled => format!("cancelled at iteration {}", state.iteration),
        RunStatus::CeilingReached => "iteration limit reached".to_string(),
        RunStatus::Finished => state
            .last_routing()
            .map(|entry| format!("finished: {}", entry.reason))
            .unwrap_or_else(|| "finished".to_string()),
    }
}

fn report_icon(status: ReportStatus) -> ColoredString {
    let icon = status.icon();
    match status {
        ReportStatus::Success => icon.green(),
        ReportStatus::Warning => icon.yellow(),
        ReportStatus::Error => icon.red(),
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// Header lines shared by every run report
pub fn print_status(state: &RunState) {
    println!("{} {}", "Session:".bold(), state.session_id);
    println!("{} {}", "Task:".bold(), state.task);
    println!("{} {}", "Repo:".bold(), state.repo_path.display());
    println!("{} {}", "Status:".bold(), status_label(&state.status));
    println!("{} {}", "Iteration:".bold(), state.iteration);
    if let Some(next) = state.next_agent {
        println!("{} {}", "Next:".bold(), next);
        if !next.is_terminal() && !state.current_instruction.is_empty() {
            println!("{} {}", "Instruction:".bold(), state.current_instruction);
        }
    }
    println!("{} {}", "Stop reason:".bold(), stop_reason(state));
}

/// Full report printed by `run`, `resume` and `status`
pub fn print_report(state: &RunState) {
    print_status(state);

    if !state.plan.is_empty() {
        println!();
        println!("{}", "Plan".bold().underline());
        println!("{}", state.plan);
    }

    if !state.agent_outputs.is_empty() {
        println!();
        println!("{}", "Agent outputs".bold().underline());
        for output in &state.agent_outputs {
            println!(
                "{} [{}] {}: {}",
                report_icon(output.status),
                output.iteration,
                output.agent.as_str().cyan(),
                first_line(&output.output)
            );
        }
    }

    if !state.artifacts.is_empty() {
        println!();
        println!("{}", "Artifacts".bold().underline());
        for (key, value) in &state.artifacts {
            println!("  {}: {}", key, value);
        }
    }

    if let RunStatus::Paused { agent } = state.status {
        println!();
        println!(
            "{} {} is waiting. Continue with `itdept resume {} --approve` or `--feedback \"...\"`",
            "⏸".yellow(),
            agent,
            state.session_id
        );
    }
}

/// Routing history and conversation log printed by `history`
pub fn print_history(state: &RunState) {
    println!("{}", "Routing history".bold().underline());
    for entry in &state.routing_history {
        let agent = match entry.agent {
            NextAgent::Finish => entry.agent.as_str().green(),
            NextAgent::Worker(_) => entry.agent.as_str().cyan(),
        };
        println!(
            "  [{}] {} {} - {}",
            entry.iteration,
            entry.timestamp.format("%H:%M:%S"),
            agent,
            entry.reason
        );
    }

    println!();
    println!("{}", "Conversation".bold().underline());
    for entry in &state.conversation_log {
        println!("  {} {}", format!("{}:", entry.speaker).bold(), entry.content);
    }
}

/// Table printed by `sessions`
pub fn print_sessions(sessions: &[SessionSummary]) {
    if sessions.is_empty() {
        println!("{}", "No sessions yet".dimmed());
        return;
    }
    for summary in sessions {
        println!(
            "{}  {:<16} iter {:>2}  {}  {}",
            summary.session_id.bold(),
            status_label(&summary.status),
            summary.iteration,
            summary.updated_at.format("%Y-%m-%d %H:%M"),
            summary.task
        );
    }
}
