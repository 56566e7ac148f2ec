//! DevOps role - build, CI, containers, dependencies and configuration

use serde_json::json;

use super::profile::RoleProfile;
use super::tool_loop::Transcript;
use crate::domain::{AgentRole, Artifacts};

const SYSTEM_PROMPT: &str = "You are the DevOps engineer on a small software team. You own the build, CI \
pipelines, container files, dependency manifests and configuration.

How to work:
- Read the existing manifests and pipeline files before changing them.
- Keep changes minimal and consistent with the tooling the project already uses.
- Install or add dependencies with the project's package manager through run_command.
- Verify what you can (a build, a dry run, a config lint) with run_command.
- Finish by calling submit_report with what you changed and anything the team must do next.";

const TOOLS: &[&str] = &[
    "read_file",
    "write_file",
    "edit_file",
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

/// Package-manager subcommands that add dependencies
const INSTALLERS: &[(&str, &str)] = &[
    ("pip", "install"),
    ("pip3", "install"),
    ("uv", "add"),
    ("poetry", "add"),
    ("npm", "install"),
    ("npm", "i"),
    ("yarn", "add"),
    ("pnpm", "add"),
    ("cargo", "add"),
    ("go", "get"),
    ("apt-get", "install"),
    ("apt", "install"),
    ("apk", "add"),
    ("brew", "install"),
    ("gem", "install"),
];

/// Installer flags whose value is a file, not a package
const VALUE_FLAGS: &[&str] = &["-r", "--requirement", "-c", "--constraint", "-e", "--editable"];

pub struct Devops;

impl RoleProfile for Devops {
    fn role(&self) -> AgentRole {
        AgentRole::Devops
    }

    fn system_prompt(&self) -> &'static str {
        SYSTEM_PROMPT
    }

    fn tools(&self) -> &'static [&'static str] {
        TOOLS
    }

    fn artifacts(&self, transcript: &Transcript, written_files: &[String]) -> Artifacts {
        let mut artifacts = Artifacts::new();
        if !written_files.is_empty() {
            artifacts.insert("config_files_changed".to_string(), json!(written_files));
        }

        let mut packages: Vec<String> = Vec::new();
        for inv in transcript.calls_to("run_command").filter(|inv| !inv.is_error) {
            if let Some(command) = inv.input["command"].as_str() {
                for package in installed_packages(command) {
                    if !packages.contains(&package) {
                        packages.push(package);
                    }
                }
            }
        }
        if !packages.is_empty() {
            artifacts.insert("packages_installed".to_string(), json!(packages));
        }
        artifacts
    }
}

/// Package names a shell command installs, across `&&`/`;` chains
fn installed_packages(command: &str) -> Vec<String> {
    let mut packages = Vec::new();
    for segment in command.split(['&', ';', '|']) {
        let tokens: Vec<&str> = segment.split_whitespace().filter(|t| *t != "sudo").collect();
        let Some(position) = tokens
            .windows(2)
            .position(|pair| INSTALLERS.contains(&(pair[0], pair[1])))
        else {
            continue;
        };
        let mut skip_value = false;
        for token in &tokens[position + 2..] {
            if skip_value {
                skip_value = false;
                continue;
            }
            if VALUE_FLAGS.contains(token) {
                skip_value = true;
                continue;
            }
            if token.starts_with('-') || token.contains('/') || token.contains('=') {
                continue;
            }
            packages.push(token.trim_matches(|c: char| c == '"' || c == '\'').to_string());
        }
    }
    packages
}
