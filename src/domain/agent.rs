//! Agent roles and the routing target domain
//!
//! `NextAgent` is the closed set a routing decision may name: one of the five
//! worker roles or the terminal sentinel. Nothing else is representable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ItDeptError;

/// Wire name of the terminal sentinel
pub const TERMINAL: &str = "FINISH";

/// A role-specialized worker agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Developer,
    Qa,
    Reviewer,
    Devops,
    Docs,
}

impl AgentRole {
    /// All roles in routing-preference order
    pub const ALL: [AgentRole; 5] = [
        AgentRole::Developer,
        AgentRole::Qa,
        AgentRole::Reviewer,
        AgentRole::Devops,
        AgentRole::Docs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Developer => "developer",
            AgentRole::Qa => "qa",
            AgentRole::Reviewer => "reviewer",
            AgentRole::Devops => "devops",
            AgentRole::Docs => "docs",
        }
    }

    /// One-line capability summary shown to the supervisor
    pub fn capability(&self) -> &'static str {
        match self {
            AgentRole::Developer => "writes and changes code, fixes bugs, commits",
            AgentRole::Qa => "runs tests and linters, reports failures and coverage",
            AgentRole::Reviewer => "reviews diffs for correctness, security and quality",
            AgentRole::Devops => "handles build, CI, containers, dependencies and configuration",
            AgentRole::Docs => "updates README, changelog and inline documentation",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AgentRole {
    type Err = ItDeptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_lowercase();
        AgentRole::ALL
            .into_iter()
            .find(|role| role.as_str() == lowered)
            .ok_or_else(|| ItDeptError::Config(format!("unknown agent role: {}", s)))
    }
}

/// Where the driver goes next: a worker, or stop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NextAgent {
    Worker(AgentRole),
    Finish,
}

impl NextAgent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NextAgent::Worker(role) => role.as_str(),
            NextAgent::Finish => TERMINAL,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, NextAgent::Finish)
    }

    pub fn role(&self) -> Option<AgentRole> {
        match self {
            NextAgent::Worker(role) => Some(*role),
            NextAgent::Finish => None,
        }
    }
}

impl From<AgentRole> for NextAgent {
    fn from(role: AgentRole) -> Self {
        NextAgent::Worker(role)
    }
}

impl fmt::Display for NextAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for NextAgent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NextAgent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == TERMINAL {
            return Ok(NextAgent::Finish);
        }
        raw.parse::<AgentRole>()
            .map(NextAgent::Worker)
            .map_err(serde::de::Error::custom)
    }
}
