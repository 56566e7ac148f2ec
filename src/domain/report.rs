//! Worker reports - the typed return value of every worker invocation

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key/value facts extracted by workers and merged into the run state
pub type Artifacts = BTreeMap<String, Value>;

/// Outcome classification of a worker invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Warning,
    Error,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::Success => "success",
            ReportStatus::Warning => "warning",
            ReportStatus::Error => "error",
        }
    }

    /// Indicator used in conversation log entries
    pub fn icon(&self) -> &'static str {
        match self {
            ReportStatus::Success => "✅",
            ReportStatus::Warning => "⚠️",
            ReportStatus::Error => "❌",
        }
    }

    /// Parse a status label as a model might write it
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "success" | "ok" | "done" | "passed" => Some(ReportStatus::Success),
            "warning" | "warn" | "partial" => Some(ReportStatus::Warning),
            "error" | "failed" | "failure" => Some(ReportStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a worker hands back to the driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReport {
    pub text: String,
    pub status: ReportStatus,
    #[serde(default)]
    pub artifacts: Artifacts,
}

impl AgentReport {
    pub fn new(text: impl Into<String>, status: ReportStatus) -> Self {
        Self {
            text: text.into(),
            status,
            artifacts: Artifacts::new(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Self::new(text, ReportStatus::Success)
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self::new(text, ReportStatus::Warning)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text, ReportStatus::Error)
    }

    /// Attach an artifact (builder style)
    pub fn with_artifact(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.artifacts.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_labels() {
        assert_eq!(ReportStatus::from_label("Success"), Some(ReportStatus::Success));
        assert_eq!(ReportStatus::from_label(" warn "), Some(ReportStatus::Warning));
        assert_eq!(ReportStatus::from_label("FAILED"), Some(ReportStatus::Error));
        assert_eq!(ReportStatus::from_label("maybe"), None);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&ReportStatus::Warning).unwrap(), "\"warning\"");
    }

    #[test]
    fn test_report_builder() {
        let report = AgentReport::success("changed config loader")
            .with_artifact("files_changed", json!(["config.py"]))
            .with_artifact("code_changed", true);

        assert_eq!(report.status, ReportStatus::Success);
        assert_eq!(report.artifacts["files_changed"], json!(["config.py"]));
        assert_eq!(report.artifacts["code_changed"], json!(true));
    }

    #[test]
    fn test_report_deserializes_without_artifacts() {
        let report: AgentReport = serde_json::from_str(r#"{"text":"hi","status":"error"}"#).unwrap();
        assert_eq!(report.status, ReportStatus::Error);
        assert!(report.artifacts.is_empty());
    }
}
