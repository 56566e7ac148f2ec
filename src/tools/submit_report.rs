//! submit_report tool - Hand the worker's final report back to the driver
//!
//! The tool itself only validates the input; the worker's tool loop reads the
//! call's arguments and stops.

use async_trait::async_trait;
use eyre::eyre;
use serde_json::Value;

use super::{Tool, ToolContext, ToolResult};
use crate::domain::ReportStatus;

pub const SUBMIT_REPORT: &str = "submit_report";

pub struct SubmitReportTool;

#[async_trait]
impl Tool for SubmitReportTool {
    fn name(&self) -> &'static str {
        SUBMIT_REPORT
    }

    fn description(&self) -> &'static str {
        "Finish your assignment and report back to the supervisor. Call exactly once, when you are done."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "summary": {
                    "type": "string",
                    "description": "What you did and what you found"
                },
                "status": {
                    "type": "string",
                    "enum": ["success", "warning", "error"],
                    "description": "success: done; warning: done with caveats; error: could not complete"
                },
                "artifacts": {
                    "type": "object",
                    "description": "Structured facts for the supervisor (role specific)"
                }
            },
            "required": ["summary", "status"]
        })
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolResult, eyre::Error> {
        let summary = input["summary"].as_str().ok_or_else(|| eyre!("summary is required"))?;
        let status = input["status"].as_str().unwrap_or("success");
        if ReportStatus::from_label(status).is_none() {
            return Ok(ToolResult::error(format!(
                "Unknown status '{}': use success, warning or error",
                status
            )));
        }
        Ok(ToolResult::success(format!("Report submitted ({}): {}", status, summary)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_submit_report_accepts_known_status() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");

        let result = SubmitReportTool
            .execute(serde_json::json!({"summary": "All 12 tests pass", "status": "success"}), &ctx)
            .await
            .unwrap();
        assert!(!result.is_error);
        assert!(result.content.contains("All 12 tests pass"));
    }

    #[tokio::test]
    async fn test_submit_report_rejects_unknown_status() {
        let dir = tempdir().unwrap();
        let ctx = ToolContext::new(dir.path().to_path_buf(), "test");

        let result = SubmitReportTool
            .execute(serde_json::json!({"summary": "x", "status": "meh"}), &ctx)
            .await
            .unwrap();
        assert!(result.is_error);

        assert!(SubmitReportTool.execute(serde_json::json!({}), &ctx).await.is_err());
    }
}
