//! Per-script results and the aggregated suite report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one script run. Exactly one holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScriptStatus {
    Pass,
    /// An assertion evaluated false.
    Fail,
    /// A request, resolution or evaluation fault stopped the script.
    Error,
}

impl std::fmt::Display for ScriptStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ScriptStatus::Pass => "PASS",
            ScriptStatus::Fail => "FAIL",
            ScriptStatus::Error => "ERROR",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptResult {
    pub script_id: String,
    pub status: ScriptStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub duration_ms: u64,
    #[serde(default)]
    pub output: Vec<String>,
}

impl ScriptResult {
    pub fn pass(script_id: impl Into<String>, output: Vec<String>, duration_ms: u64) -> Self {
        Self {
            script_id: script_id.into(),
            status: ScriptStatus::Pass,
            failed_at: None,
            message: None,
            duration_ms,
            output,
        }
    }

    /// A result for a script that never produced one, e.g. a panicked task.
    pub fn error(script_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            script_id: script_id.into(),
            status: ScriptStatus::Error,
            failed_at: None,
            message: Some(message.into()),
            duration_ms: 0,
            output: Vec::new(),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.status == ScriptStatus::Pass
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteReport {
    pub run_id: Uuid,
    pub suite: String,
    pub started_at: DateTime<Utc>,
    pub units_run: usize,
    /// Sequential units by position, group members by declared order.
    pub results: Vec<ScriptResult>,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub total_duration_ms: u64,
    pub stopped_early: bool,
}

impl SuiteReport {
    pub fn new(suite: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            suite: suite.into(),
            started_at: Utc::now(),
            units_run: 0,
            results: Vec::new(),
            passed: 0,
            failed: 0,
            errored: 0,
            total_duration_ms: 0,
            stopped_early: false,
        }
    }

    pub fn record(&mut self, result: ScriptResult) {
        match result.status {
            ScriptStatus::Pass => self.passed += 1,
            ScriptStatus::Fail => self.failed += 1,
            ScriptStatus::Error => self.errored += 1,
        }
        self.results.push(result);
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.errored == 0 && !self.stopped_early
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_uppercase() {
        let result = ScriptResult::pass("smoke", vec![], 5);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "PASS");
        assert!(json.get("failed_at").is_none());
    }

    #[test]
    fn test_report_counts() {
        let mut report = SuiteReport::new("nightly");
        report.record(ScriptResult::pass("a", vec![], 1));
        report.record(ScriptResult::error("b", "boom"));
        assert_eq!(report.passed, 1);
        assert_eq!(report.errored, 1);
        assert_eq!(report.results.len(), 2);
        assert!(!report.is_success());
    }
}
