//! Text rendering of script results, suite reports and parsed scripts.

use restscript_core::ast::{Script, StatementKind};
use restscript_core::result::{ScriptResult, ScriptStatus, SuiteReport};

pub fn format_result(result: &ScriptResult) -> String {
    let mut out = String::new();
    for line in &result.output {
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&status_line(result));
    out.push('\n');
    out
}

fn status_line(result: &ScriptResult) -> String {
    match (result.status, result.failed_at, &result.message) {
        (ScriptStatus::Pass, _, _) => format!("PASS {} ({}ms)", result.script_id, result.duration_ms),
        (status, Some(line), Some(message)) => {
            format!("{} {} at line {}: {}", status, result.script_id, line, message)
        }
        (status, _, Some(message)) => format!("{} {}: {}", status, result.script_id, message),
        (status, _, None) => format!("{} {}", status, result.script_id),
    }
}

pub fn format_report(report: &SuiteReport) -> String {
    let mut out = format!("Suite: {}\n", report.suite);
    for result in &report.results {
        out.push_str("  ");
        out.push_str(&status_line(result));
        out.push('\n');
        for line in &result.output {
            out.push_str("      ");
            out.push_str(line);
            out.push('\n');
        }
    }
    out.push_str(&format!(
        "{} passed, {} failed, {} errored in {}ms",
        report.passed, report.failed, report.errored, report.total_duration_ms
    ));
    if report.stopped_early {
        out.push_str(" (stopped early)");
    }
    out.push('\n');
    out
}

pub fn kind_name(kind: &StatementKind) -> &'static str {
    match kind {
        StatementKind::Assignment { .. } => "assignment",
        StatementKind::Request { .. } => "request",
        StatementKind::Assertion { .. } => "assertion",
        StatementKind::Output { .. } => "output",
        StatementKind::ControlMarker { .. } => "control",
    }
}

pub fn format_statements(script: &Script) -> String {
    let mut out = String::new();
    for stmt in &script.statements {
        out.push_str(&format!(
            "{:>4}  {:<10}  {}\n",
            stmt.line,
            kind_name(&stmt.kind),
            stmt.source.trim()
        ));
    }
    out.push_str(&format!("OK: {} statements\n", script.statements.len()));
    out
}
