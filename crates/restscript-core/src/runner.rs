//! Suite execution.
//!
//! Units run in order. A [`RunUnit::Group`] spawns one task per member and
//! waits for every task before moving on; its results are reported in
//! declared member order, not completion order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tracing::{info, info_span, warn, Instrument};

use crate::executor::ScriptExecutor;
use crate::result::{ScriptResult, ScriptStatus, SuiteReport};
use crate::suite::{RunUnit, ScriptEntry, SuiteOptions, SuitePlan};
use crate::value::Value;

pub struct SuiteRunner {
    executor: ScriptExecutor,
}

impl SuiteRunner {
    pub fn new(executor: ScriptExecutor) -> Self {
        Self { executor }
    }

    /// Runs a planned suite. `overrides` take precedence over the suite's
    /// own `params`.
    pub async fn run(&self, plan: &SuitePlan, overrides: &BTreeMap<String, Value>) -> SuiteReport {
        let mut params = plan.params.clone();
        params.extend(overrides.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.run_units(&plan.name, &plan.units, plan.options, params).await
    }

    pub async fn run_units(
        &self,
        suite: &str,
        units: &[RunUnit],
        options: SuiteOptions,
        params: BTreeMap<String, Value>,
    ) -> SuiteReport {
        let mut report = SuiteReport::new(suite);
        let span = info_span!("suite", name = suite, run_id = %report.run_id);
        let params = Arc::new(params);
        let start = Instant::now();

        async {
            for unit in units {
                let results = match unit {
                    RunUnit::Single(entry) => vec![self.run_entry(entry, &params).await],
                    RunUnit::Group { label, members } => {
                        info!(group = label.as_str(), members = members.len(), "running group");
                        self.run_group(members, &params).await
                    }
                };
                report.units_run += 1;

                let halted = results.iter().any(|r| r.status != ScriptStatus::Pass);
                for result in results {
                    report.record(result);
                }
                if halted && options.stop_on_error {
                    report.stopped_early = true;
                    warn!(units_run = report.units_run, remaining = units.len() - report.units_run, "stopping suite on error");
                    break;
                }
            }
        }
        .instrument(span)
        .await;

        report.total_duration_ms = start.elapsed().as_millis() as u64;
        info!(
            suite,
            passed = report.passed,
            failed = report.failed,
            errored = report.errored,
            total_duration_ms = report.total_duration_ms,
            "suite finished"
        );
        report
    }

    async fn run_entry(&self, entry: &ScriptEntry, params: &BTreeMap<String, Value>) -> ScriptResult {
        self.executor.run(&entry.id, &entry.script, params).await
    }

    /// Runs every member concurrently and returns once all have finished.
    async fn run_group(
        &self,
        members: &[Arc<ScriptEntry>],
        params: &Arc<BTreeMap<String, Value>>,
    ) -> Vec<ScriptResult> {
        let mut tasks = JoinSet::new();
        for (index, entry) in members.iter().enumerate() {
            let executor = self.executor.clone();
            let entry = Arc::clone(entry);
            let params = Arc::clone(params);
            tasks.spawn(
                async move {
                    let result = executor.run(&entry.id, &entry.script, &params).await;
                    (index, result)
                }
                .in_current_span(),
            );
        }

        let mut slots: Vec<Option<ScriptResult>> = vec![None; members.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                Err(e) => warn!(error = %e, "group member task failed"),
            }
        }

        slots
            .into_iter()
            .zip(members)
            .map(|(slot, entry)| {
                slot.unwrap_or_else(|| ScriptResult::error(&entry.id, "script task panicked or was cancelled"))
            })
            .collect()
    }
}
