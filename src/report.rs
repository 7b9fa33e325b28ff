//! Final verdict: a readable trace on stdout and a process exit status.

use std::process::ExitCode;

use crate::error::HarnessError;
use crate::pipeline::{AssertionResult, PipelineOutcome};

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    /// The pipeline ran; it may still contain a failing stage.
    Completed(PipelineOutcome),
    /// Setup failed before or instead of the pipeline.
    Aborted(HarnessError),
    /// Something panicked mid-run.
    Crashed(String),
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, RunOutcome::Completed(outcome) if outcome.passed())
    }
}

/// Trace lines for `outcome`, in the order they should be printed.
pub fn render(outcome: &RunOutcome) -> Vec<String> {
    let mut lines = Vec::new();

    match outcome {
        RunOutcome::Completed(pipeline) => {
            for report in &pipeline.stages {
                lines.push(String::new());
                lines.push(format!("🔍 {}...", report.stage));
                lines.extend(report.details.iter().map(|d| format!("  {}", d)));
                match &report.result {
                    AssertionResult::Pass => {}
                    AssertionResult::PassWithWarning(msg) => lines.push(format!("⚠️  {}", msg)),
                    AssertionResult::Fail(msg) => lines.push(format!("❌ {}", msg)),
                }
            }

            if !pipeline.notable_logs.is_empty() {
                lines.push(String::new());
                lines.push("📝 Page logs:".into());
                lines.extend(pipeline.notable_logs.iter().map(|l| format!("  {}", l)));
            }

            lines.push(String::new());
            if pipeline.passed() {
                lines.push("✅ All integration tests passed!".into());
            } else if let Some(failed) = pipeline.failure() {
                lines.push(format!("❌ Integration test failed at: {}", failed.stage));
            }
        }
        RunOutcome::Aborted(err) => {
            lines.push(format!("❌ Test aborted: {}", err));
        }
        RunOutcome::Crashed(msg) => {
            lines.push(format!("❌ Test failed with error: {}", msg));
        }
    }

    lines
}

/// Print the trace and return whether the run succeeded.
pub fn report(outcome: &RunOutcome) -> bool {
    for line in render(outcome) {
        println!("{}", line);
    }
    outcome.passed()
}

pub fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}
