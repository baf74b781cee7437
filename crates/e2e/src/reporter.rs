//! End-of-run summary and result files

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::E2eResult;
use crate::runner::{StepStatus, TestSuiteResult};

pub const RESULTS_FILE: &str = "test-results.json";

/// Passing steps, then failing steps with their error.
///
/// Skipped steps and scenarios are left out; `after` hooks only appear
/// when they fail.
pub fn render_summary(suite: &TestSuiteResult) -> String {
    let steps = || suite.results.iter().flat_map(|r| r.steps.iter());
    let mut out = String::new();

    out.push_str("\nTest Summary:\n\n");
    out.push_str("Passing Tests:\n\n");
    for step in steps().filter(|s| s.status == StepStatus::Passed && !s.hook) {
        let _ = writeln!(out, "    ✔ {} ({}ms)", step.title, step.duration_ms);
    }

    let failures: Vec<_> = steps().filter(|s| s.status == StepStatus::Failed).collect();
    if !failures.is_empty() {
        out.push_str("\nFailing Tests:\n\n");
        for step in failures {
            let _ = writeln!(out, "    ✘ {} ({}ms)", step.title, step.duration_ms);
            let _ = writeln!(out, "      Error: {}\n", step.error.as_deref().unwrap_or(""));
        }
    }

    out
}

/// Write the suite to `<dir>/test-results.json`
pub fn write_results(dir: &Path, suite: &TestSuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join(RESULTS_FILE);
    let json = serde_json::to_string_pretty(suite)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

pub fn read_results(path: &Path) -> E2eResult<TestSuiteResult> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}
