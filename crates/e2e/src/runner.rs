//! Step-sequenced scenario runner
//!
//! A scenario is an ordered list of named async steps over a shared
//! context. The first failing step stops the scenario; later steps are
//! reported as skipped and the `after` hooks still run.

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use vscode_e2e_common::{RetryRunner, Settings};

use crate::error::{E2eError, E2eResult};
use crate::screenshot::{screenshot_save_path, ScreenshotCapture};

/// Future returned by a step
pub type StepFuture<'a> = BoxFuture<'a, E2eResult<()>>;

type StepAction<C> = Box<dyn for<'a> Fn(&'a C) -> StepFuture<'a> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

/// Result of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub title: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    /// Set for `after` hooks
    #[serde(default)]
    pub hook: bool,
}

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// Result of running all scenarios
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    /// Scenarios that actually ran
    pub fn executed(&self) -> usize {
        self.passed + self.failed
    }

    /// At least one scenario ran and none failed
    pub fn succeeded(&self) -> bool {
        self.failed == 0 && self.executed() > 0
    }
}

struct Step<C> {
    title: String,
    action: StepAction<C>,
    retry: Option<RetryRunner>,
}

/// An ordered, named sequence of steps
pub struct Scenario<C> {
    name: String,
    file: Option<String>,
    steps: Vec<Step<C>>,
    after: Vec<Step<C>>,
}

impl<C: Send + Sync> Scenario<C> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            file: None,
            steps: Vec::new(),
            after: Vec::new(),
        }
    }

    /// File name the scenario can also be selected by
    pub fn file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    pub fn step<F>(mut self, title: impl Into<String>, action: F) -> Self
    where
        F: for<'a> Fn(&'a C) -> StepFuture<'a> + Send + Sync + 'static,
    {
        self.steps.push(Step {
            title: title.into(),
            action: Box::new(action),
            retry: None,
        });
        self
    }

    /// A step re-run in full by `retry` until it passes or the budget is spent
    pub fn step_with_retry<F>(mut self, title: impl Into<String>, retry: RetryRunner, action: F) -> Self
    where
        F: for<'a> Fn(&'a C) -> StepFuture<'a> + Send + Sync + 'static,
    {
        let title = title.into();
        self.steps.push(Step {
            retry: Some(retry.label(title.clone())),
            title,
            action: Box::new(action),
        });
        self
    }

    /// Cleanup that runs whatever happened to the steps
    pub fn after<F>(mut self, title: impl Into<String>, action: F) -> Self
    where
        F: for<'a> Fn(&'a C) -> StepFuture<'a> + Send + Sync + 'static,
    {
        self.after.push(Step {
            title: title.into(),
            action: Box::new(action),
            retry: None,
        });
        self
    }

    /// True when `selector` is the scenario's name or file name
    pub fn matches(&self, selector: &str) -> bool {
        self.name == selector || self.file.as_deref() == Some(selector)
    }

    async fn run_step(step: &Step<C>, ctx: &C) -> (StepResult, Option<E2eError>) {
        let start = Instant::now();
        debug!("Running step: {}", step.title);

        let outcome = match &step.retry {
            None => (step.action)(ctx).await,
            Some(retry) => retry.run(|| (step.action)(ctx)).await.map_err(E2eError::from),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => (
                StepResult {
                    title: step.title.clone(),
                    status: StepStatus::Passed,
                    duration_ms,
                    error: None,
                    hook: false,
                },
                None,
            ),
            Err(e) => (
                StepResult {
                    title: step.title.clone(),
                    status: StepStatus::Failed,
                    duration_ms,
                    error: Some(e.to_string()),
                    hook: false,
                },
                Some(e),
            ),
        }
    }
}

/// Where and how failure screenshots are taken
#[derive(Clone)]
pub struct RunOptions {
    pub capture: Option<Arc<dyn ScreenshotCapture>>,
    pub screenshot_dir: PathBuf,
    pub start_time: String,
    pub platform: String,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            capture: None,
            screenshot_dir: PathBuf::from("screenshots"),
            start_time: chrono::Local::now().format("%H:%M").to_string(),
            platform: std::env::consts::OS.to_string(),
        }
    }
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            screenshot_dir: settings.workspace_path.join("screenshots"),
            start_time: settings.start_time.clone(),
            ..Self::default()
        }
    }

    pub fn with_capture(mut self, capture: Arc<dyn ScreenshotCapture>) -> Self {
        self.capture = Some(capture);
        self
    }
}

/// Main scenario runner
#[derive(Clone, Default)]
pub struct TestRunner {
    options: RunOptions,
}

impl TestRunner {
    pub fn new(options: RunOptions) -> Self {
        Self { options }
    }

    /// Run one scenario to completion
    pub async fn run_scenario<C: Send + Sync>(&self, scenario: &Scenario<C>, ctx: &C) -> TestResult {
        let start = Instant::now();
        debug!("Running scenario: {}", scenario.name);

        let mut steps = Vec::with_capacity(scenario.steps.len() + scenario.after.len());
        let mut test_error: Option<String> = None;
        let mut screenshot_path = None;

        for step in &scenario.steps {
            if test_error.is_some() {
                steps.push(StepResult {
                    title: step.title.clone(),
                    status: StepStatus::Skipped,
                    duration_ms: 0,
                    error: None,
                    hook: false,
                });
                continue;
            }

            let (result, err) = Scenario::run_step(step, ctx).await;
            steps.push(result);
            if let Some(e) = err {
                test_error = Some(format!("{}: {}", step.title, e));
                screenshot_path = self.capture_failure(&scenario.name, &step.title).await;
            }
        }

        for hook in &scenario.after {
            let (mut result, err) = Scenario::run_step(hook, ctx).await;
            result.title = format!("after: {}", result.title);
            result.hook = true;
            if let Some(e) = err {
                warn!("after hook '{}' of {} failed: {}", hook.title, scenario.name, e);
                if test_error.is_none() {
                    test_error = Some(format!("after hook '{}': {}", hook.title, e));
                }
            }
            steps.push(result);
        }

        TestResult {
            name: scenario.name.clone(),
            success: test_error.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            error: test_error,
            screenshot_path,
        }
    }

    async fn capture_failure(&self, suite_title: &str, test_title: &str) -> Option<PathBuf> {
        let capture = self.options.capture.as_ref()?;
        let path = screenshot_save_path(
            &self.options.screenshot_dir,
            suite_title,
            test_title,
            &self.options.start_time,
            &self.options.platform,
        );
        info!("Saving a screenshot of the failure to {}", path.display());

        if let Some(parent) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Could not create {}: {}", parent.display(), e);
                return None;
            }
        }
        match capture.capture(&path).await {
            Ok(()) => Some(path),
            Err(e) => {
                warn!("Screenshot capture failed: {}", e);
                None
            }
        }
    }

    /// Run scenarios in order. When `only` is non-empty, scenarios not
    /// selected by any entry (name or file name) are counted as skipped.
    pub async fn run_scenarios<C: Send + Sync>(
        &self,
        scenarios: &[Scenario<C>],
        ctx: &C,
        only: &[String],
    ) -> TestSuiteResult {
        let start = Instant::now();
        let mut suite = TestSuiteResult {
            total: scenarios.len(),
            ..TestSuiteResult::default()
        };

        for selector in only {
            if !scenarios.iter().any(|s| s.matches(selector)) {
                warn!("No scenario matches '{}'", selector);
            }
        }

        info!("Running {} scenario(s)...", scenarios.len());

        for scenario in scenarios {
            if !only.is_empty() && !only.iter().any(|n| scenario.matches(n)) {
                suite.skipped += 1;
                continue;
            }

            let result = self.run_scenario(scenario, ctx).await;
            if result.success {
                suite.passed += 1;
                info!("✓ {} ({} ms)", result.name, result.duration_ms);
            } else {
                suite.failed += 1;
                error!("✗ {} - {}", result.name, result.error.as_deref().unwrap_or("unknown error"));
            }
            suite.results.push(result);
        }

        suite.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.skipped, suite.duration_ms
        );
        suite
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Ctx {
        log: Mutex<Vec<String>>,
        flaky_calls: AtomicUsize,
    }

    impl Ctx {
        fn record(&self, entry: &str) {
            self.log.lock().unwrap().push(entry.to_string());
        }

        fn entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    fn failing_scenario() -> Scenario<Ctx> {
        Scenario::<Ctx>::new("Push and Pull")
            .step("create class", |ctx| {
                Box::pin(async move {
                    ctx.record("create");
                    Ok(())
                })
            })
            .step("push", |ctx| {
                Box::pin(async move {
                    ctx.record("push");
                    Err(E2eError::AssertionFailed("no success notification".to_string()))
                })
            })
            .step("pull", |ctx| {
                Box::pin(async move {
                    ctx.record("pull");
                    Ok(())
                })
            })
            .after("delete scratch org", |ctx| {
                Box::pin(async move {
                    ctx.record("cleanup");
                    Ok(())
                })
            })
    }

    #[tokio::test]
    async fn test_failure_skips_rest_but_runs_after() {
        let ctx = Ctx::default();
        let result = TestRunner::default().run_scenario(&failing_scenario(), &ctx).await;

        assert!(!result.success);
        assert_eq!(ctx.entries(), vec!["create", "push", "cleanup"]);
        let statuses: Vec<StepStatus> = result.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Passed, StepStatus::Failed, StepStatus::Skipped, StepStatus::Passed]
        );
        assert!(result.error.unwrap().contains("no success notification"));
        assert_eq!(result.steps[3].title, "after: delete scratch org");
        assert!(result.steps[3].hook);
    }

    #[tokio::test]
    async fn test_retried_step_recovers() {
        let ctx = Ctx::default();
        let scenario = Scenario::<Ctx>::new("Open editor").step_with_retry(
            "open FooPage.page",
            RetryRunner::new().max_attempts(3),
            |ctx| {
                Box::pin(async move {
                    if ctx.flaky_calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(E2eError::AssertionFailed("editor not ready".to_string()))
                    } else {
                        Ok(())
                    }
                })
            },
        );

        let result = TestRunner::default().run_scenario(&scenario, &ctx).await;
        assert!(result.success);
        assert_eq!(ctx.flaky_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retried_step_exhaustion_names_step() {
        let ctx = Ctx::default();
        let scenario = Scenario::<Ctx>::new("Open editor").step_with_retry(
            "open FooPage.page",
            RetryRunner::new().max_attempts(2),
            |_| Box::pin(async { Err(E2eError::AssertionFailed("X".to_string())) }),
        );

        let result = TestRunner::default().run_scenario(&scenario, &ctx).await;
        let error = result.steps[0].error.clone().unwrap();
        assert!(error.contains("open FooPage.page"));
        assert!(error.contains("X"));
    }

    struct FileCapture;

    #[async_trait]
    impl ScreenshotCapture for FileCapture {
        async fn capture(&self, path: &Path) -> E2eResult<()> {
            tokio::fs::write(path, b"png").await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failure_screenshot_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let options = RunOptions {
            capture: Some(Arc::new(FileCapture)),
            screenshot_dir: dir.path().to_path_buf(),
            start_time: "09:30".to_string(),
            platform: "linux".to_string(),
        };

        let result = TestRunner::new(options)
            .run_scenario(&failing_scenario(), &Ctx::default())
            .await;

        let path = result.screenshot_path.unwrap();
        assert_eq!(path, dir.path().join("Push and Pull").join("09.30 - linux - push.png"));
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_run_scenarios_counts_and_filters() {
        let ctx = Ctx::default();
        let passing = Scenario::<Ctx>::new("CLI Commands").step("noop", |_| Box::pin(async { Ok(()) }));
        let scenarios = vec![passing, failing_scenario()];

        let runner = TestRunner::default();
        let suite = runner.run_scenarios(&scenarios, &ctx, &[]).await;
        assert_eq!((suite.total, suite.passed, suite.failed, suite.skipped), (2, 1, 1, 0));

        let only = vec!["CLI Commands".to_string()];
        let suite = runner.run_scenarios(&scenarios, &ctx, &only).await;
        assert_eq!((suite.total, suite.passed, suite.failed, suite.skipped), (2, 1, 0, 1));
        assert!(suite.succeeded());
    }

    #[tokio::test]
    async fn test_unmatched_selection_runs_nothing_and_does_not_succeed() {
        let ctx = Ctx::default();
        let scenarios = vec![failing_scenario()];
        let only = vec!["pushAndPull.e2e.ts".to_string()];

        let suite = TestRunner::default().run_scenarios(&scenarios, &ctx, &only).await;
        assert_eq!((suite.total, suite.passed, suite.failed, suite.skipped), (1, 0, 0, 1));
        assert_eq!(suite.executed(), 0);
        assert!(!suite.succeeded());
        assert!(ctx.entries().is_empty());
    }

    #[tokio::test]
    async fn test_selection_by_file_name() {
        let ctx = Ctx::default();
        let scenarios = vec![failing_scenario().file("pushAndPull.e2e.ts")];
        let only = vec!["pushAndPull.e2e.ts".to_string()];

        let suite = TestRunner::default().run_scenarios(&scenarios, &ctx, &only).await;
        assert_eq!((suite.passed, suite.failed, suite.skipped), (0, 1, 0));
        assert!(!suite.succeeded());
        assert!(scenarios[0].matches("Push and Pull"));
    }
}
