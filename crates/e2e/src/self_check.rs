//! Built-in `CLI Commands` scenario
//!
//! Exercises the platform CLI end to end: authorize, create a scratch org,
//! find it with `org list`, display it, and delete it afterwards.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;
use vscode_e2e_common::{RetryRunner, Settings};

use crate::authorization::setup_and_authorize_org;
use crate::cli::{ScratchOrgRequest, SfCli};
use crate::error::{E2eError, E2eResult};
use crate::runner::Scenario;

pub const CLI_COMMANDS: &str = "CLI Commands";
pub const CLI_COMMANDS_FILE: &str = "cliCommands.test.ts";
pub const SCRATCH_ORG_ALIAS: &str = "foo";

/// State shared by the steps of the CLI scenario
pub struct CliCheckContext {
    pub cli: SfCli,
    pub settings: Settings,
    work_dir: PathBuf,
    scratch_org_found: AtomicBool,
}

impl CliCheckContext {
    /// `work_dir` receives the auth URL file
    pub fn new(cli: SfCli, settings: Settings, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            cli,
            settings,
            work_dir: work_dir.into(),
            scratch_org_found: AtomicBool::new(false),
        }
    }

    pub fn scratch_org_found(&self) -> bool {
        self.scratch_org_found.load(Ordering::SeqCst)
    }
}

/// Build the scenario. Without an auth URL the authorize and create steps
/// are left out and the scratch org must already exist.
pub fn cli_commands_scenario(settings: &Settings, retry: RetryRunner) -> Scenario<CliCheckContext> {
    let mut scenario = Scenario::<CliCheckContext>::new(CLI_COMMANDS)
        .file(CLI_COMMANDS_FILE)
        .step_with_retry("Check the CLI is installed", retry.clone(), |ctx| {
            Box::pin(async move {
                let version = ctx.cli.version().await?;
                info!("Platform CLI: {}", version);
                if version.is_empty() {
                    return Err(E2eError::UnexpectedOutput {
                        command: "--version".to_string(),
                        reason: "empty version string".to_string(),
                    });
                }
                Ok(())
            })
        });

    if settings.sfdx_auth_url.is_some() {
        scenario = scenario
            .step("Authorize to Testing Org", |ctx| Box::pin(authorize(ctx)))
            .step("Create a scratch org", |ctx| Box::pin(create_scratch_org(ctx)));
    }

    scenario
        .step_with_retry("Find scratch org using org list", retry, |ctx| {
            Box::pin(find_scratch_org(ctx))
        })
        .step("Display org using org display", |ctx| Box::pin(display_scratch_org(ctx)))
        .after("Delete the scratch org", |ctx| {
            Box::pin(async move {
                if ctx.scratch_org_found() {
                    ctx.cli.delete_scratch_org(SCRATCH_ORG_ALIAS).await?;
                }
                Ok(())
            })
        })
}

async fn authorize(ctx: &CliCheckContext) -> E2eResult<()> {
    tokio::fs::create_dir_all(&ctx.work_dir).await?;
    if setup_and_authorize_org(&ctx.settings, &ctx.cli, &ctx.work_dir).await? {
        Ok(())
    } else {
        Err(E2eError::StepFailed {
            step: "authorize".to_string(),
            reason: "no auth URL configured".to_string(),
        })
    }
}

async fn create_scratch_org(ctx: &CliCheckContext) -> E2eResult<()> {
    let request = ScratchOrgRequest {
        set_default: false,
        ..ScratchOrgRequest::developer(SCRATCH_ORG_ALIAS)
    };
    let output = ctx.cli.scratch_org_create(&request).await?;
    if !output.success() {
        return Err(E2eError::CliFailed {
            command: "org:create:scratch".to_string(),
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(())
}

async fn find_scratch_org(ctx: &CliCheckContext) -> E2eResult<()> {
    let orgs = ctx.cli.org_list().await?;
    if orgs.find_scratch_org(SCRATCH_ORG_ALIAS).is_none() {
        return Err(E2eError::AssertionFailed(format!(
            "scratch org '{}' is not in org list",
            SCRATCH_ORG_ALIAS
        )));
    }
    ctx.scratch_org_found.store(true, Ordering::SeqCst);
    Ok(())
}

async fn display_scratch_org(ctx: &CliCheckContext) -> E2eResult<()> {
    let output = ctx.cli.org_display(SCRATCH_ORG_ALIAS).await?;
    if !output.json()?.is_object() {
        return Err(E2eError::UnexpectedOutput {
            command: "org:display".to_string(),
            reason: "expected a JSON object".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::{failed, ok, ScriptedExecutor};
    use crate::runner::{StepStatus, TestRunner};

    const LIST_WITH_FOO: &str =
        r#"{"status":0,"result":{"nonScratchOrgs":[],"scratchOrgs":[{"alias":"foo","username":"test-1@example.com"}]}}"#;
    const LIST_WITHOUT_FOO: &str = r#"{"status":0,"result":{"nonScratchOrgs":[],"scratchOrgs":[]}}"#;

    fn authorized_settings() -> Settings {
        Settings {
            dev_hub_user_name: Some("hub@example.com".to_string()),
            org_id: Some("00D000000000001".to_string()),
            sfdx_auth_url: Some("force://PlatformCLI::token@example.my.salesforce.com".to_string()),
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_full_run_deletes_scratch_org() {
        let dir = tempfile::tempdir().unwrap();
        let exec = ScriptedExecutor::new(vec![
            ok("@salesforce/cli/2.40.7 linux-x64 node-v20.12.2"),
            ok("Successfully authorized hub@example.com with org ID 00D000000000001"),
            ok("vscodeOrg hub@example.com true"),
            ok(r#"{"status":0,"result":{"id":"00D5e000000abcdEAA"}}"#),
            ok(LIST_WITH_FOO),
            ok(r#"{"status":0,"result":{"alias":"foo"}}"#),
            ok(""),
        ]);
        let settings = authorized_settings();
        let scenario = cli_commands_scenario(&settings, RetryRunner::new());
        let ctx = CliCheckContext::new(SfCli::new(exec.clone()), settings, dir.path().join("ws"));

        let result = TestRunner::default().run_scenario(&scenario, &ctx).await;
        assert!(result.success, "{:?}", result.error);
        assert!(ctx.scratch_org_found());

        let calls = exec.calls();
        let commands: Vec<&str> = calls.iter().map(|c| c[1].as_str()).collect();
        assert_eq!(
            commands,
            vec![
                "--version",
                "org:login:sfdx-url",
                "alias:set",
                "org:create:scratch",
                "org:list",
                "org:display",
                "org:delete:scratch"
            ]
        );
        assert!(calls[3].contains(&"foo".to_string()));
        assert!(!calls[3].contains(&"--set-default".to_string()));
        assert_eq!(calls[6], vec!["sf", "org:delete:scratch", "--target-org", "foo", "--no-prompt"]);
    }

    #[tokio::test]
    async fn test_without_auth_url_skips_login_and_keeps_org() {
        let dir = tempfile::tempdir().unwrap();
        let exec = ScriptedExecutor::new(vec![ok("@salesforce/cli/2.40.7"), ok(LIST_WITHOUT_FOO)]);
        let settings = Settings::default();
        let scenario = cli_commands_scenario(&settings, RetryRunner::new().max_attempts(1));
        let ctx = CliCheckContext::new(SfCli::new(exec.clone()), settings, dir.path());

        let result = TestRunner::default().run_scenario(&scenario, &ctx).await;
        assert!(!result.success);
        assert!(!ctx.scratch_org_found());

        let statuses: Vec<StepStatus> = result.steps.iter().map(|s| s.status).collect();
        assert_eq!(
            statuses,
            vec![StepStatus::Passed, StepStatus::Failed, StepStatus::Skipped, StepStatus::Passed]
        );
        assert_eq!(exec.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failed_scratch_org_creation_stops_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let exec = ScriptedExecutor::new(vec![
            ok("@salesforce/cli/2.40.7"),
            ok("Successfully authorized hub@example.com with org ID 00D000000000001"),
            ok("vscodeOrg hub@example.com true"),
            failed(1, "daily scratch org signup limit"),
        ]);
        let settings = authorized_settings();
        let scenario = cli_commands_scenario(&settings, RetryRunner::new());
        let ctx = CliCheckContext::new(SfCli::new(exec.clone()), settings, dir.path());

        let result = TestRunner::default().run_scenario(&scenario, &ctx).await;
        assert!(result.error.unwrap().contains("signup limit"));
        assert_eq!(exec.calls().len(), 4);
    }
}
