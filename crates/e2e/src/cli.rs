//! Wrapper around the platform command-line tool (`sf`)
//!
//! Commands go through a [`CommandExecutor`] so that org setup logic can be
//! exercised without the real binary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command as TokioCommand;
use tracing::debug;

use crate::error::{E2eError, E2eResult};

/// Captured result of one command invocation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CliOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CliOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn json(&self) -> E2eResult<serde_json::Value> {
        Ok(serde_json::from_str(&self.stdout)?)
    }
}

/// Runs external programs
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(&self, program: &str, args: &[String], cwd: Option<&Path>) -> E2eResult<CliOutput>;
}

/// Executes commands as child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessExecutor {
    /// Kill the child if it runs longer than this
    pub timeout: Option<Duration>,
}

impl ProcessExecutor {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout: Some(timeout) }
    }
}

#[async_trait]
impl CommandExecutor for ProcessExecutor {
    async fn execute(&self, program: &str, args: &[String], cwd: Option<&Path>) -> E2eResult<CliOutput> {
        let mut cmd = TokioCommand::new(program);
        cmd.args(args).kill_on_drop(true);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, cmd.output()).await.map_err(|_| {
                vscode_e2e_common::Error::Timeout(format!("{} {}", program, args.join(" ")))
            })?,
            None => cmd.output().await,
        };

        let output = output.map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => E2eError::CliNotFound(program.to_string()),
            _ => E2eError::Io(e),
        })?;

        Ok(CliOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Org entry as reported by `org list --json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgSummary {
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub org_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgList {
    #[serde(default)]
    pub non_scratch_orgs: Vec<OrgSummary>,
    #[serde(default)]
    pub scratch_orgs: Vec<OrgSummary>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

impl OrgList {
    /// Parse the stdout of `org list --json`
    pub fn from_json(stdout: &str) -> E2eResult<Self> {
        let envelope: Envelope<OrgList> = serde_json::from_str(stdout)?;
        Ok(envelope.result)
    }

    pub fn find_scratch_org(&self, alias: &str) -> Option<&OrgSummary> {
        self.scratch_orgs
            .iter()
            .find(|org| org.alias.as_deref() == Some(alias))
    }

    /// True when a non-scratch org carries both this alias and username
    pub fn has_dev_hub(&self, alias: &str, username: &str) -> bool {
        self.non_scratch_orgs
            .iter()
            .any(|org| org.alias.as_deref() == Some(alias) && org.username == username)
    }
}

/// Extract `result.id` from `org create scratch --json` output
pub fn parse_scratch_org_id(stdout: &str) -> E2eResult<String> {
    #[derive(Deserialize)]
    struct Created {
        id: String,
    }
    let envelope: Envelope<Created> = serde_json::from_str(stdout)?;
    Ok(envelope.result.id)
}

/// Parameters for a scratch org
#[derive(Debug, Clone)]
pub struct ScratchOrgRequest {
    pub edition: String,
    pub alias: String,
    pub duration_days: u32,
    pub definition_file: Option<PathBuf>,
    pub no_namespace: bool,
    pub set_default: bool,
}

impl ScratchOrgRequest {
    /// One-day developer edition org, set as default
    pub fn developer(alias: impl Into<String>) -> Self {
        Self {
            edition: "developer".to_string(),
            alias: alias.into(),
            duration_days: 1,
            definition_file: None,
            no_namespace: true,
            set_default: true,
        }
    }
}

/// Handle to the `sf` binary
#[derive(Clone)]
pub struct SfCli {
    executor: Arc<dyn CommandExecutor>,
    binary: String,
    cwd: Option<PathBuf>,
}

impl SfCli {
    pub fn new(executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            executor,
            binary: "sf".to_string(),
            cwd: None,
        }
    }

    /// Use another binary name or path
    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Run commands from this directory
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    fn command_line(&self, args: &[String]) -> String {
        format!("{} {}", self.binary, args.join(" "))
    }

    /// Run `sf <command> <args...>` and return the output whatever the exit code
    pub async fn run_cli_command(&self, command: &str, args: &[&str]) -> E2eResult<CliOutput> {
        let mut argv = Vec::with_capacity(args.len() + 1);
        argv.push(command.to_string());
        argv.extend(args.iter().map(|a| a.to_string()));

        debug!("Running {}", self.command_line(&argv));
        let output = self.executor.execute(&self.binary, &argv, self.cwd.as_deref()).await?;
        debug!("{} exited with {}", command, output.exit_code);
        Ok(output)
    }

    async fn run_checked(&self, command: &str, args: &[&str]) -> E2eResult<CliOutput> {
        let output = self.run_cli_command(command, args).await?;
        if output.success() {
            Ok(output)
        } else {
            let mut argv = vec![command.to_string()];
            argv.extend(args.iter().map(|a| a.to_string()));
            Err(E2eError::CliFailed {
                command: self.command_line(&argv),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }

    /// `sf --version`, used to check the tool is installed
    pub async fn version(&self) -> E2eResult<String> {
        let output = self.run_checked("--version", &[]).await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn org_login_sfdx_url(&self, auth_file: &Path) -> E2eResult<CliOutput> {
        let file = auth_file.to_string_lossy();
        self.run_checked("org:login:sfdx-url", &["--sfdx-url-file", &file]).await
    }

    pub async fn set_alias(&self, alias: &str, username: &str) -> E2eResult<CliOutput> {
        let pair = format!("{}={}", alias, username);
        self.run_checked("alias:set", &[&pair]).await
    }

    pub async fn org_list(&self) -> E2eResult<OrgList> {
        let output = self.run_checked("org:list", &["--json"]).await?;
        OrgList::from_json(&output.stdout).map_err(|e| E2eError::UnexpectedOutput {
            command: "org:list".to_string(),
            reason: e.to_string(),
        })
    }

    pub async fn org_display(&self, target_org: &str) -> E2eResult<CliOutput> {
        self.run_checked("org:display", &["--target-org", target_org, "--verbose", "--json"])
            .await
    }

    /// Create a scratch org. The exit code is left for the caller to judge.
    pub async fn scratch_org_create(&self, request: &ScratchOrgRequest) -> E2eResult<CliOutput> {
        let days = request.duration_days.to_string();
        let definition = request
            .definition_file
            .as_ref()
            .map(|p| p.to_string_lossy().to_string());

        let mut args = vec![
            "--edition",
            request.edition.as_str(),
            "--alias",
            request.alias.as_str(),
            "--duration-days",
            days.as_str(),
            "--json",
        ];
        if let Some(definition) = definition.as_deref() {
            args.extend(["--definition-file", definition]);
        }
        if request.no_namespace {
            args.push("--no-namespace");
        }
        if request.set_default {
            args.push("--set-default");
        }

        self.run_cli_command("org:create:scratch", &args).await
    }

    pub async fn delete_scratch_org(&self, alias: &str) -> E2eResult<CliOutput> {
        self.run_checked("org:delete:scratch", &["--target-org", alias, "--no-prompt"])
            .await
    }

    /// Remove the ScratchOrgInfo record of a scratch org from the Dev Hub.
    ///
    /// The record is keyed by the 15-character org id, so the last three
    /// characters of the 18-character id are dropped.
    pub async fn delete_scratch_org_info(&self, scratch_org_id: &str, dev_hub_alias: &str) -> E2eResult<CliOutput> {
        let short_id = scratch_org_id
            .char_indices()
            .rev()
            .nth(2)
            .map(|(i, _)| &scratch_org_id[..i])
            .unwrap_or("");
        let filter = format!("ScratchOrg={}", short_id);

        self.run_checked(
            "data:delete:record",
            &["--sobject", "ScratchOrgInfo", "--where", &filter, "--target-org", dev_hub_alias],
        )
        .await
    }
}

impl std::fmt::Debug for SfCli {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SfCli")
            .field("binary", &self.binary)
            .field("cwd", &self.cwd)
            .finish()
    }
}
