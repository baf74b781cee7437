//! Per-suite project setup and the one-time harness bootstrap

use std::path::PathBuf;
use tracing::{info, warn};
use vscode_e2e_common::Settings;

use crate::authorization::{authorize_dev_hub, create_default_scratch_org_via_cli, setup_and_authorize_org};
use crate::cli::SfCli;
use crate::error::{E2eError, E2eResult};
use crate::extensions::{default_registry, ExtensionInstaller, InstallOutcome};

/// Which project a suite runs against
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectShape {
    /// A fresh project under `<workspace>/e2e-temp`
    New,
    /// A specific existing project
    Named(PathBuf),
    /// The configured existing project if there is one, else a fresh one
    Any,
    /// No project folder
    None,
}

/// What a suite needs before its first step
#[derive(Debug, Clone)]
pub struct TestReqConfig {
    pub project_shape: ProjectShape,
    pub is_org_required: bool,
    pub suite_suffix: String,
}

/// State produced by setting up one suite
#[derive(Debug, Clone, Default)]
pub struct TestSetup {
    pub suite_suffix: String,
    pub temp_project_name: String,
    pub project_folder_path: Option<PathBuf>,
    pub alias_and_user_name_were_verified: bool,
    pub scratch_org_alias_name: Option<String>,
    pub scratch_org_id: Option<String>,
}

impl TestSetup {
    /// Setup with names filled in and nothing on disk
    pub fn detached(suite_suffix: &str) -> Self {
        Self {
            suite_suffix: suite_suffix.to_string(),
            temp_project_name: format!("TempProject-{}", suite_suffix),
            ..Self::default()
        }
    }

    pub async fn set_up(config: &TestReqConfig, settings: &Settings, cli: &SfCli) -> E2eResult<Self> {
        let mut setup = Self::detached(&config.suite_suffix);
        info!("{} - setting up", setup.suite_suffix);

        setup.prepare_project(&config.project_shape, settings).await?;

        if config.is_org_required {
            authorize_dev_hub(&mut setup, settings, cli).await?;
            create_default_scratch_org_via_cli(&mut setup, settings, cli).await?;
        }

        Ok(setup)
    }

    async fn prepare_project(&mut self, shape: &ProjectShape, settings: &Settings) -> E2eResult<()> {
        let path = match shape {
            ProjectShape::None => return Ok(()),
            ProjectShape::Named(path) => {
                if !path.exists() {
                    return Err(vscode_e2e_common::Error::ProjectPathNotFound(path.clone()).into());
                }
                path.clone()
            }
            ProjectShape::Any if settings.use_existing_project.is_some() => {
                settings.use_existing_project.clone().unwrap_or_default()
            }
            ProjectShape::New | ProjectShape::Any => {
                let path = settings.temp_projects_dir().join(&self.temp_project_name);
                if tokio::fs::try_exists(&path).await? {
                    tokio::fs::remove_dir_all(&path).await?;
                }
                tokio::fs::create_dir_all(&path).await?;
                path
            }
        };

        info!("{} - project folder {}", self.suite_suffix, path.display());
        self.project_folder_path = Some(path);
        Ok(())
    }

    /// Remove the scratch org record from the Dev Hub, if one was created
    pub async fn tear_down(&self, settings: &Settings, cli: &SfCli) -> E2eResult<()> {
        if let Some(id) = &self.scratch_org_id {
            cli.delete_scratch_org_info(id, &settings.dev_hub_alias_name).await?;
        }
        Ok(())
    }
}

/// What the bootstrap did
#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    pub extensions: Option<InstallOutcome>,
    pub org_authorized: bool,
}

/// One-time environment preparation before any suite runs
pub struct Bootstrap<'a> {
    settings: &'a Settings,
    cli: SfCli,
    installer: ExtensionInstaller,
    exclude: Vec<String>,
}

impl<'a> Bootstrap<'a> {
    pub fn new(settings: &'a Settings, cli: SfCli, installer: ExtensionInstaller) -> Self {
        Self {
            settings,
            cli,
            installer,
            exclude: Vec::new(),
        }
    }

    /// Never install these extension ids
    pub fn exclude(mut self, ids: impl IntoIterator<Item = String>) -> Self {
        self.exclude.extend(ids);
        self
    }

    /// Prepare the workspace, install extensions and authorize the org.
    ///
    /// Workspace and extension problems are logged and skipped; an org
    /// authorization failure aborts.
    pub async fn run(&self) -> E2eResult<BootstrapReport> {
        let mut report = BootstrapReport::default();
        let workspace = &self.settings.workspace_path;

        if let Err(e) = tokio::fs::create_dir_all(workspace).await {
            warn!("Failed to create workspace directory {}: {}", workspace.display(), e);
        }

        let exclude: Vec<&str> = self.exclude.iter().map(String::as_str).collect();
        let mut registry = default_registry();
        match self.installer.install_all(&mut registry, &exclude).await {
            Ok(outcome) => report.extensions = Some(outcome),
            Err(e) => warn!("Failed to install extensions: {}. Continuing setup.", e),
        }

        report.org_authorized = setup_and_authorize_org(self.settings, &self.cli, workspace)
            .await
            .map_err(|e| E2eError::StepFailed {
                step: "authorize org".to_string(),
                reason: e.to_string(),
            })?;

        Ok(report)
    }
}
