//! Process-wide harness settings
//!
//! Built once at startup from environment variables and handed to every
//! consumer by reference. Tests build their own with [`Settings::from_lookup`].

use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

use crate::duration::ThrottleFactor;
use crate::error::{Error, Result};
use crate::logging::LogLevel;

pub const ENV_CODE_VERSION: &str = "CODE_VERSION";
pub const ENV_SPEC_FILES: &str = "SPEC_FILES";
pub const ENV_DEV_HUB_ALIAS_NAME: &str = "DEV_HUB_ALIAS_NAME";
pub const ENV_DEV_HUB_USER_NAME: &str = "DEV_HUB_USER_NAME";
pub const ENV_ORG_ID: &str = "ORG_ID";
pub const ENV_SFDX_AUTH_URL: &str = "SFDX_AUTH_URL";
pub const ENV_EXTENSION_PATH: &str = "EXTENSION_PATH";
pub const ENV_EXTENSIONS_PATH_OVERRIDE: &str = "SALESFORCEDX_VSCODE_EXTENSIONS_PATH";
pub const ENV_WORKSPACE_PATH: &str = "WORKSPACE_PATH";
pub const ENV_THROTTLE_FACTOR: &str = "THROTTLE_FACTOR";
pub const ENV_JAVA_HOME: &str = "JAVA_HOME";
pub const ENV_USE_EXISTING_PROJECT_PATH: &str = "USE_EXISTING_PROJECT_PATH";
pub const ENV_LOG_LEVEL: &str = "E2E_LOG_LEVEL";

/// Environment variables consulted, in order, for the OS user name
pub const USER_NAME_VARS: [&str; 6] = ["SUDO_USER", "C9_USER", "LOGNAME", "USER", "LNAME", "USERNAME"];

const DEFAULT_VSCODE_VERSION: &str = "latest";
const DEFAULT_DEV_HUB_ALIAS: &str = "vscodeOrg";
const WORKSPACE_DIR_NAME: &str = "salesforcedx-vscode";

/// Harness settings
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// IDE version to run against
    pub vscode_version: String,

    /// Scenario files to run; empty means all
    pub spec_files: Vec<String>,

    /// Alias of the Dev Hub org
    pub dev_hub_alias_name: String,

    /// Username of the Dev Hub org
    pub dev_hub_user_name: Option<String>,

    /// Id of the Dev Hub org, used to check login output
    pub org_id: Option<String>,

    /// Auth URL for non-interactive login. Never serialized.
    #[serde(skip_serializing)]
    pub sfdx_auth_url: Option<String>,

    /// Directory holding extension builds (vsix files or unpacked dirs)
    pub extension_path: PathBuf,

    /// Directory for the IDE install and test artifacts
    pub workspace_path: PathBuf,

    /// Local wall-clock time the run started, `HH:MM`
    pub start_time: String,

    pub throttle_factor: ThrottleFactor,

    pub java_home: Option<PathBuf>,

    /// Run against this project instead of generating one
    pub use_existing_project: Option<PathBuf>,

    pub log_level: LogLevel,

    /// Login name of the user running the harness, from [`USER_NAME_VARS`]
    pub os_user_name: Option<String>,

    /// Values that were rejected while loading, reported once logging is up
    #[serde(skip)]
    pub load_warnings: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let workspace_path = cwd.join(WORKSPACE_DIR_NAME);

        Self {
            vscode_version: DEFAULT_VSCODE_VERSION.to_string(),
            spec_files: Vec::new(),
            dev_hub_alias_name: DEFAULT_DEV_HUB_ALIAS.to_string(),
            dev_hub_user_name: None,
            org_id: None,
            sfdx_auth_url: None,
            extension_path: workspace_path.join("extensions"),
            workspace_path,
            start_time: chrono::Local::now().format("%H:%M").to_string(),
            throttle_factor: ThrottleFactor::NONE,
            java_home: None,
            use_existing_project: None,
            log_level: LogLevel::Info,
            os_user_name: None,
            load_warnings: Vec::new(),
        }
    }
}

impl Settings {
    /// Load settings from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        if let Some(version) = get(ENV_CODE_VERSION) {
            settings.vscode_version = version;
        }
        if let Some(files) = get(ENV_SPEC_FILES) {
            settings.spec_files = files
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(alias) = get(ENV_DEV_HUB_ALIAS_NAME) {
            settings.dev_hub_alias_name = alias;
        }
        settings.dev_hub_user_name = get(ENV_DEV_HUB_USER_NAME);
        settings.org_id = get(ENV_ORG_ID);
        settings.sfdx_auth_url = get(ENV_SFDX_AUTH_URL);

        if let Some(path) = get(ENV_EXTENSIONS_PATH_OVERRIDE).or_else(|| get(ENV_EXTENSION_PATH)) {
            settings.extension_path = PathBuf::from(path);
        }
        if let Some(path) = get(ENV_WORKSPACE_PATH) {
            settings.workspace_path = PathBuf::from(path);
        }
        if let Some(raw) = get(ENV_THROTTLE_FACTOR) {
            settings.throttle_factor = ThrottleFactor::parse(&raw);
            if settings.throttle_factor == ThrottleFactor::NONE && raw.trim() != "1" {
                settings
                    .load_warnings
                    .push(format!("Ignoring {}={}, using 1", ENV_THROTTLE_FACTOR, raw));
            }
        }
        settings.java_home = get(ENV_JAVA_HOME).map(PathBuf::from);

        if let Some(raw) = get(ENV_LOG_LEVEL) {
            match raw.parse() {
                Ok(level) => settings.log_level = level,
                Err(_) => settings.load_warnings.push(format!(
                    "Ignoring {}={}, using {}",
                    ENV_LOG_LEVEL, raw, settings.log_level
                )),
            }
        }

        settings.os_user_name = current_os_user_name(&get).ok();

        if let Some(project) = get(ENV_USE_EXISTING_PROJECT_PATH) {
            settings.set_existing_project(Some(PathBuf::from(project)))?;
        }

        Ok(settings)
    }

    /// Emit the warnings collected while loading. Call after tracing is set up.
    pub fn log_load_warnings(&self) {
        for message in &self.load_warnings {
            warn!("{}", message);
        }
    }

    /// Move the workspace; the extensions directory follows it
    pub fn set_workspace_path(&mut self, path: impl Into<PathBuf>) {
        self.workspace_path = path.into();
        self.extension_path = self.workspace_path.join("extensions");
    }

    /// The OS user name, or `UserNameUnavailable`
    pub fn user_name(&self) -> Result<&str> {
        self.os_user_name.as_deref().ok_or(Error::UserNameUnavailable)
    }

    /// Point the run at an existing project. The path must exist.
    pub fn set_existing_project(&mut self, project: Option<PathBuf>) -> Result<()> {
        match project {
            None => {
                self.use_existing_project = None;
                Ok(())
            }
            Some(path) if path.exists() => {
                self.use_existing_project = Some(path);
                Ok(())
            }
            Some(path) => Err(Error::ProjectPathNotFound(path)),
        }
    }

    /// Check cross-field constraints not enforced while loading
    pub fn validate(&self) -> Result<()> {
        if self.dev_hub_alias_name.trim().is_empty() {
            return Err(Error::InvalidConfig("dev hub alias name is empty".to_string()));
        }
        if self.workspace_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("workspace path is empty".to_string()));
        }
        if self.extension_path.as_os_str().is_empty() {
            return Err(Error::InvalidConfig("extension path is empty".to_string()));
        }
        if self.sfdx_auth_url.is_some() && self.dev_hub_user_name.is_none() {
            return Err(Error::InvalidConfig(format!(
                "{} is set but {} is not",
                ENV_SFDX_AUTH_URL, ENV_DEV_HUB_USER_NAME
            )));
        }
        Ok(())
    }

    /// Apply the throttle factor to a timeout or pause
    pub fn scaled(&self, duration: Duration) -> Duration {
        self.throttle_factor.scale(duration)
    }

    /// Root for per-suite temporary projects
    pub fn temp_projects_dir(&self) -> PathBuf {
        self.workspace_path.join("e2e-temp")
    }
}

/// First non-empty user name from [`USER_NAME_VARS`]
pub fn current_os_user_name<F>(lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    USER_NAME_VARS
        .iter()
        .filter_map(|var| lookup(*var))
        .find(|name| !name.trim().is_empty())
        .ok_or(Error::UserNameUnavailable)
}
