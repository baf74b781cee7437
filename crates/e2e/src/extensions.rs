//! Extension discovery and installation
//!
//! The harness installs the extension builds found in the extensions
//! directory into the IDE under test, unless matching unpacked extensions
//! are already there.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cli::CommandExecutor;
use crate::error::{E2eError, E2eResult};

const INSTALLED_DIR_PATTERN: &str =
    r"^(?P<publisher>.+?)\.(?P<id>.+?)-(?P<version>\d+\.\d+\.\d+)(?:\.\d+)*$";
const VSIX_PATTERN: &str = r"^(?P<id>.*?)(-(?P<version>\d+\.\d+\.\d+))?\.vsix$";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPolicy {
    Always,
    Optional,
    Never,
}

/// An extension the harness knows how to handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionSpec {
    pub extension_id: String,
    pub name: String,
    pub should_install: InstallPolicy,
    pub should_verify_activation: bool,
    #[serde(default)]
    pub vsix_path: Option<PathBuf>,
}

impl ExtensionSpec {
    fn new(extension_id: &str, name: &str, should_install: InstallPolicy, verify: bool) -> Self {
        Self {
            extension_id: extension_id.to_string(),
            name: name.to_string(),
            should_install,
            should_verify_activation: verify,
            vsix_path: None,
        }
    }
}

/// Extensions shipped in the salesforcedx-vscode repository
pub fn default_registry() -> Vec<ExtensionSpec> {
    use InstallPolicy::*;
    vec![
        ExtensionSpec::new("salesforcedx-vscode", "Salesforce Extension Pack", Never, false),
        ExtensionSpec::new("salesforcedx-vscode-expanded", "Salesforce Extension Pack (Expanded)", Never, false),
        ExtensionSpec::new("salesforcedx-vscode-core", "Salesforce CLI Integration", Always, true),
        ExtensionSpec::new("salesforcedx-vscode-apex", "Apex", Always, true),
        ExtensionSpec::new("salesforcedx-vscode-apex-debugger", "Apex Interactive Debugger", Optional, false),
        ExtensionSpec::new("salesforcedx-vscode-apex-replay-debugger", "Apex Replay Debugger", Always, true),
        ExtensionSpec::new("salesforcedx-vscode-apex-oas", "Apex OpenAPI", Optional, false),
        ExtensionSpec::new("salesforcedx-vscode-lightning", "Lightning Web Components", Always, true),
        ExtensionSpec::new("salesforcedx-vscode-lwc", "Lightning Web Components", Always, true),
        ExtensionSpec::new("salesforcedx-vscode-soql", "SOQL", Optional, false),
        ExtensionSpec::new("salesforcedx-vscode-visualforce", "Visualforce", Always, true),
    ]
}

/// An unpacked extension found in an extensions directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledExtension {
    pub publisher: String,
    pub extension_id: String,
    pub version: String,
    pub path: PathBuf,
}

/// Split `<publisher>.<id>-<x.y.z>[.n...]` into its parts
pub fn parse_installed_dir_name(name: &str) -> E2eResult<Option<(String, String, String)>> {
    let re = Regex::new(INSTALLED_DIR_PATTERN)?;
    Ok(re.captures(name).map(|caps| {
        (
            caps["publisher"].to_string(),
            caps["id"].to_string(),
            caps["version"].to_string(),
        )
    }))
}

/// Split `<id>[-<x.y.z>].vsix` into id and optional version
pub fn parse_vsix_name(file_name: &str) -> E2eResult<Option<(String, Option<String>)>> {
    let re = Regex::new(VSIX_PATTERN)?;
    Ok(re.captures(file_name).map(|caps| {
        (
            caps["id"].to_string(),
            caps.name("version").map(|m| m.as_str().to_string()),
        )
    }))
}

fn direct_children(dir: &Path) -> impl Iterator<Item = walkdir::DirEntry> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
}

/// Unpacked extensions in `dir` whose id is in `registry`
pub fn find_installed(dir: &Path, registry: &[ExtensionSpec]) -> E2eResult<Vec<InstalledExtension>> {
    let mut found = Vec::new();

    for entry in direct_children(dir).filter(|e| e.file_type().is_dir()) {
        let name = entry.file_name().to_string_lossy();
        if let Some((publisher, extension_id, version)) = parse_installed_dir_name(&name)? {
            if registry.iter().any(|ext| ext.extension_id == extension_id) {
                found.push(InstalledExtension {
                    publisher,
                    extension_id,
                    version,
                    path: entry.path().to_path_buf(),
                });
            }
        }
    }

    Ok(found)
}

/// `*.vsix` files directly inside `dir`
pub fn find_vsix_files(dir: &Path) -> Vec<PathBuf> {
    direct_children(dir)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| p.extension().map(|ext| ext == "vsix").unwrap_or(false))
        .collect()
}

/// Attach vsix files to registry entries and decide what gets installed.
///
/// Entries listed in `exclude`, or already marked `Never`, are set to
/// `Never` and lose their activation check; every other matched entry is
/// set to `Always`. Returns the entries to install, in registry order.
pub fn plan_install(
    registry: &mut [ExtensionSpec],
    vsix_files: &[PathBuf],
    exclude: &[&str],
) -> E2eResult<Vec<ExtensionSpec>> {
    let excluded: Vec<String> = exclude
        .iter()
        .map(|id| id.to_string())
        .chain(
            registry
                .iter()
                .filter(|ext| ext.should_install == InstallPolicy::Never)
                .map(|ext| ext.extension_id.clone()),
        )
        .collect();

    for vsix in vsix_files {
        let Some(file_name) = vsix.file_name().map(|n| n.to_string_lossy().to_string()) else {
            continue;
        };
        let Some((id, version)) = parse_vsix_name(&file_name)? else {
            continue;
        };
        let Some(ext) = registry.iter_mut().find(|ext| ext.extension_id == id) else {
            continue;
        };

        ext.vsix_path = Some(vsix.clone());
        if excluded.contains(&ext.extension_id) {
            ext.should_install = InstallPolicy::Never;
            ext.should_verify_activation = false;
        } else {
            ext.should_install = InstallPolicy::Always;
        }
        info!(
            "Found extension {} version {} at {}",
            id,
            version.as_deref().unwrap_or("unversioned"),
            vsix.display()
        );
    }

    Ok(registry
        .iter()
        .filter(|ext| ext.vsix_path.is_some() && ext.should_install != InstallPolicy::Never)
        .cloned()
        .collect())
}

/// What an install pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    AlreadyInstalled(Vec<InstalledExtension>),
    NoVsixFound,
    Installed(Vec<String>),
}

/// Installs vsix packages through the IDE's command-line interface
pub struct ExtensionInstaller {
    executor: Arc<dyn CommandExecutor>,
    code_binary: String,
    extensions_dir: PathBuf,
}

impl ExtensionInstaller {
    pub fn new(executor: Arc<dyn CommandExecutor>, extensions_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            code_binary: "code".to_string(),
            extensions_dir: extensions_dir.into(),
        }
    }

    pub fn code_binary(mut self, binary: impl Into<String>) -> Self {
        self.code_binary = binary.into();
        self
    }

    pub async fn install(&self, vsix: &Path) -> E2eResult<()> {
        info!(
            "Installing extension {}",
            vsix.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        );
        let args = vec![
            "--install-extension".to_string(),
            vsix.to_string_lossy().to_string(),
            "--extensions-dir".to_string(),
            self.extensions_dir.to_string_lossy().to_string(),
            "--force".to_string(),
        ];
        let output = self.executor.execute(&self.code_binary, &args, None).await?;
        if !output.success() {
            return Err(E2eError::Extension(format!(
                "installing {} failed ({}): {}",
                vsix.display(),
                output.exit_code,
                output.stderr.trim()
            )));
        }
        Ok(())
    }

    /// Install every planned extension found in the extensions directory.
    ///
    /// Does nothing when known extensions are already unpacked there, or
    /// when the directory holds no vsix files.
    pub async fn install_all(
        &self,
        registry: &mut [ExtensionSpec],
        exclude: &[&str],
    ) -> E2eResult<InstallOutcome> {
        let installed = find_installed(&self.extensions_dir, registry)?;
        if !installed.is_empty() {
            info!(
                "Found pre-installed extensions in {}, skipping vsix installation",
                self.extensions_dir.display()
            );
            for ext in &installed {
                info!("Extension {} version {}", ext.extension_id, ext.version);
            }
            return Ok(InstallOutcome::AlreadyInstalled(installed));
        }

        let vsix_files = find_vsix_files(&self.extensions_dir);
        if vsix_files.is_empty() {
            warn!(
                "No vsix files were found in {}, skipping extension installation",
                self.extensions_dir.display()
            );
            return Ok(InstallOutcome::NoVsixFound);
        }

        let plan = plan_install(registry, &vsix_files, exclude)?;
        let mut done = Vec::with_capacity(plan.len());
        for ext in plan {
            if let Some(vsix) = &ext.vsix_path {
                self.install(vsix).await?;
                done.push(ext.extension_id);
            }
        }
        Ok(InstallOutcome::Installed(done))
    }
}
