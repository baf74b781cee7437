//! Org authorization through the platform CLI

use chrono::{DateTime, Local};
use std::path::Path;
use tracing::info;
use vscode_e2e_common::Settings;

use crate::cli::{parse_scratch_org_id, ScratchOrgRequest, SfCli};
use crate::error::{ensure_contains, E2eError, E2eResult};
use crate::setup::TestSetup;

pub const AUTH_URL_FILE: &str = "authFile.txt";
pub const DEV_HUB_AUTH_FILE: &str = "authFile.json";

/// User name with periods replaced, since the IDE input box truncates at them
pub fn transformed_user_name(user_name: &str) -> String {
    user_name.replace('.', "_")
}

/// `TempScratchOrg_<yyyy>_<mm>_<dd>_<user>_<epoch ms>_OrgAuth`
pub fn build_scratch_org_alias(now: DateTime<Local>, user_name: &str) -> String {
    format!(
        "TempScratchOrg_{}_{}_{}_OrgAuth",
        now.format("%Y_%m_%d"),
        user_name,
        now.timestamp_millis()
    )
}

fn dev_hub_user(settings: &Settings) -> E2eResult<&str> {
    settings.dev_hub_user_name.as_deref().ok_or_else(|| {
        vscode_e2e_common::Error::InvalidConfig("dev hub user name was not set".to_string()).into()
    })
}

/// Check the configured Dev Hub alias and user name appear together in `org list`
pub async fn verify_alias_and_user_name(settings: &Settings, cli: &SfCli) -> E2eResult<()> {
    let alias = settings.dev_hub_alias_name.as_str();
    if alias.is_empty() {
        return Err(vscode_e2e_common::Error::InvalidConfig("dev hub alias name was not set".to_string()).into());
    }
    let user = dev_hub_user(settings)?;

    let orgs = cli.org_list().await?;
    if orgs.has_dev_hub(alias, user) {
        return Ok(());
    }

    Err(E2eError::AssertionFailed(format!(
        "matching dev hub alias '{}' and user name '{}' was not found; \
         make sure DEV_HUB_ALIAS_NAME and DEV_HUB_USER_NAME are set correctly",
        alias, user
    )))
}

/// Authorize the Dev Hub for a suite's project using the stored CLI auth
pub async fn authorize_dev_hub(setup: &mut TestSetup, settings: &Settings, cli: &SfCli) -> E2eResult<()> {
    info!("{} - authorizing dev hub", setup.suite_suffix);

    if !setup.alias_and_user_name_were_verified {
        verify_alias_and_user_name(settings, cli).await?;
        setup.alias_and_user_name_were_verified = true;
    }

    let project = setup.project_folder_path.as_deref().ok_or_else(|| {
        E2eError::StepFailed {
            step: "authorize dev hub".to_string(),
            reason: "the suite has no project folder".to_string(),
        }
    })?;
    let auth_file = project.join(DEV_HUB_AUTH_FILE);

    let display = cli.org_display(dev_hub_user(settings)?).await?;
    tokio::fs::write(&auth_file, &display.stdout).await?;
    cli.org_login_sfdx_url(&auth_file).await?;

    info!("{} - dev hub authorized", setup.suite_suffix);
    Ok(())
}

/// Log in with the auth URL from the settings and alias the org.
///
/// Returns `false` without touching the CLI when no auth URL is configured.
pub async fn setup_and_authorize_org(settings: &Settings, cli: &SfCli, work_dir: &Path) -> E2eResult<bool> {
    let Some(auth_url) = settings.sfdx_auth_url.as_deref() else {
        info!("No SFDX_AUTH_URL provided, skipping org authorization");
        return Ok(false);
    };
    let user = dev_hub_user(settings)?;
    let alias = settings.dev_hub_alias_name.as_str();

    let auth_file = work_dir.join(AUTH_URL_FILE);
    tokio::fs::write(&auth_file, auth_url).await?;

    let login = cli.org_login_sfdx_url(&auth_file).await?;
    let expected = match settings.org_id.as_deref() {
        Some(org_id) => format!("Successfully authorized {} with org ID {}", user, org_id),
        None => format!("Successfully authorized {}", user),
    };
    ensure_contains(&login.stdout, &expected, "org login output")?;

    let aliased = cli.set_alias(alias, user).await?;
    ensure_contains(&aliased.stdout, alias, "alias output")?;
    ensure_contains(&aliased.stdout, user, "alias output")?;
    ensure_contains(&aliased.stdout, "true", "alias output")?;

    info!("Authorized {} as {}", user, alias);
    Ok(true)
}

/// Create the suite's scratch org and record its alias and id.
///
/// The alias embeds the OS user name from `settings`.
pub async fn create_default_scratch_org_via_cli(
    setup: &mut TestSetup,
    settings: &Settings,
    cli: &SfCli,
) -> E2eResult<()> {
    let user_name = transformed_user_name(settings.user_name()?);
    let alias = build_scratch_org_alias(Local::now(), &user_name);
    info!("{} - creating scratch org {}", setup.suite_suffix, alias);

    let output = cli.scratch_org_create(&ScratchOrgRequest::developer(alias.as_str())).await?;
    setup.scratch_org_alias_name = Some(alias);

    if !output.success() {
        return Err(E2eError::CliFailed {
            command: "org:create:scratch".to_string(),
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    setup.scratch_org_id = Some(parse_scratch_org_id(&output.stdout)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::{failed, ok, ScriptedExecutor};
    use chrono::TimeZone;

    fn settings_with_hub() -> Settings {
        Settings {
            dev_hub_user_name: Some("hub@example.com".to_string()),
            org_id: Some("00D000000000001".to_string()),
            sfdx_auth_url: Some("force://PlatformCLI::token@example.my.salesforce.com".to_string()),
            ..Settings::default()
        }
    }

    #[test]
    fn test_transformed_user_name() {
        assert_eq!(transformed_user_name("jane.q.doe"), "jane_q_doe");
    }

    #[test]
    fn test_scratch_org_alias_format() {
        let now = Local.with_ymd_and_hms(2025, 3, 7, 9, 5, 0).unwrap();
        let alias = build_scratch_org_alias(now, "runner");
        assert_eq!(
            alias,
            format!("TempScratchOrg_2025_03_07_runner_{}_OrgAuth", now.timestamp_millis())
        );
    }

    #[tokio::test]
    async fn test_setup_and_authorize_skips_without_auth_url() {
        let exec = ScriptedExecutor::new(vec![]);
        let cli = SfCli::new(exec.clone());
        let dir = tempfile::tempdir().unwrap();

        let authorized = setup_and_authorize_org(&Settings::default(), &cli, dir.path()).await.unwrap();
        assert!(!authorized);
        assert!(exec.calls().is_empty());
    }

    #[tokio::test]
    async fn test_setup_and_authorize_checks_output() {
        let exec = ScriptedExecutor::new(vec![
            ok("Successfully authorized hub@example.com with org ID 00D000000000001"),
            ok("Alias      Value              Success\nvscodeOrg  hub@example.com    true"),
        ]);
        let cli = SfCli::new(exec.clone());
        let dir = tempfile::tempdir().unwrap();

        let authorized = setup_and_authorize_org(&settings_with_hub(), &cli, dir.path()).await.unwrap();
        assert!(authorized);
        assert_eq!(
            std::fs::read_to_string(dir.path().join(AUTH_URL_FILE)).unwrap(),
            "force://PlatformCLI::token@example.my.salesforce.com"
        );
        assert_eq!(exec.calls()[1], vec!["sf", "alias:set", "vscodeOrg=hub@example.com"]);
    }

    #[tokio::test]
    async fn test_setup_and_authorize_rejects_wrong_org() {
        let exec = ScriptedExecutor::new(vec![ok(
            "Successfully authorized hub@example.com with org ID 00D999999999999",
        )]);
        let cli = SfCli::new(exec);
        let dir = tempfile::tempdir().unwrap();

        let err = setup_and_authorize_org(&settings_with_hub(), &cli, dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::AssertionFailed(_)));
    }

    #[tokio::test]
    async fn test_verify_alias_and_user_name() {
        let list = r#"{"result":{"nonScratchOrgs":[{"alias":"vscodeOrg","username":"hub@example.com"}]}}"#;
        let cli = SfCli::new(ScriptedExecutor::new(vec![ok(list), ok(list)]));

        verify_alias_and_user_name(&settings_with_hub(), &cli).await.unwrap();

        let other = Settings {
            dev_hub_alias_name: "otherHub".to_string(),
            ..settings_with_hub()
        };
        let err = verify_alias_and_user_name(&other, &cli).await.unwrap_err();
        assert!(err.to_string().contains("otherHub"));
    }

    #[tokio::test]
    async fn test_create_scratch_org_records_id() {
        let exec = ScriptedExecutor::new(vec![ok(r#"{"status":0,"result":{"id":"00D5e000000abcdEAA"}}"#)]);
        let cli = SfCli::new(exec);
        let mut setup = TestSetup::detached("PushAndPull");
        let settings = Settings {
            os_user_name: Some("jane.doe".to_string()),
            ..Settings::default()
        };

        create_default_scratch_org_via_cli(&mut setup, &settings, &cli).await.unwrap();
        assert_eq!(setup.scratch_org_id.as_deref(), Some("00D5e000000abcdEAA"));
        let alias = setup.scratch_org_alias_name.as_deref().unwrap();
        assert!(alias.starts_with("TempScratchOrg_"));
        assert!(alias.contains("_jane_doe_"));
    }

    #[tokio::test]
    async fn test_create_scratch_org_needs_user_name() {
        let exec = ScriptedExecutor::new(vec![]);
        let cli = SfCli::new(exec.clone());
        let mut setup = TestSetup::detached("PushAndPull");

        let err = create_default_scratch_org_via_cli(&mut setup, &Settings::default(), &cli)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            E2eError::Common(vscode_e2e_common::Error::UserNameUnavailable)
        ));
        assert!(exec.calls().is_empty());
    }

    #[tokio::test]
    async fn test_create_scratch_org_failure() {
        let cli = SfCli::new(ScriptedExecutor::new(vec![failed(1, "daily scratch org signup limit")]));
        let mut setup = TestSetup::detached("PushAndPull");
        let settings = Settings {
            os_user_name: Some("runner".to_string()),
            ..Settings::default()
        };

        let err = create_default_scratch_org_via_cli(&mut setup, &settings, &cli)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("signup limit"));
        assert!(setup.scratch_org_id.is_none());
    }
}
