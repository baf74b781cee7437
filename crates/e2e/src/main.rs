//! vscode-e2e harness entry point
//!
//! Prepares the E2E environment and runs the built-in CLI self-check.
//! Exit codes: 0 on success, 1 when a check or scenario fails, 2 on a
//! harness error.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use vscode_e2e::cli::ProcessExecutor;
use vscode_e2e::reporter::{read_results, render_summary, write_results};
use vscode_e2e::{
    cli_commands_scenario, Bootstrap, CliCheckContext, CommandCapture, ExtensionInstaller, RunOptions, SfCli,
    TestRunner,
};
use vscode_e2e_common::{init_tracing, RetryRunner, Settings};

#[derive(Parser, Debug)]
#[command(name = "vscode-e2e")]
#[command(author, version, about = "E2E environment harness for IDE extensions")]
#[command(propagate_version = true)]
struct Cli {
    /// Scenario names or files to run (overrides SPEC_FILES)
    #[arg(short, long, num_args = 1.., value_delimiter = ',', global = true)]
    spec: Vec<String>,

    /// Workspace directory; extensions go to `<workspace>/extensions`
    #[arg(short, long, global = true)]
    workspace_path: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, env = "E2E_LOG_JSON", global = true)]
    log_json: bool,

    /// Platform CLI binary
    #[arg(long, default_value = "sf", global = true)]
    sf_binary: String,

    /// IDE command line binary used to install extensions
    #[arg(long, default_value = "code", global = true)]
    code_binary: String,

    /// Kill external commands that run longer than this (0 = no limit)
    #[arg(long, default_value = "600", global = true)]
    command_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved settings as JSON
    Settings,

    /// Prepare the workspace, install extensions and authorize the org
    Setup {
        /// Extension ids that must not be installed
        #[arg(long, value_delimiter = ',')]
        exclude: Vec<String>,
    },

    /// Run the platform CLI self-check scenario
    CheckCli {
        /// Attempts per step
        #[arg(long, default_value = "3")]
        attempts: usize,

        /// Delay between attempts
        #[arg(long, default_value = "0")]
        delay_secs: u64,

        /// Directory for test-results.json
        #[arg(short, long, default_value = "test-results")]
        output: PathBuf,

        /// Screenshot command run on failure; `{path}` is replaced with the target file
        #[arg(long, num_args = 1.., allow_hyphen_values = true)]
        screenshot_cmd: Vec<String>,
    },

    /// Print the summary of a saved test-results.json
    Summary { path: PathBuf },
}

fn main() {
    let cli = Cli::parse();

    let mut settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    };
    init_tracing(settings.log_level, cli.log_json);
    settings.log_load_warnings();

    if !cli.spec.is_empty() {
        settings.spec_files = cli.spec.clone();
    }
    if let Some(path) = &cli.workspace_path {
        settings.set_workspace_path(path);
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {}", e);
            std::process::exit(2);
        }
    };

    match rt.block_on(async_main(cli, settings)) {
        Ok(true) => std::process::exit(0),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(2);
        }
    }
}

async fn async_main(cli: Cli, settings: Settings) -> anyhow::Result<bool> {
    let executor = Arc::new(match cli.command_timeout_secs {
        0 => ProcessExecutor::default(),
        secs => ProcessExecutor::with_timeout(Duration::from_secs(secs)),
    });
    let sf = SfCli::new(executor.clone())
        .binary(cli.sf_binary.as_str())
        .current_dir(settings.workspace_path.clone());

    match cli.command {
        Commands::Settings => {
            println!("{}", serde_json::to_string_pretty(&settings)?);
            Ok(true)
        }
        Commands::Setup { exclude } => {
            settings.validate().context("invalid settings")?;
            let installer = ExtensionInstaller::new(executor.clone(), settings.extension_path.clone())
                .code_binary(cli.code_binary.as_str());

            let report = Bootstrap::new(&settings, sf, installer)
                .exclude(exclude)
                .run()
                .await
                .context("environment setup failed")?;
            info!(
                "Setup finished: extensions {:?}, org authorized: {}",
                report.extensions, report.org_authorized
            );
            Ok(true)
        }
        Commands::CheckCli {
            attempts,
            delay_secs,
            output,
            screenshot_cmd,
        } => {
            let retry = RetryRunner::new()
                .max_attempts(attempts)
                .delay(settings.scaled(Duration::from_secs(delay_secs)));

            let mut options = RunOptions::from_settings(&settings);
            if let Some((program, args)) = screenshot_cmd.split_first() {
                options = options.with_capture(Arc::new(CommandCapture::new(
                    executor.clone(),
                    program.as_str(),
                    args.to_vec(),
                )));
            }

            let scenario = cli_commands_scenario(&settings, retry);
            let only = settings.spec_files.clone();
            let ctx = CliCheckContext::new(sf, settings.clone(), settings.workspace_path.clone());
            let suite = TestRunner::new(options).run_scenarios(&[scenario], &ctx, &only).await;

            if let Err(e) = write_results(&output, &suite) {
                warn!("Could not write results: {}", e);
            }
            println!("{}", render_summary(&suite));
            if suite.executed() == 0 {
                warn!("No scenario was run; check --spec / SPEC_FILES");
            }
            Ok(suite.succeeded())
        }
        Commands::Summary { path } => {
            let suite = read_results(&path).with_context(|| format!("reading {}", path.display()))?;
            println!("{}", render_summary(&suite));
            Ok(suite.succeeded())
        }
    }
}
