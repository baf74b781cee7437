//! IDE extension E2E harness
//!
//! This crate drives the platform CLI and the IDE's command line to get an
//! environment ready for extension E2E scenarios, then runs the scenarios:
//! - Wraps `sf` invocations and parses their JSON output
//! - Discovers and installs VSIX packages into the extensions directory
//! - Authorizes the Dev Hub and creates per-suite scratch orgs
//! - Runs step-sequenced scenarios with retries and failure screenshots
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  vscode-e2e harness (Rust)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Bootstrap                                                   │
//! │    ├── ExtensionInstaller::install_all() -> InstallOutcome  │
//! │    └── setup_and_authorize_org() -> bool                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestSetup::set_up(TestReqConfig)                           │
//! │    ├── project folder (new | named | any | none)            │
//! │    └── authorize_dev_hub() + scratch org                    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner                                                  │
//! │    ├── run_scenario(Scenario, ctx) -> TestResult            │
//! │    │     ├── step | step_with_retry(RetryRunner)            │
//! │    │     └── after hooks                                    │
//! │    └── ScreenshotCapture on first failure                   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  self_check: built-in "CLI Commands" scenario               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  reporter: render_summary(), write_results()                │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod authorization;
pub mod cli;
pub mod error;
pub mod extensions;
pub mod reporter;
pub mod runner;
pub mod screenshot;
pub mod self_check;
pub mod setup;

pub use cli::{CliOutput, CommandExecutor, ProcessExecutor, SfCli};
pub use error::{E2eError, E2eResult};
pub use extensions::{ExtensionInstaller, ExtensionSpec, InstallOutcome};
pub use runner::{RunOptions, Scenario, TestResult, TestRunner, TestSuiteResult};
pub use screenshot::{CommandCapture, ScreenshotCapture};
pub use self_check::{cli_commands_scenario, CliCheckContext};
pub use setup::{Bootstrap, TestReqConfig, TestSetup};
