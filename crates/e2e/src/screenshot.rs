//! Failure screenshots

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::CommandExecutor;
use crate::error::{E2eError, E2eResult};

/// Keep only characters CI artifact uploads accept: ASCII letters, digits, spaces
pub fn sanitize_path(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == ' ')
        .collect()
}

/// `<root>/<suite>/<start time> - <platform> - <test>.png`, every part sanitized.
///
/// The first `:` of the start time becomes `.`.
pub fn screenshot_save_path(
    root: &Path,
    suite_title: &str,
    test_title: &str,
    start_time: &str,
    platform: &str,
) -> PathBuf {
    let start = start_time.replacen(':', ".", 1);
    root.join(sanitize_path(suite_title)).join(format!(
        "{} - {} - {}.png",
        start,
        platform,
        sanitize_path(test_title)
    ))
}

/// Something that can grab the screen into a file
#[async_trait]
pub trait ScreenshotCapture: Send + Sync {
    async fn capture(&self, path: &Path) -> E2eResult<()>;
}

/// Captures by running an external program; `{path}` in the arguments is
/// replaced with the target file
pub struct CommandCapture {
    executor: Arc<dyn CommandExecutor>,
    program: String,
    args: Vec<String>,
}

impl CommandCapture {
    pub fn new(executor: Arc<dyn CommandExecutor>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            executor,
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl ScreenshotCapture for CommandCapture {
    async fn capture(&self, path: &Path) -> E2eResult<()> {
        let target = path.to_string_lossy();
        let args: Vec<String> = self.args.iter().map(|a| a.replace("{path}", &target)).collect();

        let output = self.executor.execute(&self.program, &args, None).await?;
        if output.success() {
            Ok(())
        } else {
            Err(E2eError::CliFailed {
                command: format!("{} {}", self.program, args.join(" ")),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::tests::{ok, ScriptedExecutor};

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("Push and Pull: \"step\" <1>|*?"), "Push and Pull step 1");
        assert_eq!(sanitize_path("Überprüfung"), "berprfung");
    }

    #[test]
    fn test_screenshot_save_path() {
        let path = screenshot_save_path(
            Path::new("/tmp/screenshots"),
            "Push and Pull",
            "SFDX: View Local Changes",
            "10:42",
            "linux",
        );
        assert_eq!(
            path,
            PathBuf::from("/tmp/screenshots/Push and Pull/10.42 - linux - SFDX View Local Changes.png")
        );
    }

    #[tokio::test]
    async fn test_command_capture_substitutes_path() {
        let exec = ScriptedExecutor::new(vec![ok("")]);
        let capture = CommandCapture::new(
            exec.clone(),
            "import",
            vec!["-window".to_string(), "root".to_string(), "{path}".to_string()],
        );

        capture.capture(Path::new("/tmp/shot.png")).await.unwrap();
        assert_eq!(exec.calls()[0], vec!["import", "-window", "root", "/tmp/shot.png"]);
    }
}
