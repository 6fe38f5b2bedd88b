use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use pkg_core::{PkgError, ScriptStage};

/// Asks the user before a script runs. Implementations default to "no".
pub trait ConfirmPrompt: Send + Sync {
    fn confirm(&self, package: &str, stage: ScriptStage, lines: &[String]) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    Completed { stdout: String, stderr: String },
    /// Nothing to run.
    Empty,
    Declined,
}

impl ScriptOutcome {
    pub fn stdout(&self) -> &str {
        match self {
            Self::Completed { stdout, .. } => stdout,
            Self::Empty | Self::Declined => "",
        }
    }
}

pub struct ScriptRunner {
    shell: PathBuf,
    prompt: Box<dyn ConfirmPrompt>,
}

impl ScriptRunner {
    pub fn new(prompt: Box<dyn ConfirmPrompt>) -> Self {
        Self {
            shell: PathBuf::from("/bin/sh"),
            prompt,
        }
    }

    pub fn with_shell(mut self, shell: impl Into<PathBuf>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn confirm(&self, package: &str, stage: ScriptStage, lines: &[String]) -> Result<bool> {
        if lines.is_empty() {
            return Ok(true);
        }
        self.prompt.confirm(package, stage, lines)
    }

    /// Runs `lines` as one fail-fast shell invocation inside `working_dir`.
    ///
    /// A non-zero exit becomes [`PkgError::ScriptFailed`] carrying stderr.
    pub fn run(
        &self,
        package: &str,
        stage: ScriptStage,
        lines: &[String],
        working_dir: &Path,
        skip_confirmation: bool,
    ) -> Result<ScriptOutcome> {
        if lines.is_empty() {
            return Ok(ScriptOutcome::Empty);
        }
        if !skip_confirmation && !self.prompt.confirm(package, stage, lines)? {
            tracing::debug!(package, %stage, "script declined");
            return Ok(ScriptOutcome::Declined);
        }

        tracing::debug!(package, %stage, dir = %working_dir.display(), "running script");
        let output = Command::new(&self.shell)
            .arg("-c")
            .arg(build_script_text(lines))
            .current_dir(working_dir)
            .output()
            .with_context(|| {
                format!(
                    "{stage} script for {package}: failed to start {}",
                    self.shell.display()
                )
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            return Err(PkgError::ScriptFailed {
                name: package.to_string(),
                stage,
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            }
            .into());
        }

        Ok(ScriptOutcome::Completed { stdout, stderr })
    }
}

/// `set -eu` aborts on the first failing line; `pipefail` is added where the
/// shell knows it.
pub fn build_script_text(lines: &[String]) -> String {
    let mut script = String::from("set -eu\n(set -o pipefail) 2>/dev/null && set -o pipefail\n");
    for line in lines {
        script.push_str(line);
        script.push('\n');
    }
    script
}
