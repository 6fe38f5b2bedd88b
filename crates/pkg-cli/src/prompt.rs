use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use pkg_core::ScriptStage;
use pkg_installer::ConfirmPrompt;

use crate::render::{highlight_script_line, OutputStyle};

/// Shows the script and asks on stdin. Anything but `y`/`yes` declines.
pub(crate) struct TerminalPrompt {
    style: OutputStyle,
}

impl TerminalPrompt {
    pub(crate) fn new(style: OutputStyle) -> Self {
        Self { style }
    }
}

impl ConfirmPrompt for TerminalPrompt {
    fn confirm(&self, package: &str, stage: ScriptStage, lines: &[String]) -> Result<bool> {
        {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "Commands to run ({stage} script for {package}):")?;
            for line in lines {
                writeln!(stdout, "  {}", highlight_script_line(self.style, line))?;
            }
            write!(stdout, "\nProceed? [y/N]: ")?;
            stdout.flush()?;
        }

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("failed to read confirmation from stdin")?;
        Ok(is_affirmative(&answer))
    }
}

pub(crate) fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
