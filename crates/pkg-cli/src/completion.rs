use std::io::Write;

use anyhow::{Context, Result};
use clap::CommandFactory;
use clap_complete::Shell;
use pkg_installer::PkgLayout;

use crate::Cli;

pub(crate) fn write_completions_script<W: Write>(shell: Shell, writer: &mut W) -> Result<()> {
    let mut command = Cli::command();
    let mut generated = Vec::new();
    clap_complete::generate(shell, &mut command, "pkg", &mut generated);
    writer
        .write_all(&generated)
        .context("failed writing generated completion script")
}

/// Shell lines that put pkg's bin and zsh completion dirs on the search paths.
pub(crate) fn render_init_snippet(layout: &PkgLayout) -> String {
    let home = escape_single_quote_shell(&layout.home().display().to_string());
    format!(
        "export PKG_HOME='{home}'\nexport PATH=\"$PKG_HOME/bin:$PATH\"\nexport FPATH=\"$PKG_HOME/share/zsh/site-functions:$FPATH\"\n"
    )
}

fn escape_single_quote_shell(value: &str) -> String {
    value.replace('\'', "'\"'\"'")
}
