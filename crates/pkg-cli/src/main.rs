use std::process::ExitCode;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

mod completion;
mod dispatch;
mod download;
mod prompt;
mod render;

use render::TerminalRenderer;

pub(crate) const LOG_ENV: &str = "PKG_LOG";

#[derive(Parser, Debug)]
#[command(name = "pkg", version)]
#[command(about = "Personal package manager", long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    /// Create the pkg home directories and an empty lockfile
    #[arg(long)]
    init: bool,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Install packages by name or from local manifest files
    Add {
        #[arg(required = true)]
        packages: Vec<String>,
        /// Run install scripts without asking
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
    /// Update the named packages, or every installed package
    Update {
        packages: Vec<String>,
        /// Run install scripts without asking
        #[arg(short = 'y', long = "yes")]
        yes: bool,
    },
    /// Remove installed packages and the dependencies installed with them
    Remove {
        #[arg(required = true)]
        packages: Vec<String>,
    },
    /// Show a package manifest for this platform
    Info { package: String },
    /// Search the package catalog
    Search { query: String },
    /// List installed packages
    List,
    /// Run each installed package's latest-version check
    Outdated,
    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    let renderer = TerminalRenderer::current();

    match dispatch::run_cli(cli, renderer) {
        Ok(code) => code,
        Err(err) => {
            renderer.print_error(&format!("{err:#}"));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
