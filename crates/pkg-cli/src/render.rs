use std::io::IsTerminal;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use pkg_core::ResolvedManifest;
use pkg_installer::Lockfile;
use pkg_registry::SearchResult;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) fn current_output_style() -> OutputStyle {
    resolve_output_style(
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some(),
    )
}

pub(crate) fn resolve_output_style(stdout_is_terminal: bool, no_color: bool) -> OutputStyle {
    if stdout_is_terminal && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

impl TerminalRenderer {
    pub(crate) fn from_style(style: OutputStyle) -> Self {
        Self { style }
    }

    pub(crate) fn current() -> Self {
        Self::from_style(current_output_style())
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn print_status(self, status: &str, message: &str) {
        println!("{}", render_status_line(self.style, status, message));
    }

    pub(crate) fn print_error(self, message: &str) {
        eprintln!("{}", render_status_line(self.style, "err", message));
    }

    pub(crate) fn print_section(self, title: &str) {
        println!();
        println!("{}", render_section_header(self.style, title));
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }
}

/// Plain output keeps the message bare, except errors which keep an `error:`
/// prefix so they stay recognizable in logs.
pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain if status == "err" => format!("error: {message}"),
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("[{}] {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "OK",
        "step" => "..",
        "warn" => "WARN",
        "err" => "ERR",
        _ => "INFO",
    }
}

pub(crate) fn render_section_header(style: OutputStyle, title: &str) -> String {
    let line = format!("== {title} ==");
    match style {
        OutputStyle::Plain => line,
        OutputStyle::Rich => colorize(section_style(), &line),
    }
}

pub(crate) fn format_info_lines(manifest: &ResolvedManifest, style: OutputStyle) -> Vec<String> {
    let label = |text: &str| match style {
        OutputStyle::Plain => text.to_string(),
        OutputStyle::Rich => colorize(label_style(), text),
    };
    let link = |text: &str| match style {
        OutputStyle::Plain => text.to_string(),
        OutputStyle::Rich => colorize(link_style(), text),
    };

    let mut lines = vec![
        format!("{} {}", label(&format!("{}:", manifest.name)), manifest.version),
        manifest.description.clone(),
        link(&manifest.homepage),
        format!("From: {}", link(&manifest.origin)),
        String::new(),
        label(&format!("Platform {}:", manifest.platform)),
        format!("  URL: {}", manifest.url),
        format!("  SHA256: {}", manifest.sha256),
    ];

    for (title, script) in [
        ("Install", &manifest.install_script),
        ("Completions", &manifest.completions_script),
        ("Latest", &manifest.latest_script),
    ] {
        if script.is_empty() {
            continue;
        }
        lines.push(format!("  {title}:"));
        lines.extend(
            script
                .iter()
                .map(|line| format!("    {}", highlight_script_line(style, line))),
        );
    }

    if !manifest.dependencies.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "{} {}",
            label("Dependencies:"),
            manifest.dependencies.join(", ")
        ));
    }
    if !manifest.caveats.trim().is_empty() {
        lines.push(String::new());
        lines.push(format!("{} {}", label("Caveats:"), manifest.caveats.trim()));
    }
    lines
}

pub(crate) fn format_list_lines(lockfile: &Lockfile) -> Vec<String> {
    lockfile
        .iter()
        .map(|(name, entry)| format!("{name}: {}", entry.version))
        .collect()
}

pub(crate) fn format_search_results(results: &[SearchResult]) -> Vec<String> {
    results
        .iter()
        .map(|result| {
            if result.description.is_empty() {
                format!("{}: {}", result.name, result.version)
            } else {
                format!("{}: {}  {}", result.name, result.version, result.description)
            }
        })
        .collect()
}

/// Emphasizes the command word of a script line.
pub(crate) fn highlight_script_line(style: OutputStyle, line: &str) -> String {
    if style == OutputStyle::Plain {
        return line.to_string();
    }
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];
    match trimmed.split_once(' ') {
        Some((command, rest)) => format!("{indent}{} {rest}", colorize(command_style(), command)),
        None => format!("{indent}{}", colorize(command_style(), trimmed)),
    }
}

/// Byte-count progress for one download. Plain output gets no bar.
pub(crate) fn start_download_progress(
    style: OutputStyle,
    label: &str,
    total: Option<u64>,
) -> Option<ProgressBar> {
    if style == OutputStyle::Plain {
        return None;
    }

    let progress_bar = match total {
        Some(total) => ProgressBar::new(total),
        None => ProgressBar::new_spinner(),
    };
    let template = if total.is_some() {
        "{msg:<24} [{bar:24.cyan/blue}] {bytes:>10}/{total_bytes:10} {bytes_per_sec}"
    } else {
        "{spinner:.cyan.bold} {msg:<24} {bytes:>10} {bytes_per_sec}"
    };
    if let Ok(style) = ProgressStyle::with_template(template) {
        progress_bar.set_style(style.progress_chars("=>-"));
    }
    progress_bar.set_message(label.to_string());
    Some(progress_bar)
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn label_style() -> Style {
    Style::new().effects(Effects::BOLD)
}

fn link_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::Blue.into()))
        .effects(Effects::UNDERLINE)
}

fn command_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
