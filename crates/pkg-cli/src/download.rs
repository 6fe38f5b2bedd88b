use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use indicatif::ProgressBar;
use pkg_installer::ArtifactFetcher;
use reqwest::blocking::Client;

use crate::render::{start_download_progress, TerminalRenderer};

/// Streams artifacts over HTTP(S) with an `indicatif` bar in rich output.
pub(crate) struct HttpFetcher {
    client: Client,
    renderer: TerminalRenderer,
}

impl HttpFetcher {
    pub(crate) fn new(renderer: TerminalRenderer) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("pkg/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client, renderer })
    }
}

impl ArtifactFetcher for HttpFetcher {
    fn download(&self, url: &str, destination: &Path) -> Result<()> {
        self.renderer
            .print_status("step", &format!("downloading {url}"));

        let mut response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("failed to request {url}"))?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("download of {url} failed with HTTP {status}"));
        }

        let progress = start_download_progress(
            self.renderer.style(),
            &download_label(url),
            response.content_length(),
        );
        let result = copy_body(&mut response, destination, progress.as_ref())
            .with_context(|| format!("failed to download {url} to {}", destination.display()));
        if let Some(progress) = progress {
            progress.finish_and_clear();
        }
        result
    }
}

fn copy_body<R: Read>(
    reader: &mut R,
    destination: &Path,
    progress: Option<&ProgressBar>,
) -> Result<()> {
    let mut file = fs::File::create(destination)
        .with_context(|| format!("failed to create {}", destination.display()))?;
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = reader.read(&mut buffer).context("failed reading response body")?;
        if read == 0 {
            break;
        }
        file.write_all(&buffer[..read])
            .with_context(|| format!("failed to write {}", destination.display()))?;
        if let Some(progress) = progress {
            progress.inc(read as u64);
        }
    }
    file.flush()
        .with_context(|| format!("failed to flush {}", destination.display()))
}

pub(crate) fn download_label(url: &str) -> String {
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').find(|segment| !segment.is_empty()))
        .unwrap_or(url)
        .to_string()
}
