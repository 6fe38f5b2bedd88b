use std::collections::BTreeMap;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::ManifestTransport;

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CatalogEntry {
    #[serde(alias = "Version")]
    pub version: String,
    #[serde(default, alias = "Description")]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub name: String,
    pub version: String,
    pub description: String,
}

pub fn fetch_catalog_index(
    transport: &dyn ManifestTransport,
    host: &str,
) -> Result<BTreeMap<String, CatalogEntry>> {
    let url = format!("{}/index.json", host.trim_end_matches('/'));
    let raw = transport
        .get_text(&url)?
        .ok_or_else(|| anyhow!("{url} not found"))?;
    serde_json::from_str(&raw).map_err(|err| {
        anyhow!(
            "failed decoding {url}, expected format {{name: {{version: string, description: string}}}}: {err}"
        )
    })
}

/// Case-insensitive substring match over `"<name> <description>"`, sorted by name.
pub fn search_catalog(index: &BTreeMap<String, CatalogEntry>, query: &str) -> Vec<SearchResult> {
    let needle = query.trim().to_lowercase();
    index
        .iter()
        .filter(|(name, entry)| {
            format!("{} {}", name, entry.description)
                .to_lowercase()
                .contains(&needle)
        })
        .map(|(name, entry)| SearchResult {
            name: name.clone(),
            version: entry.version.clone(),
            description: entry.description.clone(),
        })
        .collect()
}
