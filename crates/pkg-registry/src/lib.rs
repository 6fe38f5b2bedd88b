mod reference;
mod resolver;
mod search;
mod transport;

pub use reference::ManifestReference;
pub use resolver::{LoadedManifest, ManifestResolver};
pub use search::{fetch_catalog_index, search_catalog, CatalogEntry, SearchResult};
pub use transport::{HttpTransport, ManifestTransport};

#[cfg(test)]
mod tests;
