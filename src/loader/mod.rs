//! URL list loader for batch fetching.

use crate::fetcher::request::decode_escaped_url;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

/// Parse a URL list: one URL per line, blank lines and `#` comments skipped.
/// Escaped URLs copied out of JSON/JS payloads are decoded.
pub fn parse_url_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(decode_escaped_url)
        .collect()
}

pub fn load_url_list(path: &Path) -> Result<Vec<String>> {
    debug!("Loading URL list from {:?}", path);

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read URL list {:?}", path))?;
    let urls = parse_url_list(&text);

    info!("{:?}: {} URLs loaded", path, urls.len());
    Ok(urls)
}
