//! GitHub release API resolution
//!
//! Picks the first release asset whose download URL passes the filter.

use super::{file_name_from_url, ResolvedAsset};
use crate::error::ResolveError;
use crate::filter::Filter;
use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Deserialize)]
struct GitHubRelease {
    #[serde(default)]
    assets: Vec<GitHubAsset>,
}

#[derive(Debug, Clone, Deserialize)]
struct GitHubAsset {
    #[serde(default)]
    browser_download_url: Option<String>,
}

fn archive_ext() -> &'static Regex {
    static EXT: OnceLock<Regex> = OnceLock::new();
    EXT.get_or_init(|| Regex::new(r"(?i)\.(zip|7z)$").expect("extension regex is valid"))
}

/// Selects an asset from a release document fetched from `url`.
pub fn select_asset(body: &str, url: &str, filter: &Filter) -> Result<ResolvedAsset, ResolveError> {
    let release: GitHubRelease =
        serde_json::from_str(body).map_err(|source| ResolveError::InvalidJson {
            url: url.to_string(),
            source,
        })?;

    let urls: Vec<String> = release
        .assets
        .into_iter()
        .filter_map(|asset| asset.browser_download_url)
        .collect();
    if urls.is_empty() {
        return Err(ResolveError::NoAssets {
            url: url.to_string(),
        });
    }
    tracing::debug!("Release has {} assets", urls.len());

    let chosen = filter
        .find_match(&urls)
        .ok_or_else(|| ResolveError::NoMatch {
            url: url.to_string(),
        })?;
    let download_url = unescape(chosen);
    let version = version_from_url(&download_url);

    Ok(ResolvedAsset {
        url: download_url,
        version,
    })
}

fn unescape(url: &str) -> String {
    url.replace("\\/", "/").replace('\\', "")
}

fn version_from_url(url: &str) -> String {
    let filename = file_name_from_url(url);
    archive_ext().replace(&filename, "").into_owned()
}
