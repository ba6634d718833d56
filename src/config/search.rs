// src/config/search.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::SearchFacets;

pub const ENV_PATH: &str = "SEARCH_CONFIG_PATH";

/// Search facets as written in a config file. Every field is optional; missing
/// ones fall back to the environment.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct SearchFile {
    pub keywords: Option<String>,
    pub locations: Option<Vec<String>>,
    pub max_days_old: Option<u32>,
}

/// Load a facets file from an explicit path. Supports TOML or JSON formats.
pub fn load_search_from(path: &Path) -> Result<SearchFile> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading search config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_search(&content, ext.as_str())
        .with_context(|| format!("parsing search config {}", path.display()))
}

/// Lookup order:
/// 1) $SEARCH_CONFIG_PATH (must exist)
/// 2) config/search.toml
/// 3) config/search.json
/// 4) none: facets come from the environment alone
pub fn load_search_default() -> Result<Option<SearchFile>> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_search_from(&pb).map(Some);
        }
        bail!("{ENV_PATH} points to non-existent path {}", pb.display());
    }
    for candidate in ["config/search.toml", "config/search.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_search_from(&p).map(Some);
        }
    }
    Ok(None)
}

fn parse_search(s: &str, hint_ext: &str) -> Result<SearchFile> {
    match hint_ext {
        "toml" => toml::from_str(s).map_err(Into::into),
        "json" => serde_json::from_str(s).map_err(Into::into),
        _ => toml::from_str(s)
            .or_else(|_| serde_json::from_str(s))
            .map_err(|_| anyhow!("unsupported search config format")),
    }
}

/// Trim, drop empties and duplicates (first occurrence wins, order kept).
pub fn clean_locations<I, S>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for it in items {
        let t = it.as_ref().trim();
        if !t.is_empty() && !out.iter().any(|x| x.eq_ignore_ascii_case(t)) {
            out.push(t.to_string());
        }
    }
    out
}

pub fn validate_facets(
    keywords: &str,
    locations: Vec<String>,
    max_days_old: u32,
) -> Result<SearchFacets> {
    let keywords = keywords.trim();
    if keywords.is_empty() {
        bail!("search keywords must not be empty");
    }
    let locations = clean_locations(locations);
    if locations.is_empty() {
        bail!("at least one search location is required");
    }
    if max_days_old == 0 {
        bail!("max_days_old must be at least 1");
    }
    Ok(SearchFacets {
        keywords: keywords.to_string(),
        locations,
        max_days_old,
    })
}
