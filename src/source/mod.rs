// src/source/mod.rs
pub mod adzuna;
pub mod fixture;
pub mod types;

use crate::metrics::ensure_metrics_described;
use crate::model::{Listing, SearchFacets};
use crate::source::types::{ListingProvider, SearchQuery};
use chrono::{DateTime, NaiveDateTime, Utc};
use metrics::counter;
use serde_json::Value;
use std::collections::HashSet;

const UNKNOWN_COMPANY: &str = "Unknown";

/// Result of one fetch call across all location facets.
#[derive(Debug, Clone, Default)]
pub struct FetchOutcome {
    pub listings: Vec<Listing>,
    pub queried: usize,
    pub failed_queries: usize,
    pub malformed: usize,
    pub duplicates: usize,
}

/// Normalize text: decode entities, strip tags, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

fn text_field(v: &Value) -> Option<String> {
    let s = normalize_text(v.as_str()?);
    (!s.is_empty()).then_some(s)
}

/// Ids arrive as strings from some endpoints and numbers from others.
fn id_field(v: &Value) -> Option<String> {
    let id = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!id.is_empty()).then_some(id)
}

/// `{"display_name": "..."}` objects (Adzuna) or plain strings.
fn display_name(v: &Value) -> Option<String> {
    match v {
        Value::Object(map) => map.get("display_name").and_then(text_field),
        other => text_field(other),
    }
}

fn number_field(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn parse_posted_at(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // some feeds omit the offset; those timestamps are UTC
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Map one raw provider record to a `Listing`.
/// Returns `None` when `id`, `title` or the application url is missing.
pub fn normalize_record(raw: &Value) -> Option<Listing> {
    let id = raw.get("id").and_then(id_field)?;
    let title = raw.get("title").and_then(text_field)?;
    let url = raw
        .get("redirect_url")
        .or_else(|| raw.get("url"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|u| !u.is_empty())?
        .to_string();

    let company = raw
        .get("company")
        .and_then(display_name)
        .unwrap_or_else(|| UNKNOWN_COMPANY.to_string());

    Some(Listing {
        id,
        title,
        company,
        location: raw.get("location").and_then(display_name),
        url,
        description: raw.get("description").and_then(text_field),
        posted_at: raw
            .get("created")
            .or_else(|| raw.get("posted_at"))
            .and_then(Value::as_str)
            .and_then(parse_posted_at),
        salary_min: raw.get("salary_min").and_then(number_field),
        salary_max: raw.get("salary_max").and_then(number_field),
    })
}

/// Query the provider once per location, normalize, and dedup by id.
///
/// Never fails: a location whose query errors is logged and skipped, so a total
/// outage yields an empty outcome. Output order is location order, then provider order.
pub async fn fetch_listings(provider: &dyn ListingProvider, facets: &SearchFacets) -> FetchOutcome {
    ensure_metrics_described();

    let mut out = FetchOutcome::default();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for location in &facets.locations {
        let query = SearchQuery {
            keywords: facets.keywords.clone(),
            location: location.clone(),
            max_days_old: facets.max_days_old,
        };
        out.queried += 1;

        let raw = match provider.search(&query).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(
                    target: "source",
                    provider = provider.name(),
                    location = %location,
                    "provider query failed: {e:#}"
                );
                counter!("provider_errors_total").increment(1);
                out.failed_queries += 1;
                continue;
            }
        };

        let mut kept = 0usize;
        for record in &raw {
            let Some(listing) = normalize_record(record) else {
                out.malformed += 1;
                continue;
            };
            if !seen_ids.insert(listing.id.clone()) {
                out.duplicates += 1;
                continue;
            }
            kept += 1;
            out.listings.push(listing);
        }

        tracing::debug!(
            target: "source",
            location = %location,
            raw = raw.len(),
            kept,
            "location searched"
        );
    }

    counter!("listings_fetched_total").increment(out.listings.len() as u64);
    counter!("listings_malformed_total").increment(out.malformed as u64);
    counter!("listings_duplicate_total").increment(out.duplicates as u64);

    tracing::info!(
        target: "source",
        provider = provider.name(),
        unique = out.listings.len(),
        failed_queries = out.failed_queries,
        malformed = out.malformed,
        duplicates = out.duplicates,
        "fetch complete"
    );

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_text_strips_tags_and_collapses_ws() {
        let s = "  <strong>Software</strong>&nbsp;&nbsp;Engineer\n Intern ";
        assert_eq!(normalize_text(s), "Software Engineer Intern");
    }

    #[test]
    fn adzuna_shaped_record_normalizes() {
        let raw = json!({
            "id": 4_987_123_001u64,
            "title": "<strong>Software</strong> Engineer Intern",
            "company": {"display_name": "Acme Corp"},
            "location": {"display_name": "Austin, TX"},
            "redirect_url": "https://example.test/apply/1",
            "description": "Build &amp; ship things",
            "created": "2025-11-19T14:51:45Z",
            "salary_min": 40000,
            "salary_max": "52000.5"
        });
        let l = normalize_record(&raw).expect("valid record");
        assert_eq!(l.id, "4987123001");
        assert_eq!(l.title, "Software Engineer Intern");
        assert_eq!(l.company, "Acme Corp");
        assert_eq!(l.location.as_deref(), Some("Austin, TX"));
        assert_eq!(l.description.as_deref(), Some("Build & ship things"));
        assert_eq!(
            l.posted_at.map(|t| t.to_rfc3339()).as_deref(),
            Some("2025-11-19T14:51:45+00:00")
        );
        assert_eq!(l.salary_min, Some(40000.0));
        assert_eq!(l.salary_max, Some(52000.5));
    }

    #[test]
    fn missing_required_fields_drop_the_record() {
        let base = json!({"id": "J1", "title": "Dev", "redirect_url": "https://x.test/1"});
        assert!(normalize_record(&base).is_some());

        for key in ["id", "title", "redirect_url"] {
            let mut r = base.clone();
            r.as_object_mut().unwrap().remove(key);
            assert!(normalize_record(&r).is_none(), "missing {key} must drop");
        }

        let blank_title =
            json!({"id": "J1", "title": "  <b></b> ", "redirect_url": "https://x.test/1"});
        assert!(normalize_record(&blank_title).is_none());
        let null_id = json!({"id": null, "title": "Dev", "redirect_url": "https://x.test/1"});
        assert!(normalize_record(&null_id).is_none());
    }

    #[test]
    fn missing_company_becomes_unknown() {
        let r = json!({"id": "J1", "title": "Dev", "url": "https://x.test/1"});
        let l = normalize_record(&r).unwrap();
        assert_eq!(l.company, UNKNOWN_COMPANY);
        assert!(l.location.is_none());
        assert!(l.posted_at.is_none());
    }

    #[test]
    fn inverted_salary_passes_through() {
        let r = json!({
            "id": "J9", "title": "Dev", "redirect_url": "https://x.test/9",
            "salary_min": 90000, "salary_max": 50000
        });
        let l = normalize_record(&r).unwrap();
        assert_eq!(l.salary_min, Some(90000.0));
        assert_eq!(l.salary_max, Some(50000.0));
    }

    #[test]
    fn posted_at_accepts_offsetless_timestamps() {
        assert!(parse_posted_at("2025-11-19T14:51:45").is_some());
        assert!(parse_posted_at("2025-11-19T14:51:45+02:00").is_some());
        assert!(parse_posted_at("yesterday").is_none());
    }
}
