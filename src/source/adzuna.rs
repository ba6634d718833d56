use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::source::types::{ListingProvider, SearchQuery};

pub const DEFAULT_BASE_URL: &str = "https://api.adzuna.com/v1/api/jobs";
const RESULTS_PER_PAGE: u32 = 50;

#[derive(Debug, Clone)]
pub struct AdzunaConfig {
    pub app_id: String,
    pub api_key: String,
    pub country: String,
    pub base_url: String,
    pub timeout: Duration,
}

/// Adzuna job-search API. Only the first results page is read per location.
pub struct AdzunaProvider {
    cfg: AdzunaConfig,
    client: Client,
}

impl AdzunaProvider {
    pub fn new(cfg: AdzunaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(cfg.timeout)
            .build()
            .context("building adzuna http client")?;
        Ok(Self { cfg, client })
    }

    fn search_url(&self) -> String {
        format!(
            "{}/{}/search/1",
            self.cfg.base_url.trim_end_matches('/'),
            self.cfg.country
        )
    }
}

/// Pull the `results` array out of an Adzuna search payload.
pub fn parse_results(body: &str) -> Result<Vec<Value>> {
    let payload: Value = serde_json::from_str(body).context("parse adzuna JSON")?;
    match payload.get("results") {
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(_) => Err(anyhow!("adzuna payload: `results` is not an array")),
        None => Err(anyhow!("adzuna payload: missing `results`")),
    }
}

#[async_trait]
impl ListingProvider for AdzunaProvider {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Value>> {
        let max_days_old = query.max_days_old.to_string();
        let per_page = RESULTS_PER_PAGE.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("app_id", self.cfg.app_id.as_str()),
            ("app_key", self.cfg.api_key.as_str()),
            ("what", query.keywords.as_str()),
            ("results_per_page", per_page.as_str()),
            ("content-type", "application/json"),
            ("max_days_old", max_days_old.as_str()),
        ];
        if !query.location.is_empty() {
            params.push(("where", query.location.as_str()));
        }

        let body = self
            .client
            .get(self.search_url())
            .query(&params)
            .send()
            .await
            .context("adzuna get()")?
            .error_for_status()
            .context("adzuna non-2xx")?
            .text()
            .await
            .context("adzuna .text()")?;

        let results = parse_results(&body)?;
        tracing::debug!(
            target: "source",
            location = %query.location,
            results = results.len(),
            "adzuna page fetched"
        );
        Ok(results)
    }

    fn name(&self) -> &'static str {
        "Adzuna"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider(base: &str) -> AdzunaProvider {
        AdzunaProvider::new(AdzunaConfig {
            app_id: "id".into(),
            api_key: "key".into(),
            country: "us".into(),
            base_url: base.into(),
            timeout: Duration::from_secs(1),
        })
        .unwrap()
    }

    #[test]
    fn search_url_joins_base_and_country() {
        assert_eq!(
            provider("https://api.adzuna.com/v1/api/jobs/").search_url(),
            "https://api.adzuna.com/v1/api/jobs/us/search/1"
        );
    }

    #[test]
    fn parse_results_reads_array() {
        let body = r#"{"count": 2, "results": [{"id": "1"}, {"id": "2"}]}"#;
        assert_eq!(parse_results(body).unwrap().len(), 2);
    }

    #[test]
    fn parse_results_rejects_malformed_payloads() {
        assert!(parse_results("not json").is_err());
        assert!(parse_results(r#"{"count": 0}"#).is_err());
        assert!(parse_results(r#"{"results": {"id": 1}}"#).is_err());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_query_error() {
        // port 9 (discard) on loopback refuses connections
        let p = provider("http://127.0.0.1:9");
        let q = SearchQuery {
            keywords: "rust".into(),
            location: "Remote".into(),
            max_days_old: 7,
        };
        assert!(p.search(&q).await.is_err());
    }
}
