use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::source::adzuna::parse_results;
use crate::source::types::{ListingProvider, SearchQuery};

/// Serves canned per-location payloads. Locations without a payload fail like an outage.
pub struct StaticProvider {
    pages: HashMap<String, Vec<Value>>,
    failing: Vec<String>,
    queries: Mutex<Vec<SearchQuery>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            failing: Vec::new(),
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn with_records(mut self, location: &str, records: Vec<Value>) -> Self {
        self.pages.insert(location.to_string(), records);
        self
    }

    /// Register an Adzuna-style JSON body (`{"results": [...]}`) for a location.
    pub fn with_fixture_str(self, location: &str, body: &str) -> Result<Self> {
        let records = parse_results(body)?;
        Ok(self.with_records(location, records))
    }

    pub fn with_failure(mut self, location: &str) -> Self {
        self.failing.push(location.to_string());
        self
    }

    /// Queries received so far, in call order.
    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries
            .lock()
            .map(|q| q.clone())
            .unwrap_or_default()
    }
}

impl Default for StaticProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ListingProvider for StaticProvider {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<Value>> {
        if let Ok(mut q) = self.queries.lock() {
            q.push(query.clone());
        }
        if self.failing.iter().any(|l| l == &query.location) {
            return Err(anyhow!("fixture outage for {}", query.location));
        }
        self.pages
            .get(&query.location)
            .cloned()
            .ok_or_else(|| anyhow!("no fixture for location {}", query.location))
    }

    fn name(&self) -> &'static str {
        "Static"
    }
}
