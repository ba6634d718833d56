// src/source/types.rs
use anyhow::Result;
use std::sync::Arc;

/// One provider query: the keyword facet for a single location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub keywords: String,
    pub location: String,
    pub max_days_old: u32,
}

/// A job-search backend. Returns raw provider records; normalization happens in the adapter.
#[async_trait::async_trait]
pub trait ListingProvider: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<serde_json::Value>>;
    fn name(&self) -> &'static str;
}

pub type DynListingProvider = Arc<dyn ListingProvider>;
