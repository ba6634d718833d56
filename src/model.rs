// src/model.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single job posting, canonicalized from provider data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub id: String, // provider-assigned, unique across all time
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub url: String,
    pub description: Option<String>,
    pub posted_at: Option<DateTime<Utc>>,
    // Passed through as the provider sent them; min <= max is not enforced.
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
}

/// A listing as persisted, with the store-owned discovery/notification state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredListing {
    #[serde(flatten)]
    pub listing: Listing,
    pub first_seen: DateTime<Utc>,
    pub notified: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreStats {
    pub total: u64,
    pub notified: u64,
    pub unnotified: u64,
}

impl StoreStats {
    pub fn from_counts(total: u64, notified: u64) -> Self {
        Self {
            total,
            notified,
            unnotified: total.saturating_sub(notified),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ListFilter {
    #[default]
    All,
    Notified,
    Unnotified,
}

/// Search parameterization for one fetch call: one keyword string across several locations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchFacets {
    pub keywords: String,
    pub locations: Vec<String>,
    pub max_days_old: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_derive_unnotified() {
        let s = StoreStats::from_counts(5, 2);
        assert_eq!(s.unnotified, 3);
        // never underflows on inconsistent scan counts
        assert_eq!(StoreStats::from_counts(1, 4).unnotified, 0);
    }
}
