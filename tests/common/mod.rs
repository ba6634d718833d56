// tests/common/mod.rs
// Shared mocks for the pipeline integration tests.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use job_tracker::store::sqlite::SqliteStore;
use job_tracker::{ListFilter, Listing, ListingStore, Notifier, StoreStats, StoredListing};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub fn listing(id: &str) -> Listing {
    Listing {
        id: id.to_string(),
        title: format!("Engineer {id}"),
        company: "Acme".into(),
        location: Some("Remote".into()),
        url: format!("https://example.test/jobs/{id}"),
        description: None,
        posted_at: None,
        salary_min: None,
        salary_max: None,
    }
}

/// Adzuna-shaped raw record.
pub fn raw(id: &str) -> Value {
    json!({
        "id": id,
        "title": format!("Engineer {id}"),
        "company": {"display_name": "Acme"},
        "location": {"display_name": "Remote"},
        "redirect_url": format!("https://example.test/jobs/{id}"),
        "created": "2025-11-19T14:51:45Z"
    })
}

pub fn ids(listings: &[Listing]) -> Vec<String> {
    listings.iter().map(|l| l.id.clone()).collect()
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendMode {
    Succeed,
    Fail,
    Hang,
}

/// Records every digest it is handed (by id) and answers per `SendMode`.
pub struct RecordingNotifier {
    mode: Mutex<SendMode>,
    pub digests: Mutex<Vec<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn new(mode: SendMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            digests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_mode(&self, mode: SendMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.digests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_digest(&self, listings: &[Listing]) -> Result<()> {
        self.digests.lock().unwrap().push(ids(listings));
        let mode = *self.mode.lock().unwrap();
        match mode {
            SendMode::Succeed => Ok(()),
            SendMode::Fail => Err(anyhow!("smtp: 535 authentication failed")),
            SendMode::Hang => {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            }
        }
    }

    async fn send_test(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// In-memory SQLite store that counts `mark_notified` calls per id and can be
/// told to fail `exists` / `insert_new` for specific ids.
pub struct InstrumentedStore {
    inner: SqliteStore,
    pub mark_calls: Mutex<HashMap<String, usize>>,
    pub fail_exists: Vec<String>,
    pub fail_insert: Vec<String>,
}

impl InstrumentedStore {
    pub fn new() -> Self {
        Self {
            inner: SqliteStore::open_in_memory().unwrap(),
            mark_calls: Mutex::new(HashMap::new()),
            fail_exists: Vec::new(),
            fail_insert: Vec::new(),
        }
    }

    pub fn mark_count(&self, id: &str) -> usize {
        self.mark_calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }

    pub async fn get(&self, id: &str) -> Option<StoredListing> {
        self.inner
            .list(ListFilter::All)
            .await
            .unwrap()
            .into_iter()
            .find(|s| s.listing.id == id)
    }
}

#[async_trait]
impl ListingStore for InstrumentedStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        if self.fail_exists.iter().any(|x| x == id) {
            return Err(anyhow!("store unreachable"));
        }
        self.inner.exists(id).await
    }

    async fn insert_new(&self, listing: &Listing) -> Result<bool> {
        if self.fail_insert.iter().any(|x| x == &listing.id) {
            return Err(anyhow!("disk I/O error"));
        }
        self.inner.insert_new(listing).await
    }

    async fn mark_notified(&self, id: &str) -> Result<()> {
        *self
            .mark_calls
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default() += 1;
        self.inner.mark_notified(id).await
    }

    async fn stats(&self) -> Result<StoreStats> {
        self.inner.stats().await
    }

    async fn all_unnotified(&self) -> Result<Vec<StoredListing>> {
        self.inner.all_unnotified().await
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<StoredListing>> {
        self.inner.list(filter).await
    }

    fn backend(&self) -> &'static str {
        "instrumented"
    }
}
