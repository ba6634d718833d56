// src/store/mod.rs
pub mod dynamo;
pub mod sqlite;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use crate::model::{ListFilter, Listing, StoreStats, StoredListing};

/// Persistence contract shared by every backend.
///
/// The store is the single source of truth for "seen" and "notified"; callers never
/// cache ids across runs and never hold a concrete backend type.
#[async_trait::async_trait]
pub trait ListingStore: Send + Sync {
    /// Point lookup by id.
    async fn exists(&self, id: &str) -> Result<bool>;

    /// Insert if the id is absent. Returns `false` (and changes nothing) when it is
    /// already stored; `first_seen` and `notified` of the existing record are untouched.
    async fn insert_new(&self, listing: &Listing) -> Result<bool>;

    /// Idempotent; unknown ids are a no-op and never create a record.
    async fn mark_notified(&self, id: &str) -> Result<()>;

    async fn stats(&self) -> Result<StoreStats>;

    /// Stored but never successfully notified, oldest `first_seen` first.
    async fn all_unnotified(&self) -> Result<Vec<StoredListing>>;

    /// Newest `first_seen` first.
    async fn list(&self, filter: ListFilter) -> Result<Vec<StoredListing>>;

    fn backend(&self) -> &'static str;
}

pub type DynListingStore = Arc<dyn ListingStore>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreConfig {
    Sqlite { path: PathBuf },
    DynamoDb { table: String, region: String },
}

/// Open the backend selected by configuration.
pub async fn open_store(cfg: &StoreConfig) -> Result<DynListingStore> {
    let store: DynListingStore = match cfg {
        StoreConfig::Sqlite { path } => Arc::new(sqlite::SqliteStore::open(path)?),
        StoreConfig::DynamoDb { table, region } => {
            Arc::new(dynamo::DynamoStore::connect(table, region).await)
        }
    };
    tracing::info!(target: "store", backend = store.backend(), "listing store ready");
    Ok(store)
}
