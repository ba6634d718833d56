// src/lib.rs
// Public library surface for the CLI and integration tests.

pub mod config;
pub mod metrics;
pub mod model;
pub mod notify;
pub mod pipeline;
pub mod source;
pub mod store;
pub mod telemetry;

// ---- Re-exports for stable public API ----
pub use crate::model::{ListFilter, Listing, SearchFacets, StoreStats, StoredListing};
pub use crate::notify::{DynNotifier, Notifier};
pub use crate::pipeline::{BackfillSummary, DigestOutcome, Pipeline, PipelineOptions, RunSummary};
pub use crate::source::types::{DynListingProvider, ListingProvider, SearchQuery};
pub use crate::store::{open_store, DynListingStore, ListingStore, StoreConfig};
