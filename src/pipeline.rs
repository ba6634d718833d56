// src/pipeline.rs
//! One ingestion pass: fetch → partition → persist → notify → confirm.
//!
//! Every stage absorbs its own failures so a run always ends with a `RunSummary`.
//! The store decides what is new; nothing here remembers ids between runs.

use anyhow::{Context, Result};
use metrics::{counter, gauge};
use std::time::Duration;

use crate::metrics::ensure_metrics_described;
use crate::model::{Listing, SearchFacets, StoreStats};
use crate::notify::DynNotifier;
use crate::source::fetch_listings;
use crate::source::types::DynListingProvider;
use crate::store::{DynListingStore, ListingStore};

#[derive(Debug, Clone, Copy)]
pub struct PipelineOptions {
    /// Upper bound for one digest send; exceeding it counts as a failed send.
    pub notify_timeout: Duration,
    /// Persist discoveries but never send (or confirm) a digest.
    pub dry_run: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            notify_timeout: Duration::from_secs(60),
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestOutcome {
    /// Nothing new; no digest attempted.
    Skipped,
    DryRun,
    Sent,
    Failed,
}

/// Candidates split by a fresh existence query.
#[derive(Debug, Clone, Default)]
pub struct Partition {
    pub new: Vec<Listing>,
    pub known: Vec<Listing>,
    /// Existence check errored; left for the next run to classify.
    pub unchecked: Vec<Listing>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub fetched: usize,
    pub failed_queries: usize,
    pub malformed: usize,
    pub new: usize,
    pub known: usize,
    pub unchecked: usize,
    pub persisted: usize,
    pub persist_failures: usize,
    pub notified: usize,
    pub digest: DigestOutcome,
    pub store_stats: Option<StoreStats>,
}

#[derive(Debug, Clone)]
pub struct BackfillSummary {
    pub pending: usize,
    pub notified: usize,
    pub digest: DigestOutcome,
}

/// Classify each candidate, in order, as new/known via `exists`.
pub async fn partition(store: &dyn ListingStore, candidates: Vec<Listing>) -> Partition {
    let mut out = Partition::default();
    for listing in candidates {
        match store.exists(&listing.id).await {
            Ok(false) => out.new.push(listing),
            Ok(true) => out.known.push(listing),
            Err(e) => {
                tracing::warn!(
                    target: "pipeline",
                    id = %listing.id,
                    "existence check failed: {e:#}"
                );
                counter!("store_errors_total").increment(1);
                out.unchecked.push(listing);
            }
        }
    }
    out
}

pub struct Pipeline {
    provider: DynListingProvider,
    store: DynListingStore,
    notifier: DynNotifier,
    options: PipelineOptions,
}

impl Pipeline {
    pub fn new(
        provider: DynListingProvider,
        store: DynListingStore,
        notifier: DynNotifier,
    ) -> Self {
        Self {
            provider,
            store,
            notifier,
            options: PipelineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one full pass. Infallible by contract: failures are logged and counted.
    pub async fn run_once(&self, facets: &SearchFacets) -> RunSummary {
        ensure_metrics_described();

        // 1) fetch
        let fetched = fetch_listings(self.provider.as_ref(), facets).await;

        // 2) partition
        let fetched_count = fetched.listings.len();
        let part = partition(self.store.as_ref(), fetched.listings).await;

        // 3) persist, unconditionally and before any send
        let mut digest: Vec<Listing> = Vec::with_capacity(part.new.len());
        let mut persist_failures = 0usize;
        for listing in &part.new {
            match self.store.insert_new(listing).await {
                Ok(true) => {
                    tracing::info!(
                        target: "pipeline",
                        id = %listing.id,
                        "+ {} at {}",
                        listing.title,
                        listing.company
                    );
                    digest.push(listing.clone());
                }
                Ok(false) => {
                    // appeared between exists() and insert; another writer owns its digest
                    tracing::warn!(
                        target: "pipeline",
                        id = %listing.id,
                        "already stored at insert time"
                    );
                }
                Err(e) => {
                    tracing::warn!(target: "pipeline", id = %listing.id, "persist failed: {e:#}");
                    counter!("store_errors_total").increment(1);
                    persist_failures += 1;
                }
            }
        }
        counter!("listings_new_total").increment(digest.len() as u64);

        // 4) notify + 5) confirm
        let (outcome, notified) = self.notify_and_confirm(&digest).await;

        let store_stats = match self.store.stats().await {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(target: "pipeline", "stats unavailable: {e:#}");
                None
            }
        };

        gauge!("pipeline_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

        let summary = RunSummary {
            fetched: fetched_count,
            failed_queries: fetched.failed_queries,
            malformed: fetched.malformed,
            new: part.new.len(),
            known: part.known.len(),
            unchecked: part.unchecked.len(),
            persisted: digest.len(),
            persist_failures,
            notified,
            digest: outcome,
            store_stats,
        };

        tracing::info!(
            target: "pipeline",
            fetched = summary.fetched,
            new = summary.new,
            known = summary.known,
            unchecked = summary.unchecked,
            persisted = summary.persisted,
            notified = summary.notified,
            digest = ?summary.digest,
            "run complete"
        );
        summary
    }

    /// Re-send one digest for everything stored but never confirmed.
    /// Operator-triggered; store read errors are returned.
    pub async fn backfill(&self) -> Result<BackfillSummary> {
        ensure_metrics_described();

        let pending: Vec<Listing> = self
            .store
            .all_unnotified()
            .await
            .context("loading unnotified listings")?
            .into_iter()
            .map(|s| s.listing)
            .collect();

        let (digest, notified) = self.notify_and_confirm(&pending).await;
        tracing::info!(
            target: "pipeline",
            pending = pending.len(),
            notified,
            digest = ?digest,
            "backfill complete"
        );
        Ok(BackfillSummary {
            pending: pending.len(),
            notified,
            digest,
        })
    }

    /// All-or-nothing: marks every listing only after the whole digest was accepted.
    async fn notify_and_confirm(&self, digest: &[Listing]) -> (DigestOutcome, usize) {
        if digest.is_empty() {
            tracing::info!(target: "pipeline", "no new listings; digest skipped");
            return (DigestOutcome::Skipped, 0);
        }

        if self.options.dry_run {
            for l in digest {
                tracing::info!(
                    target: "pipeline",
                    id = %l.id,
                    url = %l.url,
                    "check mode: {} at {}",
                    l.title,
                    l.company
                );
            }
            return (DigestOutcome::DryRun, 0);
        }

        let sent = tokio::time::timeout(
            self.options.notify_timeout,
            self.notifier.send_digest(digest),
        )
        .await;

        match sent {
            Ok(Ok(())) => {
                counter!("digests_sent_total").increment(1);
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    target: "pipeline",
                    notifier = self.notifier.name(),
                    "digest send failed: {e:#}"
                );
                counter!("digest_failures_total").increment(1);
                return (DigestOutcome::Failed, 0);
            }
            Err(_) => {
                tracing::warn!(
                    target: "pipeline",
                    notifier = self.notifier.name(),
                    timeout_secs = self.options.notify_timeout.as_secs(),
                    "digest send timed out"
                );
                counter!("digest_failures_total").increment(1);
                return (DigestOutcome::Failed, 0);
            }
        }

        let mut marked = 0usize;
        for l in digest {
            match self.store.mark_notified(&l.id).await {
                Ok(()) => marked += 1,
                Err(e) => {
                    // stays unnotified; a backfill may re-send it
                    tracing::warn!(target: "pipeline", id = %l.id, "mark_notified failed: {e:#}");
                    counter!("store_errors_total").increment(1);
                }
            }
        }
        counter!("listings_notified_total").increment(marked as u64);
        (DigestOutcome::Sent, marked)
    }
}
