use anyhow::{Context, Result};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use std::path::Path;

/// One-time metrics registration (so series carry descriptions once a recorder is installed).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "listings_fetched_total",
            "Listings returned by the source adapter after normalization and dedup."
        );
        describe_counter!(
            "listings_malformed_total",
            "Provider records dropped for missing id, title or url."
        );
        describe_counter!(
            "listings_duplicate_total",
            "Listings dropped because another location facet already returned them."
        );
        describe_counter!(
            "provider_errors_total",
            "Per-location provider query failures."
        );
        describe_counter!("listings_new_total", "Listings persisted for the first time.");
        describe_counter!("store_errors_total", "Failed store operations inside a run.");
        describe_counter!("digests_sent_total", "Digests delivered successfully.");
        describe_counter!("digest_failures_total", "Digest sends that failed or timed out.");
        describe_counter!(
            "listings_notified_total",
            "Listings marked notified after a confirmed digest."
        );
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn install() -> Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .context("prometheus: install recorder")?;
        ensure_metrics_described();
        Ok(Self { handle })
    }

    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Dump the exposition text for a node-exporter textfile collector.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        // the collector must never see a partial file
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, self.render())
            .with_context(|| format!("writing metrics to {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("renaming metrics file to {}", path.display()))?;
        Ok(())
    }
}
