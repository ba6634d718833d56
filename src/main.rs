//! job-tracker CLI entrypoint.
//! Loads configuration, opens the selected store, and runs one command to completion.
//! Scheduling (cron, CI schedule) is external; one invocation = one run.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use job_tracker::config::AppConfig;
use job_tracker::metrics::Metrics;
use job_tracker::notify::email::EmailNotifier;
use job_tracker::notify::format::format_money;
use job_tracker::source::adzuna::AdzunaProvider;
use job_tracker::{
    open_store, telemetry, DigestOutcome, DynListingStore, ListFilter, Notifier, Pipeline,
    PipelineOptions, StoredListing,
};

#[derive(Parser)]
#[command(name = "job-tracker")]
#[command(about = "Poll a job-search API and email a digest of newly discovered listings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one fetch → dedup → notify pass
    Run {
        /// Persist new listings but do not send the digest
        #[arg(long)]
        check: bool,
    },

    /// Re-send a digest for listings stored but never notified
    Backfill,

    /// Show store statistics
    Stats,

    /// List stored listings (newest first)
    List {
        /// Only listings already emailed
        #[arg(long, conflicts_with = "unnotified")]
        notified: bool,

        /// Only listings not yet emailed
        #[arg(long)]
        unnotified: bool,

        /// Maximum number of listings to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Send a test email to verify SMTP settings
    TestEmail,
}

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();
    let cli = Cli::parse();

    let metrics = match Metrics::install() {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!("metrics disabled: {e:#}");
            None
        }
    };

    let code = match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("\nerror: {e:#}\n");
            ExitCode::FAILURE
        }
    };

    if let (Some(m), Ok(path)) = (&metrics, std::env::var("METRICS_TEXTFILE")) {
        if let Err(e) = m.write_textfile(&PathBuf::from(path)) {
            tracing::warn!("metrics textfile: {e:#}");
        }
    }
    code
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = AppConfig::from_env().context("configuration error")?;

    let store = open_store(&cfg.store)
        .await
        .context("opening listing store")?;

    match cli.command {
        Commands::Stats => print_stats(&store).await,

        Commands::List {
            notified,
            unnotified,
            limit,
        } => {
            let filter = match (notified, unnotified) {
                (true, _) => ListFilter::Notified,
                (_, true) => ListFilter::Unnotified,
                _ => ListFilter::All,
            };
            let rows = store.list(filter).await?;
            print_listings(&rows, limit);
            Ok(())
        }

        Commands::TestEmail => {
            let notifier = EmailNotifier::new(&cfg.email)?;
            notifier.send_test().await.context(
                "test email failed; check EMAIL_SENDER / EMAIL_PASSWORD (app password) / SMTP_HOST",
            )?;
            println!("Test email sent to {}", cfg.email.recipient);
            Ok(())
        }

        Commands::Run { check } => {
            let pipeline = build_pipeline(&cfg, store, check)?;
            println!("Searching for: {}", cfg.facets.keywords);
            println!("Locations: {}", cfg.facets.locations.join(", "));
            println!("Max age: {} days\n", cfg.facets.max_days_old);

            let s = pipeline.run_once(&cfg.facets).await;

            println!("{}", "=".repeat(60));
            println!("Fetched:   {} unique listing(s)", s.fetched);
            if s.failed_queries > 0 {
                println!("Failed location queries: {}", s.failed_queries);
            }
            println!("New:       {}", s.new);
            println!("Known:     {}", s.known);
            if s.unchecked > 0 || s.persist_failures > 0 {
                println!(
                    "Skipped:   {} unchecked, {} failed to persist",
                    s.unchecked, s.persist_failures
                );
            }
            println!("Digest:    {}", describe(s.digest));
            println!("Notified:  {}", s.notified);
            if let Some(st) = s.store_stats {
                println!(
                    "Store:     {} total, {} notified, {} pending",
                    st.total, st.notified, st.unnotified
                );
            }
            println!("{}", "=".repeat(60));
            Ok(())
        }

        Commands::Backfill => {
            let pipeline = build_pipeline(&cfg, store, false)?;
            let s = pipeline.backfill().await?;
            println!(
                "Backfill: {} pending, digest {}, {} marked notified",
                s.pending,
                describe(s.digest),
                s.notified
            );
            Ok(())
        }
    }
}

fn build_pipeline(cfg: &AppConfig, store: DynListingStore, dry_run: bool) -> Result<Pipeline> {
    let provider = Arc::new(AdzunaProvider::new(cfg.adzuna.clone())?);
    let notifier = Arc::new(EmailNotifier::new(&cfg.email)?);
    Ok(Pipeline::new(provider, store, notifier).with_options(PipelineOptions {
        // transport timeout plus slack for connect + auth
        notify_timeout: cfg.email.timeout * 2,
        dry_run,
    }))
}

fn describe(d: DigestOutcome) -> &'static str {
    match d {
        DigestOutcome::Skipped => "skipped (nothing new)",
        DigestOutcome::DryRun => "not sent (--check)",
        DigestOutcome::Sent => "sent",
        DigestOutcome::Failed => "FAILED (listings kept for backfill)",
    }
}

async fn print_stats(store: &DynListingStore) -> Result<()> {
    let st = store.stats().await?;
    println!("\nDatabase statistics ({})", store.backend());
    println!("{}", "=".repeat(50));
    println!("Total listings tracked: {}", st.total);
    println!("Notified:               {}", st.notified);
    println!("Awaiting notification:  {}", st.unnotified);

    if st.total > 0 {
        let recent = store.list(ListFilter::All).await?;
        println!("\nRecent listings:");
        for r in recent.iter().take(5) {
            println!("  - {} at {}", r.listing.title, r.listing.company);
            println!("    Added: {}", r.first_seen.to_rfc3339());
        }
    }
    println!();
    Ok(())
}

fn print_listings(rows: &[StoredListing], limit: usize) {
    if rows.is_empty() {
        println!("\nNo listings found. Run `job-tracker run` first.\n");
        return;
    }
    println!("\n{} listing(s), showing up to {limit}\n", rows.len());
    for (i, r) in rows.iter().take(limit).enumerate() {
        let l = &r.listing;
        println!("{}. {}", i + 1, l.title);
        println!("   Company:  {}", l.company);
        println!("   Location: {}", l.location.as_deref().unwrap_or("N/A"));
        if let (Some(min), Some(max)) = (l.salary_min, l.salary_max) {
            println!("   Salary:   {} - {}", format_money(min), format_money(max));
        }
        println!(
            "   Status:   {}",
            if r.notified { "emailed" } else { "not emailed yet" }
        );
        println!("   Added:    {}", r.first_seen.to_rfc3339());
        println!("   URL:      {}", l.url);
        println!("   ID:       {}\n", l.id);
    }
}
