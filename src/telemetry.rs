// src/telemetry.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// events use short per-stage targets, so those are listed next to the crate
const DEFAULT_FILTER: &str =
    "job_tracker=info,source=info,store=info,pipeline=info,notify=info,warn";

/// Initialize tracing for the CLI.
///   - `RUST_LOG` overrides the default filter (info for this crate, warn elsewhere)
///   - `LOG_FORMAT=json` switches to one JSON object per line (for CI/cron log shipping)
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };

    if let Err(e) = res {
        tracing::debug!("tracing already initialized: {e}");
    }
}
