pub mod email;
pub mod format;

use anyhow::Result;
use std::sync::Arc;

use crate::model::Listing;

/// Delivery channel for digests. `Ok(())` means the whole digest was accepted.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send_digest(&self, listings: &[Listing]) -> Result<()>;

    /// Setup check: a short message that proves credentials and routing work.
    async fn send_test(&self) -> Result<()>;

    fn name(&self) -> &'static str;
}

pub type DynNotifier = Arc<dyn Notifier>;
