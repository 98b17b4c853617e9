use async_trait::async_trait;

use crate::domain::{CanonicalPersonRecord, RawPersonRecord};
use crate::error::Result;

/// Boundary to the external persons feed. Batches are addressed by id so a
/// run can be replayed deterministically.
#[async_trait]
pub trait PersonFeedPort: Send + Sync {
    async fn fetch_batch(&self, batch_id: u32, quantity: u32) -> Result<Vec<RawPersonRecord>>;
}

/// Boundary to the canonical record store. The persistence layer is expected
/// to keep `id` unique and index the analytic dimensions; the core relies on
/// that, it does not re-enforce it on every read.
#[async_trait]
pub trait CanonicalStorePort: Send + Sync {
    async fn insert_batch(&self, records: &[CanonicalPersonRecord]) -> Result<()>;
    async fn scan_all(&self) -> Result<Vec<CanonicalPersonRecord>>;
    async fn count(&self) -> Result<usize>;
}
