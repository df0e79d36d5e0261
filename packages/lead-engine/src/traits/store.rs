//! Persistence gateway trait.
//!
//! The core only ever calls [`LeadStore::put`], once per finalized lead at the
//! end of a run. The read side serves the CLI and downstream consumers.

use async_trait::async_trait;

use crate::error::StoreResult;
use crate::export::{self, ExportFormat};
use crate::types::lead::Lead;

/// Key/value and range-query store for ranked leads.
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Insert or replace a lead by id.
    async fn put(&self, lead: &Lead) -> StoreResult<()>;

    /// Get a lead by id (its lead key).
    async fn get(&self, id: &str) -> StoreResult<Option<Lead>>;

    /// Highest-scoring leads first, ties by id.
    async fn query_top(&self, limit: usize) -> StoreResult<Vec<Lead>>;

    /// Number of stored leads.
    async fn count(&self) -> StoreResult<usize>;

    /// Render every stored lead, best first.
    async fn export(&self, format: ExportFormat) -> StoreResult<Vec<u8>> {
        let leads = self.query_top(usize::MAX).await?;
        export::render(&leads, format)
    }
}
