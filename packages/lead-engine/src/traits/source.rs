//! Source adapter trait.
//!
//! A source adapter is the opaque network (or file) service a search agent
//! queries for raw candidates. Agents compose one or more of them.

use async_trait::async_trait;

use crate::error::ProviderResult;
use crate::types::raw::{RawLead, SourceQuery};

/// Fetch raw candidate leads for one query.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Provider name. Used for rate limiting, caching and error logs.
    fn name(&self) -> &str;

    /// Run one query. Returns at most `query.limit` results.
    async fn fetch(&self, query: &SourceQuery) -> ProviderResult<Vec<RawLead>>;
}
