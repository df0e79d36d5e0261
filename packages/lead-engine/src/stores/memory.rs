//! In-memory lead store for tests and dry runs.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::error::StoreResult;
use crate::traits::store::LeadStore;
use crate::types::lead::Lead;

use super::by_overall_then_id;

/// In-memory storage for ranked leads.
///
/// Data is lost on restart.
#[derive(Default)]
pub struct MemoryStore {
    leads: RwLock<HashMap<String, Lead>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored leads.
    pub fn clear(&self) {
        self.leads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.leads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn put(&self, lead: &Lead) -> StoreResult<()> {
        self.leads
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(lead.id().to_string(), lead.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> StoreResult<Option<Lead>> {
        Ok(self
            .leads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    async fn query_top(&self, limit: usize) -> StoreResult<Vec<Lead>> {
        let mut leads: Vec<Lead> = self
            .leads
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        leads.sort_by(by_overall_then_id);
        leads.truncate(limit);
        Ok(leads)
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.len())
    }
}
