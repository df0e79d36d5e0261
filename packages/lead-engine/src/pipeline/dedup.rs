//! Deduplication of raw search results into unique leads.
//!
//! Raw leads are keyed by canonical company name plus industry. Records that
//! share a key are merged: collections are unioned, and scalar fields come
//! from whichever record is more complete (first-seen wins ties). Output
//! order is first-seen order.

use indexmap::map::Entry;
use indexmap::IndexMap;
use tracing::debug;

use crate::types::lead::{canonical_company_name, Lead, LeadKey, LeadStatus};
use crate::types::raw::RawLead;

/// Merge `raws` into unique leads, each advanced to `Deduped`.
///
/// Records whose company name is blank are dropped.
pub fn deduplicate(raws: impl IntoIterator<Item = RawLead>) -> Vec<Lead> {
    let mut merged: IndexMap<LeadKey, Lead> = IndexMap::new();
    let mut seen = 0usize;

    for raw in raws {
        seen += 1;
        if canonical_company_name(&raw.company).is_empty() {
            debug!("dropping raw lead with blank company name");
            continue;
        }
        let lead = Lead::from_raw(raw);
        match merged.entry(lead.key().clone()) {
            Entry::Occupied(mut existing) => existing.get_mut().absorb(lead),
            Entry::Vacant(slot) => {
                slot.insert(lead);
            }
        }
    }

    let mut leads: Vec<Lead> = merged.into_values().collect();
    for lead in &mut leads {
        lead.advance(LeadStatus::Deduped);
    }
    debug!(raw = seen, unique = leads.len(), "deduplicated");
    leads
}

/// Merge two leads with the same key. Returns `None` when keys differ.
pub fn merge(mut first: Lead, second: Lead) -> Option<Lead> {
    if first.key() != second.key() {
        return None;
    }
    first.absorb(second);
    Some(first)
}
