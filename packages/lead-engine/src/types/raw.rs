//! Search inputs and raw (pre-dedup) results.

use serde::{Deserialize, Deserializer, Serialize};

use crate::types::lead::{CompanyIds, Contact, Industry};
use crate::types::signal::Signal;

fn industry_from_str<'de, D>(deserializer: D) -> Result<Industry, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw
        .as_deref()
        .map(|s| s.parse().unwrap_or(Industry::Unknown))
        .unwrap_or_default())
}

/// A candidate as returned by a source adapter, before deduplication.
///
/// Only `company` is required on the wire; `{"company":"ABC Bank Inc",
/// "industry":"banking"}` is a complete raw lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawLead {
    pub company: String,
    #[serde(default, deserialize_with = "industry_from_str")]
    pub industry: Industry,
    #[serde(default)]
    pub website: Option<String>,
    #[serde(default)]
    pub employee_count: Option<u32>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub revenue: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub ids: CompanyIds,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub tech_stack: Vec<String>,
    #[serde(default)]
    pub signals: Vec<Signal>,
    /// Name of the agent or source that produced this record.
    #[serde(default)]
    pub source: Option<String>,
}

impl RawLead {
    pub fn new(company: impl Into<String>, industry: Industry) -> Self {
        Self {
            company: company.into(),
            industry,
            ..Default::default()
        }
    }

    pub fn with_employees(mut self, count: u32) -> Self {
        self.employee_count = Some(count);
        self
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = Some(website.into());
        self
    }

    pub fn with_signal(mut self, signal: Signal) -> Self {
        self.signals.push(signal);
        self
    }

    pub fn with_contact(mut self, contact: Contact) -> Self {
        self.contacts.push(contact);
        self
    }

    pub fn with_tech(mut self, tag: impl Into<String>) -> Self {
        self.tech_stack.push(tag.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// What the caller is looking for. Shared, unchanged, by every search agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub regions: Vec<String>,
    /// Overrides the ICP minimum employee count for this run.
    #[serde(default)]
    pub min_employees: Option<u32>,
    /// Lowers the per-agent result cap for this run.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl SearchCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.regions.push(region.into());
        self
    }

    pub fn with_min_employees(mut self, min: u32) -> Self {
        self.min_employees = Some(min);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One query a search agent sends to one source adapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceQuery {
    pub industry: Industry,
    pub text: String,
    #[serde(default)]
    pub regions: Vec<String>,
    pub limit: usize,
}

impl SourceQuery {
    pub fn new(industry: Industry, text: impl Into<String>, limit: usize) -> Self {
        Self {
            industry,
            text: text.into(),
            regions: Vec::new(),
            limit,
        }
    }

    pub fn with_regions(mut self, regions: Vec<String>) -> Self {
        self.regions = regions;
        self
    }

    /// Normalized form used as the response-cache key.
    pub fn cache_key(&self) -> String {
        let mut regions: Vec<String> = self.regions.iter().map(|r| normalize_query(r)).collect();
        regions.sort();
        regions.dedup();
        format!(
            "{}|{}|{}|{}",
            self.industry,
            normalize_query(&self.text),
            regions.join(","),
            self.limit
        )
    }
}

/// Lower-case and whitespace-collapse a free-text query.
pub fn normalize_query(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}
