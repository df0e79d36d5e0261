//! File-backed search source for offline runs.
//!
//! The file holds a JSON array of raw leads. A query returns the records of
//! its industry (records without an industry match every query), narrowed
//! to the query's regions when it has any.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{ProviderError, ProviderResult};
use crate::traits::source::SourceAdapter;
use crate::types::lead::Industry;
use crate::types::raw::{RawLead, SourceQuery};

#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    path: PathBuf,
}

impl FileSource {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> ProviderResult<Vec<RawLead>> {
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            let message = format!("{}: {e}", self.path.display());
            match e.kind() {
                IoErrorKind::NotFound | IoErrorKind::PermissionDenied => {
                    ProviderError::permanent(&self.name, message)
                }
                _ => ProviderError::transient(&self.name, message),
            }
        })?;
        serde_json::from_slice(&bytes).map_err(|e| {
            ProviderError::permanent(&self.name, format!("{}: invalid JSON: {e}", self.path.display()))
        })
    }
}

fn in_regions(raw: &RawLead, regions: &[String]) -> bool {
    if regions.is_empty() {
        return true;
    }
    let Some(location) = raw.location.as_deref() else {
        return false;
    };
    let location = location.to_lowercase();
    regions
        .iter()
        .any(|region| location.contains(&region.trim().to_lowercase()))
}

#[async_trait]
impl SourceAdapter for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self, query: &SourceQuery) -> ProviderResult<Vec<RawLead>> {
        let leads = self
            .load()
            .await?
            .into_iter()
            .filter(|raw| raw.industry == query.industry || raw.industry == Industry::Unknown)
            .filter(|raw| in_regions(raw, &query.regions))
            .take(query.limit)
            .collect();
        Ok(leads)
    }
}
