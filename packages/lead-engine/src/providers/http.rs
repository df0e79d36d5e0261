//! JSON-over-HTTP provider adapters.
//!
//! Every adapter POSTs a JSON body to its endpoint and decodes a JSON
//! response. Status codes are classified for the retry loop: 408, 429 and
//! 5xx are transient; any other non-success status, or an undecodable body,
//! is permanent.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ConfigError, ProviderError, ProviderResult};
use crate::traits::provider::{CompanyQuery, EnrichmentData, EnrichmentProvider, SignalProvider};
use crate::traits::source::SourceAdapter;
use crate::types::config::HttpEndpoint;
use crate::types::raw::{RawLead, SourceQuery};
use crate::types::signal::Signal;

use super::credentials::ApiKey;

/// Map a non-success status to a provider error.
pub fn classify_status(provider: &str, status: StatusCode, body: &str) -> ProviderError {
    let message = format!("HTTP {}: {}", status.as_u16(), truncate(body, 200));
    if status == StatusCode::TOO_MANY_REQUESTS {
        ProviderError::RateLimited {
            provider: provider.to_string(),
        }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        ProviderError::transient(provider, message)
    } else {
        ProviderError::permanent(provider, message)
    }
}

fn classify_send(provider: &str, err: reqwest::Error, timeout: Duration) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout {
            provider: provider.to_string(),
            elapsed: timeout,
        }
    } else if err.is_builder() {
        ProviderError::permanent(provider, err.to_string())
    } else {
        ProviderError::transient(provider, err.to_string())
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Shared request plumbing for one endpoint.
#[derive(Debug, Clone)]
struct JsonEndpoint {
    name: String,
    url: String,
    api_key: Option<ApiKey>,
    client: reqwest::Client,
    timeout: Duration,
}

impl JsonEndpoint {
    fn from_config(endpoint: &HttpEndpoint, timeout: Duration) -> Result<Self, ConfigError> {
        let api_key = endpoint
            .api_key_env
            .as_deref()
            .map(|var| ApiKey::from_env(var, &endpoint.name))
            .transpose()?;
        Self::new(&endpoint.name, &endpoint.url, api_key, timeout)
    }

    fn new(
        name: &str,
        url: &str,
        api_key: Option<ApiKey>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        url::Url::parse(url).map_err(|e| ConfigError::Parse(format!("{name}: invalid url {url}: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            name: name.to_string(),
            url: url.to_string(),
            api_key,
            client,
            timeout,
        })
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, body: &B) -> ProviderResult<T> {
        let mut request = self.client.post(&self.url).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key.expose());
        }

        let response = request
            .send()
            .await
            .map_err(|e| classify_send(&self.name, e, self.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(&self.name, status, &body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_send(&self.name, e, self.timeout))?;
        debug!(provider = %self.name, bytes = bytes.len(), "provider responded");
        serde_json::from_slice(&bytes)
            .map_err(|e| ProviderError::permanent(&self.name, format!("undecodable response: {e}")))
    }
}

/// A list response, bare or wrapped in an object.
#[derive(Deserialize)]
#[serde(untagged)]
enum Listing<T> {
    Bare(Vec<T>),
    Results { results: Vec<T> },
    Signals { signals: Vec<T> },
}

impl<T> Listing<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            Listing::Bare(items) | Listing::Results { results: items } | Listing::Signals { signals: items } => items,
        }
    }
}

/// Search source backed by an HTTP endpoint. Receives a [`SourceQuery`].
#[derive(Debug, Clone)]
pub struct HttpSource {
    endpoint: JsonEndpoint,
}

impl HttpSource {
    pub fn new(
        name: &str,
        url: &str,
        api_key: Option<ApiKey>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: JsonEndpoint::new(name, url, api_key, timeout)?,
        })
    }

    pub fn from_config(endpoint: &HttpEndpoint, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: JsonEndpoint::from_config(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl SourceAdapter for HttpSource {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn fetch(&self, query: &SourceQuery) -> ProviderResult<Vec<RawLead>> {
        let listing: Listing<RawLead> = self.endpoint.post(query).await?;
        let mut leads = listing.into_vec();
        leads.truncate(query.limit);
        Ok(leads)
    }
}

/// Enrichment provider backed by an HTTP endpoint. Receives a [`CompanyQuery`].
#[derive(Debug, Clone)]
pub struct HttpEnrichmentProvider {
    endpoint: JsonEndpoint,
}

impl HttpEnrichmentProvider {
    pub fn from_config(endpoint: &HttpEndpoint, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: JsonEndpoint::from_config(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl EnrichmentProvider for HttpEnrichmentProvider {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn lookup(&self, query: &CompanyQuery) -> ProviderResult<EnrichmentData> {
        self.endpoint.post(query).await
    }
}

/// Signal provider backed by an HTTP endpoint. Receives a [`CompanyQuery`].
#[derive(Debug, Clone)]
pub struct HttpSignalProvider {
    endpoint: JsonEndpoint,
}

impl HttpSignalProvider {
    pub fn from_config(endpoint: &HttpEndpoint, timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: JsonEndpoint::from_config(endpoint, timeout)?,
        })
    }
}

#[async_trait]
impl SignalProvider for HttpSignalProvider {
    fn name(&self) -> &str {
        &self.endpoint.name
    }

    async fn detect(&self, query: &CompanyQuery) -> ProviderResult<Vec<Signal>> {
        let listing: Listing<Signal> = self.endpoint.post(query).await?;
        Ok(listing.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(classify_status("fdic", StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status("fdic", StatusCode::REQUEST_TIMEOUT, "").is_transient());
        assert!(matches!(
            classify_status("fdic", StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::RateLimited { .. }
        ));

        let err = classify_status("fdic", StatusCode::NOT_FOUND, "no such company");
        assert!(!err.is_transient());
        assert!(err.to_string().contains("404"));
    }

    #[test]
    fn test_listing_shapes() {
        let bare: Listing<RawLead> =
            serde_json::from_str(r#"[{"company":"Acme Bank","industry":"banking"}]"#).unwrap();
        assert_eq!(bare.into_vec().len(), 1);

        let wrapped: Listing<RawLead> =
            serde_json::from_str(r#"{"results":[{"company":"Acme Bank"},{"company":"Beta Bank"}]}"#)
                .unwrap();
        assert_eq!(wrapped.into_vec().len(), 2);
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        let err = HttpSource::new("bad", "not a url", None, Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
