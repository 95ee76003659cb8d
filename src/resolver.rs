//! Two-stage media resolution
//!
//! Stage 1 turns free text into a [`MediaReference`]; stage 2 turns that reference into a
//! [`StreamLocation`]. The HTTP implementation queries the same search endpoint twice: the
//! second time with the stage-1 item URL as the search term. Upstream only returns a
//! download URL for that second form.
//!
//! Every field access on the upstream JSON is fallible. Nothing is defaulted, and each call
//! is attempted exactly once.

use crate::config::ResolverConfig;
use crate::error::{Error, NetworkError, ResolutionError, Result};
use crate::types::{MediaReference, Query, StreamLocation};
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Query -> reference -> stream location
#[async_trait]
pub trait MediaResolver: Send + Sync {
    /// Stage 1: find the first item matching `query`
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::NotFound`] if the result list is absent or empty
    /// - [`ResolutionError::Malformed`] if the first result lacks a required field
    /// - [`Error::Network`] on transport failure, timeout, non-2xx status or unparsable body
    async fn resolve(&self, query: &Query) -> Result<MediaReference>;

    /// Stage 2: find where the bytes for `reference` can be fetched
    ///
    /// # Errors
    ///
    /// - [`ResolutionError::NoStream`] if the response has no stream location
    /// - [`ResolutionError::Malformed`] if the location is not an absolute http(s) URL
    /// - [`Error::Network`] as for [`resolve`](Self::resolve)
    async fn locate(&self, reference: &MediaReference) -> Result<StreamLocation>;
}

/// [`MediaResolver`] backed by the upstream search API
pub struct HttpResolver {
    /// HTTP client with the per-request bound applied
    http_client: reqwest::Client,

    /// Endpoint, field names and bounds
    config: ResolverConfig,
}

impl HttpResolver {
    /// Create a resolver
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(config: ResolverConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {e}"),
                key: Some("resolver".to_string()),
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    /// One GET against the search endpoint, returning the parsed JSON body
    async fn lookup(&self, term: &str) -> Result<Value> {
        let url = self.config.endpoint.as_str();
        let bound = self.config.request_timeout;
        let q = format!("{}{}", self.config.query_prefix, term);

        debug!(%url, term, "resolver lookup");

        let response = self
            .http_client
            .get(url)
            .query(&[(self.config.query_param.as_str(), q.as_str())])
            .send()
            .await
            .map_err(|e| NetworkError::from_reqwest(url, bound, e))?;

        // Check HTTP status before trying to parse the response body
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
            .into());
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| NetworkError::from_reqwest(url, bound, e))?;

        serde_json::from_slice(&body).map_err(|e| {
            NetworkError::Body {
                url: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

#[async_trait]
impl MediaResolver for HttpResolver {
    async fn resolve(&self, query: &Query) -> Result<MediaReference> {
        let body = self.lookup(query.as_str()).await?;
        parse_reference(&body, &self.config.results_field, query.as_str())
    }

    async fn locate(&self, reference: &MediaReference) -> Result<StreamLocation> {
        let body = self.lookup(&reference.canonical_key).await?;
        parse_stream_location(&body, &self.config.stream_field)
    }
}

/// Extract the first result of `results_field` as a reference
fn parse_reference(body: &Value, results_field: &str, query: &str) -> Result<MediaReference> {
    let first = body
        .get(results_field)
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .ok_or_else(|| ResolutionError::NotFound {
            query: query.to_string(),
        })?;

    Ok(MediaReference {
        title: required_str(first, "title")?,
        canonical_key: required_str(first, "url")?,
        duration: required_str(first, "duration")?,
    })
}

/// Extract the stream URL from a stage-2 response
fn parse_stream_location(body: &Value, stream_field: &str) -> Result<StreamLocation> {
    let raw = match body.get(stream_field) {
        None | Some(Value::Null) => return Err(ResolutionError::NoStream.into()),
        Some(v) => v.as_str().map(str::trim).unwrap_or_default(),
    };
    if raw.is_empty() {
        return Err(ResolutionError::NoStream.into());
    }

    StreamLocation::parse(raw).ok_or_else(|| {
        ResolutionError::Malformed {
            field: stream_field.to_string(),
        }
        .into()
    })
}

fn required_str(item: &Value, field: &str) -> Result<String> {
    item.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| {
            ResolutionError::Malformed {
                field: field.to_string(),
            }
            .into()
        })
}
