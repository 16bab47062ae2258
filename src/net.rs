//! Network collaborator used by the worker to reach the origin.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::header::{CACHE_CONTROL, PRAGMA};
use std::time::Duration;
use thiserror::Error;

use crate::http::{CacheMode, Headers, Method, Request, Response};

/// Failure to obtain any response from the network.
///
/// A response with a non-2xx status is not an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  /// The request was aborted after its deadline.
  #[error("request to {url} timed out after {after:?}")]
  Timeout { url: String, after: Duration },

  /// Connection refused, DNS failure, reset, etc.
  #[error("request to {url} failed: {reason}")]
  Network { url: String, reason: String },
}

/// Per-request network options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchOptions {
  pub timeout: Option<Duration>,
  pub cache: CacheMode,
}

impl FetchOptions {
  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  pub fn no_cache(mut self) -> Self {
    self.cache = CacheMode::NoCache;
    self
  }
}

/// Issues requests to the network.
#[async_trait]
pub trait Fetcher: Send + Sync {
  async fn fetch(&self, request: &Request, options: FetchOptions) -> Result<Response, FetchError>;
}

/// Fetcher backed by a shared reqwest client.
#[derive(Clone)]
pub struct ReqwestFetcher {
  client: reqwest::Client,
}

impl ReqwestFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("duka-worker/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { client })
  }

  async fn send(&self, request: &Request, cache: CacheMode) -> reqwest::Result<Response> {
    let mut builder = self.client.request(to_reqwest_method(request.method), request.url.clone());
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    if cache == CacheMode::NoCache {
      builder = builder.header(CACHE_CONTROL, "no-cache").header(PRAGMA, "no-cache");
    }

    let resp = builder.send().await?;
    let status = resp.status();
    let headers: Headers = resp
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let final_url = resp.url().to_string();
    let body = resp.bytes().await?.to_vec();

    Ok(Response {
      status: status.as_u16(),
      status_text: status.canonical_reason().unwrap_or("").to_string(),
      headers,
      body,
      url: Some(final_url),
    })
  }
}

#[async_trait]
impl Fetcher for ReqwestFetcher {
  async fn fetch(&self, request: &Request, options: FetchOptions) -> Result<Response, FetchError> {
    let url = request.url.to_string();
    let result = match options.timeout {
      // Dropping the in-flight future aborts the request
      Some(after) => tokio::time::timeout(after, self.send(request, options.cache))
        .await
        .map_err(|_| FetchError::Timeout {
          url: url.clone(),
          after,
        })?,
      None => self.send(request, options.cache).await,
    };

    result.map_err(|e| FetchError::Network {
      url,
      reason: e.to_string(),
    })
  }
}

fn to_reqwest_method(method: Method) -> reqwest::Method {
  match method {
    Method::Get => reqwest::Method::GET,
    Method::Head => reqwest::Method::HEAD,
    Method::Post => reqwest::Method::POST,
    Method::Put => reqwest::Method::PUT,
    Method::Patch => reqwest::Method::PATCH,
    Method::Delete => reqwest::Method::DELETE,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  #[test]
  fn test_options_builder() {
    let options = FetchOptions::default()
      .with_timeout(Duration::from_secs(5))
      .no_cache();
    assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    assert_eq!(options.cache, CacheMode::NoCache);
  }

  #[tokio::test]
  async fn test_unreachable_host_is_network_error() {
    let fetcher = ReqwestFetcher::new().unwrap();
    // Port 9 on loopback: nothing listens there
    let request = Request::get(Url::parse("http://127.0.0.1:9/").unwrap());

    let err = fetcher
      .fetch(&request, FetchOptions::default().with_timeout(Duration::from_secs(5)))
      .await
      .unwrap_err();

    assert!(matches!(err, FetchError::Network { .. } | FetchError::Timeout { .. }));
  }
}
