//! Best-effort check for "really offline" versus "this one request failed".

use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::http::Request;
use crate::net::{FetchOptions, Fetcher};

/// Decides whether the client has lost connectivity altogether.
///
/// Implementations return `true` only when no target could be reached.
#[async_trait]
pub trait ConnectivityChecker: Send + Sync {
  async fn is_really_offline(&self) -> bool;
}

/// Probes a handful of targets with concurrent HEAD requests.
///
/// Offline only if every probe fails to settle. Any response, whatever its
/// status, proves the network is up.
pub struct HeadProbe<F> {
  fetcher: Arc<F>,
  targets: Vec<Url>,
  timeout: Duration,
}

impl<F: Fetcher> HeadProbe<F> {
  pub fn new(fetcher: Arc<F>, targets: Vec<Url>, timeout: Duration) -> Self {
    Self {
      fetcher,
      targets,
      timeout,
    }
  }
}

#[async_trait]
impl<F: Fetcher> ConnectivityChecker for HeadProbe<F> {
  async fn is_really_offline(&self) -> bool {
    if self.targets.is_empty() {
      return false;
    }

    let options = FetchOptions::default().no_cache().with_timeout(self.timeout);
    let probes = self.targets.iter().map(|url| {
      let request = Request::head(url.clone());
      let fetcher = &self.fetcher;
      async move { fetcher.fetch(&request, options).await }
    });

    let results = join_all(probes).await;
    let settled = results.iter().filter(|r| r.is_ok()).count();
    debug!(settled, total = results.len(), "Connectivity probe finished");

    settled == 0
  }
}
