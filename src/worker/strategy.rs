//! One caching policy per request class.

use tracing::{debug, error, info, warn};

use super::classify::RequestClass;
use super::fallback;
use super::probe::ConnectivityChecker;
use super::ServiceWorker;
use crate::cache::{put_bounded, CacheStorage};
use crate::http::{Request, Response};
use crate::net::{FetchError, FetchOptions, Fetcher};

impl<S, F, C> ServiceWorker<S, F, C>
where
  S: CacheStorage,
  F: Fetcher,
  C: ConnectivityChecker,
{
  pub(super) async fn respond(
    &self,
    class: RequestClass,
    request: &Request,
  ) -> Result<Response, FetchError> {
    match class {
      RequestClass::Static => Ok(self.cache_first(request).await),
      RequestClass::Image => Ok(self.cache_first_image(request).await),
      RequestClass::Api => self.network_first_api(request).await,
      RequestClass::Navigation => Ok(self.network_first_navigation(request).await),
      RequestClass::Dynamic => Ok(self.network_first_dynamic(request).await),
    }
  }

  /// Serve from the static store; fill it from the network on a miss.
  async fn cache_first(&self, request: &Request) -> Response {
    let store = &self.config.caches.static_cache;
    if let Some(cached) = self.lookup(store, request) {
      debug!(url = %request.url, "Static cache hit");
      return cached;
    }

    match self.fetcher.fetch(request, FetchOptions::default()).await {
      Ok(response) => {
        if response.ok() {
          self.store(store, request, &response);
        }
        response
      }
      Err(e) => {
        warn!(error = %e, "Static asset unavailable");
        fallback::service_unavailable(fallback::STATIC_UNAVAILABLE)
      }
    }
  }

  /// Like `cache_first`, into the size-bounded image store. Never fails:
  /// a placeholder stands in for anything unreachable.
  async fn cache_first_image(&self, request: &Request) -> Response {
    let store = &self.config.caches.image;
    if let Some(cached) = self.lookup(store, request) {
      debug!(url = %request.url, "Image cache hit");
      return cached;
    }

    match self.fetcher.fetch(request, FetchOptions::default()).await {
      Ok(response) => {
        if response.ok() {
          match put_bounded(
            self.storage.as_ref(),
            store,
            &request.key(),
            &response,
            self.config.image_cache_limit,
          ) {
            Ok(Some(evicted)) => debug!(%evicted, "Evicted oldest image"),
            Ok(None) => {}
            Err(e) => error!(store = %store, "Cache write failed: {:#}", e),
          }
        }
        response
      }
      Err(e) => {
        warn!(error = %e, "Image unavailable, serving placeholder");
        fallback::image_placeholder()
      }
    }
  }

  /// Network with a deadline. On failure, cached data or an offline envelope
  /// only when the client is really offline; otherwise the original error.
  async fn network_first_api(&self, request: &Request) -> Result<Response, FetchError> {
    let store = &self.config.caches.dynamic;
    let options = FetchOptions::default().with_timeout(self.config.api_timeout);

    match self.fetcher.fetch(request, options).await {
      Ok(response) => {
        if response.ok() {
          self.store(store, request, &response);
        }
        Ok(response)
      }
      Err(e) => {
        if !self.connectivity.is_really_offline().await {
          warn!(error = %e, "API request failed on a live connection");
          return Err(e);
        }

        info!(url = %request.url, "Offline, serving API from cache");
        Ok(
          self
            .lookup(store, request)
            .unwrap_or_else(fallback::api_offline),
        )
      }
    }
  }

  /// Always revalidate page loads. A transient failure gets a cached copy or
  /// a self-refreshing loading page; a real outage walks the offline chain.
  async fn network_first_navigation(&self, request: &Request) -> Response {
    let store = &self.config.caches.dynamic;
    let options = FetchOptions::default()
      .with_timeout(self.config.navigation_timeout)
      .no_cache();

    let error = match self.fetcher.fetch(request, options).await {
      Ok(response) => {
        if response.ok() {
          self.store(store, request, &response);
        }
        return response;
      }
      Err(e) => e,
    };

    if !self.connectivity.is_really_offline().await {
      warn!(error = %error, "Navigation failed on a live connection");
      return self
        .lookup(store, request)
        .unwrap_or_else(fallback::loading_page);
    }

    info!(url = %request.url, "Offline navigation");
    self
      .lookup(store, request)
      .or_else(|| self.offline_route())
      .unwrap_or_else(fallback::offline_page)
  }

  async fn network_first_dynamic(&self, request: &Request) -> Response {
    let store = &self.config.caches.dynamic;

    match self.fetcher.fetch(request, FetchOptions::default()).await {
      Ok(response) => {
        if response.ok() {
          self.store(store, request, &response);
        }
        response
      }
      Err(e) => {
        warn!(error = %e, "Request failed, trying cache");
        self
          .lookup(store, request)
          .unwrap_or_else(|| fallback::service_unavailable(fallback::DYNAMIC_UNAVAILABLE))
      }
    }
  }
}
