//! The caching worker: sits between the storefront pages and the network.
//!
//! Every intercepted GET is classified and served by one policy:
//! - static: cache-first, never revalidated
//! - image: cache-first into a bounded store, SVG placeholder on failure
//! - api: network-first with timeout, offline JSON envelope
//! - navigation: network-first with timeout, loading page or offline page
//! - dynamic: network-first, cache on failure
//!
//! The network, cache stores and liveness probe are injected, so the same
//! worker runs against SQLite and reqwest in the CLI and against fakes in tests.

mod classify;
mod clients;
mod fallback;
mod lifecycle;
mod notify;
mod probe;
mod strategy;
mod sync;

pub use classify::{Classifier, RequestClass};
pub use clients::{WindowClient, WindowClients};
pub use lifecycle::{Lifecycle, WorkerMessage, WorkerState};
pub use notify::{ClickOutcome, NotificationClick, NotificationOptions, Notifier};
pub use probe::{ConnectivityChecker, HeadProbe};
pub use sync::{RefreshReport, SyncOutcome, BACKGROUND_SYNC_TAG, CONTENT_SYNC_TAG};

use color_eyre::{eyre::eyre, Result};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::cache::CacheStorage;
use crate::config::WorkerConfig;
use crate::http::{Method, Request, Response};
use crate::net::{FetchError, FetchOptions, Fetcher};

/// What happened to an intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
  /// Not handled by the worker; the host must send it itself
  Bypassed,
  Responded {
    class: RequestClass,
    response: Response,
  },
}

/// One generation of the worker, identified by its version tag.
pub struct ServiceWorker<S, F, C> {
  config: WorkerConfig,
  storage: Arc<S>,
  fetcher: Arc<F>,
  connectivity: C,
  classifier: Classifier,
  lifecycle: Lifecycle,
}

impl<S, F, C> ServiceWorker<S, F, C>
where
  S: CacheStorage,
  F: Fetcher,
  C: ConnectivityChecker,
{
  pub fn new(config: WorkerConfig, storage: Arc<S>, fetcher: Arc<F>, connectivity: C) -> Self {
    let classifier = Classifier::new(config.cdn_hosts.clone(), config.api_hosts.clone());
    Self {
      config,
      storage,
      fetcher,
      connectivity,
      classifier,
      lifecycle: Lifecycle::default(),
    }
  }

  pub fn config(&self) -> &WorkerConfig {
    &self.config
  }

  pub fn storage(&self) -> &S {
    &self.storage
  }

  pub fn lifecycle(&self) -> &Lifecycle {
    &self.lifecycle
  }

  pub fn version(&self) -> &str {
    &self.config.version
  }

  #[cfg(test)]
  pub(crate) fn fetcher(&self) -> &F {
    &self.fetcher
  }

  #[cfg(test)]
  pub(crate) fn connectivity(&self) -> &C {
    &self.connectivity
  }

  /// Pre-warm the static store with the precache manifest.
  ///
  /// All-or-nothing: if any entry cannot be fetched, nothing is stored and
  /// the worker becomes redundant.
  pub async fn install(&mut self) -> Result<()> {
    self.lifecycle.state = WorkerState::Installing;
    info!(version = %self.config.version, "Installing worker");

    match self.precache().await {
      Ok(count) => {
        self.lifecycle.state = WorkerState::Installed;
        self.lifecycle.skip_waiting = true;
        info!(count, "Precached static assets");
        Ok(())
      }
      Err(e) => {
        self.lifecycle.state = WorkerState::Redundant;
        error!("Install failed: {:#}", e);
        Err(e)
      }
    }
  }

  async fn precache(&self) -> Result<usize> {
    let store = &self.config.caches.static_cache;
    self.storage.open(store)?;

    let fetches = self.config.precache.iter().map(|url| async move {
      let request = Request::get(url.clone());
      let result = self.fetcher.fetch(&request, FetchOptions::default()).await;
      (request, result)
    });

    let mut entries = Vec::with_capacity(self.config.precache.len());
    for (request, result) in join_all(fetches).await {
      let response = result.map_err(|e| eyre!("Failed to precache {}: {}", request.url, e))?;
      if !response.ok() {
        return Err(eyre!(
          "Failed to precache {}: status {}",
          request.url,
          response.status
        ));
      }
      entries.push((request.key(), response));
    }

    self.storage.put_all(store, &entries)?;
    Ok(entries.len())
  }

  /// Drop stores from other versions and take control of open windows.
  ///
  /// Returns the names of the deleted stores. On failure the worker goes back
  /// to `Installed` so activation can be retried.
  pub async fn activate(&mut self, clients: &dyn WindowClients) -> Result<Vec<String>> {
    if self.lifecycle.state != WorkerState::Installed {
      return Err(eyre!(
        "Cannot activate a worker in state {}",
        self.lifecycle.state
      ));
    }
    self.lifecycle.state = WorkerState::Activating;

    match self.take_over(clients).await {
      Ok(deleted) => {
        self.lifecycle.clients_claimed = true;
        self.lifecycle.state = WorkerState::Activated;
        info!(version = %self.config.version, "Worker activated");
        Ok(deleted)
      }
      Err(e) => {
        self.lifecycle.state = WorkerState::Installed;
        error!("Activation failed: {:#}", e);
        Err(e)
      }
    }
  }

  async fn take_over(&self, clients: &dyn WindowClients) -> Result<Vec<String>> {
    let allow_list = self.config.caches.allow_list();
    let mut deleted = Vec::new();
    for name in self.storage.names()? {
      if !allow_list.contains(&name.as_str()) {
        info!(store = %name, "Deleting superseded cache");
        self.storage.delete_store(&name)?;
        deleted.push(name);
      }
    }

    clients.claim().await?;
    Ok(deleted)
  }

  pub fn handle_message(&mut self, message: WorkerMessage) {
    match message {
      WorkerMessage::SkipWaiting => {
        debug!("Skip waiting requested");
        self.lifecycle.skip_waiting = true;
      }
      WorkerMessage::GetVersion { reply } => match reply {
        Some(port) => {
          if port.send(self.config.version.clone()).is_err() {
            debug!("Version requester went away");
          }
        }
        None => debug!("Version requested without a reply port"),
      },
    }
  }

  /// Intercept a request from a page.
  ///
  /// Only fails when an API request failed on a live connection; that error
  /// is the original network error.
  pub async fn handle_fetch(&self, request: &Request) -> Result<Interception, FetchError> {
    if request.method != Method::Get || !request.is_http() {
      debug!(method = %request.method, url = %request.url, "Not intercepted");
      return Ok(Interception::Bypassed);
    }

    let class = self.classifier.classify(request);
    debug!(%class, url = %request.url, "Intercepted");
    let response = self.respond(class, request).await?;

    Ok(Interception::Responded { class, response })
  }

  /// Show a notification for a push message. No data, no notification.
  pub async fn handle_push(&self, data: Option<&[u8]>, notifier: &dyn Notifier) -> Result<()> {
    let Some(payload) = notify::parse_push(data) else {
      debug!("Push without data ignored");
      return Ok(());
    };

    let (title, options) = notify::build_notification(payload, &self.config.app_name);
    notifier.show(&title, &options).await
  }

  pub async fn handle_notification_click(
    &self,
    click: &NotificationClick,
    notifier: &dyn Notifier,
    clients: &dyn WindowClients,
  ) -> Result<ClickOutcome> {
    notify::handle_click(&self.config.origin, click, notifier, clients).await
  }

  fn lookup(&self, store: &str, request: &Request) -> Option<Response> {
    match self.storage.match_request(store, &request.key()) {
      Ok(hit) => hit.map(|cached| cached.response),
      Err(e) => {
        error!(store, "Cache lookup failed: {:#}", e);
        None
      }
    }
  }

  fn store(&self, store: &str, request: &Request, response: &Response) {
    if let Err(e) = self.storage.put(store, &request.key(), response) {
      error!(store, "Cache write failed: {:#}", e);
    }
  }

  /// The precached offline page from this version's stores.
  fn offline_route(&self) -> Option<Response> {
    let request = Request::get(self.config.offline_route.clone());
    let caches = &self.config.caches;
    self
      .lookup(&caches.static_cache, &request)
      .or_else(|| self.lookup(&caches.dynamic, &request))
  }
}
