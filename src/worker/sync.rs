//! Background sync and periodic content refresh.

use color_eyre::Result;
use futures::future::join_all;
use serde_json::json;
use tracing::{debug, info, warn};

use super::clients::WindowClients;
use super::probe::ConnectivityChecker;
use super::ServiceWorker;
use crate::cache::CacheStorage;
use crate::http::Request;
use crate::net::{FetchOptions, Fetcher};

pub const BACKGROUND_SYNC_TAG: &str = "background-sync";
pub const CONTENT_SYNC_TAG: &str = "content-sync";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
  /// Pages were asked to replay their queued mutations
  Replayed { notified: usize },
  Refreshed(RefreshReport),
  /// Tag not handled by this worker
  Ignored,
}

/// Result of a periodic refresh. Routes fail independently.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
  pub refreshed: Vec<String>,
  pub failed: Vec<String>,
}

impl<S, F, C> ServiceWorker<S, F, C>
where
  S: CacheStorage,
  F: Fetcher,
  C: ConnectivityChecker,
{
  /// One-off sync after connectivity returns.
  ///
  /// Failed mutations are queued by the pages themselves, so the worker only
  /// tells every open window to replay its queue.
  pub async fn handle_sync(&self, tag: &str, clients: &dyn WindowClients) -> Result<SyncOutcome> {
    if tag != BACKGROUND_SYNC_TAG {
      debug!(tag, "Ignoring sync event");
      return Ok(SyncOutcome::Ignored);
    }

    let windows = clients.match_all().await?;
    let message = json!({ "type": "BACKGROUND_SYNC", "tag": tag });
    let mut notified = 0;
    for window in &windows {
      match clients.post_message(&window.id, &message).await {
        Ok(()) => notified += 1,
        Err(e) => warn!(window = %window.id, "Failed to request replay: {:#}", e),
      }
    }

    info!(notified, windows = windows.len(), "Background sync dispatched");
    Ok(SyncOutcome::Replayed { notified })
  }

  pub async fn handle_periodic_sync(&self, tag: &str) -> Result<SyncOutcome> {
    if tag != CONTENT_SYNC_TAG {
      debug!(tag, "Ignoring periodic sync event");
      return Ok(SyncOutcome::Ignored);
    }

    Ok(SyncOutcome::Refreshed(self.refresh_content().await))
  }

  /// Re-fetch the important routes into the dynamic store.
  pub async fn refresh_content(&self) -> RefreshReport {
    let store = &self.config.caches.dynamic;
    let fetches = self.config.periodic_routes.iter().map(|url| async move {
      let request = Request::get(url.clone());
      let result = self.fetcher.fetch(&request, FetchOptions::default()).await;
      (request, result)
    });

    let mut report = RefreshReport::default();
    for (request, result) in join_all(fetches).await {
      let url = request.url.to_string();
      match result {
        Ok(response) if response.ok() => match self.storage.put(store, &request.key(), &response) {
          Ok(()) => report.refreshed.push(url),
          Err(e) => {
            warn!(%url, "Failed to store refreshed route: {:#}", e);
            report.failed.push(url);
          }
        },
        Ok(response) => {
          warn!(%url, status = response.status, "Refresh returned an error status");
          report.failed.push(url);
        }
        Err(e) => {
          warn!(%url, error = %e, "Refresh failed");
          report.failed.push(url);
        }
      }
    }

    info!(
      refreshed = report.refreshed.len(),
      failed = report.failed.len(),
      "Periodic content refresh finished"
    );
    report
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::http::Response;
  use crate::testing::{worker, FakeClients, ScriptedFetcher};

  #[tokio::test]
  async fn test_background_sync_notifies_every_window() {
    let sw = worker(ScriptedFetcher::new(), false);
    let clients = FakeClients::with_windows(&[
      ("a", "https://shop.example/cart"),
      ("b", "https://shop.example/"),
    ]);

    let outcome = sw.handle_sync(BACKGROUND_SYNC_TAG, &clients).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Replayed { notified: 2 });
    let messages = clients.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].1["type"], "BACKGROUND_SYNC");
  }

  #[tokio::test]
  async fn test_background_sync_skips_unreachable_window() {
    let sw = worker(ScriptedFetcher::new(), false);
    let clients = FakeClients::with_windows(&[
      ("a", "https://shop.example/cart"),
      ("b", "https://shop.example/"),
      ("c", "https://shop.example/orders"),
    ])
    .unreachable("a");

    let outcome = sw.handle_sync(BACKGROUND_SYNC_TAG, &clients).await.unwrap();

    assert_eq!(outcome, SyncOutcome::Replayed { notified: 2 });
    let ids: Vec<String> = clients.messages().into_iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec!["b", "c"]);
  }

  #[tokio::test]
  async fn test_unknown_tags_ignored() {
    let sw = worker(ScriptedFetcher::new(), false);
    let clients = FakeClients::with_windows(&[("a", "https://shop.example/")]);

    assert_eq!(sw.handle_sync("other", &clients).await.unwrap(), SyncOutcome::Ignored);
    assert_eq!(sw.handle_periodic_sync("other").await.unwrap(), SyncOutcome::Ignored);
    assert!(clients.messages().is_empty());
  }

  #[tokio::test]
  async fn test_refresh_tolerates_individual_failures() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond("https://shop.example/", Response::html(200, "home"));
    fetcher.respond("https://shop.example/products", Response::html(200, "products"));
    fetcher.respond("https://shop.example/offers", Response::new(502, ""));
    // /categories is unscripted and fails at the network level
    let sw = worker(fetcher, false);

    let outcome = sw.handle_periodic_sync(CONTENT_SYNC_TAG).await.unwrap();

    let SyncOutcome::Refreshed(report) = outcome else {
      panic!("expected a refresh report");
    };
    assert_eq!(
      report.refreshed,
      vec!["https://shop.example/", "https://shop.example/products"]
    );
    assert_eq!(
      report.failed,
      vec!["https://shop.example/categories", "https://shop.example/offers"]
    );
    assert_eq!(sw.storage().count(&sw.config().caches.dynamic).unwrap(), 2);
  }
}
