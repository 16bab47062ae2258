use color_eyre::{eyre::eyre, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::oneshot;
use url::Url;

use crate::cache::{CacheStorage, SqliteStorage};
use crate::config::{Config, WorkerConfig};
use crate::host::{TerminalClients, TerminalNotifier};
use crate::http::{Request, Response};
use crate::net::{FetchOptions, Fetcher, ReqwestFetcher};
use crate::worker::{
  HeadProbe, Interception, NotificationClick, RefreshReport, ServiceWorker, SyncOutcome,
  WorkerMessage, BACKGROUND_SYNC_TAG, CONTENT_SYNC_TAG,
};
use crate::Command;

/// Longest body printed by `fetch`
const BODY_PREVIEW_CHARS: usize = 2000;

type Worker = ServiceWorker<SqliteStorage, ReqwestFetcher, HeadProbe<ReqwestFetcher>>;

/// Worker wired to the real network and the persistent cache.
pub struct App {
  worker: Worker,
  fetcher: Arc<ReqwestFetcher>,
}

impl App {
  pub fn new(config: &Config, ephemeral: bool) -> Result<Self> {
    let worker_config = WorkerConfig::from_config(config)?;
    let storage = if ephemeral {
      SqliteStorage::open_in_memory()?
    } else {
      SqliteStorage::open(config.cache_db.as_deref())?
    };
    let fetcher = Arc::new(ReqwestFetcher::new()?);
    let probe = HeadProbe::new(
      Arc::clone(&fetcher),
      worker_config.probe_urls.clone(),
      worker_config.probe_timeout,
    );

    let worker = ServiceWorker::new(worker_config, Arc::new(storage), Arc::clone(&fetcher), probe);
    Ok(Self { worker, fetcher })
  }

  pub async fn run(&mut self, command: Command) -> Result<()> {
    match command {
      Command::Install => self.install().await,
      Command::Fetch { target, navigate } => self.fetch(&target, navigate).await,
      Command::Caches { entries } => self.list_caches(entries),
      Command::Push { payload } => {
        self
          .worker
          .handle_push(payload.as_deref().map(str::as_bytes), &TerminalNotifier)
          .await
      }
      Command::Click {
        action,
        url,
        windows,
      } => self.click(action.as_deref(), url, &windows).await,
      Command::Sync { periodic, tag } => self.sync(periodic, tag).await,
      Command::Message { json } => self.message(&json).await,
    }
  }

  async fn install(&mut self) -> Result<()> {
    self.worker.install().await?;
    println!(
      "Installed {} ({} precached)",
      self.worker.version(),
      self.worker.config().precache.len()
    );

    if !self.worker.lifecycle().ready_to_activate() {
      println!("Waiting for open windows to close before activating");
      return Ok(());
    }

    let deleted = self.worker.activate(&TerminalClients::new(&[])).await?;
    if deleted.is_empty() {
      println!("Activated; no stale caches");
    } else {
      println!("Activated; deleted {}", deleted.join(", "));
    }
    Ok(())
  }

  async fn fetch(&self, target: &str, navigate: bool) -> Result<()> {
    let url = self.worker.config().resolve(target)?;
    let request = if navigate {
      Request::navigate(url)
    } else {
      Request::get(url)
    };

    match self.worker.handle_fetch(&request).await? {
      Interception::Responded { class, response } => print_response(&class.to_string(), &response),
      Interception::Bypassed => {
        let response = self.fetcher.fetch(&request, FetchOptions::default()).await?;
        print_response("network", &response);
      }
    }
    Ok(())
  }

  fn list_caches(&self, entries: bool) -> Result<()> {
    let storage = self.worker.storage();
    let caches = &self.worker.config().caches;
    let allow_list = caches.allow_list();

    for name in storage.names()? {
      let marker = if allow_list.contains(&name.as_str()) {
        ""
      } else if name == caches.umbrella {
        " (umbrella)"
      } else {
        " (stale)"
      };
      println!("{}\t{}{}", name, storage.count(&name)?, marker);

      if entries {
        for key in storage.keys(&name)? {
          if let Some(cached) = storage.match_request(&name, &key)? {
            println!(
              "  {}  {} {}B  {}",
              cached.cached_at.format("%Y-%m-%d %H:%M:%S"),
              cached.response.status,
              cached.response.body.len(),
              key
            );
          }
        }
      }
    }
    Ok(())
  }

  async fn click(&self, action: Option<&str>, url: Option<String>, windows: &[String]) -> Result<()> {
    let windows: Vec<Url> = windows
      .iter()
      .map(|w| self.worker.config().resolve(w))
      .collect::<Result<_>>()?;
    let data = url.map_or_else(|| json!({}), |url| json!({ "url": url }));
    let click = NotificationClick::new(action, data);

    let outcome = self
      .worker
      .handle_notification_click(&click, &TerminalNotifier, &TerminalClients::new(&windows))
      .await?;
    println!("{:?}", outcome);
    Ok(())
  }

  async fn sync(&self, periodic: bool, tag: Option<String>) -> Result<()> {
    let outcome = if periodic {
      let tag = tag.as_deref().unwrap_or(CONTENT_SYNC_TAG);
      self.worker.handle_periodic_sync(tag).await?
    } else {
      let tag = tag.as_deref().unwrap_or(BACKGROUND_SYNC_TAG);
      self.worker.handle_sync(tag, &TerminalClients::new(&[])).await?
    };

    match outcome {
      SyncOutcome::Replayed { notified } => println!("Asked {} window(s) to replay", notified),
      SyncOutcome::Refreshed(report) => print_report(&report),
      SyncOutcome::Ignored => println!("Tag not handled"),
    }
    Ok(())
  }

  async fn message(&mut self, raw: &str) -> Result<()> {
    let data: Value =
      serde_json::from_str(raw).map_err(|e| eyre!("Invalid message JSON: {}", e))?;
    let (port, reply) = oneshot::channel();

    let message = WorkerMessage::parse(&data, Some(port))
      .ok_or_else(|| eyre!("Unsupported message: {}", raw))?;
    let expects_reply = matches!(message, WorkerMessage::GetVersion { .. });
    self.worker.handle_message(message);

    if expects_reply {
      let version = reply
        .await
        .map_err(|_| eyre!("Worker did not reply to the version query"))?;
      println!("{}", version);
    } else {
      println!("skip_waiting = {}", self.worker.lifecycle().skip_waiting);
    }
    Ok(())
  }
}

fn print_response(source: &str, response: &Response) {
  println!("{} {} [{}]", response.status, response.status_text, source);
  for (name, value) in &response.headers {
    println!("{}: {}", name, value);
  }
  println!();

  let body = response.body_text();
  match body.char_indices().nth(BODY_PREVIEW_CHARS) {
    Some((cut, _)) => println!("{}\n... ({} bytes total)", &body[..cut], response.body.len()),
    None => println!("{}", body),
  }
}

fn print_report(report: &RefreshReport) {
  for url in &report.refreshed {
    println!("refreshed {}", url);
  }
  for url in &report.failed {
    println!("failed    {}", url);
  }
}
