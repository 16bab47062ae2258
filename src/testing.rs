//! Fakes for the worker's collaborators.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;

use crate::cache::MemoryStorage;
use crate::config::{Config, WorkerConfig};
use crate::http::{Method, Request, Response};
use crate::net::{FetchError, FetchOptions, Fetcher};
use crate::worker::{
  ConnectivityChecker, NotificationOptions, Notifier, ServiceWorker, WindowClient, WindowClients,
};

pub type TestWorker = ServiceWorker<MemoryStorage, ScriptedFetcher, FixedConnectivity>;

/// Worker for `https://shop.example` over in-memory stores.
pub fn worker(fetcher: ScriptedFetcher, offline: bool) -> TestWorker {
  let config = Config {
    origin: "https://shop.example".to_string(),
    ..Config::default()
  };
  let connectivity = if offline {
    FixedConnectivity::offline()
  } else {
    FixedConnectivity::online()
  };

  ServiceWorker::new(
    WorkerConfig::from_config(&config).unwrap(),
    Arc::new(MemoryStorage::new()),
    Arc::new(fetcher),
    connectivity,
  )
}

#[derive(Debug, Clone)]
pub struct FetchCall {
  pub method: Method,
  pub url: String,
  pub options: FetchOptions,
}

/// Answers from a script keyed by URL. Unscripted URLs fail like a dead network.
#[derive(Default)]
pub struct ScriptedFetcher {
  script: Mutex<HashMap<String, Result<Response, FetchError>>>,
  calls: Mutex<Vec<FetchCall>>,
}

impl ScriptedFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, url: &str, response: Response) {
    self.script.lock().unwrap().insert(url.to_string(), Ok(response));
  }

  pub fn fail(&self, url: &str, error: FetchError) {
    self.script.lock().unwrap().insert(url.to_string(), Err(error));
  }

  pub fn calls(&self) -> Vec<FetchCall> {
    self.calls.lock().unwrap().clone()
  }

  pub fn calls_to(&self, url: &str) -> usize {
    self.calls.lock().unwrap().iter().filter(|c| c.url == url).count()
  }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
  async fn fetch(&self, request: &Request, options: FetchOptions) -> Result<Response, FetchError> {
    let url = request.url.to_string();
    self.calls.lock().unwrap().push(FetchCall {
      method: request.method,
      url: url.clone(),
      options,
    });

    self
      .script
      .lock()
      .unwrap()
      .get(&url)
      .cloned()
      .unwrap_or_else(|| {
        Err(FetchError::Network {
          url,
          reason: "connection refused".to_string(),
        })
      })
  }
}

/// Connectivity checker with a fixed answer.
pub struct FixedConnectivity {
  offline: bool,
  probes: AtomicUsize,
}

impl FixedConnectivity {
  pub fn online() -> Self {
    Self {
      offline: false,
      probes: AtomicUsize::new(0),
    }
  }

  pub fn offline() -> Self {
    Self {
      offline: true,
      probes: AtomicUsize::new(0),
    }
  }

  pub fn probes(&self) -> usize {
    self.probes.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl ConnectivityChecker for FixedConnectivity {
  async fn is_really_offline(&self) -> bool {
    self.probes.fetch_add(1, Ordering::SeqCst);
    self.offline
  }
}

#[derive(Default)]
pub struct RecordingNotifier {
  shown: Mutex<Vec<(String, NotificationOptions)>>,
  closed: AtomicUsize,
}

impl RecordingNotifier {
  pub fn shown(&self) -> Vec<(String, NotificationOptions)> {
    self.shown.lock().unwrap().clone()
  }

  pub fn closed_count(&self) -> usize {
    self.closed.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn show(&self, title: &str, options: &NotificationOptions) -> Result<()> {
    self
      .shown
      .lock()
      .unwrap()
      .push((title.to_string(), options.clone()));
    Ok(())
  }

  async fn close(&self, _tag: Option<&str>) -> Result<()> {
    self.closed.fetch_add(1, Ordering::SeqCst);
    Ok(())
  }
}

#[derive(Default)]
pub struct FakeClients {
  windows: Vec<WindowClient>,
  focused: Mutex<Vec<String>>,
  opened: Mutex<Vec<Url>>,
  messages: Mutex<Vec<(String, Value)>>,
  claimed: AtomicBool,
  refuse_claim: bool,
  unreachable: Vec<String>,
}

impl FakeClients {
  pub fn with_windows(windows: &[(&str, &str)]) -> Self {
    Self {
      windows: windows
        .iter()
        .map(|(id, url)| WindowClient {
          id: id.to_string(),
          url: url.to_string(),
        })
        .collect(),
      ..Self::default()
    }
  }

  /// `claim()` fails.
  pub fn refusing_claim(mut self) -> Self {
    self.refuse_claim = true;
    self
  }

  /// Messages to window `id` fail.
  pub fn unreachable(mut self, id: &str) -> Self {
    self.unreachable.push(id.to_string());
    self
  }

  pub fn focused(&self) -> Vec<String> {
    self.focused.lock().unwrap().clone()
  }

  pub fn opened(&self) -> Vec<Url> {
    self.opened.lock().unwrap().clone()
  }

  pub fn messages(&self) -> Vec<(String, Value)> {
    self.messages.lock().unwrap().clone()
  }

  pub fn claimed(&self) -> bool {
    self.claimed.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl WindowClients for FakeClients {
  async fn match_all(&self) -> Result<Vec<WindowClient>> {
    Ok(self.windows.clone())
  }

  async fn focus(&self, id: &str) -> Result<()> {
    self.focused.lock().unwrap().push(id.to_string());
    Ok(())
  }

  async fn open_window(&self, url: &Url) -> Result<()> {
    self.opened.lock().unwrap().push(url.clone());
    Ok(())
  }

  async fn claim(&self) -> Result<()> {
    if self.refuse_claim {
      return Err(eyre!("Claim refused"));
    }
    self.claimed.store(true, Ordering::SeqCst);
    Ok(())
  }

  async fn post_message(&self, id: &str, message: &Value) -> Result<()> {
    if self.unreachable.iter().any(|u| u == id) {
      return Err(eyre!("Window {} is gone", id));
    }
    self
      .messages
      .lock()
      .unwrap()
      .push((id.to_string(), message.clone()));
    Ok(())
  }
}
