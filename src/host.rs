//! Terminal stand-ins for the browser's notification and window APIs.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::worker::{NotificationOptions, Notifier, WindowClient, WindowClients};

/// Prints notifications to stdout.
pub struct TerminalNotifier;

#[async_trait]
impl Notifier for TerminalNotifier {
  async fn show(&self, title: &str, options: &NotificationOptions) -> Result<()> {
    let rendered = serde_json::to_string_pretty(options)
      .map_err(|e| eyre!("Failed to render notification: {}", e))?;
    println!("Notification: {}", title);
    println!("{}", rendered);
    Ok(())
  }

  async fn close(&self, tag: Option<&str>) -> Result<()> {
    debug!(?tag, "Notification closed");
    Ok(())
  }
}

/// A fixed set of windows given on the command line.
pub struct TerminalClients {
  windows: Vec<WindowClient>,
}

impl TerminalClients {
  pub fn new(urls: &[Url]) -> Self {
    let windows = urls
      .iter()
      .enumerate()
      .map(|(i, url)| WindowClient {
        id: format!("window-{}", i + 1),
        url: url.to_string(),
      })
      .collect();
    Self { windows }
  }
}

#[async_trait]
impl WindowClients for TerminalClients {
  async fn match_all(&self) -> Result<Vec<WindowClient>> {
    Ok(self.windows.clone())
  }

  async fn focus(&self, id: &str) -> Result<()> {
    let window = self
      .windows
      .iter()
      .find(|w| w.id == id)
      .ok_or_else(|| eyre!("No such window: {}", id))?;
    println!("Focus {} ({})", window.id, window.url);
    Ok(())
  }

  async fn open_window(&self, url: &Url) -> Result<()> {
    println!("Open new window at {}", url);
    Ok(())
  }

  async fn claim(&self) -> Result<()> {
    debug!(windows = self.windows.len(), "Claimed open windows");
    Ok(())
  }

  async fn post_message(&self, id: &str, message: &Value) -> Result<()> {
    println!("Message to {}: {}", id, message);
    Ok(())
  }
}
