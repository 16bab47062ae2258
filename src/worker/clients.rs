//! Window clients controlled by the worker (open tabs of the storefront).

use async_trait::async_trait;
use color_eyre::Result;
use serde_json::Value;
use url::Url;

/// An open tab or window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
  pub id: String,
  pub url: String,
}

/// Access to the page windows of the origin.
#[async_trait]
pub trait WindowClients: Send + Sync {
  /// Every window client currently open, controlled or not.
  async fn match_all(&self) -> Result<Vec<WindowClient>>;

  async fn focus(&self, id: &str) -> Result<()>;

  async fn open_window(&self, url: &Url) -> Result<()>;

  /// Take control of already-open windows without a reload.
  async fn claim(&self) -> Result<()>;

  async fn post_message(&self, id: &str, message: &Value) -> Result<()>;
}
