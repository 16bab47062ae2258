//! Push notifications: rendering push payloads and routing clicks to a tab.

use async_trait::async_trait;
use chrono::Utc;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::clients::WindowClients;

pub const DEFAULT_ICON: &str = "/icons/icon-192x192.png";
pub const DEFAULT_BADGE: &str = "/icons/icon-72x72.png";
pub const DEFAULT_BODY: &str = "You have a new update";
pub const DISMISS_ACTION: &str = "dismiss";

/// Push message body as sent by the backend. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct NotificationPayload {
  pub title: Option<String>,
  pub body: Option<String>,
  pub icon: Option<String>,
  pub image: Option<String>,
  pub badge: Option<String>,
  pub data: Option<Value>,
  pub actions: Option<Vec<NotificationAction>>,
  pub tag: Option<String>,
  pub priority: Option<String>,
  /// Shorthand for `data.url`
  pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub icon: Option<String>,
}

impl NotificationAction {
  fn new(action: &str, title: &str) -> Self {
    Self {
      action: action.to_string(),
      title: title.to_string(),
      icon: None,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
  High,
  Normal,
  Low,
}

impl Priority {
  fn from_payload(priority: Option<&str>) -> Self {
    match priority.map(str::to_ascii_lowercase).as_deref() {
      Some("high") => Self::High,
      Some("low") => Self::Low,
      _ => Self::Normal,
    }
  }
}

/// Options passed to the platform when showing a notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationOptions {
  pub body: String,
  pub icon: String,
  pub badge: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
  pub data: Value,
  pub actions: Vec<NotificationAction>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub tag: Option<String>,
  pub require_interaction: bool,
  pub silent: bool,
  pub vibrate: Vec<u32>,
  /// Milliseconds since the epoch
  pub timestamp: i64,
}

/// Platform notification display.
#[async_trait]
pub trait Notifier: Send + Sync {
  async fn show(&self, title: &str, options: &NotificationOptions) -> Result<()>;

  /// Close the notification with the given tag (or the clicked one when `None`).
  async fn close(&self, tag: Option<&str>) -> Result<()>;
}

/// Parse push event data.
///
/// `None` when the push carried no data. Undecodable data still yields a
/// notification, with the raw text as body when it has any.
pub fn parse_push(data: Option<&[u8]>) -> Option<NotificationPayload> {
  let bytes = data?;

  match serde_json::from_slice::<NotificationPayload>(bytes) {
    Ok(payload) => Some(payload),
    Err(e) => {
      warn!(error = %e, "Malformed push payload, showing generic notification");
      let text = String::from_utf8_lossy(bytes).trim().to_string();
      Some(NotificationPayload {
        body: (!text.is_empty()).then_some(text),
        ..NotificationPayload::default()
      })
    }
  }
}

/// Build the title and display options for a payload.
pub fn build_notification(
  payload: NotificationPayload,
  app_name: &str,
) -> (String, NotificationOptions) {
  let priority = Priority::from_payload(payload.priority.as_deref());
  let silent = priority == Priority::Low;

  // `url` shorthand merges into object data; any other data passes through as is
  let data = match (payload.data, payload.url) {
    (Some(Value::Object(mut map)), Some(url)) => {
      map.entry("url").or_insert(Value::String(url));
      Value::Object(map)
    }
    (Some(data), _) => data,
    (None, Some(url)) => json!({ "url": url }),
    (None, None) => Value::Object(Map::new()),
  };

  let options = NotificationOptions {
    body: payload.body.unwrap_or_else(|| DEFAULT_BODY.to_string()),
    icon: payload.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
    badge: payload.badge.unwrap_or_else(|| DEFAULT_BADGE.to_string()),
    image: payload.image,
    data,
    actions: payload.actions.unwrap_or_else(|| {
      vec![
        NotificationAction::new("explore", "View"),
        NotificationAction::new(DISMISS_ACTION, "Dismiss"),
      ]
    }),
    tag: payload.tag,
    require_interaction: priority == Priority::High,
    silent,
    vibrate: if silent { Vec::new() } else { vec![100, 50, 100] },
    timestamp: Utc::now().timestamp_millis(),
  };

  (payload.title.unwrap_or_else(|| app_name.to_string()), options)
}

/// A click on a shown notification or one of its action buttons.
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationClick {
  /// Action button id, `None` for a click on the body
  pub action: Option<String>,
  pub tag: Option<String>,
  pub data: Value,
}

impl NotificationClick {
  pub fn new(action: Option<&str>, data: Value) -> Self {
    Self {
      action: action.map(String::from),
      tag: None,
      data,
    }
  }
}

impl Default for NotificationClick {
  fn default() -> Self {
    Self::new(None, json!({}))
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
  Dismissed,
  /// An existing window already showed the target
  Focused(String),
  Opened(Url),
}

/// Close the notification, then focus a window already at the target URL or
/// open a new one.
pub async fn handle_click(
  origin: &Url,
  click: &NotificationClick,
  notifier: &dyn Notifier,
  clients: &dyn WindowClients,
) -> Result<ClickOutcome> {
  notifier.close(click.tag.as_deref()).await?;

  if click.action.as_deref() == Some(DISMISS_ACTION) {
    debug!("Notification dismissed");
    return Ok(ClickOutcome::Dismissed);
  }

  let path = click.data.get("url").and_then(Value::as_str).unwrap_or("/");
  let target = origin.join(path).unwrap_or_else(|e| {
    warn!(url = path, error = %e, "Invalid notification target, opening home page");
    origin.clone()
  });

  let windows = clients.match_all().await?;
  if let Some(window) = windows.iter().find(|w| w.url == target.as_str()) {
    info!(client = %window.id, url = %target, "Focusing existing window");
    clients.focus(&window.id).await?;
    return Ok(ClickOutcome::Focused(window.id.clone()));
  }

  info!(url = %target, "Opening new window");
  clients.open_window(&target).await?;
  Ok(ClickOutcome::Opened(target))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{FakeClients, RecordingNotifier};

  fn payload(bytes: &[u8]) -> NotificationPayload {
    parse_push(Some(bytes)).unwrap()
  }

  fn origin() -> Url {
    Url::parse("https://shop.example").unwrap()
  }

  #[test]
  fn test_high_priority_requires_interaction() {
    let payload = payload(br#"{"title":"Sale","body":"50% off","priority":"high"}"#);
    let (title, options) = build_notification(payload, "Duka");

    assert_eq!(title, "Sale");
    assert_eq!(options.body, "50% off");
    assert!(options.require_interaction);
    assert!(!options.silent);
  }

  #[test]
  fn test_low_priority_is_silent() {
    let payload = payload(br#"{"title":"Tip","priority":"low"}"#);
    let (_, options) = build_notification(payload, "Duka");

    assert!(options.silent);
    assert!(!options.require_interaction);
    assert!(options.vibrate.is_empty());
  }

  #[test]
  fn test_defaults_fill_missing_fields() {
    let (title, options) = build_notification(NotificationPayload::default(), "Duka");

    assert_eq!(title, "Duka");
    assert_eq!(options.icon, DEFAULT_ICON);
    assert_eq!(options.badge, DEFAULT_BADGE);
    assert_eq!(options.actions.len(), 2);
    assert_eq!(options.actions[1].action, DISMISS_ACTION);
  }

  #[test]
  fn test_url_shorthand_lands_in_data() {
    let payload = payload(br#"{"url":"/orders/42","data":{"orderId":42}}"#);
    let (_, options) = build_notification(payload, "Duka");

    assert_eq!(options.data["url"], "/orders/42");
    assert_eq!(options.data["orderId"], 42);
  }

  #[test]
  fn test_non_object_data_passes_through() {
    let payload = payload(br#"{"url":"/orders/42","data":["a",1]}"#);
    let (_, options) = build_notification(payload, "Duka");

    assert_eq!(options.data, serde_json::json!(["a", 1]));
  }

  #[test]
  fn test_absent_data_is_noop() {
    assert!(parse_push(None).is_none());
  }

  #[test]
  fn test_malformed_payload_falls_back() {
    let payload = payload(b"Your order has shipped");
    let (title, options) = build_notification(payload, "Duka");

    assert_eq!(title, "Duka");
    assert_eq!(options.body, "Your order has shipped");
  }

  #[test]
  fn test_options_serialize_camel_case() {
    let (_, options) = build_notification(NotificationPayload::default(), "Duka");
    let value = serde_json::to_value(&options).unwrap();

    assert_eq!(value["requireInteraction"], false);
    assert!(value.get("image").is_none());
  }

  #[tokio::test]
  async fn test_click_focuses_existing_window() {
    let notifier = RecordingNotifier::default();
    let clients = FakeClients::with_windows(&[
      ("a", "https://shop.example/"),
      ("b", "https://shop.example/orders"),
    ]);
    let click = NotificationClick::new(None, json!({ "url": "/orders" }));

    let outcome = handle_click(&origin(), &click, &notifier, &clients).await.unwrap();

    assert_eq!(outcome, ClickOutcome::Focused("b".to_string()));
    assert_eq!(clients.focused(), vec!["b".to_string()]);
    assert!(clients.opened().is_empty());
    assert_eq!(notifier.closed_count(), 1);
  }

  #[tokio::test]
  async fn test_click_opens_window_when_none_matches() {
    let notifier = RecordingNotifier::default();
    let clients = FakeClients::with_windows(&[("a", "https://shop.example/")]);
    let click = NotificationClick::new(Some("explore"), json!({ "url": "/offers" }));

    let outcome = handle_click(&origin(), &click, &notifier, &clients).await.unwrap();

    let expected = Url::parse("https://shop.example/offers").unwrap();
    assert_eq!(outcome, ClickOutcome::Opened(expected.clone()));
    assert_eq!(clients.opened(), vec![expected]);
    assert!(clients.focused().is_empty());
  }

  #[tokio::test]
  async fn test_click_defaults_to_home() {
    let notifier = RecordingNotifier::default();
    let clients = FakeClients::with_windows(&[("home", "https://shop.example/")]);

    let outcome = handle_click(&origin(), &NotificationClick::default(), &notifier, &clients)
      .await
      .unwrap();

    assert_eq!(outcome, ClickOutcome::Focused("home".to_string()));
  }

  #[tokio::test]
  async fn test_dismiss_only_closes() {
    let notifier = RecordingNotifier::default();
    let clients = FakeClients::with_windows(&[]);
    let click = NotificationClick::new(Some(DISMISS_ACTION), json!({ "url": "/orders" }));

    let outcome = handle_click(&origin(), &click, &notifier, &clients).await.unwrap();

    assert_eq!(outcome, ClickOutcome::Dismissed);
    assert_eq!(notifier.closed_count(), 1);
    assert!(clients.opened().is_empty());
    assert!(clients.focused().is_empty());
  }
}
