//! Synthetic responses served when neither cache nor network can answer.

use serde_json::json;

use crate::http::Response;

pub const STATIC_UNAVAILABLE: &str = "Network error: resource not available offline";
pub const DYNAMIC_UNAVAILABLE: &str = "Content not available offline";

const IMAGE_PLACEHOLDER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="200" height="200" viewBox="0 0 200 200">
  <rect width="200" height="200" fill="#f3f4f6"/>
  <path d="M70 130l25-30 20 24 15-18 25 24H70z" fill="#d1d5db"/>
  <circle cx="80" cy="80" r="10" fill="#d1d5db"/>
  <text x="100" y="170" font-family="sans-serif" font-size="12" fill="#9ca3af" text-anchor="middle">Image unavailable</text>
</svg>"##;

const LOADING_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <meta http-equiv="refresh" content="3">
  <title>Loading...</title>
  <style>
    body { font-family: sans-serif; display: flex; align-items: center; justify-content: center; min-height: 100vh; margin: 0; color: #374151; }
  </style>
</head>
<body>
  <p>Loading...</p>
</body>
</html>"#;

const OFFLINE_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>You're offline</title>
  <style>
    body { font-family: sans-serif; text-align: center; padding: 4rem 1rem; color: #374151; }
    button { margin-top: 1.5rem; padding: 0.75rem 1.5rem; border: 0; border-radius: 0.5rem; background: #dc2626; color: #fff; font-size: 1rem; cursor: pointer; }
  </style>
</head>
<body>
  <h1>You're offline</h1>
  <p>Check your internet connection and try again.</p>
  <button id="retry" onclick="window.location.reload()">Try again</button>
</body>
</html>"#;

/// Plain-text 503 for assets that could not be fetched or found.
pub fn service_unavailable(message: &str) -> Response {
  Response::text(503, message).with_header("cache-control", "no-store")
}

/// Neutral placeholder so a missing image never breaks layout.
pub fn image_placeholder() -> Response {
  Response::new(200, IMAGE_PLACEHOLDER_SVG)
    .with_header("content-type", "image/svg+xml")
    .with_header("cache-control", "no-store")
}

/// JSON error envelope for API calls made while offline.
pub fn api_offline() -> Response {
  Response::json(
    503,
    &json!({
      "error": "Network unavailable",
      "message": "You appear to be offline. Please check your connection and try again.",
      "offline": true,
    }),
  )
  .with_header("cache-control", "no-store")
}

/// Self-refreshing page for navigations that failed on a live connection.
pub fn loading_page() -> Response {
  Response::html(200, LOADING_PAGE).with_header("cache-control", "no-store")
}

/// Last page of the offline chain, with a manual retry.
pub fn offline_page() -> Response {
  Response::html(200, OFFLINE_PAGE).with_header("cache-control", "no-store")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_api_offline_envelope() {
    let resp = api_offline();
    assert_eq!(resp.status, 503);

    let body: serde_json::Value = serde_json::from_slice(&resp.body).unwrap();
    assert_eq!(body["offline"], true);
    assert!(body["error"].is_string());
    assert!(body["message"].is_string());
  }

  #[test]
  fn test_loading_page_refreshes() {
    let resp = loading_page();
    assert_eq!(resp.status, 200);
    assert!(resp.body_text().contains(r#"<meta http-equiv="refresh" content="3">"#));
    assert!(!resp.body_text().contains("retry"));
  }

  #[test]
  fn test_offline_page_has_retry() {
    let resp = offline_page();
    assert!(resp.body_text().contains(r#"id="retry""#));
  }

  #[test]
  fn test_placeholder_is_svg() {
    let resp = image_placeholder();
    assert!(resp.ok());
    assert_eq!(resp.content_type(), Some("image/svg+xml"));
    assert!(resp.body_text().starts_with("<svg"));
  }
}
