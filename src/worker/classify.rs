//! Maps an intercepted request to the caching policy that serves it.

use std::fmt;

use crate::http::{Request, RequestMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestClass {
  /// Build assets, icons, manifest: cache-first
  Static,
  /// Cache-first with a bounded store
  Image,
  /// Network-first with a timeout and offline JSON fallback
  Api,
  /// Page loads: network-first with the offline page chain
  Navigation,
  /// Everything else
  Dynamic,
}

impl fmt::Display for RequestClass {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Static => "static",
      Self::Image => "image",
      Self::Api => "api",
      Self::Navigation => "navigation",
      Self::Dynamic => "dynamic",
    };
    f.write_str(name)
  }
}

const STATIC_PREFIXES: &[&str] = &["/_next/static/", "/static/", "/icons/"];
const STATIC_FILES: &[&str] = &["/manifest.json", "/panda.ico", "/favicon.ico"];
const STATIC_EXTENSIONS: &[&str] = &["js", "css", "woff", "woff2"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "svg", "ico", "avif"];

type Rule = (RequestClass, fn(&Classifier, &Request) -> bool);

/// Checked in order; the first match wins.
const RULES: &[Rule] = &[
  (RequestClass::Static, Classifier::is_static),
  (RequestClass::Image, Classifier::is_image),
  (RequestClass::Api, Classifier::is_api),
  (RequestClass::Navigation, Classifier::is_navigation),
];

/// Pure request classifier.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
  cdn_hosts: Vec<String>,
  api_hosts: Vec<String>,
}

impl Classifier {
  pub fn new(cdn_hosts: Vec<String>, api_hosts: Vec<String>) -> Self {
    Self {
      cdn_hosts,
      api_hosts,
    }
  }

  pub fn classify(&self, request: &Request) -> RequestClass {
    RULES
      .iter()
      .find(|(_, matches)| matches(self, request))
      .map_or(RequestClass::Dynamic, |(class, _)| *class)
  }

  fn is_static(&self, request: &Request) -> bool {
    let path = request.url.path();
    STATIC_PREFIXES.iter().any(|p| path.starts_with(p))
      || STATIC_FILES.contains(&path)
      || extension(path).is_some_and(|ext| STATIC_EXTENSIONS.contains(&ext.as_str()))
  }

  fn is_image(&self, request: &Request) -> bool {
    let path = request.url.path();
    extension(path).is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
      || path.starts_with("/_next/image")
      || request
        .url
        .host_str()
        .is_some_and(|host| self.cdn_hosts.iter().any(|h| h == host))
  }

  fn is_api(&self, request: &Request) -> bool {
    request.url.path().starts_with("/api/")
      || request
        .url
        .host_str()
        .is_some_and(|host| host.starts_with("api.") || self.api_hosts.iter().any(|h| h == host))
  }

  fn is_navigation(&self, request: &Request) -> bool {
    request.mode == RequestMode::Navigate
  }
}

/// Lowercased extension of the last path segment.
fn extension(path: &str) -> Option<String> {
  let segment = path.rsplit('/').next()?;
  let (stem, ext) = segment.rsplit_once('.')?;
  if stem.is_empty() || ext.is_empty() {
    return None;
  }
  Some(ext.to_ascii_lowercase())
}
