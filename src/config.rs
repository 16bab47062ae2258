use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Configuration file contents. Every field has a default.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Origin the worker sits in front of
  pub origin: String,
  /// Version tag embedded in every cache store name
  pub version: String,
  /// Title used for notifications without one
  pub app_name: String,
  /// Paths fetched into the static store at install time
  pub precache: Vec<String>,
  /// Pre-cached page served to navigations when offline
  pub offline_route: String,
  pub image_cache_limit: usize,
  pub timeouts: TimeoutConfig,
  /// Liveness probe targets, relative to the origin or absolute
  pub probe_urls: Vec<String>,
  /// Routes refreshed by periodic content sync
  pub periodic_routes: Vec<String>,
  /// Hosts whose requests are always treated as images
  pub cdn_hosts: Vec<String>,
  /// Hosts whose requests are always treated as API calls
  pub api_hosts: Vec<String>,
  /// SQLite cache location (default: $XDG_DATA_HOME/duka-worker/cache.db)
  pub cache_db: Option<PathBuf>,
  /// Directory for a rolling log file, in addition to stderr
  pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
  pub api_secs: u64,
  pub navigation_secs: u64,
  pub probe_secs: u64,
}

impl Default for TimeoutConfig {
  fn default() -> Self {
    Self {
      api_secs: 8,
      navigation_secs: 5,
      probe_secs: 3,
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: "http://localhost:3000".to_string(),
      version: "1.0.0".to_string(),
      app_name: "Duka".to_string(),
      precache: [
        "/",
        "/offline",
        "/manifest.json",
        "/panda.ico",
        "/icons/icon-192x192.png",
        "/icons/icon-512x512.png",
      ]
      .map(String::from)
      .to_vec(),
      offline_route: "/offline".to_string(),
      image_cache_limit: 100,
      timeouts: TimeoutConfig::default(),
      probe_urls: ["/", "/panda.ico", "https://www.google.com/favicon.ico"]
        .map(String::from)
        .to_vec(),
      periodic_routes: ["/", "/products", "/categories", "/offers"]
        .map(String::from)
        .to_vec(),
      cdn_hosts: vec!["images.unsplash.com".to_string()],
      api_hosts: Vec::new(),
      cache_db: None,
      log_dir: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./duka-worker.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/duka-worker/config.yaml
  ///
  /// Falls back to built-in defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("duka-worker.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("duka-worker").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))
  }
}

/// Names of the versioned cache stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheNames {
  /// Umbrella store; not on the activation allow-list
  pub umbrella: String,
  pub static_cache: String,
  pub dynamic: String,
  pub image: String,
}

impl CacheNames {
  pub fn for_version(version: &str) -> Self {
    Self {
      umbrella: format!("duka-v{version}"),
      static_cache: format!("duka-static-v{version}"),
      dynamic: format!("duka-dynamic-v{version}"),
      image: format!("duka-image-v{version}"),
    }
  }

  /// Stores that survive activation.
  pub fn allow_list(&self) -> [&str; 3] {
    [
      self.static_cache.as_str(),
      self.dynamic.as_str(),
      self.image.as_str(),
    ]
  }
}

/// Resolved settings handed to the worker and its handlers.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
  pub version: String,
  pub app_name: String,
  pub origin: Url,
  pub caches: CacheNames,
  pub precache: Vec<Url>,
  pub offline_route: Url,
  pub image_cache_limit: usize,
  pub api_timeout: Duration,
  pub navigation_timeout: Duration,
  pub probe_timeout: Duration,
  pub probe_urls: Vec<Url>,
  pub periodic_routes: Vec<Url>,
  pub cdn_hosts: Vec<String>,
  pub api_hosts: Vec<String>,
}

impl WorkerConfig {
  pub fn from_config(config: &Config) -> Result<Self> {
    let origin = Url::parse(&config.origin)
      .map_err(|e| eyre!("Invalid origin '{}': {}", config.origin, e))?;
    if config.image_cache_limit == 0 {
      return Err(eyre!("image_cache_limit must be at least 1"));
    }
    let resolve_all = |paths: &[String]| -> Result<Vec<Url>> {
      paths.iter().map(|p| resolve(&origin, p)).collect()
    };

    Ok(Self {
      version: config.version.clone(),
      app_name: config.app_name.clone(),
      caches: CacheNames::for_version(&config.version),
      precache: resolve_all(&config.precache)?,
      offline_route: resolve(&origin, &config.offline_route)?,
      image_cache_limit: config.image_cache_limit,
      api_timeout: Duration::from_secs(config.timeouts.api_secs),
      navigation_timeout: Duration::from_secs(config.timeouts.navigation_secs),
      probe_timeout: Duration::from_secs(config.timeouts.probe_secs),
      probe_urls: resolve_all(&config.probe_urls)?,
      periodic_routes: resolve_all(&config.periodic_routes)?,
      cdn_hosts: config.cdn_hosts.clone(),
      api_hosts: config.api_hosts.clone(),
      origin,
    })
  }

  /// Resolve a path or absolute URL against the origin.
  pub fn resolve(&self, path: &str) -> Result<Url> {
    resolve(&self.origin, path)
  }
}

fn resolve(origin: &Url, path: &str) -> Result<Url> {
  origin
    .join(path)
    .map_err(|e| eyre!("Invalid URL '{}': {}", path, e))
}
