mod app;
mod cache;
mod config;
mod host;
mod http;
mod net;
#[cfg(test)]
mod testing;
mod worker;

use clap::{Parser, Subcommand};
use color_eyre::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "duka-worker")]
#[command(about = "Offline-first caching worker for a storefront origin")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/duka-worker/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Origin to serve, overriding the config file
  #[arg(short, long)]
  origin: Option<String>,

  /// Keep caches in memory for this run only
  #[arg(long)]
  ephemeral: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Precache the manifest, then activate and drop old cache generations
  Install,
  /// Send a GET through the worker and print the response
  Fetch {
    /// Path relative to the origin, or an absolute URL
    target: String,
    /// Issue the request as a page load
    #[arg(long)]
    navigate: bool,
  },
  /// List cache stores and their entry counts
  Caches {
    /// Also list every cached request
    #[arg(long)]
    entries: bool,
  },
  /// Show the notification a push payload would produce
  Push {
    /// JSON payload; omit to simulate a push without data
    payload: Option<String>,
  },
  /// Click a notification
  Click {
    /// Action button id (e.g. "dismiss")
    #[arg(long)]
    action: Option<String>,
    /// Target URL carried in the notification data
    #[arg(long)]
    url: Option<String>,
    /// URL of an already-open window (repeatable)
    #[arg(long = "window")]
    windows: Vec<String>,
  },
  /// Run a background sync, or a periodic content refresh
  Sync {
    #[arg(long)]
    periodic: bool,
    /// Override the sync tag
    #[arg(long)]
    tag: Option<String>,
  },
  /// Post a control message, e.g. '{"type":"GET_VERSION"}'
  Message { json: String },
}

fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("duka_worker=info"));

  let (file_layer, guard) = match log_dir {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "duka-worker.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      (
        Some(fmt::layer().with_writer(writer).with_ansi(false)),
        Some(guard),
      )
    }
    None => (None, None),
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(file_layer)
    .init();

  guard
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let config = config::Config::load(args.config.as_deref())?;

  // Override origin if specified on command line
  let config = if let Some(origin) = args.origin {
    config::Config { origin, ..config }
  } else {
    config
  };

  let _guard = init_tracing(config.log_dir.as_deref());

  let mut app = app::App::new(&config, args.ephemeral)?;
  app.run(args.command).await?;

  Ok(())
}
