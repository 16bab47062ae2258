//! Worker lifecycle states and the control messages pages can send.

use serde::Deserialize;
use serde_json::Value;
use std::fmt;
use tokio::sync::oneshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Parsed,
  Installing,
  Installed,
  Activating,
  Activated,
  /// Install failed; the worker will never control a page
  Redundant,
}

impl fmt::Display for WorkerState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Self::Parsed => "parsed",
      Self::Installing => "installing",
      Self::Installed => "installed",
      Self::Activating => "activating",
      Self::Activated => "activated",
      Self::Redundant => "redundant",
    };
    f.write_str(name)
  }
}

/// Mutable lifecycle bookkeeping for one worker generation.
#[derive(Debug, Clone)]
pub struct Lifecycle {
  pub state: WorkerState,
  /// Activate without waiting for old tabs to close
  pub skip_waiting: bool,
  pub clients_claimed: bool,
}

impl Default for Lifecycle {
  fn default() -> Self {
    Self {
      state: WorkerState::Parsed,
      skip_waiting: false,
      clients_claimed: false,
    }
  }
}

impl Lifecycle {
  /// Installed and allowed to take over immediately.
  pub fn ready_to_activate(&self) -> bool {
    self.state == WorkerState::Installed && self.skip_waiting
  }
}

/// A control message posted to the worker by a page.
#[derive(Debug)]
pub enum WorkerMessage {
  SkipWaiting,
  /// Reply goes over the port supplied with the message
  GetVersion { reply: Option<oneshot::Sender<String>> },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
enum MessageKind {
  SkipWaiting,
  GetVersion,
}

impl WorkerMessage {
  /// Decode `{ "type": ... }` message data. Unknown types yield `None`.
  pub fn parse(data: &Value, port: Option<oneshot::Sender<String>>) -> Option<Self> {
    match MessageKind::deserialize(data).ok()? {
      MessageKind::SkipWaiting => Some(Self::SkipWaiting),
      MessageKind::GetVersion => Some(Self::GetVersion { reply: port }),
    }
  }
}
