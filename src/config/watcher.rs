//! Hot reload of the configuration file.
//!
//! The parent directory is watched rather than the file, so saves that
//! replace the file through a rename keep producing reloads. Events for other
//! files in the directory are ignored, and a save that leaves the text as it
//! was does not produce an update.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::load_with_env;
use crate::config::schema::GatewayConfig;

/// Sends a freshly loaded `GatewayConfig` whenever the file's text changes.
pub struct ConfigWatcher {
    dir: PathBuf,
    reloader: Reloader,
}

impl ConfigWatcher {
    /// Returns the watcher and the receiving end for reloaded configurations.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (updates, update_rx) = mpsc::unbounded_channel();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let watcher = Self {
            dir,
            reloader: Reloader::new(path, updates),
        };
        (watcher, update_rx)
    }

    /// Start watching. Updates stop when the returned watcher is dropped.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let mut reloader = self.reloader;
        let path = reloader.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    reloader.handle(&event);
                }
                Err(e) => tracing::error!(error = %e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;
        watcher.watch(&self.dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Config watcher started");
        Ok(watcher)
    }
}

struct Reloader {
    path: PathBuf,
    /// Text of the last configuration loaded from the file.
    last_text: Option<String>,
    updates: mpsc::UnboundedSender<GatewayConfig>,
}

impl Reloader {
    fn new(path: &Path, updates: mpsc::UnboundedSender<GatewayConfig>) -> Self {
        Self {
            path: path.to_path_buf(),
            last_text: std::fs::read_to_string(path).ok(),
            updates,
        }
    }

    /// Reload on a relevant event. Returns whether an update was sent.
    fn handle(&mut self, event: &Event) -> bool {
        if !is_relevant(event, &self.path) {
            return false;
        }

        // Mid-rename the file can be briefly missing; the next event retries.
        let Ok(text) = std::fs::read_to_string(&self.path) else {
            return false;
        };
        if self.last_text.as_deref() == Some(text.as_str()) {
            return false;
        }

        match load_with_env(Some(&self.path)) {
            Ok(config) => {
                tracing::info!(path = ?self.path, "Config file changed, reloading");
                self.last_text = Some(text);
                self.updates.send(config).is_ok()
            }
            Err(e) => {
                tracing::error!(error = %e, "Config reload failed, keeping current configuration");
                false
            }
        }
    }
}

/// A create or modify event naming the watched file.
fn is_relevant(event: &Event, path: &Path) -> bool {
    if !(event.kind.is_modify() || event.kind.is_create()) {
        return false;
    }
    let Some(name) = path.file_name() else {
        return false;
    };
    event.paths.iter().any(|p| p.file_name() == Some(name))
}
