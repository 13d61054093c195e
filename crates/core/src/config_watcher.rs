use crate::config::AppConfig;
use crate::config_loader::ConfigLoader;
use anyhow::Result;
use notify::{Event, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc::RecvTimeoutError;
use std::time::Duration;
use tokio::sync::watch;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Reloads configuration when `Config.toml` changes on disk and publishes each
/// successfully validated result.
pub struct ConfigWatcher {
    tx: watch::Sender<AppConfig>,
    dir: PathBuf,
    profile: Option<String>,
}

impl ConfigWatcher {
    /// Creates a watcher over the files in `dir`, seeded with `initial_config`.
    #[must_use]
    pub fn new(
        initial_config: AppConfig,
        dir: impl Into<PathBuf>,
        profile: Option<String>,
    ) -> (Self, watch::Receiver<AppConfig>) {
        let (tx, rx) = watch::channel(initial_config);
        let watcher = Self {
            tx,
            dir: dir.into(),
            profile,
        };
        (watcher, rx)
    }

    /// Re-reads the configuration and publishes it if it parses and validates.
    /// Invalid edits are logged and the previous configuration stays in effect.
    pub fn reload(&self) -> bool {
        match ConfigLoader::load_from(&self.dir, self.profile.as_deref()) {
            Ok(config) => {
                self.tx.send_if_modified(|current| {
                    if *current == config {
                        false
                    } else {
                        *current = config;
                        true
                    }
                });
                tracing::info!("Config reloaded successfully");
                true
            }
            Err(e) => {
                tracing::error!("Failed to reload config, keeping previous: {e:#}");
                false
            }
        }
    }

    /// Blocks a worker thread watching the config directory until every receiver is
    /// dropped or the watcher fails.
    ///
    /// # Errors
    ///
    /// Returns an error if file watching cannot be initiated or if the watcher task fails.
    pub async fn watch(self) -> Result<()> {
        tokio::task::spawn_blocking(move || {
            let (notify_tx, notify_rx) = std::sync::mpsc::channel();

            let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
                if let Ok(event) = res {
                    let _ = notify_tx.send(event);
                }
            })?;

            watcher.watch(Path::new(&self.dir), RecursiveMode::NonRecursive)?;
            tracing::info!(dir = %self.dir.display(), "Watching configuration");

            // Polls so the thread exits once every subscriber is gone.
            while !self.tx.is_closed() {
                match notify_rx.recv_timeout(POLL_INTERVAL) {
                    Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                        tracing::info!("Config file changed, reloading...");
                        self.reload();
                    }
                    Ok(_) | Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("Config watcher stopped");

            Ok::<_, anyhow::Error>(())
        })
        .await??;

        Ok(())
    }
}
