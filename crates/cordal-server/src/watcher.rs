//! File Watcher (C9): debounced observation of configuration directories.
//!
//! Built on `notify`, a dependency the teacher declared in `fraiseql-cli`
//! for an unfinished `serve` dev-loop stub
//! (`anyhow::bail!("serve command not implemented yet")`); this is the
//! first implementation the dependency was actually brought in for.

use notify::{Event as NotifyEvent, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A coalesced batch of filesystem changes, emitted once the debounce
/// window elapses with no further activity.
#[derive(Debug, Clone)]
pub struct ChangeNotification {
    /// Paths that changed during the debounce window.
    pub paths: Vec<PathBuf>,
    /// Distinct `notify` event kinds observed (create/modify/delete), as display strings.
    pub kinds: Vec<String>,
}

/// Watches `directories` for create/modify/delete events on files matching
/// `globs`, coalescing bursts into one [`ChangeNotification`] per debounce window.
///
/// The watcher itself does no parsing — callers (the reload orchestrator)
/// decide what to do with a notification.
pub struct FileWatcher {
    _inner: RecommendedWatcher,
    receiver: mpsc::Receiver<ChangeNotification>,
}

impl FileWatcher {
    /// Start watching `directories`, admitting only files matching any of `globs`.
    ///
    /// # Errors
    /// Returns a [`notify::Error`] if the underlying OS watch cannot be installed.
    pub fn start(
        directories: Vec<PathBuf>,
        globs: Vec<String>,
        debounce: Duration,
    ) -> notify::Result<Self> {
        let patterns: Vec<glob::Pattern> = globs.iter().filter_map(|g| glob::Pattern::new(g).ok()).collect();
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<NotifyEvent>();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<NotifyEvent>| {
            if let Ok(event) = res {
                let _ = raw_tx.send(event);
            }
        })?;
        for dir in &directories {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }

        let (tx, rx) = mpsc::channel::<ChangeNotification>(16);
        tokio::spawn(async move {
            let mut pending_paths: Vec<PathBuf> = Vec::new();
            let mut pending_kinds: Vec<String> = Vec::new();
            let mut deadline: Option<Instant> = None;

            loop {
                let sleep = match deadline {
                    Some(d) => tokio::time::sleep_until(d),
                    None => tokio::time::sleep(Duration::from_secs(3600)),
                };
                tokio::select! {
                    maybe_event = raw_rx.recv() => {
                        let Some(event) = maybe_event else { break };
                        let admitted: Vec<PathBuf> = event
                            .paths
                            .iter()
                            .filter(|p| {
                                p.file_name()
                                    .and_then(|n| n.to_str())
                                    .is_some_and(|name| patterns.iter().any(|pat| pat.matches(name)))
                            })
                            .cloned()
                            .collect();
                        if admitted.is_empty() {
                            continue;
                        }
                        pending_paths.extend(admitted);
                        pending_kinds.push(format!("{:?}", event.kind));
                        deadline = Some(Instant::now() + debounce);
                    }
                    () = sleep, if deadline.is_some() => {
                        if !pending_paths.is_empty() {
                            let notification = ChangeNotification {
                                paths: std::mem::take(&mut pending_paths),
                                kinds: std::mem::take(&mut pending_kinds),
                            };
                            if tx.send(notification).await.is_err() {
                                break;
                            }
                        }
                        deadline = None;
                    }
                }
            }
        });

        Ok(Self {
            _inner: watcher,
            receiver: rx,
        })
    }

    /// Await the next coalesced change notification.
    pub async fn next(&mut self) -> Option<ChangeNotification> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::Duration as StdDuration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn coalesces_bursts_into_one_notification() {
        let dir = tempdir().unwrap();
        let mut watcher = FileWatcher::start(
            vec![dir.path().to_path_buf()],
            vec!["*.yml".to_string()],
            Duration::from_millis(100),
        )
        .unwrap();

        for i in 0..3 {
            fs::write(dir.path().join(format!("f{i}-database.yml")), "databases: {}").unwrap();
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }

        let notification = tokio::time::timeout(StdDuration::from_secs(2), watcher.next())
            .await
            .expect("debounce fired")
            .expect("channel open");
        assert!(!notification.paths.is_empty());
    }
}
