//! Artifact watcher event source.
//!
//! Fallback when no compiler command is configured: watch the build
//! directory and synthesize events from artifact changes. The first time
//! template, bundle and manifest all exist a `ReadyEvent` is emitted;
//! later changes are debounced into `ReloadEvent`s.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use crossbeam::channel::{self, RecvTimeoutError};
use notify::{RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::CompileEvent;
use crate::render::BuildArtifacts;

/// Quiet period before a burst of file events becomes one reload.
const DEBOUNCE_MS: u64 = 300;

/// Watch `dir` for artifact changes and feed events into `tx`.
pub fn spawn_artifact_watcher(
    dir: &Path,
    artifacts: BuildArtifacts,
    tx: mpsc::Sender<CompileEvent>,
) -> Result<()> {
    let (raw_tx, raw_rx) = channel::unbounded();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = raw_tx.send(res);
    })?;
    watcher
        .watch(dir, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", dir.display()))?;

    std::thread::spawn(move || {
        // Keep the watcher alive for the thread's lifetime.
        let _watcher = watcher;
        watch_loop(&raw_rx, &artifacts, &tx);
    });

    Ok(())
}

fn watch_loop(
    raw_rx: &channel::Receiver<notify::Result<notify::Event>>,
    artifacts: &BuildArtifacts,
    tx: &mpsc::Sender<CompileEvent>,
) {
    let mut ready_sent = false;
    if artifacts.all_exist() {
        ready_sent = true;
        if tx.blocking_send(CompileEvent::Ready).is_err() {
            return;
        }
    }

    let mut pending = false;
    loop {
        if crate::core::is_shutdown() {
            break;
        }

        match raw_rx.recv_timeout(Duration::from_millis(DEBOUNCE_MS)) {
            Ok(Ok(event)) => {
                if is_content_change(&event) {
                    crate::debug!("watch"; "raw notify: {:?} {:?}", event.kind, event.paths);
                    pending = true;
                }
            }
            Ok(Err(e)) => {
                crate::debug!("watch"; "notify error: {e}");
            }
            Err(RecvTimeoutError::Timeout) => {
                // Quiet period elapsed; emit at most one event per burst.
                if pending && artifacts.all_exist() {
                    pending = false;
                    let event = if ready_sent {
                        CompileEvent::Reload
                    } else {
                        ready_sent = true;
                        CompileEvent::Ready
                    };
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
}

/// Content events only; mtime/chmod noise would cause reload loops.
fn is_content_change(event: &notify::Event) -> bool {
    use notify::EventKind;

    match event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => true,
        EventKind::Modify(modify) => !matches!(modify, notify::event::ModifyKind::Metadata(_)),
        _ => false,
    }
}
