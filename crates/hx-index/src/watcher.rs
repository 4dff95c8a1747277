use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{select, Receiver, Sender};
use notify::event::{ModifyKind, RenameMode};
use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use hx_core::{IndexConfig, Language};
use hx_storage::{DenseEmbedder, SparseEmbedder, VectorStore};

use crate::error::IndexerError;
use crate::hybrid::HybridIndex;
use crate::scanner::{GENERATED_PATTERNS, VENDOR_DIRS};

/// Net effect of everything observed for one path during a debounce window.
/// Later events overwrite earlier ones, so a create-then-delete within the
/// window coalesces to `Remove` and never touches the store with a doomed
/// `update_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PendingChange {
    Upsert,
    Remove,
}

/// A running filesystem watch over one [`HybridIndex`].
///
/// `start` performs a full `index_files()` bootstrap before watching begins,
/// so a caller always sees a consistent index the moment `start` returns.
/// Dropping (or explicitly `stop`ping) the handle joins the background
/// thread, which performs one final flush of any pending debounced change.
pub struct WatcherHandle<S: VectorStore> {
    index: Arc<Mutex<HybridIndex<S>>>,
    root: PathBuf,
    stop_tx: Sender<()>,
    worker: Option<JoinHandle<()>>,
}

impl<S: VectorStore> WatcherHandle<S> {
    /// Shared handle to the index being kept live. Callers use this to issue
    /// `search` queries while the watcher keeps it updated in the background.
    pub fn index(&self) -> Arc<Mutex<HybridIndex<S>>> {
        Arc::clone(&self.index)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stop watching and join the background thread. Idempotent.
    pub fn stop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl<S: VectorStore> Drop for WatcherHandle<S> {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

/// Bootstrap a [`HybridIndex`] over `config.root_path` with a full
/// `index_files()` pass, then start a recursive filesystem watch that keeps
/// it live: qualifying create/modify/remove events are coalesced with a
/// trailing-edge debounce (the timer resets on every qualifying event; a
/// flush happens only once `config.debounce_delay_ms` passes with no new
/// activity) and applied via `update_file`/`delete_file`.
///
/// `SIGINT`/`SIGTERM` are wired to `stop()` via a process-wide signal
/// handler, installed at most once regardless of how many watchers are
/// running.
#[tracing::instrument(skip(config, store, dense, sparse), fields(root = %config.root_path.display()))]
pub fn start<S: VectorStore + 'static>(
    config: IndexConfig,
    store: S,
    dense: Arc<dyn DenseEmbedder>,
    sparse: Arc<dyn SparseEmbedder>,
) -> Result<WatcherHandle<S>, IndexerError> {
    let root = config.root_path.clone();
    let debounce = Duration::from_millis(config.debounce_delay_ms.max(1));

    let mut index = HybridIndex::open(&config, store, dense, sparse)?;
    let indexed = index.index_files()?;
    tracing::info!(indexed, "initial bulk index complete, starting watch");
    let index = Arc::new(Mutex::new(index));

    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let mut watcher: RecommendedWatcher = notify::recommended_watcher(move |res| {
        let _ = event_tx.send(res);
    })
    .map_err(|e| IndexerError::Watcher(e.to_string()))?;
    watcher
        .watch(&root, RecursiveMode::Recursive)
        .map_err(|e| IndexerError::Watcher(e.to_string()))?;

    let (stop_tx, stop_rx) = crossbeam_channel::bounded(1);
    register_signal_sender(stop_tx.clone());

    let worker_index = Arc::clone(&index);
    let worker_root = root.clone();
    let worker = thread::spawn(move || {
        run_event_loop(&worker_index, &worker_root, &event_rx, &stop_rx, debounce);
        // Keep the watcher alive for the lifetime of the loop; it stops
        // producing events once dropped here.
        drop(watcher);
    });

    Ok(WatcherHandle {
        index,
        root,
        stop_tx,
        worker: Some(worker),
    })
}

fn run_event_loop<S: VectorStore>(
    index: &Arc<Mutex<HybridIndex<S>>>,
    root: &Path,
    event_rx: &Receiver<notify::Result<notify::Event>>,
    stop_rx: &Receiver<()>,
    debounce: Duration,
) {
    let mut pending: HashMap<PathBuf, PendingChange> = HashMap::new();
    let mut deadline: Option<Instant> = None;

    loop {
        let timeout = deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
            .unwrap_or(Duration::from_secs(3600));

        select! {
            recv(event_rx) -> msg => match msg {
                Ok(Ok(event)) => {
                    if handle_event(root, &event, &mut pending) {
                        deadline = Some(Instant::now() + debounce);
                    }
                }
                Ok(Err(err)) => {
                    tracing::warn!(error = %err, "filesystem watch error");
                }
                Err(_) => break,
            },
            recv(stop_rx) -> _ => break,
            default(timeout) => {
                if let Some(d) = deadline {
                    if Instant::now() >= d {
                        flush(index, &mut pending);
                        deadline = None;
                    }
                }
            }
        }
    }
    flush(index, &mut pending);
}

/// Records `event`'s effect on `pending`. Returns `true` if the debounce
/// timer should be (re)armed, i.e. at least one path in the event qualified.
fn handle_event(
    root: &Path,
    event: &notify::Event,
    pending: &mut HashMap<PathBuf, PendingChange>,
) -> bool {
    if let EventKind::Modify(ModifyKind::Name(rename_mode)) = event.kind {
        return handle_rename(root, rename_mode, &event.paths, pending);
    }

    let change = match event.kind {
        EventKind::Remove(_) => PendingChange::Remove,
        EventKind::Create(_) | EventKind::Modify(_) => PendingChange::Upsert,
        _ => return false,
    };

    let mut armed = false;
    for path in &event.paths {
        armed |= mark(root, path, change, pending);
    }
    armed
}

/// A rename reports its source and destination together as
/// `RenameMode::Both` (`event.paths = [from, to]`), or as two separate
/// events tagged `From`/`To`. Either way the source must be scheduled for
/// removal, not re-upserted — treating it as an update leaves a permanently
/// stale entry at the old path, since `update_file` on a path that no
/// longer exists just fails and gets logged. `RenameMode::Any` carries no
/// reliable path ordering, so its paths fall back to being treated as
/// updates.
fn handle_rename(
    root: &Path,
    mode: RenameMode,
    paths: &[PathBuf],
    pending: &mut HashMap<PathBuf, PendingChange>,
) -> bool {
    let mut armed = false;
    match mode {
        RenameMode::Both if paths.len() >= 2 => {
            armed |= mark(root, &paths[0], PendingChange::Remove, pending);
            armed |= mark(root, &paths[1], PendingChange::Upsert, pending);
        }
        RenameMode::From => {
            for path in paths {
                armed |= mark(root, path, PendingChange::Remove, pending);
            }
        }
        _ => {
            for path in paths {
                armed |= mark(root, path, PendingChange::Upsert, pending);
            }
        }
    }
    armed
}

/// Records `change` for `path` in `pending` if it's a watchable, qualifying
/// path. Returns whether it was recorded (and so should arm the debounce).
fn mark(
    root: &Path,
    path: &Path,
    change: PendingChange,
    pending: &mut HashMap<PathBuf, PendingChange>,
) -> bool {
    if !is_watchable_path(root, path) {
        return false;
    }
    if change == PendingChange::Upsert && path.is_dir() {
        return false;
    }
    pending.insert(path.to_path_buf(), change);
    true
}

/// A path qualifies if it sits under a recognized extension and does not
/// fall inside a hidden or vendor directory, or match a generated-file
/// pattern — the same policy `scanner::scan_files` applies to the bulk pass.
fn is_watchable_path(root: &Path, path: &Path) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return false;
    };
    for component in relative.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.starts_with('.') || VENDOR_DIRS.contains(&name.as_ref()) {
            return false;
        }
    }
    if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
        if GENERATED_PATTERNS.iter().any(|p| file_name.contains(p)) {
            return false;
        }
    }
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    Language::from_extension(extension).is_some()
}

fn flush<S: VectorStore>(index: &Arc<Mutex<HybridIndex<S>>>, pending: &mut HashMap<PathBuf, PendingChange>) {
    if pending.is_empty() {
        return;
    }
    let batch: Vec<(PathBuf, PendingChange)> = pending.drain().collect();
    let Ok(mut guard) = index.lock() else {
        return;
    };
    for (path, change) in batch {
        let result = match change {
            PendingChange::Upsert => guard.update_file(&path),
            PendingChange::Remove => guard.delete_file(&path),
        };
        if let Err(err) = result {
            tracing::warn!(path = %path.display(), error = %err, "watcher failed to apply change");
        }
    }
}

/// Registers `tx` to receive a signal on `SIGINT`/`SIGTERM`/process exit.
/// The underlying `ctrlc` handler can only be installed once per process;
/// this installs it lazily on the first watcher and fans out to every
/// watcher started since, via a process-wide registry.
fn register_signal_sender(tx: Sender<()>) {
    static SENDERS: OnceLock<Mutex<Vec<Sender<()>>>> = OnceLock::new();
    let senders = SENDERS.get_or_init(|| Mutex::new(Vec::new()));
    let mut guard = senders.lock().unwrap_or_else(|e| e.into_inner());
    if guard.is_empty() {
        let fanout = SENDERS.get().expect("just initialized above");
        let _ = ctrlc::set_handler(move || {
            if let Ok(list) = fanout.lock() {
                for sender in list.iter() {
                    let _ = sender.send(());
                }
            }
        });
    }
    guard.push(tx);
}
