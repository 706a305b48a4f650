//! Source tree watching for live reload.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::{Duration, Instant};

use notify::{EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc as async_mpsc;

/// Window in which repeated events for one path are collapsed.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Change observed in the source tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// HTML page was modified
    PageModified(PathBuf),

    /// Any other file was modified
    AssetModified(PathBuf),

    Created(PathBuf),

    Deleted(PathBuf),
}

impl WatchEvent {
    pub fn path(&self) -> &Path {
        match self {
            Self::PageModified(p) | Self::AssetModified(p) | Self::Created(p) | Self::Deleted(p) => p,
        }
    }
}

/// Watches the site source directory.
///
/// Dropping the watcher closes the event channel.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Watch `root` recursively.
    pub fn new(root: &Path) -> Result<(Self, async_mpsc::Receiver<WatchEvent>), notify::Error> {
        let (raw_tx, raw_rx) = mpsc::channel::<notify::Event>();
        let (tx, rx) = async_mpsc::channel(100);

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            if let Ok(event) = res {
                let _ = raw_tx.send(event);
            }
        })?;
        watcher.watch(root, RecursiveMode::Recursive)?;

        std::thread::spawn(move || {
            let mut debouncer = Debouncer::new(DEBOUNCE);

            for event in raw_rx {
                let changes = event
                    .paths
                    .iter()
                    .filter_map(|path| classify_event(path, &event.kind));

                for change in changes {
                    if !debouncer.admit(change.path(), Instant::now()) {
                        continue;
                    }
                    if tx.blocking_send(change).is_err() {
                        return;
                    }
                }
            }
        });

        Ok((Self { _watcher: watcher }, rx))
    }
}

/// Drops events for a path seen less than `window` ago.
struct Debouncer {
    window: Duration,
    seen: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    fn new(window: Duration) -> Self {
        Self {
            window,
            seen: HashMap::new(),
        }
    }

    fn admit(&mut self, path: &Path, now: Instant) -> bool {
        if let Some(at) = self.seen.get(path) {
            if now.duration_since(*at) < self.window {
                return false;
            }
        }
        self.seen.retain(|_, at| now.duration_since(*at) < self.window);
        self.seen.insert(path.to_path_buf(), now);
        true
    }
}

/// Map a notify event on `path` to a [`WatchEvent`].
///
/// Editor swap and backup files are ignored.
fn classify_event(path: &Path, kind: &EventKind) -> Option<WatchEvent> {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.starts_with('.') || name.ends_with('~') {
        return None;
    }

    let path = path.to_path_buf();
    let is_page = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("html"));

    match kind {
        EventKind::Create(_) => Some(WatchEvent::Created(path)),
        EventKind::Remove(_) => Some(WatchEvent::Deleted(path)),
        EventKind::Modify(_) if is_page => Some(WatchEvent::PageModified(path)),
        EventKind::Modify(_) => Some(WatchEvent::AssetModified(path)),
        _ => None,
    }
}
