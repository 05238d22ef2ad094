//! Watching the source file for `--watch`.
//!
//! The parent directory is watched rather than the file itself: editors
//! that save by renaming a temp file over the original would otherwise
//! detach the watch after the first save.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};

use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

/// Debounced change notifications for one file.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    rx: Receiver<notify::Result<Event>>,
    watch_root: PathBuf,
    target_path: PathBuf,
    target_name: Option<OsString>,
    debounce: Duration,
    pending_since: Option<Instant>,
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("target_path", &self.target_path)
            .field("debounce", &self.debounce)
            .finish_non_exhaustive()
    }
}

impl FileWatcher {
    /// Watch `path`, which does not need to exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be created or the parent
    /// directory cannot be watched.
    pub fn new(path: impl AsRef<Path>, debounce: Duration) -> notify::Result<Self> {
        let target_path = canonical_target(path.as_ref());
        let target_name = target_path.file_name().map(std::ffi::OsStr::to_os_string);
        let watch_root = watch_root_for(&target_path);

        let (tx, rx) = mpsc::channel();
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.send(res);
        })?;
        watcher.watch(&watch_root, RecursiveMode::NonRecursive)?;
        tracing::debug!(path = %target_path.display(), "watching source file");

        Ok(Self {
            _watcher: watcher,
            rx,
            watch_root,
            target_path,
            target_name,
            debounce,
            pending_since: None,
        })
    }

    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    /// True once a change has been quiet for the debounce interval.
    pub fn take_change_ready(&mut self) -> bool {
        self.take_change_ready_at(Instant::now())
    }

    fn take_change_ready_at(&mut self, now: Instant) -> bool {
        let mut relevant = 0_u32;
        while let Ok(event) = self.rx.try_recv() {
            match event {
                Ok(event) if self.is_relevant(&event) => relevant += 1,
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(%err, "file watcher error");
                    crate::perf::log_event("watcher.error", err.to_string());
                }
            }
        }
        if relevant > 0 {
            crate::perf::log_event(
                "watcher.change",
                format!("events={relevant} path={}", self.target_path.display()),
            );
            self.pending_since = Some(now);
        }

        match self.pending_since {
            Some(since) if now.saturating_duration_since(since) >= self.debounce => {
                self.pending_since = None;
                true
            }
            _ => false,
        }
    }

    fn is_relevant(&self, event: &Event) -> bool {
        // Our own reads must not look like edits.
        if matches!(
            event.kind,
            EventKind::Access(
                AccessKind::Open(_) | AccessKind::Read | AccessKind::Close(AccessMode::Read)
            )
        ) {
            return false;
        }
        event.paths.iter().any(|path| {
            path == &self.watch_root
                || path == &self.target_path
                || self
                    .target_name
                    .as_ref()
                    .is_some_and(|name| path.file_name() == Some(name.as_os_str()))
        })
    }
}

/// Canonical form of `path`, resolving through the parent when the file
/// itself is missing.
fn canonical_target(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let parent = watch_root_for(path);
    match (parent.canonicalize(), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

fn watch_root_for(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, ModifyKind};
    use tempfile::tempdir;

    fn event(kind: EventKind, path: PathBuf) -> Event {
        Event {
            kind,
            paths: vec![path],
            attrs: notify::event::EventAttributes::new(),
        }
    }

    #[test]
    fn test_missing_file_resolves_through_parent() {
        let dir = tempdir().unwrap();
        let canonical_dir = dir.path().canonicalize().unwrap();
        let watcher =
            FileWatcher::new(dir.path().join("new.flow"), Duration::from_millis(10)).unwrap();
        assert_eq!(watcher.target_path(), canonical_dir.join("new.flow"));
    }

    #[test]
    fn test_writes_are_relevant_and_reads_are_not() {
        let dir = tempdir().unwrap();
        let path = dir.path().canonicalize().unwrap().join("chart.flow");
        std::fs::write(&path, "st=>start: A").unwrap();
        let watcher = FileWatcher::new(&path, Duration::from_millis(10)).unwrap();

        let write = EventKind::Modify(ModifyKind::Data(DataChange::Content));
        assert!(watcher.is_relevant(&event(write, path.clone())));
        let closed = EventKind::Access(AccessKind::Close(AccessMode::Write));
        assert!(watcher.is_relevant(&event(closed, path.clone())));
        let read = EventKind::Access(AccessKind::Open(AccessMode::Read));
        assert!(!watcher.is_relevant(&event(read, path.clone())));

        let sibling = path.with_file_name("other.flow");
        assert!(!watcher.is_relevant(&event(write, sibling)));
    }

    #[test]
    fn test_change_waits_for_debounce() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("chart.flow");
        let mut watcher = FileWatcher::new(&path, Duration::from_millis(200)).unwrap();
        let start = Instant::now();
        watcher.pending_since = Some(start);
        assert!(!watcher.take_change_ready_at(start + Duration::from_millis(50)));
        assert!(watcher.take_change_ready_at(start + Duration::from_millis(250)));
        assert!(!watcher.take_change_ready_at(start + Duration::from_millis(300)));
    }

    #[test]
    fn test_real_file_modification_detected() {
        let dir = tempdir().unwrap();
        let path = dir.path().canonicalize().unwrap().join("watched.flow");
        std::fs::write(&path, "st=>start: A").unwrap();
        let mut watcher = FileWatcher::new(&path, Duration::from_millis(50)).unwrap();

        // Give the backend time to register the watch.
        std::thread::sleep(Duration::from_millis(500));
        std::fs::write(&path, "st=>start: B").unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut detected = false;
        while Instant::now() < deadline {
            if watcher.take_change_ready() {
                detected = true;
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        assert!(detected, "modification not reported within 5 seconds");
    }
}
