//! Timing scopes and the render debug log.
//!
//! `--perf` prints scope timings to stderr; `--render-debug-log PATH` writes
//! timestamped events (render requests, stale discards, frame draws) to a
//! file so the TUI stays undisturbed.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{LazyLock, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

static ENABLED: AtomicBool = AtomicBool::new(false);
static DEBUG_LOGGER: LazyLock<Mutex<DebugLogger>> =
    LazyLock::new(|| Mutex::new(DebugLogger::new()));

/// Measures wall time from creation until drop.
#[derive(Debug)]
pub struct Scope {
    name: &'static str,
    start: Instant,
}

impl Drop for Scope {
    fn drop(&mut self) {
        let elapsed_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        tracing::trace!(scope = self.name, elapsed_ms, "perf scope");
        if is_enabled() {
            eprintln!("[perf] {}: {:.2} ms", self.name, elapsed_ms);
        }
    }
}

#[derive(Debug)]
struct DebugLogger {
    enabled: bool,
    start: Instant,
    writer: Option<BufWriter<File>>,
}

impl DebugLogger {
    fn new() -> Self {
        Self {
            enabled: false,
            start: Instant::now(),
            writer: None,
        }
    }
}

fn logger() -> MutexGuard<'static, DebugLogger> {
    // A panic mid-write leaves nothing inconsistent worth refusing over.
    DEBUG_LOGGER.lock().unwrap_or_else(PoisonError::into_inner)
}

pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
}

pub fn scope(name: &'static str) -> Scope {
    Scope {
        name,
        start: Instant::now(),
    }
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Start (or stop, with `None`) writing the render debug log.
///
/// # Errors
///
/// Returns an error if the log file cannot be created or written.
pub fn set_debug_log_path(path: Option<&Path>) -> std::io::Result<()> {
    let mut logger = logger();
    if let Some(path) = path {
        let file = File::create(path)?;
        logger.enabled = true;
        logger.start = Instant::now();
        let mut writer = BufWriter::new(file);
        writeln!(writer, "flowchartify render debug log start")?;
        writer.flush()?;
        logger.writer = Some(writer);
    } else {
        logger.enabled = false;
        logger.writer = None;
    }
    Ok(())
}

pub fn is_debug_log_enabled() -> bool {
    logger().enabled
}

/// Steps of a render's life, as they are named in the debug log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderEvent {
    /// Handed to the worker.
    Request,
    /// Skipped by the worker in favour of a newer request.
    Coalesce,
    /// Parsed and rendered.
    Done,
    /// Parse or render failed.
    Error,
    /// Rendered, but the terminal raster could not be made.
    RasterError,
    /// Finished after a newer request or a Clear.
    Stale,
    /// Shown in the preview pane.
    Mounted,
    /// Never reached the worker.
    Abort,
}

impl RenderEvent {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Request => "render.request",
            Self::Coalesce => "render.coalesce",
            Self::Done => "render.done",
            Self::Error => "render.error",
            Self::RasterError => "render.raster_error",
            Self::Stale => "render.stale",
            Self::Mounted => "render.mounted",
            Self::Abort => "render.abort",
        }
    }
}

/// Log one render step for request `seq`.
pub fn log_render(event: RenderEvent, seq: u64, detail: impl AsRef<str>) {
    let detail = detail.as_ref();
    if detail.is_empty() {
        log_event(event.name(), format!("seq={seq}"));
    } else {
        log_event(event.name(), format!("seq={seq} {detail}"));
    }
}

pub fn log_event(name: &str, detail: impl AsRef<str>) {
    let mut logger = logger();
    if !logger.enabled {
        return;
    }
    let elapsed_ms = logger.start.elapsed().as_secs_f64() * 1000.0;
    if let Some(writer) = logger.writer.as_mut() {
        let _ = writeln!(
            writer,
            "[{elapsed_ms:>10.3} ms] {name}: {}",
            detail.as_ref()
        );
        let _ = writer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_set_enabled_toggles_runtime_flag() {
        set_enabled(true);
        assert!(is_enabled());

        set_enabled(false);
        assert!(!is_enabled());
    }

    #[test]
    fn test_render_event_names_are_distinct() {
        let events = [
            RenderEvent::Request,
            RenderEvent::Coalesce,
            RenderEvent::Done,
            RenderEvent::Error,
            RenderEvent::RasterError,
            RenderEvent::Stale,
            RenderEvent::Mounted,
            RenderEvent::Abort,
        ];
        let mut names: Vec<_> = events.iter().map(|event| event.name()).collect();
        assert!(names.iter().all(|name| name.starts_with("render.")));
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), events.len());
    }

    // One test owns the global debug log; parallel tests would race on it.
    #[test]
    fn test_debug_log_traces_render_lifecycle_until_disabled() {
        let temp_file = NamedTempFile::new().unwrap();
        set_debug_log_path(Some(temp_file.path())).unwrap();
        assert!(is_debug_log_enabled());

        log_render(RenderEvent::Request, 9001, "generation=0");
        log_render(RenderEvent::Request, 9002, "generation=1");
        log_render(RenderEvent::Coalesce, 9002, "skipped=9001");
        log_render(RenderEvent::Done, 9002, "symbols=9 edges=9");
        log_render(RenderEvent::Stale, 9001, "latest=9002");
        log_render(RenderEvent::Mounted, 9002, "error=false image=false");
        log_render(RenderEvent::Abort, 9003, "");
        set_debug_log_path(None).unwrap();
        log_render(RenderEvent::Error, 9004, "after disable");

        let content = std::fs::read_to_string(temp_file.path()).unwrap();
        assert!(content.starts_with("flowchartify render debug log start"));
        let order = [
            "render.request: seq=9001 generation=0",
            "render.request: seq=9002 generation=1",
            "render.coalesce: seq=9002 skipped=9001",
            "render.done: seq=9002 symbols=9 edges=9",
            "render.stale: seq=9001 latest=9002",
            "render.mounted: seq=9002 error=false image=false",
        ];
        let positions: Vec<_> = order
            .iter()
            .map(|line| content.find(line).unwrap_or_else(|| panic!("missing {line}")))
            .collect();
        assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(content.lines().any(|line| line.ends_with("render.abort: seq=9003")));
        assert!(!content.contains("after disable"));
    }
}
