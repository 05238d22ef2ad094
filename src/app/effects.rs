use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::app::{App, Message, Model, ToastLevel};
use crate::export::{ExportError, export_png};
use crate::raster::{Rasterizer, ResvgRasterizer};
use crate::watcher::FileWatcher;

impl App {
    pub(super) fn make_file_watcher(path: &Path) -> notify::Result<FileWatcher> {
        FileWatcher::new(path, Duration::from_millis(200))
    }

    /// The shared rasterizer, loading system fonts on first use.
    pub(super) fn rasterizer(&mut self) -> Arc<dyn Rasterizer> {
        Arc::clone(
            self.rasterizer
                .get_or_insert_with(|| Arc::new(ResvgRasterizer::new())),
        )
    }

    pub(super) fn handle_message_side_effects(&mut self, model: &mut Model, msg: &Message) {
        match msg {
            Message::Download => self.export_diagram(model),
            Message::Save => save_source(model),
            Message::FileChanged => reload_source(model),
            _ => {}
        }
    }

    fn export_diagram(&mut self, model: &mut Model) {
        let rasterizer = self.rasterizer();
        let result = export_png(
            model.preview.mounted(),
            rasterizer.as_ref(),
            self.sink.as_mut(),
            self.export_scale,
        );
        match result {
            Ok(path) => {
                model.show_toast(ToastLevel::Info, format!("Saved {}", path.display()));
            }
            Err(err) => {
                if !matches!(err, ExportError::NothingToExport) {
                    tracing::warn!(%err, "export failed");
                }
                crate::perf::log_event("export.error", err.to_string());
                model.alert = Some(err.alert_message());
            }
        }
    }
}

fn save_source(model: &mut Model) {
    match model.save_to_disk() {
        Ok(path) => {
            tracing::info!(path = %path.display(), "saved source");
            model.show_toast(ToastLevel::Info, format!("Saved {}", path.display()));
            if model.quit_confirmed {
                model.should_quit = true;
            }
        }
        Err(err) => {
            tracing::warn!(%err, "save failed");
            model.quit_confirmed = false;
            model.show_toast(ToastLevel::Error, format!("Save failed: {err}"));
        }
    }
}

fn reload_source(model: &mut Model) {
    if model.session.buffer.is_dirty() {
        if model.file_disk_hash() != model.disk_hash {
            model.show_toast(
                ToastLevel::Warning,
                "File changed on disk; keeping unsaved edits (Ctrl+S overwrites)",
            );
        }
        return;
    }
    match model.reload_from_disk() {
        Ok(true) => {
            tracing::debug!(path = ?model.file_path, "reloaded source");
            model.request_render();
            model.show_toast(ToastLevel::Info, "Reloaded from disk");
        }
        Ok(false) => {}
        Err(err) => {
            model.show_toast(ToastLevel::Error, format!("Reload failed: {err}"));
            crate::perf::log_event("reload.error", format!("{err:#}"));
        }
    }
}
