//! Application state and main event loop.
//!
//! This module implements The Elm Architecture (TEA):
//! - [`Model`]: The complete application state
//! - [`Message`]: All possible events and actions
//! - [`update`]: Pure function for state transitions
//! - [`App::run`]: Main event loop with rendering
//!
//! Renders run on a background worker; the loop hands it the model's
//! pending [`crate::preview::RenderRequest`] and feeds finished outcomes
//! back through [`Model::accept_render`].

mod effects;
mod event_loop;
mod input;
mod model;
mod update;

pub use model::{Model, ToastLevel};
pub use update::{Message, update};

use std::path::PathBuf;
use std::sync::Arc;

use crate::export::{DirectorySink, ExportSink};
use crate::flowchart::{DiagramEngine, FlowchartEngine};
use crate::raster::Rasterizer;
use crate::theme::Palette;

/// Main application struct that owns the terminal and runs the event loop.
pub struct App {
    file_path: Option<PathBuf>,
    watch_enabled: bool,
    live_render: bool,
    plain: bool,
    images_enabled: bool,
    force_half_cell: bool,
    palette: Palette,
    export_scale: f32,
    config_global_path: Option<PathBuf>,
    config_local_path: Option<PathBuf>,
    engine: Arc<dyn DiagramEngine>,
    rasterizer: Option<Arc<dyn Rasterizer>>,
    sink: Box<dyn ExportSink>,
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("file_path", &self.file_path)
            .field("watch_enabled", &self.watch_enabled)
            .field("live_render", &self.live_render)
            .field("export_scale", &self.export_scale)
            .finish_non_exhaustive()
    }
}

impl App {
    /// Create a new application, optionally bound to a source file.
    pub fn new(file_path: Option<PathBuf>) -> Self {
        Self {
            file_path,
            watch_enabled: false,
            live_render: true,
            plain: false,
            images_enabled: true,
            force_half_cell: false,
            palette: Palette::default(),
            export_scale: 1.0,
            config_global_path: None,
            config_local_path: None,
            engine: Arc::new(FlowchartEngine),
            rasterizer: None,
            sink: Box::new(DirectorySink::default()),
        }
    }

    /// Enable or disable file watching.
    #[must_use]
    pub const fn with_watch(mut self, enabled: bool) -> Self {
        self.watch_enabled = enabled;
        self
    }

    /// Re-render after edits, or only on Render/Clear.
    #[must_use]
    pub const fn with_live_render(mut self, enabled: bool) -> Self {
        self.live_render = enabled;
        self
    }

    /// Disable highlighting and completion.
    #[must_use]
    pub const fn with_plain(mut self, plain: bool) -> Self {
        self.plain = plain;
        self
    }

    /// Enable or disable terminal graphics in the preview.
    #[must_use]
    pub const fn with_images_enabled(mut self, enabled: bool) -> Self {
        self.images_enabled = enabled;
        self
    }

    /// Skip the terminal query and use half-block graphics.
    #[must_use]
    pub const fn with_force_half_cell(mut self, force: bool) -> Self {
        self.force_half_cell = force;
        self
    }

    #[must_use]
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    #[must_use]
    pub const fn with_export_scale(mut self, scale: f32) -> Self {
        self.export_scale = scale;
        self
    }

    /// Write exports into `dir`.
    #[must_use]
    pub fn with_output_dir(mut self, dir: PathBuf) -> Self {
        self.sink = Box::new(DirectorySink::new(dir));
        self
    }

    #[must_use]
    pub fn with_export_sink(mut self, sink: Box<dyn ExportSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn Rasterizer>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    /// Set config paths to show in help.
    #[must_use]
    pub fn with_config_paths(
        mut self,
        global_path: Option<PathBuf>,
        local_path: Option<PathBuf>,
    ) -> Self {
        self.config_global_path = global_path;
        self.config_local_path = local_path;
        self
    }
}
