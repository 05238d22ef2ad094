use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use ratatui::layout::Rect;
use ratatui_image::picker::{Picker, ProtocolType};
use ratatui_image::protocol::StatefulProtocol;

use crate::editor::CompletionState;
use crate::highlight::HighlightSpan;
use crate::preview::{Preview, PreviewState, RenderOutcome, RenderRequest};
use crate::session::Session;
use crate::theme::Palette;
use crate::ui::ScreenLayout;

/// Hash a byte slice for content comparison.
pub(super) fn hash_bytes(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
struct Toast {
    level: ToastLevel,
    message: String,
    expires_at: Instant,
}

/// The complete application state.
///
/// All state lives here - no global or scattered state.
pub struct Model {
    /// Editor text and render generation
    pub session: Session,
    /// What the preview pane shows, plus the stale-render guard
    pub preview: Preview,
    pub palette: Palette,
    /// Source file the buffer is bound to, if any
    pub file_path: Option<PathBuf>,
    pub terminal_size: (u16, u16),
    /// First buffer line shown in the editor pane
    pub editor_scroll_offset: usize,
    /// First image row shown when the diagram is taller than the pane
    pub preview_scroll_offset: u16,
    pub completion: Option<CompletionState>,
    /// Re-render (debounced) after every edit
    pub live_render: bool,
    /// No highlighting, no completion
    pub plain: bool,
    pub watch_enabled: bool,
    pub images_enabled: bool,
    pub picker: Option<Picker>,
    /// Terminal image for the mounted diagram: (protocol, width cols, height rows)
    pub preview_protocol: Option<(StatefulProtocol, u16, u16)>,
    pub config_global_path: Option<PathBuf>,
    pub config_local_path: Option<PathBuf>,
    pub help_visible: bool,
    pub help_scroll_offset: usize,
    /// Blocking message; input is swallowed until it is dismissed
    pub alert: Option<String>,
    pub should_quit: bool,
    /// Set after the first Ctrl+Q with unsaved changes
    pub quit_confirmed: bool,
    /// Hash of the file content last loaded or saved
    pub disk_hash: Option<u64>,
    toast: Option<Toast>,
    render_pending: bool,
    text_edited: bool,
    highlight_cache: Option<(u64, Vec<Vec<HighlightSpan>>)>,
}

impl std::fmt::Debug for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model")
            .field("file_path", &self.file_path)
            .field("generation", &self.session.generation())
            .field("preview_seq", &self.preview.latest_seq())
            .field("live_render", &self.live_render)
            .field("watch_enabled", &self.watch_enabled)
            .finish_non_exhaustive()
    }
}

impl Model {
    /// Create a model editing `text`.
    pub fn new(file_path: Option<PathBuf>, text: &str, terminal_size: (u16, u16)) -> Self {
        Self {
            session: Session::new(text),
            file_path,
            terminal_size,
            ..Self::default()
        }
    }

    /// Set the image picker.
    #[must_use]
    pub fn with_picker(mut self, picker: Option<Picker>) -> Self {
        self.picker = picker;
        self
    }

    #[must_use]
    pub fn with_palette(mut self, palette: Palette) -> Self {
        self.palette = palette;
        self
    }

    /// Screen regions for the current terminal size.
    pub fn layout(&self) -> ScreenLayout {
        let (width, height) = self.terminal_size;
        crate::ui::screen_layout(
            Rect::new(0, 0, width, height),
            self.active_toast().is_some(),
        )
    }

    pub fn editor_visible_rows(&self) -> usize {
        usize::from(self.layout().editor_inner.height)
    }

    /// Whether the preview goes through a terminal graphics protocol.
    pub const fn graphics_active(&self) -> bool {
        self.images_enabled && self.picker.is_some()
    }

    pub fn uses_halfblocks(&self) -> bool {
        self.picker
            .as_ref()
            .is_some_and(|picker| matches!(picker.protocol_type(), ProtocolType::Halfblocks))
    }

    /// Unsaved edits to a bound file.
    pub fn is_dirty(&self) -> bool {
        self.file_path.is_some() && self.session.buffer.is_dirty()
    }

    /// Hash the contents of the bound file, `None` if it can't be read.
    pub fn file_disk_hash(&self) -> Option<u64> {
        let bytes = std::fs::read(self.file_path.as_ref()?).ok()?;
        Some(hash_bytes(&bytes))
    }

    pub(super) fn show_toast(&mut self, level: ToastLevel, message: impl Into<String>) {
        self.toast = Some(Toast {
            level,
            message: message.into(),
            expires_at: Instant::now() + Duration::from_secs(4),
        });
    }

    pub(super) fn expire_toast(&mut self, now: Instant) -> bool {
        if self
            .toast
            .as_ref()
            .is_some_and(|toast| toast.expires_at <= now)
        {
            self.toast = None;
            return true;
        }
        false
    }

    pub fn active_toast(&self) -> Option<(&str, ToastLevel)> {
        self.toast
            .as_ref()
            .map(|toast| (toast.message.as_str(), toast.level))
    }

    /// Ask the event loop for a render of the current text.
    pub(super) const fn request_render(&mut self) {
        self.render_pending = true;
    }

    pub const fn render_pending(&self) -> bool {
        self.render_pending
    }

    /// Note that the buffer text changed.
    pub(super) const fn mark_edited(&mut self) {
        self.text_edited = true;
    }

    /// Whether the text changed since the last call.
    pub(super) fn take_edited(&mut self) -> bool {
        std::mem::replace(&mut self.text_edited, false)
    }

    /// Turn a pending render into a request for the worker.
    ///
    /// Blank text clears the preview instead and yields nothing.
    pub fn take_render_request(&mut self) -> Option<RenderRequest> {
        if !std::mem::replace(&mut self.render_pending, false) {
            return None;
        }
        let text = self.session.text();
        let style = crate::theme::style_config(&self.palette);
        let target_width_px = self.preview_target_width_px();
        let request =
            self.preview
                .request(self.session.generation(), &text, style, target_width_px);
        if request.is_none() {
            self.preview_protocol = None;
            self.preview_scroll_offset = 0;
        }
        request
    }

    /// Raster width that fills the preview pane, when graphics are on.
    fn preview_target_width_px(&self) -> Option<u32> {
        if !self.images_enabled {
            return None;
        }
        let picker = self.picker.as_ref()?;
        let columns = self.layout().preview_inner.width;
        Some(crate::image::preview_width_px(columns, picker.font_size().0))
    }

    /// Mount a finished render if it is still the latest one.
    pub fn accept_render(&mut self, outcome: RenderOutcome) -> bool {
        let seq = outcome.seq;
        if !self.preview.accept(outcome) {
            return false;
        }
        self.preview_scroll_offset = 0;
        self.rebuild_preview_protocol();
        crate::perf::log_render(
            crate::perf::RenderEvent::Mounted,
            seq,
            format!(
                "error={} image={}",
                self.preview.error().is_some(),
                self.preview_protocol.is_some()
            ),
        );
        true
    }

    /// Drop the in-flight marker for a request the worker never received.
    pub fn abort_render(&mut self, seq: u64) {
        self.preview.abort(seq);
        crate::perf::log_render(crate::perf::RenderEvent::Abort, seq, "");
    }

    /// Empty the preview and drop its terminal image.
    pub(super) fn clear_preview(&mut self) {
        self.preview.clear();
        self.preview_protocol = None;
        self.preview_scroll_offset = 0;
    }

    fn rebuild_preview_protocol(&mut self) {
        self.preview_protocol = None;
        if !self.images_enabled {
            return;
        }
        let Some(picker) = &self.picker else { return };
        let PreviewState::Diagram(rendered) = self.preview.state() else {
            return;
        };
        let Some(raster) = &rendered.raster else {
            return;
        };

        let use_halfblocks = matches!(picker.protocol_type(), ProtocolType::Halfblocks);
        let quantize = use_halfblocks && !crate::image::supports_truecolor_terminal();
        let image = if quantize {
            crate::image::quantize_to_ansi256(raster)
        } else {
            raster.clone()
        };
        let protocol = picker.new_resize_protocol(image);
        let target_width_cols = self.layout().preview_inner.width;
        let (width_cols, height_rows) = protocol_render_size(&protocol, target_width_cols);
        crate::perf::log_event(
            "image.preview.protocol",
            format!(
                "width_cols={width_cols} height_rows={height_rows} halfblocks={use_halfblocks} ansi256={quantize}"
            ),
        );
        self.preview_protocol = Some((protocol, width_cols, height_rows));
    }

    /// Largest useful preview scroll offset.
    pub fn max_preview_scroll(&self) -> u16 {
        let visible = self.layout().preview_inner.height;
        self.preview_protocol
            .as_ref()
            .map_or(0, |(_, _, height)| height.saturating_sub(visible))
    }

    /// Recompute syntax highlighting if the text changed since last time.
    pub fn refresh_highlight(&mut self) {
        if self.plain {
            self.highlight_cache = None;
            return;
        }
        let text = self.session.text();
        let hash = hash_bytes(text.as_bytes());
        if self
            .highlight_cache
            .as_ref()
            .is_some_and(|(cached, _)| *cached == hash)
        {
            return;
        }
        let _scope = crate::perf::scope("highlight.refresh");
        self.highlight_cache = Some((hash, crate::highlight::highlight_source(&text)));
    }

    /// Highlighted lines, if they match the current text.
    pub fn highlighted_lines(&self) -> Option<&[Vec<HighlightSpan>]> {
        let (_, lines) = self.highlight_cache.as_ref()?;
        (lines.len() == self.session.buffer.line_count()).then_some(lines.as_slice())
    }

    /// Replace the buffer with the bound file's content when it changed.
    ///
    /// Returns `Ok(false)` when the content matches what was last loaded
    /// or saved.
    pub(super) fn reload_from_disk(&mut self) -> Result<bool> {
        let Some(path) = self.file_path.clone() else {
            return Ok(false);
        };
        let bytes =
            std::fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        let hash = hash_bytes(&bytes);
        if self.disk_hash == Some(hash) {
            return Ok(false);
        }
        let text = String::from_utf8_lossy(&bytes);
        self.session.set_text(&text);
        self.session.buffer.mark_clean();
        self.disk_hash = Some(hash);
        self.completion = None;
        let max = self.session.buffer.line_count().saturating_sub(1);
        self.editor_scroll_offset = self.editor_scroll_offset.min(max);
        Ok(true)
    }

    /// Write the buffer to the bound file.
    pub(super) fn save_to_disk(&mut self) -> Result<PathBuf> {
        let Some(path) = self.file_path.clone() else {
            anyhow::bail!("No source file; start flowchartify with a FILE to save");
        };
        write_source(&path, &self.session.text())?;
        self.session.buffer.mark_clean();
        self.disk_hash = self.file_disk_hash();
        Ok(path)
    }
}

fn write_source(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

pub(super) fn protocol_render_size(protocol: &StatefulProtocol, target_width_cols: u16) -> (u16, u16) {
    use ratatui_image::Resize;
    let resize = if matches!(
        protocol.protocol_type(),
        ratatui_image::protocol::StatefulProtocolType::Halfblocks(_)
    ) {
        Resize::Scale(Some(image::imageops::FilterType::CatmullRom))
    } else {
        Resize::Scale(None)
    };
    let area = Rect::new(0, 0, target_width_cols, u16::MAX);
    let rect = protocol.size_for(resize, area);
    (rect.width.max(1), rect.height.max(1))
}

// Implement Default for Model to allow std::mem::take
impl Default for Model {
    fn default() -> Self {
        Self {
            session: Session::default(),
            preview: Preview::default(),
            palette: Palette::default(),
            file_path: None,
            terminal_size: (80, 24),
            editor_scroll_offset: 0,
            preview_scroll_offset: 0,
            completion: None,
            live_render: true,
            plain: false,
            watch_enabled: false,
            images_enabled: true,
            picker: None,
            preview_protocol: None,
            config_global_path: None,
            config_local_path: None,
            help_visible: false,
            help_scroll_offset: 0,
            alert: None,
            should_quit: false,
            quit_confirmed: false,
            disk_hash: None,
            toast: None,
            render_pending: false,
            text_edited: false,
            highlight_cache: None,
        }
    }
}
