use std::io::stdout;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::event;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture};
use crossterm::execute;
use ratatui::DefaultTerminal;

use crate::app::{App, Message, Model, ToastLevel, update};
use crate::preview::RenderWorker;
use crate::session::DEFAULT_SOURCE;
use crate::watcher::FileWatcher;

use super::model::hash_bytes;

/// Quiet period after the last edit before a live render starts.
pub(super) const LIVE_RENDER_DELAY_MS: u64 = 150;

pub(super) struct ResizeDebouncer {
    delay_ms: u64,
    pending: Option<(u16, u16, u64)>,
}

impl ResizeDebouncer {
    pub(super) const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            pending: None,
        }
    }

    pub(super) const fn queue(&mut self, width: u16, height: u16, now_ms: u64) {
        self.pending = Some((width, height, now_ms));
    }

    pub(super) fn take_ready(&mut self, now_ms: u64) -> Option<(u16, u16)> {
        let (width, height, queued_at) = self.pending?;
        if now_ms.saturating_sub(queued_at) >= self.delay_ms {
            self.pending = None;
            Some((width, height))
        } else {
            None
        }
    }

    pub(super) const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

/// Delays live renders until typing pauses.
pub(super) struct LiveRenderDebouncer {
    delay_ms: u64,
    queued_at: Option<u64>,
}

impl LiveRenderDebouncer {
    pub(super) const fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            queued_at: None,
        }
    }

    /// Restart the quiet period.
    pub(super) const fn queue(&mut self, now_ms: u64) {
        self.queued_at = Some(now_ms);
    }

    pub(super) fn take_ready(&mut self, now_ms: u64) -> bool {
        match self.queued_at {
            Some(queued_at) if now_ms.saturating_sub(queued_at) >= self.delay_ms => {
                self.queued_at = None;
                true
            }
            _ => false,
        }
    }

    pub(super) const fn cancel(&mut self) {
        self.queued_at = None;
    }

    pub(super) const fn is_pending(&self) -> bool {
        self.queued_at.is_some()
    }
}

impl App {
    /// Run the main event loop.
    ///
    /// # Errors
    ///
    /// Returns an error if the source file cannot be read, the terminal
    /// cannot be initialized, or the event loop hits an I/O failure.
    pub fn run(&mut self) -> Result<()> {
        let _run_scope = crate::perf::scope("app.run.total");

        // Create image picker BEFORE initializing terminal (queries stdio)
        let picker = if self.images_enabled {
            let _picker_scope = crate::perf::scope("app.create_picker");
            crate::image::create_picker(self.force_half_cell)
        } else {
            None
        };

        let (text, disk_hash) = self.load_source()?;

        let init_scope = crate::perf::scope("app.ratatui_init");
        let mut terminal = ratatui::try_init().context(
            "Failed to initialize terminal; flowchartify requires an interactive terminal",
        )?;
        let size = terminal.size()?;
        drop(init_scope);

        let mut model = self
            .build_model(&text, (size.width, size.height))
            .with_picker(picker);
        model.disk_hash = disk_hash;

        let result = self.event_loop(&mut terminal, &mut model);

        let _ = execute!(stdout(), DisableMouseCapture);
        ratatui::restore();

        result
    }

    /// Initial buffer text and its on-disk hash.
    ///
    /// A missing file starts empty; no file at all starts from the example.
    pub(super) fn load_source(&self) -> Result<(String, Option<u64>)> {
        let Some(path) = &self.file_path else {
            return Ok((DEFAULT_SOURCE.to_string(), None));
        };
        match std::fs::read(path) {
            Ok(bytes) => Ok((
                String::from_utf8_lossy(&bytes).into_owned(),
                Some(hash_bytes(&bytes)),
            )),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "source file missing, starting empty");
                Ok((String::new(), None))
            }
            Err(err) => Err(err).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    /// The starting model. Live mode renders the initial text right away.
    pub(super) fn build_model(&self, text: &str, terminal_size: (u16, u16)) -> Model {
        let mut model = Model::new(self.file_path.clone(), text, terminal_size)
            .with_palette(self.palette.clone());
        model.watch_enabled = self.watch_enabled && self.file_path.is_some();
        model.live_render = self.live_render;
        model.plain = self.plain;
        model.images_enabled = self.images_enabled;
        model
            .config_global_path
            .clone_from(&self.config_global_path);
        model.config_local_path.clone_from(&self.config_local_path);
        if model.live_render {
            model.request_render();
        }
        model
    }

    /// Update the model with `msg`, then run its side effects.
    pub(super) fn dispatch(&mut self, model: &mut Model, msg: Message) {
        let side_msg = msg.clone();
        *model = update(std::mem::take(model), msg);
        self.handle_message_side_effects(model, &side_msg);
    }

    fn event_loop(&mut self, terminal: &mut DefaultTerminal, model: &mut Model) -> Result<()> {
        let start = Instant::now();
        let rasterizer = {
            let _scope = crate::perf::scope("app.rasterizer.init");
            self.rasterizer()
        };
        let worker = RenderWorker::spawn(Arc::clone(&self.engine), rasterizer)
            .context("Failed to start the render worker")?;
        let mut resize_debouncer = ResizeDebouncer::new(100);
        let mut live_debouncer = LiveRenderDebouncer::new(LIVE_RENDER_DELAY_MS);
        let mut file_watcher = match model.file_path.clone() {
            Some(path) if model.watch_enabled => match Self::make_file_watcher(&path) {
                Ok(watcher) => Some(watcher),
                Err(err) => {
                    model.watch_enabled = false;
                    model.show_toast(ToastLevel::Warning, format!("Watch unavailable: {err}"));
                    tracing::warn!(%err, path = %path.display(), "watch unavailable");
                    None
                }
            },
            _ => None,
        };
        let mut frame_idx: u64 = 0;
        let mut needs_render = true;
        execute!(stdout(), EnableMouseCapture)?;

        loop {
            if model.expire_toast(Instant::now()) {
                needs_render = true;
            }

            let now_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            if let Some((width, height)) = resize_debouncer.take_ready(now_ms) {
                crate::perf::log_event(
                    "event.resize.apply",
                    format!("frame={frame_idx} width={width} height={height}"),
                );
                self.dispatch(model, Message::Resize(width, height));
                needs_render = true;
            }

            if model.watch_enabled
                && file_watcher
                    .as_mut()
                    .is_some_and(FileWatcher::take_change_ready)
            {
                self.dispatch(model, Message::FileChanged);
                needs_render = true;
            }

            if model.take_edited() && model.live_render {
                live_debouncer.queue(now_ms);
            }
            if model.render_pending() {
                // An explicit render supersedes the queued live one.
                live_debouncer.cancel();
            } else if live_debouncer.take_ready(now_ms) {
                model.request_render();
            }

            if model.render_pending() {
                if let Some(request) = model.take_render_request() {
                    let seq = request.seq;
                    if !worker.submit(request) {
                        model.abort_render(seq);
                        model.show_toast(ToastLevel::Error, "Render worker stopped");
                    }
                }
                needs_render = true;
            }

            while let Some(outcome) = worker.try_recv() {
                if model.accept_render(outcome) {
                    needs_render = true;
                }
            }

            let poll_ms = if needs_render {
                0
            } else if resize_debouncer.is_pending()
                || live_debouncer.is_pending()
                || model.preview.is_rendering()
            {
                10
            } else {
                250
            };
            if event::poll(Duration::from_millis(poll_ms))? {
                // Refresh timestamp after poll wait so debouncers use accurate times.
                let event_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                if let Some(msg) =
                    Self::handle_event(&event::read()?, model, event_ms, &mut resize_debouncer)
                {
                    crate::perf::log_event(
                        "event.message",
                        format!("frame={frame_idx} msg={msg:?}"),
                    );
                    self.dispatch(model, msg);
                    needs_render = true;
                }

                // Coalesce key repeat bursts into a single render.
                let mut drained = 0_u32;
                while event::poll(Duration::from_millis(0))? {
                    let drain_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                    if let Some(msg) =
                        Self::handle_event(&event::read()?, model, drain_ms, &mut resize_debouncer)
                    {
                        drained += 1;
                        self.dispatch(model, msg);
                        needs_render = true;
                    }
                }
                if drained > 0 {
                    crate::perf::log_event(
                        "event.drain",
                        format!("frame={frame_idx} drained={drained}"),
                    );
                }
            }

            if needs_render {
                frame_idx += 1;
                let draw_start = Instant::now();
                terminal.draw(|frame| crate::ui::render(model, frame))?;
                crate::perf::log_event(
                    "frame.draw",
                    format!(
                        "frame={} draw_ms={:.3}",
                        frame_idx,
                        draw_start.elapsed().as_secs_f64() * 1000.0
                    ),
                );
                needs_render = false;
            }

            if model.should_quit {
                break;
            }
        }
        Ok(())
    }
}
