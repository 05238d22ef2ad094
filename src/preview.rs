//! Preview pane state and the background render worker.
//!
//! Every render is a [`RenderRequest`] stamped with a sequence number. The
//! worker thread executes requests in order, skipping any that were
//! superseded while it was busy, and [`Preview::accept`] only mounts an
//! outcome whose sequence is still the latest one issued. Clearing the
//! preview bumps the sequence too, so a render that finishes after a Clear
//! never resurrects the old diagram.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use image::DynamicImage;

use crate::flowchart::{DiagramEngine, StyleConfig, VectorDocument};
use crate::perf::RenderEvent;
use crate::raster::{RasterSize, Rasterizer};

/// Shown before anything has been rendered.
pub const PLACEHOLDER_TEXT: &str = "Enter DSL code and click Render to see your flowchart";

/// A successfully rendered flowchart.
#[derive(Debug, Clone)]
pub struct RenderedDiagram {
    pub document: VectorDocument,
    /// Terminal-sized raster; `None` when graphics are off.
    pub raster: Option<DynamicImage>,
}

/// What the preview pane currently shows.
#[derive(Debug, Clone, Default)]
pub enum PreviewState {
    #[default]
    Placeholder,
    Empty,
    Diagram(RenderedDiagram),
    Error(String),
}

#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub seq: u64,
    pub generation: u64,
    pub source: String,
    pub style: StyleConfig,
    pub target_width_px: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct RenderOutcome {
    pub seq: u64,
    pub generation: u64,
    pub result: Result<RenderedDiagram, String>,
}

#[derive(Debug, Default)]
pub struct Preview {
    state: PreviewState,
    latest_seq: u64,
    in_flight: bool,
}

impl Preview {
    pub const fn state(&self) -> &PreviewState {
        &self.state
    }

    /// The vector document currently mounted, if any.
    pub const fn mounted(&self) -> Option<&VectorDocument> {
        match &self.state {
            PreviewState::Diagram(rendered) => Some(&rendered.document),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            PreviewState::Error(message) => Some(message),
            _ => None,
        }
    }

    pub const fn is_rendering(&self) -> bool {
        self.in_flight
    }

    pub const fn latest_seq(&self) -> u64 {
        self.latest_seq
    }

    /// Empty the pane and invalidate anything still rendering.
    pub fn clear(&mut self) {
        self.latest_seq += 1;
        self.in_flight = false;
        self.state = PreviewState::Empty;
    }

    /// Issue a new sequence ticket.
    pub const fn begin(&mut self) -> u64 {
        self.latest_seq += 1;
        self.in_flight = true;
        self.latest_seq
    }

    /// Forget request `seq` when it never reached the worker. The pane keeps
    /// whatever it showed before.
    pub const fn abort(&mut self, seq: u64) {
        if seq == self.latest_seq {
            self.in_flight = false;
        }
    }

    /// Build the request for `source`, or clear the pane when it is blank.
    pub fn request(
        &mut self,
        generation: u64,
        source: &str,
        style: StyleConfig,
        target_width_px: Option<u32>,
    ) -> Option<RenderRequest> {
        if source.trim().is_empty() {
            self.clear();
            return None;
        }
        let seq = self.begin();
        Some(RenderRequest {
            seq,
            generation,
            source: source.to_string(),
            style,
            target_width_px,
        })
    }

    /// Mount `outcome` if it answers the latest request.
    ///
    /// Returns `false` for stale outcomes, which leave the pane untouched.
    pub fn accept(&mut self, outcome: RenderOutcome) -> bool {
        if outcome.seq != self.latest_seq {
            tracing::debug!(
                seq = outcome.seq,
                latest = self.latest_seq,
                "discarding stale render"
            );
            crate::perf::log_render(
                RenderEvent::Stale,
                outcome.seq,
                format!("latest={}", self.latest_seq),
            );
            return false;
        }
        self.in_flight = false;
        self.state = match outcome.result {
            Ok(rendered) => PreviewState::Diagram(rendered),
            Err(message) => PreviewState::Error(message),
        };
        true
    }
}

/// Rasterize for the pane. A failure here keeps the vector document; the
/// pane falls back to the text summary.
fn preview_raster(
    rasterizer: &dyn Rasterizer,
    document: &VectorDocument,
    width: u32,
    seq: u64,
) -> Option<DynamicImage> {
    match rasterizer.rasterize(&document.svg, RasterSize::Width(width)) {
        Ok(image) => Some(image),
        Err(err) => {
            tracing::warn!(seq, %err, "preview rasterization failed");
            crate::perf::log_render(RenderEvent::RasterError, seq, format!("err={err}"));
            None
        }
    }
}

/// Run one request to completion: parse, render, then rasterize when a
/// target width was asked for.
pub fn execute(
    engine: &dyn DiagramEngine,
    rasterizer: &dyn Rasterizer,
    request: RenderRequest,
) -> RenderOutcome {
    let _scope = crate::perf::scope("render.execute");
    let result = engine
        .parse(&request.source)
        .and_then(|diagram| engine.render(&diagram, &request.style))
        .map_err(|err| err.to_string())
        .map(|document| {
            let raster = request
                .target_width_px
                .and_then(|width| preview_raster(rasterizer, &document, width, request.seq));
            RenderedDiagram { document, raster }
        });

    match &result {
        Ok(rendered) => crate::perf::log_render(
            RenderEvent::Done,
            request.seq,
            format!(
                "symbols={} edges={}",
                rendered.document.symbol_count, rendered.document.edge_count
            ),
        ),
        Err(message) => {
            tracing::debug!(seq = request.seq, error = %message, "render failed");
            crate::perf::log_render(RenderEvent::Error, request.seq, format!("err={message}"));
        }
    }

    RenderOutcome {
        seq: request.seq,
        generation: request.generation,
        result,
    }
}

/// Owns the render thread. Dropping it closes the queue and joins.
#[derive(Debug)]
pub struct RenderWorker {
    requests: Option<Sender<RenderRequest>>,
    outcomes: Receiver<RenderOutcome>,
    handle: Option<JoinHandle<()>>,
}

impl RenderWorker {
    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn(
        engine: Arc<dyn DiagramEngine>,
        rasterizer: Arc<dyn Rasterizer>,
    ) -> std::io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let (outcome_tx, outcome_rx) = mpsc::channel();
        let handle = thread::Builder::new()
            .name("flowchartify-render".to_string())
            .spawn(move || {
                worker_loop(engine.as_ref(), rasterizer.as_ref(), &request_rx, &outcome_tx);
            })?;
        Ok(Self {
            requests: Some(request_tx),
            outcomes: outcome_rx,
            handle: Some(handle),
        })
    }

    /// Queue a request. Returns `false` if the worker has gone away.
    pub fn submit(&self, request: RenderRequest) -> bool {
        tracing::debug!(
            seq = request.seq,
            generation = request.generation,
            bytes = request.source.len(),
            "render requested"
        );
        crate::perf::log_render(
            RenderEvent::Request,
            request.seq,
            format!("generation={}", request.generation),
        );
        self.requests
            .as_ref()
            .is_some_and(|tx| tx.send(request).is_ok())
    }

    pub fn try_recv(&self) -> Option<RenderOutcome> {
        match self.outcomes.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<RenderOutcome> {
        match self.outcomes.recv_timeout(timeout) {
            Ok(outcome) => Some(outcome),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::warn!("render worker panicked");
        }
    }
}

fn worker_loop(
    engine: &dyn DiagramEngine,
    rasterizer: &dyn Rasterizer,
    requests: &Receiver<RenderRequest>,
    outcomes: &Sender<RenderOutcome>,
) {
    while let Ok(mut request) = requests.recv() {
        while let Ok(newer) = requests.try_recv() {
            crate::perf::log_render(
                RenderEvent::Coalesce,
                newer.seq,
                format!("skipped={}", request.seq),
            );
            request = newer;
        }
        if outcomes.send(execute(engine, rasterizer, request)).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flowchart::FlowchartEngine;
    use crate::raster::ResvgRasterizer;

    const VALID: &str = "st=>start: Start\ne=>end: End\nst->e";

    fn outcome(seq: u64, result: Result<RenderedDiagram, String>) -> RenderOutcome {
        RenderOutcome {
            seq,
            generation: 0,
            result,
        }
    }

    fn rendered() -> RenderedDiagram {
        let request = RenderRequest {
            seq: 1,
            generation: 0,
            source: VALID.to_string(),
            style: StyleConfig::default(),
            target_width_px: None,
        };
        execute(&FlowchartEngine, &ResvgRasterizer::without_fonts(), request)
            .result
            .unwrap()
    }

    #[test]
    fn test_starts_with_placeholder() {
        let preview = Preview::default();
        assert!(matches!(preview.state(), PreviewState::Placeholder));
        assert!(preview.mounted().is_none());
        assert!(!preview.is_rendering());
    }

    #[test]
    fn test_blank_source_clears_without_request() {
        let mut preview = Preview::default();
        let seq = preview.begin();
        assert!(preview.accept(outcome(seq, Ok(rendered()))));

        let request = preview.request(1, "  \n\t", StyleConfig::default(), None);
        assert!(request.is_none());
        assert!(matches!(preview.state(), PreviewState::Empty));
        assert!(preview.mounted().is_none());
        assert!(preview.error().is_none());
    }

    #[test]
    fn test_out_of_order_outcome_is_discarded() {
        let mut preview = Preview::default();
        let first = preview.begin();
        let second = preview.begin();

        assert!(preview.accept(outcome(second, Ok(rendered()))));
        assert!(!preview.accept(outcome(first, Err("late failure".to_string()))));
        assert!(preview.mounted().is_some());
        assert!(preview.error().is_none());
    }

    #[test]
    fn test_clear_invalidates_in_flight_render() {
        let mut preview = Preview::default();
        let seq = preview.begin();
        preview.clear();
        assert!(!preview.is_rendering());
        assert!(!preview.accept(outcome(seq, Ok(rendered()))));
        assert!(matches!(preview.state(), PreviewState::Empty));
    }

    #[test]
    fn test_abort_stops_rendering_and_keeps_diagram() {
        let mut preview = Preview::default();
        let seq = preview.begin();
        assert!(preview.accept(outcome(seq, Ok(rendered()))));

        let request = preview
            .request(1, VALID, StyleConfig::default(), None)
            .unwrap();
        assert!(preview.is_rendering());
        preview.abort(request.seq - 1);
        assert!(preview.is_rendering());
        preview.abort(request.seq);
        assert!(!preview.is_rendering());
        assert!(preview.mounted().is_some());
    }

    #[test]
    fn test_error_replaces_mounted_diagram() {
        let mut preview = Preview::default();
        let seq = preview.begin();
        preview.accept(outcome(seq, Ok(rendered())));
        let seq = preview.begin();
        preview.accept(outcome(seq, Err("line 2: boom".to_string())));
        assert!(preview.mounted().is_none());
        assert_eq!(preview.error(), Some("line 2: boom"));
    }

    #[test]
    fn test_execute_dangling_connection_reports_line() {
        let request = RenderRequest {
            seq: 7,
            generation: 3,
            source: "st=>start: Start\nst->".to_string(),
            style: StyleConfig::default(),
            target_width_px: None,
        };
        let outcome = execute(&FlowchartEngine, &ResvgRasterizer::without_fonts(), request);
        assert_eq!((outcome.seq, outcome.generation), (7, 3));
        let message = outcome.result.unwrap_err();
        assert!(message.contains("line 2"), "{message}");
    }

    #[test]
    fn test_execute_rasterizes_to_target_width() {
        let request = RenderRequest {
            seq: 1,
            generation: 0,
            source: VALID.to_string(),
            style: StyleConfig::default(),
            target_width_px: Some(320),
        };
        let rendered = execute(&FlowchartEngine, &ResvgRasterizer::without_fonts(), request)
            .result
            .unwrap();
        assert_eq!(rendered.document.symbol_count, 2);
        assert_eq!(rendered.document.edge_count, 1);
        assert_eq!(rendered.raster.map(|img| img.width()), Some(320));
    }

    fn long_chain(operations: usize) -> String {
        let mut source = String::from("st=>start: Start\ne=>end: End\n");
        for idx in 0..operations {
            source.push_str(&format!("op{idx}=>operation: Step {idx}\n"));
        }
        source.push_str("st");
        for idx in 0..operations {
            source.push_str(&format!("->op{idx}"));
        }
        source.push_str("->e");
        source
    }

    #[test]
    fn test_execute_tall_chain_fits_raster_cap() {
        let request = RenderRequest {
            seq: 1,
            generation: 0,
            source: long_chain(40),
            style: StyleConfig::default(),
            target_width_px: Some(600),
        };
        let rendered = execute(&FlowchartEngine, &ResvgRasterizer::without_fonts(), request)
            .result
            .unwrap();
        assert_eq!(rendered.document.symbol_count, 42);
        let raster = rendered.raster.unwrap();
        assert!(raster.height() <= crate::raster::MAX_RASTER_EDGE_PX);
        assert!(raster.width() <= 600);
    }

    struct FailingRasterizer;

    impl Rasterizer for FailingRasterizer {
        fn rasterize(
            &self,
            _svg: &str,
            _size: RasterSize,
        ) -> Result<DynamicImage, crate::raster::RasterError> {
            Err(crate::raster::RasterError::Size {
                width: 0,
                height: 0,
            })
        }
    }

    #[test]
    fn test_raster_failure_still_mounts_document() {
        let mut preview = Preview::default();
        let request = preview
            .request(0, VALID, StyleConfig::default(), Some(320))
            .unwrap();
        let outcome = execute(&FlowchartEngine, &FailingRasterizer, request);
        assert!(preview.accept(outcome));
        assert!(preview.error().is_none());
        let PreviewState::Diagram(rendered) = preview.state() else {
            panic!("expected a mounted diagram");
        };
        assert!(rendered.raster.is_none());
        assert_eq!(rendered.document.symbol_count, 2);
    }

    #[test]
    fn test_worker_delivers_latest_request_last() {
        let worker = RenderWorker::spawn(
            Arc::new(FlowchartEngine),
            Arc::new(ResvgRasterizer::without_fonts()),
        )
        .unwrap();
        let mut preview = Preview::default();
        for source in ["a=>start: A", "b=>start: B", VALID] {
            let request = preview
                .request(0, source, StyleConfig::default(), None)
                .unwrap();
            assert!(worker.submit(request));
        }

        let mut seen = Vec::new();
        while let Some(outcome) = worker.recv_timeout(Duration::from_secs(10)) {
            let seq = outcome.seq;
            seen.push(seq);
            preview.accept(outcome);
            if seq == preview.latest_seq() {
                break;
            }
        }
        assert_eq!(seen.last().copied(), Some(3));
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(preview.mounted().map(|doc| doc.symbol_count), Some(2));
    }
}
