use std::sync::Arc;
use std::time::Duration;

use flowchartify::export::{DirectorySink, EXPORT_FILE_NAME, ExportError, export_png};
use flowchartify::flowchart::{DiagramEngine, FlowchartEngine, render_to_svg};
use flowchartify::preview::{Preview, PreviewState, RenderWorker};
use flowchartify::raster::{RasterSize, Rasterizer, ResvgRasterizer};
use flowchartify::theme::{Palette, style_config};

const ORDER_FLOW: &str = include_str!("fixtures/order.flow");

#[test]
fn test_fixture_renders_every_symbol() {
    let style = style_config(&Palette::light());
    let document = render_to_svg(ORDER_FLOW, &style).unwrap();

    assert_eq!(document.symbol_count, 9);
    assert!(document.width > 0.0 && document.height > 0.0);
    for label in ["Validate order", "Reserve stock", "In stock?", "Update ledger"] {
        assert!(document.svg.contains(label), "missing label {label}");
    }
}

#[test]
fn test_palette_colors_reach_the_svg() {
    let palette = Palette::dark();
    let engine = FlowchartEngine;
    let diagram = engine.parse("st=>start: Start\ne=>end: End\nst->e").unwrap();
    let document = engine.render(&diagram, &style_config(&palette)).unwrap();

    assert!(document.svg.contains(&palette.primary));
    assert!(document.svg.contains(&palette.background));
}

#[test]
fn test_export_writes_png_into_output_dir() {
    let dir = tempfile::tempdir().unwrap();
    let document = render_to_svg(ORDER_FLOW, &style_config(&Palette::light())).unwrap();
    let mut sink = DirectorySink::new(dir.path().join("out"));

    let path = export_png(
        Some(&document),
        &ResvgRasterizer::without_fonts(),
        &mut sink,
        2.0,
    )
    .unwrap();

    assert_eq!(path, dir.path().join("out").join(EXPORT_FILE_NAME));
    let image = image::open(&path).unwrap();
    assert!((image.width() as f32 - document.width * 2.0).abs() <= 1.0);
    assert!((image.height() as f32 - document.height * 2.0).abs() <= 1.0);
}

#[test]
fn test_export_without_diagram_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let mut sink = DirectorySink::new(dir.path());

    let err = export_png(None, &ResvgRasterizer::without_fonts(), &mut sink, 1.0).unwrap_err();

    assert!(matches!(err, ExportError::NothingToExport));
    assert!(!dir.path().join(EXPORT_FILE_NAME).exists());
}

#[test]
fn test_rasterize_to_width_keeps_aspect_ratio() {
    let document = render_to_svg(ORDER_FLOW, &style_config(&Palette::light())).unwrap();
    let image = ResvgRasterizer::without_fonts()
        .rasterize(&document.svg, RasterSize::Width(400))
        .unwrap();
    assert_eq!(image.width(), 400);
    let expected = 400.0 * document.height / document.width;
    assert!((image.height() as f32 - expected).abs() <= 2.0);
}

#[test]
fn test_worker_result_for_latest_request_wins() {
    let worker = RenderWorker::spawn(
        Arc::new(FlowchartEngine),
        Arc::new(ResvgRasterizer::without_fonts()),
    )
    .unwrap();
    let style = style_config(&Palette::light());
    let mut preview = Preview::default();

    let first = preview
        .request(1, "a=>start: A\nb=>end: B\na->b", style.clone(), None)
        .unwrap();
    let second = preview.request(2, ORDER_FLOW, style, Some(320)).unwrap();
    let latest = second.seq;
    assert!(worker.submit(first));
    assert!(worker.submit(second));

    loop {
        let outcome = worker
            .recv_timeout(Duration::from_secs(30))
            .expect("worker answered");
        let seq = outcome.seq;
        let mounted = preview.accept(outcome);
        assert_eq!(mounted, seq == latest);
        if mounted {
            break;
        }
    }

    let PreviewState::Diagram(rendered) = preview.state() else {
        panic!("expected a mounted diagram");
    };
    assert_eq!(rendered.document.symbol_count, 9);
    assert_eq!(rendered.raster.as_ref().map(image::DynamicImage::width), Some(320));
    assert!(!preview.is_rendering());
}
