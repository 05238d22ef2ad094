//! SVG rasterization.
//!
//! The only place vector documents become pixels: the preview pane and the
//! PNG export both go through a [`Rasterizer`].

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbaImage};
use resvg::usvg::fontdb;
use thiserror::Error;

/// Largest raster edge we are willing to allocate.
pub const MAX_RASTER_EDGE_PX: u32 = 16_384;

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("invalid SVG: {0}")]
    Parse(String),
    #[error("invalid raster size {width}x{height}")]
    Size { width: u32, height: u32 },
    #[error("failed to encode PNG: {0}")]
    Encode(#[from] image::ImageError),
}

/// How big the raster should be.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RasterSize {
    /// Multiply the document's own size.
    Scale(f32),
    /// Fit to this many pixels wide, preserving aspect ratio. Tall documents
    /// are narrowed so the height stays within [`MAX_RASTER_EDGE_PX`].
    Width(u32),
}

/// Turns a standalone SVG document into pixels.
pub trait Rasterizer: Send + Sync {
    /// # Errors
    ///
    /// Returns a [`RasterError`] if the document cannot be parsed or the
    /// requested size is unusable.
    fn rasterize(&self, svg: &str, size: RasterSize) -> Result<DynamicImage, RasterError>;
}

/// `resvg`/`tiny-skia` rasterizer with a shared font database.
#[derive(Clone)]
pub struct ResvgRasterizer {
    fontdb: Arc<fontdb::Database>,
}

impl std::fmt::Debug for ResvgRasterizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResvgRasterizer")
            .field("faces", &self.fontdb.len())
            .finish()
    }
}

impl Default for ResvgRasterizer {
    fn default() -> Self {
        Self::new()
    }
}

impl ResvgRasterizer {
    /// Load system fonts once; every render reuses them.
    pub fn new() -> Self {
        let _scope = crate::perf::scope("raster.fontdb.load_system_fonts");
        let mut db = fontdb::Database::new();
        db.load_system_fonts();
        tracing::debug!(faces = db.len(), "loaded system fonts");
        Self {
            fontdb: Arc::new(db),
        }
    }

    /// A rasterizer with no fonts loaded. Text is skipped; shapes still draw.
    pub fn without_fonts() -> Self {
        Self {
            fontdb: Arc::new(fontdb::Database::new()),
        }
    }
}

impl Rasterizer for ResvgRasterizer {
    fn rasterize(&self, svg: &str, size: RasterSize) -> Result<DynamicImage, RasterError> {
        let opts = resvg::usvg::Options {
            fontdb: Arc::clone(&self.fontdb),
            ..Default::default()
        };
        let tree = resvg::usvg::Tree::from_str(svg, &opts)
            .map_err(|err| RasterError::Parse(err.to_string()))?;
        let tree_size = tree.size();

        let (scale, width) = match size {
            RasterSize::Scale(scale) => (scale, scaled_edge(tree_size.width(), scale)),
            RasterSize::Width(width) => fit_width(tree_size.width(), tree_size.height(), width),
        };
        let height = scaled_edge(tree_size.height(), scale);
        if !(1..=MAX_RASTER_EDGE_PX).contains(&width) || !(1..=MAX_RASTER_EDGE_PX).contains(&height)
        {
            return Err(RasterError::Size { width, height });
        }

        let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
            .ok_or(RasterError::Size { width, height })?;
        resvg::render(
            &tree,
            resvg::tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );

        // tiny-skia stores premultiplied alpha
        let rgba = pixmap
            .pixels()
            .iter()
            .flat_map(|px| {
                let c = px.demultiply();
                [c.red(), c.green(), c.blue(), c.alpha()]
            })
            .collect();
        let buffer =
            RgbaImage::from_raw(width, height, rgba).ok_or(RasterError::Size { width, height })?;
        Ok(DynamicImage::ImageRgba8(buffer))
    }
}

/// Scale and pixel width for a `width`-wide raster whose height still fits
/// under [`MAX_RASTER_EDGE_PX`].
#[allow(clippy::cast_precision_loss)]
fn fit_width(doc_width: f32, doc_height: f32, width: u32) -> (f32, u32) {
    let width = width.min(MAX_RASTER_EDGE_PX);
    let scale = width as f32 / doc_width;
    // Leave a pixel of slack for the ceil in `scaled_edge`.
    let height_cap = (MAX_RASTER_EDGE_PX - 1) as f32 / doc_height;
    if scale <= height_cap {
        (scale, width)
    } else {
        (height_cap, scaled_edge(doc_width, height_cap).min(width))
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn scaled_edge(edge: f32, scale: f32) -> u32 {
    let value = (edge * scale).ceil();
    if value.is_finite() && value > 0.0 {
        value.min(u32::MAX as f32) as u32
    } else {
        0
    }
}

/// Encode an image as PNG bytes.
///
/// # Errors
///
/// Returns [`RasterError::Encode`] if the encoder fails.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, RasterError> {
    let mut bytes = Cursor::new(Vec::new());
    image.write_to(&mut bytes, ImageFormat::Png)?;
    Ok(bytes.into_inner())
}
