//! Terminal graphics for the preview pane.
//!
//! The rasterized flowchart is shown through whatever graphics protocol the
//! terminal supports (Kitty, Sixel, iTerm2), falling back to Unicode
//! half-blocks. Terminals without truecolor get the image quantized to the
//! xterm 256-color cube first.

#[cfg(unix)]
use std::time::Duration;

use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};
use ratatui_image::picker::Picker;
#[cfg(unix)]
use ratatui_image::picker::cap_parser::QueryStdioOptions;

#[cfg(unix)]
const PICKER_QUERY_TIMEOUT_MS: u64 = 250;
/// Upper bound on the raster width requested for the preview.
pub const MAX_PREVIEW_WIDTH_PX: u32 = 2400;

/// Create a picker for terminal image rendering.
///
/// Returns `None` when the terminal does not answer the capability query.
pub fn create_picker(force_half_cell: bool) -> Option<Picker> {
    if force_half_cell {
        crate::perf::log_event(
            "image.create_picker",
            "force_half_cell=true protocol=Halfblocks",
        );
        return Some(Picker::halfblocks());
    }

    // The stdio capability query can leave a reader thread blocking the
    // Windows console input buffer.
    #[cfg(not(unix))]
    {
        crate::perf::log_event("image.create_picker", "windows fallback protocol=Halfblocks");
        return Some(Picker::halfblocks());
    }

    #[cfg(unix)]
    {
        let picker = Picker::from_query_stdio_with_options(query_options()).ok()?;
        crate::perf::log_event(
            "image.create_picker",
            format!(
                "term_program={} term={} protocol={:?}",
                std::env::var("TERM_PROGRAM").unwrap_or_else(|_| "<unset>".to_string()),
                std::env::var("TERM").unwrap_or_else(|_| "<unset>".to_string()),
                picker.protocol_type()
            ),
        );
        tracing::debug!(protocol = ?picker.protocol_type(), "terminal graphics detected");
        Some(picker)
    }
}

/// Pixel width to rasterize at so the image fills `columns` terminal cells.
pub fn preview_width_px(columns: u16, cell_width_px: u16) -> u32 {
    (u32::from(columns) * u32::from(cell_width_px.max(1))).clamp(1, MAX_PREVIEW_WIDTH_PX)
}

/// Whether terminal output should be treated as truecolor-capable.
pub fn supports_truecolor_terminal() -> bool {
    if let Ok(force) = std::env::var("FLOWCHARTIFY_TRUECOLOR") {
        let value = force.to_ascii_lowercase();
        return matches!(value.as_str(), "1" | "true" | "yes" | "on");
    }
    if std::env::var("TERM_PROGRAM")
        .ok()
        .as_deref()
        .is_some_and(|v| v == "Apple_Terminal")
    {
        return false;
    }
    supports_truecolor_from_env(
        std::env::var("COLORTERM").ok().as_deref(),
        std::env::var("TERM").ok().as_deref(),
    )
}

/// Quantize RGB channels to the xterm 256-color cube, keeping alpha.
pub fn quantize_to_ansi256(image: &DynamicImage) -> DynamicImage {
    let (width, height) = image.dimensions();
    let mut out = RgbaImage::new(width, height);

    for (x, y, px) in image.to_rgba8().enumerate_pixels() {
        let (r, g, b) = cube_to_rgb(rgb_to_cube(px[0], px[1], px[2]));
        out.put_pixel(x, y, Rgba([r, g, b, px[3]]));
    }

    DynamicImage::ImageRgba8(out)
}

#[cfg(unix)]
fn query_options() -> QueryStdioOptions {
    let mut options = QueryStdioOptions::default();
    options.timeout = Duration::from_millis(PICKER_QUERY_TIMEOUT_MS);
    options
}

fn supports_truecolor_from_env(colorterm: Option<&str>, term: Option<&str>) -> bool {
    let has = |value: Option<&str>, needles: &[&str]| {
        value.is_some_and(|v| {
            let lower = v.to_ascii_lowercase();
            needles.iter().any(|needle| lower.contains(needle))
        })
    };
    has(colorterm, &["truecolor", "24bit"]) || has(term, &["direct", "truecolor"])
}

/// Index into the 6x6x6 color cube (16..=231).
#[allow(clippy::cast_possible_truncation)]
pub fn rgb_to_cube(r: u8, g: u8, b: u8) -> u8 {
    let level = |v: u8| ((u16::from(v) * 5) / 255) as u8;
    16 + 36 * level(r) + 6 * level(g) + level(b)
}

fn cube_to_rgb(index: u8) -> (u8, u8, u8) {
    let i = index.saturating_sub(16);
    let value = |c: u8| if c == 0 { 0 } else { 55 + c * 40 };
    (value((i / 36) % 6), value((i / 6) % 6), value(i % 6))
}
