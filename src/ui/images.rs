use ratatui::prelude::*;
use ratatui_image::protocol::StatefulProtocolType;
use ratatui_image::{CropOptions, Resize, StatefulImage};

use crate::app::Model;

/// Draw the mounted diagram into `area`, scrolled by the preview offset.
pub fn render_preview_image(model: &mut Model, frame: &mut Frame, area: Rect) {
    let max_offset = model.max_preview_scroll();
    let offset = model.preview_scroll_offset.min(max_offset);
    let Some((protocol, img_width, img_height)) = model.preview_protocol.as_mut() else {
        return;
    };
    let img_width = *img_width;
    let img_height = *img_height;

    let visible_cols = img_width.min(area.width);
    let visible_rows = img_height.saturating_sub(offset).min(area.height);
    if visible_rows == 0 || visible_cols == 0 {
        return;
    }
    // Center horizontally when the image is narrower than the pane.
    let dst_x = area.x + (area.width - visible_cols) / 2;
    crate::perf::log_event(
        "render.preview.image",
        format!(
            "area={}x{} img={img_width}x{img_height} offset={offset} rows={visible_rows}",
            area.width, area.height
        ),
    );

    if matches!(protocol.protocol_type(), StatefulProtocolType::ITerm2(_)) {
        // iTerm2 keeps the whole payload in one anchor cell, so row slices
        // of a temp buffer would lose it; crop in place instead.
        let crop = Resize::Crop(Some(CropOptions {
            clip_top: offset > 0,
            clip_left: false,
        }));
        StatefulImage::default().resize(crop).render(
            Rect::new(dst_x, area.y, visible_cols, visible_rows),
            frame.buffer_mut(),
            protocol,
        );
        return;
    }

    let temp_area = Rect::new(0, 0, img_width, img_height);
    let mut temp_buf = ratatui::buffer::Buffer::empty(temp_area);
    let halfblocks = matches!(protocol.protocol_type(), StatefulProtocolType::Halfblocks(_));
    let resize = if halfblocks {
        // Nearest-neighbor aliases badly at half-cell resolution.
        Resize::Scale(Some(image::imageops::FilterType::CatmullRom))
    } else {
        Resize::Scale(None)
    };
    StatefulImage::default()
        .resize(resize)
        .render(temp_area, &mut temp_buf, protocol);

    if halfblocks && !crate::image::supports_truecolor_terminal() {
        for cell in &mut temp_buf.content {
            if let Color::Rgb(r, g, b) = cell.fg {
                cell.fg = Color::Indexed(crate::image::rgb_to_cube(r, g, b));
            }
            if let Color::Rgb(r, g, b) = cell.bg {
                cell.bg = Color::Indexed(crate::image::rgb_to_cube(r, g, b));
            }
        }
    }

    let frame_buf = frame.buffer_mut();
    for row in 0..visible_rows {
        let src_row = offset + row;
        let dst_row = area.y + row;
        if src_row >= img_height || dst_row >= frame_buf.area.bottom() {
            continue;
        }
        for col in 0..visible_cols {
            frame_buf[(dst_x + col, dst_row)] = temp_buf[(col, src_row)].clone();
        }
    }
}
