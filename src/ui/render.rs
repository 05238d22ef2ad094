use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap};

use crate::app::Model;
use crate::preview::{PLACEHOLDER_TEXT, PreviewState, RenderedDiagram};

use super::style::{UiTheme, span_style};
use super::{ScreenLayout, ToolbarButton, images, overlays, status};

/// Render the complete UI.
pub fn render(model: &mut Model, frame: &mut Frame) {
    model.refresh_highlight();
    let layout = super::screen_layout(frame.area(), model.active_toast().is_some());
    let theme = UiTheme::from_palette(&model.palette);

    render_header(frame, &layout, &theme);
    render_editor(model, frame, &layout, &theme);
    render_preview(model, frame, &layout, &theme);

    if let Some(toast_area) = layout.toast {
        status::render_toast_bar(model, frame, toast_area);
    }
    status::render_status_bar(model, frame, layout.status);

    let area = frame.area();
    if let Some(message) = model.alert.as_deref() {
        overlays::render_alert(message, frame, area);
    } else if model.help_visible {
        overlays::render_help_overlay(model, frame, area);
    } else if model.completion.is_some() {
        overlays::render_completion_popup(model, frame, &layout);
    }
}

fn render_header(frame: &mut Frame, layout: &ScreenLayout, theme: &UiTheme) {
    let title = Line::from(vec![
        Span::styled(" F ", theme.badge),
        Span::styled(" Flowchartify", theme.title),
    ]);
    frame.render_widget(Paragraph::new(title), layout.header);

    for (button, rect) in &layout.buttons {
        let style = if *button == ToolbarButton::Render {
            theme.primary_button
        } else {
            theme.button
        };
        frame.render_widget(Paragraph::new(button.text()).style(style), *rect);
    }
}

fn render_editor(model: &Model, frame: &mut Frame, layout: &ScreenLayout, theme: &UiTheme) {
    let block = Block::default()
        .title(Line::styled(" DSL Code ", theme.pane_title))
        .title_bottom(Line::styled(" Enter flowchart.js DSL syntax ", theme.hint))
        .borders(Borders::ALL)
        .border_style(theme.pane_border);
    frame.render_widget(block, layout.editor);

    let area = layout.editor_inner;
    let buf = &model.session.buffer;
    let total_lines = buf.line_count();
    let gutter_width = line_number_width(total_lines);
    let highlighted = model.highlighted_lines();

    let visible_height = area.height as usize;
    let start = model.editor_scroll_offset.min(total_lines.saturating_sub(1));
    let end = (start + visible_height).min(total_lines);
    let cursor = buf.cursor();

    let mut content: Vec<Line> = Vec::with_capacity(end.saturating_sub(start));
    for line_idx in start..end {
        let line_text = buf.line_at(line_idx).unwrap_or_default();
        let line_num = format!("{:>width$} ", line_idx + 1, width = gutter_width as usize);
        let mut spans = vec![Span::styled(line_num, theme.gutter)];

        let styled: Vec<(String, Style)> = match highlighted.and_then(|lines| lines.get(line_idx)) {
            Some(line_spans) => line_spans
                .iter()
                .map(|span| (span.text.clone(), span_style(span)))
                .collect(),
            None => vec![(line_text.clone(), Style::default())],
        };

        if line_idx == cursor.line {
            spans.extend(with_cursor(&styled, cursor.col, theme.cursor));
        } else {
            spans.extend(
                styled
                    .into_iter()
                    .filter(|(text, _)| !text.is_empty())
                    .map(|(text, style)| Span::styled(text, style)),
            );
        }
        content.push(Line::from(spans));
    }

    frame.render_widget(Clear, area);
    frame.render_widget(Paragraph::new(content), area);
}

/// Split styled runs around the byte column `col` and mark the cursor cell.
fn with_cursor(runs: &[(String, Style)], col: usize, cursor_style: Style) -> Vec<Span<'static>> {
    let mut out = Vec::new();
    let mut offset = 0usize;
    let mut placed = false;
    for (text, style) in runs {
        let run_end = offset + text.len();
        if !placed && col >= offset && col < run_end {
            let local = col - offset;
            let cursor_len = text[local..].chars().next().map_or(1, char::len_utf8);
            if local > 0 {
                out.push(Span::styled(text[..local].to_string(), *style));
            }
            out.push(Span::styled(
                text[local..local + cursor_len].to_string(),
                cursor_style,
            ));
            if local + cursor_len < text.len() {
                out.push(Span::styled(text[local + cursor_len..].to_string(), *style));
            }
            placed = true;
        } else if !text.is_empty() {
            out.push(Span::styled(text.clone(), *style));
        }
        offset = run_end;
    }
    if !placed {
        out.push(Span::styled(" ", cursor_style));
    }
    out
}

fn render_preview(model: &mut Model, frame: &mut Frame, layout: &ScreenLayout, theme: &UiTheme) {
    let block = Block::default()
        .title(Line::styled(" Preview ", theme.pane_title))
        .borders(Borders::ALL)
        .border_style(theme.pane_border);
    frame.render_widget(block, layout.preview);
    let area = layout.preview_inner;
    frame.render_widget(Clear, area);

    if model.preview_protocol.is_some() && model.preview.mounted().is_some() {
        images::render_preview_image(model, frame, area);
        return;
    }
    match model.preview.state() {
        PreviewState::Placeholder => render_placeholder(frame, area, theme),
        PreviewState::Empty => {}
        PreviewState::Error(message) => render_error(message, frame, area, theme),
        PreviewState::Diagram(rendered) => {
            let summary = diagram_summary(rendered, model.graphics_active());
            frame.render_widget(Paragraph::new(summary).wrap(Wrap { trim: false }), area);
        }
    }
}

fn render_placeholder(frame: &mut Frame, area: Rect, theme: &UiTheme) {
    if area.height == 0 {
        return;
    }
    let rows = area.height.min(3);
    let row = Rect {
        y: area.y + (area.height - rows) / 2,
        height: rows,
        ..area
    };
    frame.render_widget(
        Paragraph::new(PLACEHOLDER_TEXT)
            .style(theme.placeholder)
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true }),
        row,
    );
}

fn render_error(message: &str, frame: &mut Frame, area: Rect, theme: &UiTheme) {
    let block = Block::default()
        .borders(Borders::LEFT)
        .border_style(theme.error_title)
        .padding(Padding::horizontal(1));
    let text = vec![Line::from(vec![
        Span::styled("Error:", theme.error_title),
        Span::styled(format!(" {message}"), theme.error_text),
    ])];
    frame.render_widget(
        Paragraph::new(text)
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}

/// Text shown in place of the image when graphics are unavailable.
pub(super) fn diagram_summary(rendered: &RenderedDiagram, graphics_active: bool) -> Vec<Line<'static>> {
    let document = &rendered.document;
    let mut lines = vec![
        Line::styled(
            "Flowchart rendered",
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Line::raw(""),
        Line::raw(format!("  Symbols:      {}", document.symbol_count)),
        Line::raw(format!("  Connections:  {}", document.edge_count)),
        Line::raw(format!(
            "  Size:         {:.0} × {:.0} px",
            document.width, document.height
        )),
        Line::raw(""),
    ];
    let hint = if graphics_active && rendered.raster.is_some() {
        "Preparing terminal image…"
    } else if graphics_active {
        "No terminal image for this diagram; Ctrl+E writes flowchart.png"
    } else {
        "Terminal graphics are off; Ctrl+E writes flowchart.png"
    };
    lines.push(Line::styled(hint, Style::default().fg(Color::Indexed(245))));
    lines
}

/// Calculate the width needed for line numbers.
pub const fn line_number_width(total_lines: usize) -> u16 {
    if total_lines < 10 {
        1
    } else if total_lines < 100 {
        2
    } else if total_lines < 1_000 {
        3
    } else if total_lines < 10_000 {
        4
    } else if total_lines < 100_000 {
        5
    } else {
        6
    }
}

/// Display column of the first text cell in the editor for `total_lines`.
pub(crate) const fn editor_text_offset(total_lines: usize) -> u16 {
    line_number_width(total_lines) + 1
}
