use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Padding, Paragraph, Wrap};
use unicode_width::UnicodeWidthStr;

use crate::app::Model;

use super::ScreenLayout;

/// Popup listing completions, anchored just below the cursor.
pub fn completion_rect(model: &Model, layout: &ScreenLayout) -> Option<Rect> {
    let completion = model.completion.as_ref()?;
    let editor = layout.editor_inner;
    let buf = &model.session.buffer;
    let cursor = buf.cursor();
    let row_in_view = cursor.line.checked_sub(model.editor_scroll_offset)?;
    let row_in_view = u16::try_from(row_in_view).ok()?;
    if row_in_view >= editor.height {
        return None;
    }

    let longest = completion
        .items
        .iter()
        .map(|s| s.label.width() + 2 + s.detail.width())
        .max()
        .unwrap_or(0);
    let width = u16::try_from(longest + 4).unwrap_or(u16::MAX).min(editor.width);
    let rows = u16::try_from(completion.items.len()).unwrap_or(u16::MAX);
    let height = rows.saturating_add(2);

    let text_x = editor.x + super::editor_text_offset(buf.line_count());
    let prefix_cols = u16::try_from(completion.prefix.width()).unwrap_or(0);
    let cursor_cols = u16::try_from(buf.cursor_display_col()).unwrap_or(u16::MAX);
    let anchor_x = text_x.saturating_add(cursor_cols.saturating_sub(prefix_cols));
    let max_x = editor.x + editor.width.saturating_sub(width);
    let x = anchor_x.min(max_x);

    let below = editor.y + row_in_view + 1;
    let editor_bottom = editor.y + editor.height;
    let y = if below + height <= editor_bottom {
        below
    } else {
        // Flip above the cursor when there is no room below.
        (editor.y + row_in_view).saturating_sub(height).max(editor.y)
    };
    Some(Rect::new(x, y, width, height.min(editor.height)))
}

pub fn render_completion_popup(model: &Model, frame: &mut Frame, layout: &ScreenLayout) {
    let Some(completion) = model.completion.as_ref() else {
        return;
    };
    let Some(popup) = completion_rect(model, layout) else {
        return;
    };

    let lines: Vec<Line> = completion
        .items
        .iter()
        .enumerate()
        .map(|(idx, snippet)| {
            let selected = idx == completion.selected;
            let label_style = if selected {
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Yellow)
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().add_modifier(Modifier::BOLD)
            };
            Line::from(vec![
                Span::styled(snippet.label, label_style),
                Span::raw("  "),
                Span::styled(snippet.detail, Style::default().fg(Color::Indexed(245))),
            ])
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().bg(Color::Black).fg(Color::White));
    frame.render_widget(Clear, popup);
    frame.render_widget(Paragraph::new(lines).block(block), popup);
}

pub fn alert_rect(area: Rect, message: &str) -> Rect {
    let popup_width = area.width.saturating_sub(8).clamp(20, 64);
    let text_width = usize::from(popup_width.saturating_sub(4)).max(1);
    let text_rows = message.width().div_ceil(text_width).max(1);
    let text_rows = u16::try_from(text_rows).unwrap_or(u16::MAX);
    // border + padding above and below, a blank row and the hint
    let popup_height = text_rows.saturating_add(6);
    centered_popup_rect(popup_width, popup_height, area)
}

pub fn render_alert(message: &str, frame: &mut Frame, area: Rect) {
    let popup = alert_rect(area, message);
    let lines = vec![
        Line::raw(message.to_string()),
        Line::raw(""),
        Line::styled(
            "Enter / Esc / click to dismiss",
            Style::default().fg(Color::Indexed(245)),
        ),
    ];
    let block = Block::default()
        .title(Line::styled(
            " Flowchartify ",
            Style::default().add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .padding(Padding::uniform(1))
        .style(Style::default().bg(Color::Black).fg(Color::White));
    frame.render_widget(Clear, popup);
    frame.render_widget(
        Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false }),
        popup,
    );
}

/// Every line of the help overlay, before scrolling.
fn help_lines(model: &Model) -> Vec<Line<'static>> {
    let global_cfg = model
        .config_global_path
        .as_ref()
        .map_or_else(|| "<unknown>".to_string(), |p| p.display().to_string());
    let local_cfg = model
        .config_local_path
        .as_ref()
        .map_or_else(|| "<none>".to_string(), |p| p.display().to_string());

    let section_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let mut lines: Vec<Line> = Vec::new();

    lines.push(Line::styled("Toolbar", section_style));
    lines.push(Line::raw("  Ctrl-r / F5         Render"));
    lines.push(Line::raw("  Ctrl-e / F6         Download PNG"));
    lines.push(Line::raw("  Ctrl-l / F8         Clear"));
    lines.push(Line::raw("  Mouse click         Toolbar buttons"));
    lines.push(Line::raw(""));

    lines.push(Line::styled("Editor", section_style));
    lines.push(Line::raw("  Arrows, Home/End    Navigate"));
    lines.push(Line::raw("  Ctrl+Left/Right     Word movement"));
    lines.push(Line::raw("  Ctrl+Home/End       Buffer start / end"));
    lines.push(Line::raw("  PageUp/PageDown     Scroll editor"));
    lines.push(Line::raw("  Tab                 Indent / accept completion"));
    lines.push(Line::raw("  Ctrl-s              Save source file"));
    lines.push(Line::raw(""));

    lines.push(Line::styled("Completion", section_style));
    lines.push(Line::raw("  Up/Down             Select"));
    lines.push(Line::raw("  Tab                 Insert snippet"));
    lines.push(Line::raw("  Esc                 Dismiss"));
    lines.push(Line::raw(""));

    lines.push(Line::styled("Preview", section_style));
    lines.push(Line::raw("  Mouse wheel         Scroll a tall diagram"));
    lines.push(Line::raw(""));

    lines.push(Line::styled("Other", section_style));
    lines.push(Line::raw("  F1                  Toggle help"));
    lines.push(Line::raw("  Ctrl-q / Ctrl-c     Quit"));
    lines.push(Line::raw(""));

    lines.push(Line::styled("Config", section_style));
    lines.push(Line::raw(format!("  Global: {global_cfg}")));
    lines.push(Line::raw(format!("  Local override: {local_cfg}")));
    lines
}

pub fn help_line_count(model: &Model) -> usize {
    help_lines(model).len()
}

pub fn render_help_overlay(model: &Model, frame: &mut Frame, area: Rect) {
    let popup_width = area.width.saturating_sub(12).max(48);
    let popup_height = area.height.saturating_sub(6).max(12);
    let popup = centered_popup_rect(popup_width, popup_height, area);
    let dim_style = Style::default().fg(Color::Indexed(245));
    let all_lines = help_lines(model);

    let block = Block::default()
        .title("Help")
        .borders(Borders::ALL)
        .padding(Padding::uniform(1))
        .style(Style::default().bg(Color::Black).fg(Color::White));

    frame.render_widget(Clear, popup);
    frame.render_widget(block, popup);

    // border(1) + padding(1) on each side
    let inner = Rect::new(
        popup.x + 2,
        popup.y + 2,
        popup.width.saturating_sub(4),
        popup.height.saturating_sub(4),
    );

    let content_height_u16 = inner.height.saturating_sub(1);
    let content_height = content_height_u16 as usize;
    let max_scroll = all_lines.len().saturating_sub(content_height);
    let scroll = model.help_scroll_offset.min(max_scroll);
    let end = (scroll + content_height).min(all_lines.len());

    let content_area = Rect::new(inner.x, inner.y, inner.width, content_height_u16);
    frame.render_widget(Paragraph::new(all_lines[scroll..end].to_vec()), content_area);

    let footer_area = Rect::new(inner.x, inner.y + content_height_u16, inner.width, 1);
    let footer = Line::styled("Up/Down scroll \u{2502} Esc closes", dim_style);
    frame.render_widget(Paragraph::new(footer), footer_area);
}

fn centered_popup_rect(width: u16, height: u16, area: Rect) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    let x = area.x + (area.width.saturating_sub(w) / 2);
    let y = area.y + (area.height.saturating_sub(h) / 2);
    Rect::new(x, y, w, h)
}
