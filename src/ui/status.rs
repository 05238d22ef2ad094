use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

use crate::app::{Model, ToastLevel};
use crate::preview::PreviewState;

pub fn render_status_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let filename = model.file_path.as_ref().map_or_else(
        || "untitled".to_string(),
        |path| {
            path.file_name()
                .map_or_else(|| path.display().to_string(), |s| s.to_string_lossy().to_string())
        },
    );
    let dirty_indicator = if model.is_dirty() { " [modified]" } else { "" };
    let watch_indicator = if model.watch_enabled {
        " [watching]"
    } else {
        ""
    };
    let live_indicator = if model.live_render { " [live]" } else { "" };

    let cursor = model.session.buffer.cursor();
    let cursor_info = format!(
        "Ln {}, Col {}",
        cursor.line + 1,
        model.session.buffer.cursor_display_col() + 1
    );

    let preview_info = if model.preview.is_rendering() {
        "rendering…"
    } else {
        match model.preview.state() {
            PreviewState::Placeholder | PreviewState::Empty => "",
            PreviewState::Diagram(_) => "rendered",
            PreviewState::Error(_) => "error",
        }
    };

    let status = format!(
        " {filename}{dirty_indicator}{watch_indicator}{live_indicator}  {cursor_info}  {preview_info}  F1:help"
    );
    let status_bar =
        Paragraph::new(status).style(Style::default().bg(Color::DarkGray).fg(Color::White));
    frame.render_widget(status_bar, area);
}

pub fn render_toast_bar(model: &Model, frame: &mut Frame, area: Rect) {
    let Some((message, level)) = model.active_toast() else {
        return;
    };
    let (prefix, style) = match level {
        ToastLevel::Info => (
            "[info]",
            Style::default().bg(Color::DarkGray).fg(Color::White),
        ),
        ToastLevel::Warning => (
            "[warn]",
            Style::default().bg(Color::Yellow).fg(Color::Black),
        ),
        ToastLevel::Error => ("[error]", Style::default().bg(Color::Red).fg(Color::White)),
    };
    let toast = Paragraph::new(format!("{prefix} {message}")).style(style);
    frame.render_widget(toast, area);
}
