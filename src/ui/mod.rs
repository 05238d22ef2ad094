//! Terminal UI components.
//!
//! The screen is a one-row header carrying the toolbar, the editor and
//! preview panes side by side, and a footer with the status bar (plus a
//! toast row while one is showing).

pub mod style;

mod images;
mod overlays;
mod render;
mod status;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::widgets::{Block, Borders};
use unicode_width::UnicodeWidthStr;

pub use overlays::{alert_rect, completion_rect, help_line_count};
pub use render::{line_number_width, render};
pub(crate) use render::editor_text_offset;

pub const EDITOR_WIDTH_PERCENT: u16 = 50;
pub const PREVIEW_WIDTH_PERCENT: u16 = 50;
/// Columns reserved for the application title at the left of the header.
const HEADER_TITLE_WIDTH: u16 = 16;

/// The three toolbar actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolbarButton {
    Render,
    Download,
    Clear,
}

impl ToolbarButton {
    pub const ALL: [Self; 3] = [Self::Render, Self::Download, Self::Clear];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Render => "Render",
            Self::Download => "Download PNG",
            Self::Clear => "Clear",
        }
    }

    pub const fn shortcut(self) -> &'static str {
        match self {
            Self::Render => "^R",
            Self::Download => "^E",
            Self::Clear => "^L",
        }
    }

    fn text(self) -> String {
        format!("[ {} {} ]", self.label(), self.shortcut())
    }
}

/// Where everything goes on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenLayout {
    pub header: Rect,
    /// Buttons that fit in the header, in toolbar order
    pub buttons: Vec<(ToolbarButton, Rect)>,
    pub editor: Rect,
    pub editor_inner: Rect,
    pub preview: Rect,
    pub preview_inner: Rect,
    pub toast: Option<Rect>,
    pub status: Rect,
}

impl ScreenLayout {
    pub fn button_at(&self, column: u16, row: u16) -> Option<ToolbarButton> {
        self.buttons
            .iter()
            .find(|(_, rect)| contains(*rect, column, row))
            .map(|(button, _)| *button)
    }
}

pub const fn contains(rect: Rect, column: u16, row: u16) -> bool {
    column >= rect.x
        && column < rect.x.saturating_add(rect.width)
        && row >= rect.y
        && row < rect.y.saturating_add(rect.height)
}

pub fn screen_layout(area: Rect, toast_active: bool) -> ScreenLayout {
    let footer_rows = 1 + u16::from(toast_active);
    let [header, body, footer] = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(footer_rows),
        ])
        .areas(area);
    let [editor, preview] = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(EDITOR_WIDTH_PERCENT),
            Constraint::Percentage(PREVIEW_WIDTH_PERCENT),
        ])
        .areas(body);

    let pane = Block::default().borders(Borders::ALL);
    let status = Rect {
        y: footer.y + footer.height.saturating_sub(1),
        height: footer.height.min(1),
        ..footer
    };
    let toast = toast_active.then_some(Rect {
        height: footer.height.min(1),
        ..footer
    });

    ScreenLayout {
        header,
        buttons: toolbar_buttons(header),
        editor,
        editor_inner: pane.inner(editor),
        preview,
        preview_inner: pane.inner(preview),
        toast,
        status,
    }
}

/// Right-aligned toolbar buttons; those that would overlap the title are dropped.
fn toolbar_buttons(header: Rect) -> Vec<(ToolbarButton, Rect)> {
    let min_x = header.x.saturating_add(HEADER_TITLE_WIDTH);
    let mut right = header.x.saturating_add(header.width).saturating_sub(1);
    let mut placed = Vec::new();
    for button in ToolbarButton::ALL.into_iter().rev() {
        let width = u16::try_from(button.text().width()).unwrap_or(u16::MAX);
        let Some(x) = right.checked_sub(width) else {
            break;
        };
        if x < min_x {
            break;
        }
        placed.push((button, Rect::new(x, header.y, width, 1)));
        right = x.saturating_sub(1);
    }
    placed.reverse();
    placed
}
