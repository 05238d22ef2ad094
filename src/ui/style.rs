//! Terminal colors derived from the theme palette.
//!
//! The palette holds `#rrggbb` strings; terminals without truecolor get the
//! nearest xterm-256 cube entry instead.

use ratatui::style::{Color, Modifier, Style};

use crate::highlight::{HighlightColor, HighlightSpan};
use crate::theme::Palette;

/// Convert a normalized `#rrggbb` value to a terminal color.
pub fn hex_to_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#').filter(|d| d.len() == 6)?;
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(digits.get(range)?, 16).ok();
    Some(rgb_color(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

pub fn rgb_color(r: u8, g: u8, b: u8) -> Color {
    if crate::image::supports_truecolor_terminal() {
        Color::Rgb(r, g, b)
    } else {
        Color::Indexed(crate::image::rgb_to_cube(r, g, b))
    }
}

/// Style for one highlighted token.
pub fn span_style(span: &HighlightSpan) -> Style {
    let mut style = Style::default();
    if let Some(HighlightColor { r, g, b }) = span.fg {
        style = style.fg(rgb_color(r, g, b));
    }
    if span.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if span.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    style
}

/// Chrome styles for one palette.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiTheme {
    pub badge: Style,
    pub title: Style,
    pub primary_button: Style,
    pub button: Style,
    pub pane_border: Style,
    pub pane_title: Style,
    pub hint: Style,
    pub gutter: Style,
    pub cursor: Style,
    pub placeholder: Style,
    pub error_title: Style,
    pub error_text: Style,
    pub status: Style,
}

impl UiTheme {
    pub fn from_palette(palette: &Palette) -> Self {
        let color = |hex: &str, fallback: Color| hex_to_color(hex).unwrap_or(fallback);
        let primary = color(&palette.primary, Color::Blue);
        let primary_fg = color(&palette.primary_foreground, Color::Black);
        let border = color(&palette.border, Color::DarkGray);
        Self {
            badge: Style::default()
                .bg(primary)
                .fg(primary_fg)
                .add_modifier(Modifier::BOLD),
            title: Style::default().add_modifier(Modifier::BOLD),
            primary_button: Style::default()
                .bg(primary)
                .fg(primary_fg)
                .add_modifier(Modifier::BOLD),
            button: Style::default().fg(border).add_modifier(Modifier::BOLD),
            pane_border: Style::default().fg(border),
            pane_title: Style::default().add_modifier(Modifier::BOLD),
            hint: Style::default().fg(Color::Indexed(245)),
            gutter: Style::default().fg(Color::DarkGray),
            cursor: Style::default().bg(Color::White).fg(Color::Black),
            placeholder: Style::default()
                .fg(Color::Indexed(245))
                .add_modifier(Modifier::ITALIC),
            error_title: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            error_text: Style::default().fg(Color::Red),
            status: Style::default().bg(Color::DarkGray).fg(Color::White),
        }
    }
}

impl Default for UiTheme {
    fn default() -> Self {
        Self::from_palette(&Palette::default())
    }
}
