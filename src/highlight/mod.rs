//! Syntax highlighting for the DSL editor.
//!
//! The flowchart grammar ships as a Sublime syntax definition embedded in
//! the binary and is compiled into its own `syntect` syntax set on first
//! use. Colors come from one of syntect's bundled themes, picked for the
//! terminal background.

use std::sync::{Mutex, OnceLock, PoisonError};

use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxDefinition, SyntaxReference, SyntaxSet, SyntaxSetBuilder};

const FLOWCHART_SYNTAX: &str = include_str!("flowchart.sublime-syntax");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// A run of text sharing one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpan {
    pub text: String,
    pub fg: Option<HighlightColor>,
    pub bold: bool,
    pub italic: bool,
}

impl HighlightSpan {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            fg: None,
            bold: false,
            italic: false,
        }
    }
}

/// Highlight `source` line by line.
///
/// Always yields one entry per line of `source` (an empty source is one
/// empty line). Falls back to unstyled spans if the grammar is unavailable.
pub fn highlight_source(source: &str) -> Vec<Vec<HighlightSpan>> {
    let lines: Vec<&str> = source.split('\n').collect();
    let Some((syntax_set, syntax)) = flowchart_syntax() else {
        return lines
            .iter()
            .map(|line| vec![HighlightSpan::plain(line.trim_end_matches('\r'))])
            .collect();
    };

    let mode = background();
    let mut highlighter = HighlightLines::new(syntax, theme());
    lines
        .into_iter()
        .map(|line| {
            let line = line.trim_end_matches('\r');
            let Ok(ranges) = highlighter.highlight_line(line, syntax_set) else {
                return vec![HighlightSpan::plain(line)];
            };
            ranges
                .into_iter()
                .filter(|(_, text)| !text.is_empty())
                .map(|(style, text)| HighlightSpan {
                    text: text.to_string(),
                    fg: Some(adjust_fg_for_background(
                        HighlightColor {
                            r: style.foreground.r,
                            g: style.foreground.g,
                            b: style.foreground.b,
                        },
                        mode,
                    )),
                    bold: style.font_style.contains(FontStyle::BOLD),
                    italic: style.font_style.contains(FontStyle::ITALIC),
                })
                .collect()
        })
        .collect()
}

fn flowchart_syntax() -> Option<(&'static SyntaxSet, &'static SyntaxReference)> {
    static SYNTAX_SET: OnceLock<Option<SyntaxSet>> = OnceLock::new();
    let set = SYNTAX_SET
        .get_or_init(|| {
            let _scope = crate::perf::scope("highlight.syntax_set.build");
            match SyntaxDefinition::load_from_str(FLOWCHART_SYNTAX, false, Some("flowchart")) {
                Ok(definition) => {
                    let mut builder = SyntaxSetBuilder::new();
                    builder.add(definition);
                    Some(builder.build())
                }
                Err(err) => {
                    tracing::warn!(%err, "flowchart grammar failed to load");
                    None
                }
            }
        })
        .as_ref()?;
    let syntax = set.find_syntax_by_extension("flowchart")?;
    Some((set, syntax))
}

fn theme() -> &'static Theme {
    static THEME: OnceLock<Theme> = OnceLock::new();
    THEME.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.theme.load_defaults");
        let theme_set = ThemeSet::load_defaults();
        let preferred = match background() {
            HighlightBackground::Dark => ["base16-eighties.dark", "base16-ocean.dark"],
            HighlightBackground::Light => ["InspiredGitHub", "base16-ocean.light"],
        };
        preferred
            .iter()
            .find_map(|name| theme_set.themes.get(*name).cloned())
            .or_else(|| theme_set.themes.values().next().cloned())
            .unwrap_or_default()
    })
}

/// Terminal background brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightBackground {
    Light,
    Dark,
}

static BACKGROUND_OVERRIDE: Mutex<Option<HighlightBackground>> = Mutex::new(None);

/// Force the background instead of reading `COLORFGBG`.
pub fn set_background_mode(mode: Option<HighlightBackground>) {
    *BACKGROUND_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner) = mode;
}

/// The forced background, or the one `COLORFGBG` advertises (dark when unset).
pub fn background() -> HighlightBackground {
    let forced = *BACKGROUND_OVERRIDE
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    forced.unwrap_or_else(|| {
        background_from_colorfgbg(std::env::var("COLORFGBG").ok().as_deref())
    })
}

fn background_from_colorfgbg(colorfgbg: Option<&str>) -> HighlightBackground {
    let bg = colorfgbg
        .and_then(|value| value.rsplit(';').next())
        .and_then(|bg| bg.parse::<u8>().ok());
    match bg {
        Some(bg) if bg >= 7 => HighlightBackground::Light,
        _ => HighlightBackground::Dark,
    }
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops
)]
fn adjust_fg_for_background(color: HighlightColor, mode: HighlightBackground) -> HighlightColor {
    if mode == HighlightBackground::Dark {
        return color;
    }
    let luma = 0.2126 * f32::from(color.r) + 0.7152 * f32::from(color.g) + 0.0722 * f32::from(color.b);
    if luma < 155.0 {
        return color;
    }
    let darken = |channel: u8| (f32::from(channel) * 0.42).round() as u8;
    HighlightColor {
        r: darken(color.r),
        g: darken(color.g),
        b: darken(color.b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(spans: &[HighlightSpan]) -> String {
        spans.iter().map(|span| span.text.as_str()).collect()
    }

    #[test]
    fn test_grammar_loads() {
        assert!(flowchart_syntax().is_some());
    }

    #[test]
    fn test_one_entry_per_line_and_text_preserved() {
        let source = "st=>start: Start\r\n' a comment\n\ncond(yes)->e";
        let lines = highlight_source(source);
        assert_eq!(lines.len(), 4);
        assert_eq!(line_text(&lines[0]), "st=>start: Start");
        assert_eq!(line_text(&lines[1]), "' a comment");
        assert_eq!(line_text(&lines[3]), "cond(yes)->e");
    }

    #[test]
    fn test_keywords_are_split_into_their_own_spans() {
        let lines = highlight_source("if x then");
        let texts: Vec<_> = lines[0].iter().map(|span| span.text.as_str()).collect();
        assert!(texts.contains(&"if"), "{texts:?}");
        assert!(texts.contains(&"then"), "{texts:?}");
        assert!(lines[0].iter().all(|span| span.fg.is_some()));
    }

    #[test]
    fn test_comment_runs_to_end_of_line() {
        let lines = highlight_source("' if while \"x\"");
        assert_eq!(lines[0].len(), 1);
    }

    #[test]
    fn test_arrow_is_distinct_from_identifiers() {
        let lines = highlight_source("st=>start");
        let texts: Vec<_> = lines[0].iter().map(|span| span.text.as_str()).collect();
        assert_eq!(texts, ["st", "=>", "start"]);
    }

    #[test]
    fn test_colorfgbg_detection() {
        assert_eq!(background_from_colorfgbg(Some("15;0")), HighlightBackground::Dark);
        assert_eq!(background_from_colorfgbg(Some("0;15")), HighlightBackground::Light);
        assert_eq!(background_from_colorfgbg(Some("garbage")), HighlightBackground::Dark);
        assert_eq!(background_from_colorfgbg(None), HighlightBackground::Dark);
    }

    #[test]
    fn test_light_mode_darkens_bright_fg() {
        let bright = HighlightColor { r: 240, g: 230, b: 120 };
        let adjusted = adjust_fg_for_background(bright, HighlightBackground::Light);
        assert!(adjusted.r < bright.r && adjusted.g < bright.g && adjusted.b < bright.b);
        assert_eq!(adjust_fg_for_background(bright, HighlightBackground::Dark), bright);
    }
}
