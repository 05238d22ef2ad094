//! Theme palette and its mapping onto the renderer's style configuration.
//!
//! A [`Palette`] is an immutable snapshot of the six design-system colors
//! the preview uses. It comes from the terminal background (light or dark)
//! and, optionally, a CSS file of custom properties such as
//!
//! ```css
//! :root {
//!   --foreground: 222.2 84% 4.9%;
//!   --primary: #2563eb;
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::flowchart::{StyleConfig, SymbolKind, SymbolStyle};
use crate::highlight::HighlightBackground;

static RE_HEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^#([0-9a-fA-F]{3}|[0-9a-fA-F]{6})$").expect("hex color regex is valid")
});
static RE_RGB: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^rgba?\(\s*(\d{1,3})(?:\s*,\s*|\s+)(\d{1,3})(?:\s*,\s*|\s+)(\d{1,3})\s*(?:[,/]\s*[\d.]+%?\s*)?\)$")
        .expect("rgb color regex is valid")
});
static RE_HSL_FN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^hsla?\(\s*(.+?)\s*\)$").expect("hsl color regex is valid")
});
static RE_HSL_TRIPLET: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(-?\d+(?:\.\d+)?)(?:deg)?(?:\s*,\s*|\s+)(\d+(?:\.\d+)?)%(?:\s*,\s*|\s+)(\d+(?:\.\d+)?)%(?:\s*[,/]\s*[\d.]+%?)?$")
        .expect("hsl triplet regex is valid")
});
static RE_CSS_VAR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"--([A-Za-z0-9-]+)\s*:\s*([^;}]+)").expect("css variable regex is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    #[error("invalid color `{0}`")]
    Invalid(String),
    #[error("invalid value for --{name}: `{value}`")]
    InvalidVariable { name: String, value: String },
}

/// Named colors read once per render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Palette {
    pub foreground: String,
    pub border: String,
    pub background: String,
    pub primary: String,
    pub primary_foreground: String,
    pub muted: String,
}

impl Default for Palette {
    fn default() -> Self {
        Self::light()
    }
}

impl Palette {
    pub fn light() -> Self {
        Self {
            foreground: "#1a1a1a".to_string(),
            border: "#333333".to_string(),
            background: "#ffffff".to_string(),
            primary: "#2563eb".to_string(),
            primary_foreground: "#000000".to_string(),
            muted: "#f4f4f5".to_string(),
        }
    }

    pub fn dark() -> Self {
        Self {
            foreground: "#e4e4e7".to_string(),
            border: "#a1a1aa".to_string(),
            background: "#18181b".to_string(),
            primary: "#3b82f6".to_string(),
            primary_foreground: "#ffffff".to_string(),
            muted: "#27272a".to_string(),
        }
    }

    pub fn for_background(background: HighlightBackground) -> Self {
        match background {
            HighlightBackground::Light => Self::light(),
            HighlightBackground::Dark => Self::dark(),
        }
    }

    /// Override colors from CSS custom properties; unknown names are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ColorError::InvalidVariable`] for a known name whose value
    /// is not a supported color.
    pub fn with_css_variables(mut self, css: &str) -> Result<Self, ColorError> {
        for (name, value) in parse_css_variables(css) {
            let slot = match name.as_str() {
                "foreground" => &mut self.foreground,
                "border" => &mut self.border,
                "background" => &mut self.background,
                "primary" => &mut self.primary,
                "primary-foreground" => &mut self.primary_foreground,
                "muted" => &mut self.muted,
                _ => continue,
            };
            *slot = normalize_color(&value).map_err(|_| ColorError::InvalidVariable {
                name: name.clone(),
                value: value.clone(),
            })?;
        }
        Ok(self)
    }
}

/// Read a palette file and layer it over `base`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or holds an invalid color.
pub fn load_palette_file(path: &Path, base: Palette) -> Result<Palette> {
    let css = fs::read_to_string(path)
        .with_context(|| format!("Failed to read palette {}", path.display()))?;
    base.with_css_variables(&css)
        .with_context(|| format!("Invalid palette {}", path.display()))
}

/// `--name: value` pairs in source order; later declarations win.
fn parse_css_variables(css: &str) -> BTreeMap<String, String> {
    RE_CSS_VAR
        .captures_iter(css)
        .map(|caps| (caps[1].to_string(), caps[2].trim().to_string()))
        .collect()
}

/// Normalize a CSS color to lowercase `#rrggbb`.
///
/// Accepts `#rgb`, `#rrggbb`, `rgb(r, g, b)`, `hsl(h, s%, l%)` and bare
/// `h s% l%` triplets.
///
/// # Errors
///
/// Returns [`ColorError::Invalid`] for anything else.
pub fn normalize_color(value: &str) -> Result<String, ColorError> {
    let value = value.trim();
    let invalid = || ColorError::Invalid(value.to_string());

    if let Some(caps) = RE_HEX.captures(value) {
        let hex = caps[1].to_ascii_lowercase();
        if hex.len() == 3 {
            let expanded: String = hex.chars().flat_map(|c| [c, c]).collect();
            return Ok(format!("#{expanded}"));
        }
        return Ok(format!("#{hex}"));
    }

    if let Some(caps) = RE_RGB.captures(value) {
        let channel = |idx: usize| caps[idx].parse::<u8>().map_err(|_| invalid());
        return Ok(hex_string(channel(1)?, channel(2)?, channel(3)?));
    }

    let triplet = RE_HSL_FN
        .captures(value)
        .map_or(value, |caps| caps.get(1).map_or(value, |m| m.as_str()));
    let caps = RE_HSL_TRIPLET.captures(triplet).ok_or_else(invalid)?;
    let component = |idx: usize| caps[idx].parse::<f32>().map_err(|_| invalid());
    let (h, s, l) = (component(1)?, component(2)?, component(3)?);
    if s > 100.0 || l > 100.0 {
        return Err(invalid());
    }
    let (r, g, b) = hsl_to_rgb(h, s / 100.0, l / 100.0);
    Ok(hex_string(r, g, b))
}

fn hex_string(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

#[allow(clippy::many_single_char_names)]
fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (u8, u8, u8) {
    let h = h.rem_euclid(360.0) / 60.0;
    let c = (1.0 - 2.0f32.mul_add(l, -1.0).abs()) * s;
    let x = c * (1.0 - (h.rem_euclid(2.0) - 1.0).abs());
    let m = l - c / 2.0;
    let (r, g, b) = match h {
        h if h < 1.0 => (c, x, 0.0),
        h if h < 2.0 => (x, c, 0.0),
        h if h < 3.0 => (0.0, c, x),
        h if h < 4.0 => (0.0, x, c),
        h if h < 5.0 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    (to_channel(r + m), to_channel(g + m), to_channel(b + m))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_channel(value: f32) -> u8 {
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Map a palette onto the renderer configuration.
///
/// Start and end symbols use the primary colors; every other category
/// gets the muted fill with a border stroke.
pub fn style_config(palette: &Palette) -> StyleConfig {
    let accent = SymbolStyle {
        font_color: Some(palette.primary_foreground.clone()),
        element_color: Some(palette.primary.clone()),
        fill: Some(palette.primary.clone()),
    };
    let neutral = SymbolStyle {
        font_color: Some(palette.foreground.clone()),
        element_color: Some(palette.border.clone()),
        fill: Some(palette.muted.clone()),
    };
    let symbols = SymbolKind::ALL
        .into_iter()
        .map(|kind| {
            let style = if kind.is_terminal() {
                accent.clone()
            } else {
                neutral.clone()
            };
            (kind, style)
        })
        .collect();

    StyleConfig {
        font_color: palette.foreground.clone(),
        line_color: palette.foreground.clone(),
        element_color: palette.border.clone(),
        fill: palette.background.clone(),
        background: Some(palette.background.clone()),
        symbols,
        ..StyleConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_normalize_hex_forms() {
        assert_eq!(normalize_color("#FFF").unwrap(), "#ffffff");
        assert_eq!(normalize_color("#2563EB").unwrap(), "#2563eb");
        assert_eq!(normalize_color("  #abc ").unwrap(), "#aabbcc");
    }

    #[test]
    fn test_normalize_rgb_function() {
        assert_eq!(normalize_color("rgb(37, 99, 235)").unwrap(), "#2563eb");
        assert_eq!(normalize_color("rgb(0 0 0)").unwrap(), "#000000");
        assert_eq!(normalize_color("rgba(255, 255, 255, 0.5)").unwrap(), "#ffffff");
    }

    #[test]
    fn test_normalize_hsl_forms() {
        assert_eq!(normalize_color("hsl(0, 100%, 50%)").unwrap(), "#ff0000");
        assert_eq!(normalize_color("hsl(120deg 100% 25%)").unwrap(), "#008000");
        assert_eq!(normalize_color("0 0% 100%").unwrap(), "#ffffff");
        assert_eq!(normalize_color("240 100% 50%").unwrap(), "#0000ff");
    }

    #[test]
    fn test_normalize_rejects_malformed_values() {
        for bad in ["", "blue-ish", "#12", "#1234567", "rgb(256, 0, 0)", "hsl(0, 120%, 50%)", "1 2 3"] {
            assert!(normalize_color(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_css_variables_override_palette() {
        let css = ":root {\n  --primary: 221.2 83.2% 53.3%;\n  --muted: #eee;\n  --radius: 0.5rem;\n}";
        let palette = Palette::light().with_css_variables(css).unwrap();
        assert_eq!(palette.muted, "#eeeeee");
        assert_eq!(palette.primary, "#2563eb");
        assert_eq!(palette.foreground, Palette::light().foreground);
    }

    #[test]
    fn test_css_variables_reject_bad_known_value() {
        let err = Palette::light()
            .with_css_variables("--border: nope;")
            .unwrap_err();
        assert_eq!(
            err,
            ColorError::InvalidVariable {
                name: "border".to_string(),
                value: "nope".to_string()
            }
        );
    }

    #[test]
    fn test_load_palette_file() {
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "--background: rgb(0, 0, 0);").unwrap();
        let palette = load_palette_file(file.path(), Palette::dark()).unwrap();
        assert_eq!(palette.background, "#000000");
    }

    #[test]
    fn test_style_config_uses_primary_for_terminals() {
        let palette = Palette::light();
        let style = style_config(&palette);
        let start = style.resolve(SymbolKind::Start, None);
        assert_eq!(start.fill, palette.primary);
        assert_eq!(start.font_color, palette.primary_foreground);
        let condition = style.resolve(SymbolKind::Condition, None);
        assert_eq!(condition.fill, palette.muted);
        assert_eq!(condition.element_color, palette.border);
        assert_eq!(style.line_color, palette.foreground);
        assert_eq!(style.background.as_deref(), Some(palette.background.as_str()));
        assert!((style.line_width - 3.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_style_config_is_pure() {
        let palette = Palette::dark();
        assert_eq!(style_config(&palette), style_config(&palette));
    }

    proptest! {
        #[test]
        fn prop_hex_round_trips(r in any::<u8>(), g in any::<u8>(), b in any::<u8>()) {
            let hex = hex_string(r, g, b);
            prop_assert_eq!(normalize_color(&hex.to_uppercase()).unwrap(), hex);
        }

        #[test]
        fn prop_hsl_always_normalizes(h in -720.0f32..720.0, s in 0.0f32..=100.0, l in 0.0f32..=100.0) {
            let value = format!("{h:.1} {s:.1}% {l:.1}%");
            let normalized = normalize_color(&value).unwrap();
            prop_assert!(RE_HEX.is_match(&normalized));
            prop_assert_eq!(normalized.len(), 7);
        }

        #[test]
        fn prop_arbitrary_input_never_panics(value in ".{0,32}") {
            let _ = normalize_color(&value);
        }
    }
}
