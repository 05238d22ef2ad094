//! Renderer configuration, shaped like the flowchart.js option object.
//!
//! Serializes with the same kebab-case keys flowchart.js uses
//! (`line-width`, `font-color`, `symbols`, `flowstate`, ...).

use std::collections::BTreeMap;

use serde::Serialize;

use super::DiagramError;
use super::types::SymbolKind;

/// Marker drawn at the end of every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArrowEnd {
    #[default]
    Block,
    Open,
    Classic,
    None,
}

/// Per-category colors; unset values fall back to the global ones.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SymbolStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
}

/// Overrides applied to symbols tagged with `|name` in the source.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct FlowStateStyle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_weight: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct StyleConfig {
    pub x: f32,
    pub y: f32,
    pub line_width: f32,
    pub line_length: f32,
    pub text_margin: f32,
    pub font_size: f32,
    pub font_family: String,
    pub font_color: String,
    pub line_color: String,
    pub element_color: String,
    pub fill: String,
    pub yes_text: String,
    pub no_text: String,
    pub arrow_end: ArrowEnd,
    pub scale: f32,
    /// Canvas color; transparent when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    pub symbols: BTreeMap<SymbolKind, SymbolStyle>,
    pub flowstate: BTreeMap<String, FlowStateStyle>,
}

/// Colors and type settings for one symbol after fallbacks are applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSymbolStyle<'a> {
    pub font_color: &'a str,
    pub element_color: &'a str,
    pub fill: &'a str,
    pub font_size: f32,
    pub font_weight: &'a str,
    pub yes_text: &'a str,
    pub no_text: &'a str,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            line_width: 3.0,
            line_length: 50.0,
            text_margin: 10.0,
            font_size: 14.0,
            font_family: "Geist, sans-serif".to_string(),
            font_color: "black".to_string(),
            line_color: "black".to_string(),
            element_color: "black".to_string(),
            fill: "white".to_string(),
            yes_text: "yes".to_string(),
            no_text: "no".to_string(),
            arrow_end: ArrowEnd::Block,
            scale: 1.0,
            background: None,
            symbols: BTreeMap::new(),
            flowstate: default_flowstates(),
        }
    }
}

impl StyleConfig {
    /// Reject configurations that cannot produce a drawable diagram.
    ///
    /// # Errors
    ///
    /// Returns [`DiagramError::Render`] naming the offending option.
    pub fn validate(&self) -> Result<(), DiagramError> {
        let positive = [
            ("font-size", self.font_size),
            ("scale", self.scale),
            ("line-length", self.line_length),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(DiagramError::Render(format!(
                    "{name} must be a positive number, got {value}"
                )));
            }
        }
        for (name, value) in [
            ("line-width", self.line_width),
            ("text-margin", self.text_margin),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(DiagramError::Render(format!(
                    "{name} must not be negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Style for a symbol, layering flowstate over category over globals.
    pub fn resolve(&self, kind: SymbolKind, flowstate: Option<&str>) -> ResolvedSymbolStyle<'_> {
        let category = self.symbols.get(&kind);
        let state = flowstate.and_then(|name| self.flowstate.get(name));

        let font_color = state
            .and_then(|s| s.font_color.as_deref())
            .or_else(|| category.and_then(|c| c.font_color.as_deref()))
            .unwrap_or(&self.font_color);
        let element_color = category
            .and_then(|c| c.element_color.as_deref())
            .unwrap_or(&self.element_color);
        let fill = state
            .and_then(|s| s.fill.as_deref())
            .or_else(|| category.and_then(|c| c.fill.as_deref()))
            .unwrap_or(&self.fill);

        ResolvedSymbolStyle {
            font_color,
            element_color,
            fill,
            font_size: state.and_then(|s| s.font_size).unwrap_or(self.font_size),
            font_weight: state
                .and_then(|s| s.font_weight.as_deref())
                .unwrap_or("normal"),
            yes_text: state
                .and_then(|s| s.yes_text.as_deref())
                .unwrap_or(&self.yes_text),
            no_text: state
                .and_then(|s| s.no_text.as_deref())
                .unwrap_or(&self.no_text),
        }
    }
}

/// The flowstate table the editor ships with.
pub fn default_flowstates() -> BTreeMap<String, FlowStateStyle> {
    let mut states = BTreeMap::new();
    states.insert(
        "past".to_string(),
        FlowStateStyle {
            fill: Some("#CCCCCC".to_string()),
            font_size: Some(12.0),
            ..FlowStateStyle::default()
        },
    );
    states.insert(
        "current".to_string(),
        FlowStateStyle {
            fill: Some("#FFFFFF".to_string()),
            font_color: Some("red".to_string()),
            font_weight: Some("bold".to_string()),
            ..FlowStateStyle::default()
        },
    );
    states.insert(
        "future".to_string(),
        FlowStateStyle {
            fill: Some("#FFFFFF".to_string()),
            ..FlowStateStyle::default()
        },
    );
    states.insert(
        "request".to_string(),
        FlowStateStyle {
            fill: Some("#58C4A3".to_string()),
            ..FlowStateStyle::default()
        },
    );
    states.insert(
        "invalid".to_string(),
        FlowStateStyle {
            fill: Some("#444444".to_string()),
            ..FlowStateStyle::default()
        },
    );
    states.insert(
        "approved".to_string(),
        FlowStateStyle {
            fill: Some("#58C4A3".to_string()),
            font_size: Some(12.0),
            yes_text: Some("APPROVED".to_string()),
            no_text: Some("n/a".to_string()),
            ..FlowStateStyle::default()
        },
    );
    states.insert(
        "rejected".to_string(),
        FlowStateStyle {
            fill: Some("#C45879".to_string()),
            font_size: Some(12.0),
            yes_text: Some("n/a".to_string()),
            no_text: Some("REJECTED".to_string()),
            ..FlowStateStyle::default()
        },
    );
    states
}
