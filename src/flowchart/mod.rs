//! Flowchart diagram engine.
//!
//! Turns flowchart.js source text into a standalone SVG document:
//! [`parser`] builds a [`Diagram`], [`layout`] places symbols on a grid and
//! routes connections, and [`svg`] emits the markup styled by a
//! [`StyleConfig`].

mod layout;
mod parser;
mod style;
mod svg;
mod types;

use thiserror::Error;

pub use layout::{Layout, PlacedEdge, PlacedSymbol, Point, layout_diagram};
pub use parser::parse_flowchart;
pub use style::{ArrowEnd, FlowStateStyle, ResolvedSymbolStyle, StyleConfig, SymbolStyle};
pub use types::{Branch, Connection, Diagram, Direction, Link, Symbol, SymbolKind};

/// Errors raised while parsing or rendering a flowchart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiagramError {
    #[error("line {line}: unrecognized statement `{text}`")]
    UnrecognizedLine { line: usize, text: String },
    #[error("line {line}: unknown symbol type `{kind}`")]
    UnknownSymbolType { line: usize, kind: String },
    #[error("line {line}: symbol definition has no id")]
    EmptyId { line: usize },
    #[error("line {line}: symbol `{id}` is already defined on line {first}")]
    DuplicateSymbol { line: usize, id: String, first: usize },
    #[error("line {line}: connection is missing a source or target")]
    DanglingConnection { line: usize },
    #[error("line {line}: connection refers to undefined symbol `{id}`")]
    UndefinedSymbol { line: usize, id: String },
    #[error("line {line}: connection from condition `{id}` needs a yes or no branch")]
    MissingBranch { line: usize, id: String },
    #[error("line {line}: invalid annotation `{annotation}`")]
    InvalidAnnotation { line: usize, annotation: String },
    #[error("no symbols defined")]
    NoSymbols,
    #[error("render failed: {0}")]
    Render(String),
}

impl DiagramError {
    /// One-based source line the error points at, if any.
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::UnrecognizedLine { line, .. }
            | Self::UnknownSymbolType { line, .. }
            | Self::EmptyId { line }
            | Self::DuplicateSymbol { line, .. }
            | Self::DanglingConnection { line }
            | Self::UndefinedSymbol { line, .. }
            | Self::MissingBranch { line, .. }
            | Self::InvalidAnnotation { line, .. } => Some(*line),
            Self::NoSymbols | Self::Render(_) => None,
        }
    }
}

/// A rendered flowchart: standalone SVG markup plus its pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorDocument {
    pub svg: String,
    pub width: f32,
    pub height: f32,
    pub symbol_count: usize,
    pub edge_count: usize,
}

/// The two-step contract the preview and export paths consume.
pub trait DiagramEngine: Send + Sync {
    /// Parse source text into a diagram model.
    ///
    /// # Errors
    ///
    /// Returns a [`DiagramError`] describing the first malformed statement.
    fn parse(&self, source: &str) -> Result<Diagram, DiagramError>;

    /// Lay out and draw a parsed diagram.
    ///
    /// # Errors
    ///
    /// Returns [`DiagramError::Render`] when the style cannot be applied.
    fn render(&self, diagram: &Diagram, style: &StyleConfig) -> Result<VectorDocument, DiagramError>;
}

/// The built-in flowchart.js engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowchartEngine;

impl DiagramEngine for FlowchartEngine {
    fn parse(&self, source: &str) -> Result<Diagram, DiagramError> {
        parse_flowchart(source)
    }

    fn render(&self, diagram: &Diagram, style: &StyleConfig) -> Result<VectorDocument, DiagramError> {
        style.validate()?;
        let layout = layout_diagram(diagram, style);
        let svg = svg::render_svg(diagram, &layout, style);
        Ok(VectorDocument {
            svg,
            width: layout.width * style.scale,
            height: layout.height * style.scale,
            symbol_count: layout.symbols.len(),
            edge_count: layout.edges.len(),
        })
    }
}

/// Parse and render in one step.
///
/// # Errors
///
/// Returns the parse or render error.
pub fn render_to_svg(source: &str, style: &StyleConfig) -> Result<VectorDocument, DiagramError> {
    let engine = FlowchartEngine;
    let diagram = engine.parse(source)?;
    engine.render(&diagram, style)
}
