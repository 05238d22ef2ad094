// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. export::ExportSink)
    clippy::module_name_repetitions
)]

//! # Flowchartify
//!
//! A terminal editor for the flowchart.js description language.
//!
//! Flowchartify shows the DSL source next to a rendered preview:
//! - Syntax-highlighted editor with snippet completion
//! - Diagram preview (Kitty, Sixel, iTerm2, half-block fallback)
//! - PNG export of the rendered flowchart
//! - Optional source file with save and live reload
//!
//! ## Architecture
//!
//! Flowchartify uses The Elm Architecture (TEA) pattern:
//! - **Model**: Application state
//! - **Message**: Events and actions
//! - **Update**: Pure state transitions
//! - **View**: Render to terminal
//!
//! Diagram rendering runs on a worker thread; results carry a sequence
//! ticket so only the newest request is ever mounted.
//!
//! ## Modules
//!
//! - [`app`]: Main application loop and state
//! - [`flowchart`]: DSL parser, layout and SVG renderer
//! - [`preview`]: Render requests, preview state and the render worker
//! - [`raster`]: SVG rasterization and PNG encoding
//! - [`export`]: PNG download into an export sink
//! - [`session`]: Editor text and render generation
//! - [`editor`]: Text buffer and snippet completion
//! - [`theme`]: Palette colors and the derived style configuration
//! - [`ui`]: Terminal UI components
//! - [`highlight`]: Syntax highlighting
//! - [`image`]: Terminal graphics protocol setup
//! - [`watcher`]: File watching
//! - [`config`]: Persisted default flags

pub mod app;
pub mod config;
pub mod editor;
pub mod export;
pub mod flowchart;
pub mod highlight;
pub mod image;
pub mod perf;
pub mod preview;
pub mod raster;
pub mod session;
pub mod theme;
pub mod ui;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{App, Message, Model};
    pub use crate::flowchart::{DiagramEngine, FlowchartEngine, StyleConfig};
    pub use crate::preview::PreviewState;
    pub use crate::session::Session;
}
