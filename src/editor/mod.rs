//! Source editor for the DSL pane.
//!
//! A rope-backed buffer with a single cursor plus snippet completion. The
//! app layer owns the buffer through [`crate::session::Session`] and drives
//! it from key and mouse messages.

mod buffer;
mod completion;

pub use buffer::{Cursor, Direction, EditorBuffer};
pub use completion::{CompletionState, SNIPPETS, Snippet, indent_template, matching_snippets};
