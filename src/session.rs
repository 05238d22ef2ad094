//! Session state: the DSL text and the render generation.

use crate::editor::EditorBuffer;

/// Default source shown when no file is given.
pub const DEFAULT_SOURCE: &str = "st=>start: Start\ne=>end: End\nst->e";

/// The editor buffer plus the counter that forces fresh renders.
///
/// The generation only ever increases: Render and Clear each bump it, while
/// typing leaves it alone.
#[derive(Debug, Clone)]
pub struct Session {
    pub buffer: EditorBuffer,
    generation: u64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(DEFAULT_SOURCE)
    }
}

impl Session {
    pub fn new(text: &str) -> Self {
        Self {
            buffer: EditorBuffer::from_text(text),
            generation: 0,
        }
    }

    pub fn text(&self) -> String {
        self.buffer.text()
    }

    pub fn is_blank(&self) -> bool {
        self.buffer.is_blank()
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Request a fresh render of the current text.
    pub const fn render(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Empty the text and force a render of the empty document.
    pub fn clear(&mut self) -> u64 {
        self.buffer.set_text("");
        self.render()
    }

    /// Replace the text without touching the generation.
    pub fn set_text(&mut self, text: &str) {
        self.buffer.set_text(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_session_seeds_example() {
        let session = Session::default();
        assert_eq!(session.text(), DEFAULT_SOURCE);
        assert_eq!(session.generation(), 0);
        assert!(!session.buffer.is_dirty());
    }

    #[test]
    fn test_clear_empties_text_and_bumps_generation() {
        let mut session = Session::default();
        session.render();
        assert_eq!(session.clear(), 2);
        assert_eq!(session.text(), "");
        assert!(session.is_blank());
    }

    #[test]
    fn test_set_text_keeps_generation() {
        let mut session = Session::default();
        session.set_text("a=>start: A");
        assert_eq!(session.generation(), 0);
        assert_eq!(session.text(), "a=>start: A");
    }

    #[derive(Debug, Clone)]
    enum Op {
        Render,
        Clear,
        Type(char),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Render),
            Just(Op::Clear),
            proptest::char::range(' ', '~').prop_map(Op::Type),
        ]
    }

    proptest! {
        #[test]
        fn prop_generation_never_decreases(ops in proptest::collection::vec(op(), 0..64)) {
            let mut session = Session::default();
            let mut last = session.generation();
            for op in ops {
                match op {
                    Op::Render => { session.render(); }
                    Op::Clear => {
                        session.clear();
                        prop_assert!(session.is_blank());
                    }
                    Op::Type(ch) => session.buffer.insert_char(ch),
                }
                prop_assert!(session.generation() >= last);
                last = session.generation();
            }
        }
    }
}
