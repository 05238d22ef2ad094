//! Inline snippet completion.

use super::EditorBuffer;

/// A completion entry: the word that triggers it and the text it expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Snippet {
    pub label: &'static str,
    pub detail: &'static str,
    pub template: &'static str,
}

pub const SNIPPETS: &[Snippet] = &[
    Snippet {
        label: "if",
        detail: "if statement",
        template: "if CONDITION then\n    \nendif",
    },
    Snippet {
        label: "while",
        detail: "while loop",
        template: "while CONDITION do\n    \nendwhile",
    },
    Snippet {
        label: "for",
        detail: "for loop",
        template: "for i = 1 to N do\n    \nnext i",
    },
    Snippet {
        label: "function",
        detail: "function definition",
        template: "function name(params)\n    \nendfunction",
    },
    Snippet {
        label: "print",
        detail: "print statement",
        template: "print(\"message\")",
    },
    Snippet {
        label: "start",
        detail: "start symbol",
        template: "st=>start: Start",
    },
    Snippet {
        label: "end",
        detail: "end symbol",
        template: "e=>end: End",
    },
    Snippet {
        label: "operation",
        detail: "operation symbol",
        template: "op=>operation: Operation",
    },
    Snippet {
        label: "inputoutput",
        detail: "input/output symbol",
        template: "io=>inputoutput: Input",
    },
    Snippet {
        label: "subroutine",
        detail: "subroutine symbol",
        template: "sub=>subroutine: Subroutine",
    },
    Snippet {
        label: "condition",
        detail: "condition symbol",
        template: "cond=>condition: Yes or No?",
    },
    Snippet {
        label: "parallel",
        detail: "parallel symbol",
        template: "para=>parallel: Parallel",
    },
];

/// Shortest word that opens the popup.
pub const MIN_PREFIX_LEN: usize = 2;

/// Snippets whose label starts with `prefix`.
///
/// Matching is case-sensitive and needs at least [`MIN_PREFIX_LEN`]
/// characters, so labels like `Start` or one-letter ids never match.
pub fn matching_snippets(prefix: &str) -> Vec<&'static Snippet> {
    if prefix.chars().count() < MIN_PREFIX_LEN {
        return Vec::new();
    }
    SNIPPETS
        .iter()
        .filter(|snippet| snippet.label.starts_with(prefix))
        .collect()
}

/// Whether some line declares `id` as a symbol (`id=>type: ...`).
fn is_declared_id(text: &str, id: &str) -> bool {
    text.lines().any(|line| {
        line.trim_start()
            .strip_prefix(id)
            .is_some_and(|rest| rest.trim_start().starts_with("=>"))
    })
}

/// Re-indent continuation lines of `template` with `indent`.
pub fn indent_template(template: &str, indent: &str) -> String {
    if indent.is_empty() {
        return template.to_string();
    }
    template.replace('\n', &format!("\n{indent}"))
}

/// The open completion popup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionState {
    pub prefix: String,
    pub items: Vec<&'static Snippet>,
    pub selected: usize,
}

impl CompletionState {
    /// Open for the word left of the cursor, if anything matches.
    ///
    /// Only the first word of a line is completed; ids after `->` or `=>`
    /// and label text never are. Words already declared as symbol ids are
    /// left alone too.
    pub fn for_buffer(buffer: &EditorBuffer) -> Option<Self> {
        let prefix = buffer.word_before_cursor();
        let cursor = buffer.cursor();
        let line = buffer.line_at(cursor.line).unwrap_or_default();
        let word_start = cursor.col.checked_sub(prefix.len())?;
        let leading = line.get(..word_start)?;
        if !leading.chars().all(char::is_whitespace) {
            return None;
        }
        let trailing = line.get(cursor.col..).unwrap_or_default();
        if trailing.chars().next().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            return None;
        }
        let items = matching_snippets(&prefix);
        if items.is_empty() || is_declared_id(&buffer.text(), &prefix) {
            return None;
        }
        if items.is_empty() {
            return None;
        }
        Some(Self {
            prefix,
            items,
            selected: 0,
        })
    }

    pub fn select_next(&mut self) {
        if !self.items.is_empty() {
            self.selected = (self.selected + 1) % self.items.len();
        }
    }

    pub fn select_prev(&mut self) {
        if !self.items.is_empty() {
            self.selected = self
                .selected
                .checked_sub(1)
                .unwrap_or(self.items.len() - 1);
        }
    }

    pub fn current(&self) -> Option<&'static Snippet> {
        self.items.get(self.selected).copied()
    }

    /// Replace the typed prefix with the selected template.
    ///
    /// Returns `false` if nothing was selected.
    pub fn accept(&self, buffer: &mut EditorBuffer) -> bool {
        let Some(snippet) = self.current() else {
            return false;
        };
        let text = indent_template(snippet.template, &buffer.current_indent());
        buffer.replace_before_cursor(self.prefix.len(), &text);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn typed(text: &str) -> EditorBuffer {
        let mut buf = EditorBuffer::from_text(text);
        buf.move_to_end();
        buf
    }

    #[test]
    fn test_prefix_matching_is_case_sensitive_and_needs_two_chars() {
        let labels: Vec<_> = matching_snippets("pa").iter().map(|s| s.label).collect();
        assert_eq!(labels, ["parallel"]);
        assert!(matching_snippets("Pa").is_empty());
        assert!(matching_snippets("St").is_empty());
        assert!(matching_snippets("p").is_empty());
        assert!(matching_snippets("").is_empty());
        assert!(matching_snippets("zzz").is_empty());
    }

    #[test]
    fn test_every_symbol_type_has_a_template() {
        for kind in crate::flowchart::SymbolKind::ALL {
            let label = kind.keyword();
            let snippet = SNIPPETS.iter().find(|s| s.label == label);
            assert!(snippet.is_some(), "missing snippet for {label}");
            let template = snippet.unwrap().template;
            assert!(crate::flowchart::parse_flowchart(template).is_ok(), "{template}");
        }
    }

    #[test]
    fn test_accept_replaces_word_and_keeps_indent() {
        let mut buf = typed("    wh");
        let state = CompletionState::for_buffer(&buf).unwrap();
        assert_eq!(state.current().map(|s| s.label), Some("while"));
        assert!(state.accept(&mut buf));
        assert_eq!(buf.text(), "    while CONDITION do\n        \n    endwhile");
        assert_eq!(buf.cursor().line, 2);
    }

    #[test]
    fn test_selection_wraps() {
        let mut state = CompletionState {
            prefix: String::new(),
            items: SNIPPETS.iter().take(2).collect(),
            selected: 0,
        };
        state.select_prev();
        assert_eq!(state.current().map(|s| s.label), Some("while"));
        state.select_next();
        assert_eq!(state.current().map(|s| s.label), Some("if"));
        state.select_next();
        state.select_next();
        assert_eq!(state.selected, 0);
    }

    #[test]
    fn test_no_popup_after_punctuation() {
        assert!(CompletionState::for_buffer(&typed("st->")).is_none());
    }

    #[test]
    fn test_no_popup_for_connection_targets_or_labels() {
        assert!(CompletionState::for_buffer(&typed("x=>end: X\nop->en")).is_none());
        assert!(CompletionState::for_buffer(&typed("st=>start: Start")).is_none());
        assert!(CompletionState::for_buffer(&typed("st=>start: start")).is_none());
        assert!(CompletionState::for_buffer(&typed("c=>condition: co")).is_none());
    }

    #[test]
    fn test_no_popup_for_declared_ids() {
        let buf = typed("para=>parallel: P\npa");
        assert!(CompletionState::for_buffer(&buf).is_none());
        let buf = typed("x=>parallel: P\npa");
        assert!(CompletionState::for_buffer(&buf).is_some());
    }

    #[test]
    fn test_no_popup_inside_a_word() {
        let mut buf = EditorBuffer::from_text("pa_rest");
        buf.move_to_end();
        for _ in 0.."_rest".len() {
            buf.move_cursor(crate::editor::Direction::Left);
        }
        assert!(CompletionState::for_buffer(&buf).is_none());
    }
}
