use crate::app::{Model, ToastLevel};
use crate::editor::{CompletionState, Direction};

/// All possible events and actions in the application.
///
/// These represent user input, system events, and internal actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    // Toolbar
    /// Bump the generation and render the current text
    Render,
    /// Export the mounted diagram as flowchart.png
    Download,
    /// Empty the editor and the preview
    Clear,

    // Editor
    /// Insert a character at the cursor
    EditorInsertChar(char),
    /// Insert indentation at the cursor
    EditorInsertTab,
    /// Delete character before cursor (Backspace)
    EditorDeleteBack,
    /// Delete character at cursor (Delete)
    EditorDeleteForward,
    /// Split line at cursor (Enter)
    EditorSplitLine,
    /// Move cursor in a direction
    EditorMoveCursor(Direction),
    /// Move cursor to beginning of line (Home)
    EditorMoveHome,
    /// Move cursor to end of line (End)
    EditorMoveEnd,
    /// Move cursor one word left (Ctrl+Left)
    EditorMoveWordLeft,
    /// Move cursor one word right (Ctrl+Right)
    EditorMoveWordRight,
    /// Move cursor to start of buffer (Ctrl+Home)
    EditorMoveToStart,
    /// Move cursor to end of buffer (Ctrl+End)
    EditorMoveToEnd,
    /// Move cursor to (line, display column), e.g. from a mouse click
    EditorMoveTo(usize, usize),
    /// Scroll editor viewport up by n lines
    EditorScrollUp(usize),
    /// Scroll editor viewport down by n lines
    EditorScrollDown(usize),
    /// Move the cursor up one screen
    EditorPageUp,
    /// Move the cursor down one screen
    EditorPageDown,

    // Completion
    CompletionNext,
    CompletionPrev,
    /// Replace the typed word with the selected snippet
    CompletionAccept,
    CompletionDismiss,

    // Preview
    /// Scroll a tall diagram up by n rows
    PreviewScrollUp(u16),
    /// Scroll a tall diagram down by n rows
    PreviewScrollDown(u16),

    // File
    /// Write the buffer to the source file
    Save,
    /// Source file changed externally
    FileChanged,

    // Overlays
    /// Toggle help overlay
    ToggleHelp,
    /// Hide help overlay
    HideHelp,
    HelpScrollUp(usize),
    HelpScrollDown(usize),
    /// Close the blocking alert
    DismissAlert,

    // Window
    /// Terminal resized
    Resize(u16, u16),
    /// Redraw screen
    Redraw,

    // Application
    /// Quit the application
    Quit,
}

/// Pure function that updates the model based on a message.
///
/// This is the core of TEA - all state transitions happen here.
/// File and export I/O happen afterwards in the side-effect handler.
pub fn update(mut model: Model, msg: Message) -> Model {
    // Save preserves the flag so Ctrl+S can complete a pending quit.
    if !matches!(msg, Message::Quit | Message::Save) {
        model.quit_confirmed = false;
    }

    match msg {
        // Toolbar
        Message::Render => {
            let generation = model.session.render();
            model.completion = None;
            model.request_render();
            tracing::debug!(generation, "render requested");
        }
        Message::Clear => {
            let generation = model.session.clear();
            model.clear_preview();
            model.completion = None;
            model.editor_scroll_offset = 0;
            tracing::debug!(generation, "cleared");
        }
        Message::Download | Message::Save | Message::FileChanged | Message::Redraw => {}

        // Editor
        Message::EditorInsertChar(ch) => {
            model.session.buffer.insert_char(ch);
            after_edit(&mut model, true);
        }
        Message::EditorInsertTab => {
            model.session.buffer.insert_str("    ");
            after_edit(&mut model, false);
        }
        Message::EditorDeleteBack => {
            if model.session.buffer.delete_back() {
                let reopen = model.completion.is_some();
                after_edit(&mut model, reopen);
            }
        }
        Message::EditorDeleteForward => {
            if model.session.buffer.delete_forward() {
                after_edit(&mut model, false);
            }
        }
        Message::EditorSplitLine => {
            model.session.buffer.split_line();
            after_edit(&mut model, false);
        }
        Message::EditorMoveCursor(dir) => {
            model.session.buffer.move_cursor(dir);
            after_move(&mut model);
        }
        Message::EditorMoveHome => {
            model.session.buffer.move_home();
            after_move(&mut model);
        }
        Message::EditorMoveEnd => {
            model.session.buffer.move_end();
            after_move(&mut model);
        }
        Message::EditorMoveWordLeft => {
            model.session.buffer.move_word_left();
            after_move(&mut model);
        }
        Message::EditorMoveWordRight => {
            model.session.buffer.move_word_right();
            after_move(&mut model);
        }
        Message::EditorMoveToStart => {
            model.session.buffer.move_to_start();
            after_move(&mut model);
        }
        Message::EditorMoveToEnd => {
            model.session.buffer.move_to_end();
            after_move(&mut model);
        }
        Message::EditorMoveTo(line, col) => {
            model.session.buffer.move_to_display(line, col);
            after_move(&mut model);
        }
        Message::EditorScrollUp(n) => {
            model.editor_scroll_offset = model.editor_scroll_offset.saturating_sub(n);
        }
        Message::EditorScrollDown(n) => {
            let max = model.session.buffer.line_count().saturating_sub(1);
            model.editor_scroll_offset = (model.editor_scroll_offset + n).min(max);
        }
        Message::EditorPageUp => page(&mut model, Direction::Up),
        Message::EditorPageDown => page(&mut model, Direction::Down),

        // Completion
        Message::CompletionNext => {
            if let Some(completion) = &mut model.completion {
                completion.select_next();
            }
        }
        Message::CompletionPrev => {
            if let Some(completion) = &mut model.completion {
                completion.select_prev();
            }
        }
        Message::CompletionAccept => {
            if let Some(completion) = model.completion.take()
                && completion.accept(&mut model.session.buffer)
            {
                model.mark_edited();
                editor_ensure_cursor_visible(&mut model);
            }
        }
        Message::CompletionDismiss => {
            model.completion = None;
        }

        // Preview
        Message::PreviewScrollUp(n) => {
            model.preview_scroll_offset = model.preview_scroll_offset.saturating_sub(n);
        }
        Message::PreviewScrollDown(n) => {
            let max = model.max_preview_scroll();
            model.preview_scroll_offset = model.preview_scroll_offset.saturating_add(n).min(max);
        }

        // Overlays
        Message::ToggleHelp => {
            model.help_visible = !model.help_visible;
            model.help_scroll_offset = 0;
        }
        Message::HideHelp => {
            model.help_visible = false;
        }
        Message::HelpScrollUp(n) => {
            model.help_scroll_offset = model.help_scroll_offset.saturating_sub(n);
        }
        Message::HelpScrollDown(n) => {
            let max = crate::ui::help_line_count(&model).saturating_sub(1);
            model.help_scroll_offset = (model.help_scroll_offset + n).min(max);
        }
        Message::DismissAlert => {
            model.alert = None;
        }

        // Window
        Message::Resize(width, height) => {
            model.terminal_size = (width, height);
            editor_ensure_cursor_visible(&mut model);
            // The raster was sized for the old pane width.
            if model.graphics_active() && model.preview.mounted().is_some() {
                model.request_render();
            }
        }

        // Application
        Message::Quit => {
            if model.is_dirty() && !model.quit_confirmed {
                model.show_toast(
                    ToastLevel::Warning,
                    "Unsaved changes! Press Ctrl+Q again to quit, or Ctrl+S to save",
                );
                model.quit_confirmed = true;
            } else {
                model.should_quit = true;
            }
        }
    }
    model
}

/// Bookkeeping shared by every text edit.
fn after_edit(model: &mut Model, refresh_completion: bool) {
    model.mark_edited();
    model.completion = if refresh_completion && !model.plain {
        CompletionState::for_buffer(&model.session.buffer)
    } else {
        None
    };
    editor_ensure_cursor_visible(model);
}

fn page(model: &mut Model, dir: Direction) {
    for _ in 0..model.editor_visible_rows().max(1) {
        model.session.buffer.move_cursor(dir);
    }
    after_move(model);
}

fn after_move(model: &mut Model) {
    model.completion = None;
    editor_ensure_cursor_visible(model);
}

/// Ensure the editor cursor line is visible in the viewport.
pub(super) fn editor_ensure_cursor_visible(model: &mut Model) {
    let cursor_line = model.session.buffer.cursor().line;
    let visible_height = model.editor_visible_rows();
    if visible_height == 0 {
        model.editor_scroll_offset = cursor_line;
        return;
    }

    if cursor_line < model.editor_scroll_offset {
        model.editor_scroll_offset = cursor_line;
    } else if cursor_line >= model.editor_scroll_offset + visible_height {
        model.editor_scroll_offset = cursor_line + 1 - visible_height;
    }
}
