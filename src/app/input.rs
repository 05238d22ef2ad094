use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};

use crate::app::{App, Message, Model};
use crate::editor::Direction;
use crate::ui::{ToolbarButton, contains};

use super::event_loop::ResizeDebouncer;

const WHEEL_LINES: usize = 3;
const HELP_PAGE: usize = 10;

impl App {
    pub(super) fn handle_event(
        event: &Event,
        model: &Model,
        now_ms: u64,
        resize_debouncer: &mut ResizeDebouncer,
    ) -> Option<Message> {
        match event {
            Event::Key(key) => Self::handle_key(*key, model),
            Event::Mouse(mouse) => Self::handle_mouse(*mouse, model),
            Event::Resize(w, h) => {
                crate::perf::log_event("event.resize.queue", format!("width={w} height={h}"));
                resize_debouncer.queue(*w, *h, now_ms);
                None
            }
            _ => None,
        }
    }

    pub(super) fn handle_key(key: KeyEvent, model: &Model) -> Option<Message> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let alt = key.modifiers.contains(KeyModifiers::ALT);

        if ctrl && matches!(key.code, KeyCode::Char('c' | 'q')) {
            return Some(Message::Quit);
        }

        if model.alert.is_some() {
            return match key.code {
                KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ') => Some(Message::DismissAlert),
                _ => None,
            };
        }

        if model.help_visible {
            return match key.code {
                KeyCode::Esc | KeyCode::Char('q') => Some(Message::HideHelp),
                KeyCode::F(1) => Some(Message::ToggleHelp),
                KeyCode::Up => Some(Message::HelpScrollUp(1)),
                KeyCode::Down => Some(Message::HelpScrollDown(1)),
                KeyCode::PageUp => Some(Message::HelpScrollUp(HELP_PAGE)),
                KeyCode::PageDown => Some(Message::HelpScrollDown(HELP_PAGE)),
                _ => None,
            };
        }

        // Toolbar and application keys work regardless of completion state.
        match key.code {
            KeyCode::Char('r') if ctrl => return Some(Message::Render),
            KeyCode::Char('e') if ctrl => return Some(Message::Download),
            KeyCode::Char('l') if ctrl => return Some(Message::Clear),
            KeyCode::Char('s') if ctrl => return Some(Message::Save),
            KeyCode::F(5) => return Some(Message::Render),
            KeyCode::F(6) => return Some(Message::Download),
            KeyCode::F(8) => return Some(Message::Clear),
            KeyCode::F(1) => return Some(Message::ToggleHelp),
            _ => {}
        }

        if model.completion.is_some() {
            match key.code {
                KeyCode::Up => return Some(Message::CompletionPrev),
                KeyCode::Down => return Some(Message::CompletionNext),
                KeyCode::Tab => return Some(Message::CompletionAccept),
                KeyCode::Esc => return Some(Message::CompletionDismiss),
                _ => {}
            }
        }

        match key.code {
            KeyCode::Char(c) if !ctrl && !alt => Some(Message::EditorInsertChar(c)),
            KeyCode::Enter => Some(Message::EditorSplitLine),
            KeyCode::Tab => Some(Message::EditorInsertTab),
            KeyCode::Backspace => Some(Message::EditorDeleteBack),
            KeyCode::Delete => Some(Message::EditorDeleteForward),
            KeyCode::Left if ctrl => Some(Message::EditorMoveWordLeft),
            KeyCode::Right if ctrl => Some(Message::EditorMoveWordRight),
            KeyCode::Left => Some(Message::EditorMoveCursor(Direction::Left)),
            KeyCode::Right => Some(Message::EditorMoveCursor(Direction::Right)),
            KeyCode::Up => Some(Message::EditorMoveCursor(Direction::Up)),
            KeyCode::Down => Some(Message::EditorMoveCursor(Direction::Down)),
            KeyCode::Home if ctrl => Some(Message::EditorMoveToStart),
            KeyCode::End if ctrl => Some(Message::EditorMoveToEnd),
            KeyCode::Home => Some(Message::EditorMoveHome),
            KeyCode::End => Some(Message::EditorMoveEnd),
            KeyCode::PageUp => Some(Message::EditorPageUp),
            KeyCode::PageDown => Some(Message::EditorPageDown),
            _ => None,
        }
    }

    pub(super) fn handle_mouse(mouse: MouseEvent, model: &Model) -> Option<Message> {
        let left_up = matches!(mouse.kind, MouseEventKind::Up(MouseButton::Left));
        let left_down = matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left));

        if model.alert.is_some() {
            return left_up.then_some(Message::DismissAlert);
        }
        if model.help_visible {
            return match mouse.kind {
                MouseEventKind::ScrollUp => Some(Message::HelpScrollUp(WHEEL_LINES)),
                MouseEventKind::ScrollDown => Some(Message::HelpScrollDown(WHEEL_LINES)),
                MouseEventKind::Up(MouseButton::Left) => Some(Message::HideHelp),
                _ => None,
            };
        }

        let layout = model.layout();
        let (column, row) = (mouse.column, mouse.row);

        if left_up {
            return layout.button_at(column, row).map(|button| match button {
                ToolbarButton::Render => Message::Render,
                ToolbarButton::Download => Message::Download,
                ToolbarButton::Clear => Message::Clear,
            });
        }

        let in_editor = contains(layout.editor, column, row);
        let in_preview = contains(layout.preview, column, row);
        match mouse.kind {
            MouseEventKind::ScrollUp if in_editor => Some(Message::EditorScrollUp(WHEEL_LINES)),
            MouseEventKind::ScrollDown if in_editor => {
                Some(Message::EditorScrollDown(WHEEL_LINES))
            }
            MouseEventKind::ScrollUp if in_preview => {
                Some(Message::PreviewScrollUp(WHEEL_LINES as u16))
            }
            MouseEventKind::ScrollDown if in_preview => {
                Some(Message::PreviewScrollDown(WHEEL_LINES as u16))
            }
            _ if left_down && contains(layout.editor_inner, column, row) => {
                let inner = layout.editor_inner;
                let line = model.editor_scroll_offset + usize::from(row - inner.y);
                let text_x = inner.x
                    + crate::ui::editor_text_offset(model.session.buffer.line_count());
                let col = usize::from(column.saturating_sub(text_x));
                Some(Message::EditorMoveTo(line, col))
            }
            _ => None,
        }
    }
}
