use ropey::Rope;
use unicode_width::UnicodeWidthStr;

/// Cursor position in the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    /// Zero-based line index.
    pub line: usize,
    /// Byte offset within the line.
    pub col: usize,
    /// Column to return to when moving vertically through shorter lines.
    sticky_col: usize,
}

impl Cursor {
    pub const fn new() -> Self {
        Self::at(0, 0)
    }

    pub const fn at(line: usize, col: usize) -> Self {
        Self {
            line,
            col,
            sticky_col: col,
        }
    }

    const fn set_col(&mut self, col: usize) {
        self.col = col;
        self.sticky_col = col;
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Rope-backed source buffer with a single cursor.
///
/// Columns are byte offsets into the line and always sit on a char
/// boundary. Any mutation marks the buffer dirty until [`mark_clean`]
/// is called after a save or reload.
///
/// [`mark_clean`]: EditorBuffer::mark_clean
#[derive(Clone)]
pub struct EditorBuffer {
    rope: Rope,
    cursor: Cursor,
    dirty: bool,
}

impl EditorBuffer {
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            cursor: Cursor::new(),
            dirty: false,
        }
    }

    pub fn empty() -> Self {
        Self::from_text("")
    }

    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub const fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Line content without its line ending.
    pub fn line_at(&self, line_idx: usize) -> Option<String> {
        if line_idx >= self.rope.len_lines() {
            return None;
        }
        let mut line = self.rope.line(line_idx).to_string();
        let trimmed_len = line.trim_end_matches(['\n', '\r']).len();
        line.truncate(trimmed_len);
        Some(line)
    }

    pub fn line_len(&self, line_idx: usize) -> usize {
        self.line_at(line_idx).map_or(0, |line| line.len())
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    /// Whether the buffer holds nothing but whitespace.
    pub fn is_blank(&self) -> bool {
        self.rope.chars().all(char::is_whitespace)
    }

    /// Replace the whole content, keeping the cursor as close as possible.
    pub fn set_text(&mut self, text: &str) {
        self.rope = Rope::from_str(text);
        let line = self.cursor.line;
        let col = self.cursor.col;
        self.move_to(line, col);
        self.dirty = true;
    }

    pub fn insert_char(&mut self, ch: char) {
        if ch == '\n' {
            self.split_line();
            return;
        }
        let idx = self.cursor_char_idx();
        self.rope.insert_char(idx, ch);
        self.cursor.set_col(self.cursor.col + ch.len_utf8());
        self.dirty = true;
    }

    /// Insert text at the cursor and leave the cursor after it.
    pub fn insert_str(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let idx = self.cursor_char_idx();
        self.rope.insert(idx, text);
        match text.rsplit_once('\n') {
            Some((head, tail)) => {
                self.cursor.line += head.matches('\n').count() + 1;
                self.cursor.set_col(tail.len());
            }
            None => self.cursor.set_col(self.cursor.col + text.len()),
        }
        self.dirty = true;
    }

    /// Remove `byte_len` bytes immediately before the cursor, then insert
    /// `text` in their place.
    pub fn replace_before_cursor(&mut self, byte_len: usize, text: &str) {
        let byte_len = byte_len.min(self.cursor.col);
        if byte_len > 0 {
            let end = self.cursor_char_idx();
            let line_start = self.rope.line_to_byte(self.cursor.line);
            let start = self
                .rope
                .byte_to_char(line_start + self.cursor.col - byte_len);
            self.rope.remove(start..end);
            self.cursor.set_col(self.cursor.col - byte_len);
            self.dirty = true;
        }
        self.insert_str(text);
    }

    /// Break the line at the cursor.
    pub fn split_line(&mut self) {
        let idx = self.cursor_char_idx();
        self.rope.insert_char(idx, '\n');
        self.cursor.line += 1;
        self.cursor.set_col(0);
        self.dirty = true;
    }

    /// Backspace. Returns `true` if anything was removed.
    pub fn delete_back(&mut self) -> bool {
        let idx = self.cursor_char_idx();
        if idx == 0 {
            return false;
        }
        if self.cursor.col == 0 {
            let joined_col = self.line_len(self.cursor.line - 1);
            let removed = self.line_ending_len(self.cursor.line - 1);
            self.rope.remove(idx - removed..idx);
            self.cursor.line -= 1;
            self.cursor.set_col(joined_col);
        } else {
            let prev_len = self.rope.char(idx - 1).len_utf8();
            self.rope.remove(idx - 1..idx);
            self.cursor.set_col(self.cursor.col - prev_len);
        }
        self.dirty = true;
        true
    }

    /// Delete. Returns `true` if anything was removed.
    pub fn delete_forward(&mut self) -> bool {
        let idx = self.cursor_char_idx();
        if idx >= self.rope.len_chars() {
            return false;
        }
        let removed = if self.cursor.col >= self.line_len(self.cursor.line) {
            self.line_ending_len(self.cursor.line).max(1)
        } else {
            1
        };
        self.rope.remove(idx..idx + removed);
        self.dirty = true;
        true
    }

    pub fn move_cursor(&mut self, direction: Direction) {
        match direction {
            Direction::Left => self.move_left(),
            Direction::Right => self.move_right(),
            Direction::Up => self.move_vertical(-1),
            Direction::Down => self.move_vertical(1),
        }
    }

    pub const fn move_home(&mut self) {
        self.cursor.set_col(0);
    }

    pub fn move_end(&mut self) {
        self.cursor.set_col(self.line_len(self.cursor.line));
    }

    /// Jump to the start of the previous word, wrapping to the previous line.
    pub fn move_word_left(&mut self) {
        if self.cursor.col == 0 {
            if self.cursor.line > 0 {
                self.cursor.line -= 1;
                self.move_end();
            }
            return;
        }
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        let before = line[..self.cursor.col].trim_end_matches(|c: char| !is_word_char(c));
        let start = before
            .rfind(|c: char| !is_word_char(c))
            .map_or(0, |idx| idx + before[idx..].chars().next().map_or(1, char::len_utf8));
        self.cursor.set_col(start);
    }

    /// Jump past the current word and the separators after it.
    pub fn move_word_right(&mut self) {
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        if self.cursor.col >= line.len() {
            if self.cursor.line + 1 < self.line_count() {
                self.cursor.line += 1;
                self.cursor.set_col(0);
            }
            return;
        }
        let after = &line[self.cursor.col..];
        let word_end = after.find(|c: char| !is_word_char(c)).unwrap_or(after.len());
        let gap = after[word_end..]
            .find(is_word_char)
            .unwrap_or(after.len() - word_end);
        self.cursor.set_col(self.cursor.col + word_end + gap);
    }

    /// Place the cursor, clamping to the buffer and snapping to a char boundary.
    pub fn move_to(&mut self, line: usize, col: usize) {
        self.cursor.line = line.min(self.line_count().saturating_sub(1));
        let text = self.line_at(self.cursor.line).unwrap_or_default();
        let mut col = col.min(text.len());
        while !text.is_char_boundary(col) {
            col -= 1;
        }
        self.cursor.set_col(col);
    }

    /// Place the cursor at a display column, as a mouse click would.
    pub fn move_to_display(&mut self, line: usize, display_col: usize) {
        let line = line.min(self.line_count().saturating_sub(1));
        let text = self.line_at(line).unwrap_or_default();
        let mut width = 0;
        let mut col = text.len();
        for (idx, ch) in text.char_indices() {
            let ch_width = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
            if width + ch_width > display_col {
                col = idx;
                break;
            }
            width += ch_width;
        }
        self.move_to(line, col);
    }

    pub const fn move_to_start(&mut self) {
        self.cursor.line = 0;
        self.cursor.set_col(0);
    }

    pub fn move_to_end(&mut self) {
        self.cursor.line = self.line_count().saturating_sub(1);
        self.move_end();
    }

    /// Terminal column of the cursor within its line.
    pub fn cursor_display_col(&self) -> usize {
        self.line_at(self.cursor.line)
            .map_or(0, |line| line[..self.cursor.col.min(line.len())].width())
    }

    /// Leading whitespace of the cursor's line.
    pub fn current_indent(&self) -> String {
        self.line_at(self.cursor.line)
            .unwrap_or_default()
            .chars()
            .take_while(|c| *c == ' ' || *c == '\t')
            .collect()
    }

    /// The identifier immediately left of the cursor, if any.
    pub fn word_before_cursor(&self) -> String {
        let line = self.line_at(self.cursor.line).unwrap_or_default();
        let before = &line[..self.cursor.col.min(line.len())];
        let start = before
            .char_indices()
            .rev()
            .take_while(|(_, c)| is_word_char(*c))
            .last()
            .map_or(before.len(), |(idx, _)| idx);
        before[start..].to_string()
    }

    fn cursor_char_idx(&self) -> usize {
        let line_start = self.rope.line_to_byte(self.cursor.line);
        let col = self.cursor.col.min(self.line_len(self.cursor.line));
        self.rope.byte_to_char(line_start + col)
    }

    fn line_ending_len(&self, line_idx: usize) -> usize {
        let line = self.rope.line(line_idx);
        let len = line.len_chars();
        if len >= 2 && line.char(len - 2) == '\r' && line.char(len - 1) == '\n' {
            2
        } else {
            usize::from(len > 0 && matches!(line.char(len - 1), '\n' | '\r'))
        }
    }

    fn move_left(&mut self) {
        if self.cursor.col > 0 {
            let idx = self.cursor_char_idx();
            let prev_len = self.rope.char(idx - 1).len_utf8();
            self.cursor.set_col(self.cursor.col - prev_len);
        } else if self.cursor.line > 0 {
            self.cursor.line -= 1;
            self.move_end();
        }
    }

    fn move_right(&mut self) {
        if self.cursor.col < self.line_len(self.cursor.line) {
            let next_len = self.rope.char(self.cursor_char_idx()).len_utf8();
            self.cursor.set_col(self.cursor.col + next_len);
        } else if self.cursor.line + 1 < self.line_count() {
            self.cursor.line += 1;
            self.cursor.set_col(0);
        }
    }

    fn move_vertical(&mut self, delta: isize) {
        let Some(target) = self.cursor.line.checked_add_signed(delta) else {
            return;
        };
        if target >= self.line_count() {
            return;
        }
        let sticky = self.cursor.sticky_col;
        let text = self.line_at(target).unwrap_or_default();
        let mut col = sticky.min(text.len());
        while !text.is_char_boundary(col) {
            col -= 1;
        }
        self.cursor.line = target;
        self.cursor.col = col;
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl std::fmt::Debug for EditorBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorBuffer")
            .field("lines", &self.rope.len_lines())
            .field("cursor", &self.cursor)
            .field("dirty", &self.dirty)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_at(text: &str, line: usize, col: usize) -> EditorBuffer {
        let mut buf = EditorBuffer::from_text(text);
        buf.move_to(line, col);
        buf
    }

    #[test]
    fn test_empty_buffer_is_blank_single_line() {
        let buf = EditorBuffer::empty();
        assert_eq!(buf.line_count(), 1);
        assert_eq!(buf.line_at(0).as_deref(), Some(""));
        assert!(buf.is_blank());
        assert!(!buf.is_dirty());
    }

    #[test]
    fn test_whitespace_only_is_blank() {
        assert!(EditorBuffer::from_text(" \n\t\n").is_blank());
        assert!(!EditorBuffer::from_text(" st=>start\n").is_blank());
    }

    #[test]
    fn test_line_at_strips_crlf() {
        let buf = EditorBuffer::from_text("st=>start: A\r\ne=>end: B");
        assert_eq!(buf.line_at(0).as_deref(), Some("st=>start: A"));
        assert_eq!(buf.line_at(2), None);
    }

    #[test]
    fn test_text_round_trips() {
        let src = "st=>start: Start\ne=>end: End\nst->e\n";
        assert_eq!(EditorBuffer::from_text(src).text(), src);
    }

    #[test]
    fn test_typing_marks_dirty_until_clean() {
        let mut buf = EditorBuffer::empty();
        for ch in "st->e".chars() {
            buf.insert_char(ch);
        }
        assert_eq!(buf.text(), "st->e");
        assert_eq!(buf.cursor(), Cursor::at(0, 5));
        assert!(buf.is_dirty());
        buf.mark_clean();
        assert!(!buf.is_dirty());
    }

    #[test]
    fn test_insert_str_moves_cursor_to_end_of_last_line() {
        let mut buf = buffer_at("x", 0, 1);
        buf.insert_str(" then\n    \nendif");
        assert_eq!(buf.text(), "x then\n    \nendif");
        assert_eq!((buf.cursor().line, buf.cursor().col), (2, 5));
    }

    #[test]
    fn test_split_line_and_backspace_rejoin() {
        let mut buf = buffer_at("st->e", 0, 2);
        buf.split_line();
        assert_eq!(buf.text(), "st\n->e");
        assert_eq!((buf.cursor().line, buf.cursor().col), (1, 0));
        assert!(buf.delete_back());
        assert_eq!(buf.text(), "st->e");
        assert_eq!((buf.cursor().line, buf.cursor().col), (0, 2));
    }

    #[test]
    fn test_backspace_joins_crlf_lines() {
        let mut buf = buffer_at("a\r\nb", 1, 0);
        assert!(buf.delete_back());
        assert_eq!(buf.text(), "ab");
    }

    #[test]
    fn test_backspace_at_origin_is_noop() {
        let mut buf = EditorBuffer::from_text("abc");
        assert!(!buf.delete_back());
        assert!(!buf.is_dirty());
    }

    #[test]
    fn test_delete_forward_joins_and_stops_at_end() {
        let mut buf = buffer_at("ab\ncd", 0, 2);
        assert!(buf.delete_forward());
        assert_eq!(buf.text(), "abcd");
        buf.move_to_end();
        assert!(!buf.delete_forward());
    }

    #[test]
    fn test_multibyte_edits_stay_on_boundaries() {
        let mut buf = EditorBuffer::from_text("op=>operation: Größe");
        buf.move_end();
        assert_eq!(buf.cursor().col, 22);
        buf.move_cursor(Direction::Left);
        buf.move_cursor(Direction::Left);
        assert_eq!(buf.cursor().col, 19);
        assert!(buf.delete_back());
        assert_eq!(buf.text(), "op=>operation: Grße");
        assert_eq!(buf.cursor().col, 17);
        buf.move_to(0, 18);
        assert_eq!(buf.cursor().col, 17);
    }

    #[test]
    fn test_vertical_moves_remember_column() {
        let mut buf = buffer_at("long line here\nab\nanother long", 0, 10);
        buf.move_cursor(Direction::Down);
        assert_eq!(buf.cursor().col, 2);
        buf.move_cursor(Direction::Down);
        assert_eq!(buf.cursor().col, 10);
        buf.move_cursor(Direction::Down);
        assert_eq!(buf.cursor().line, 2);
    }

    #[test]
    fn test_horizontal_moves_wrap_lines() {
        let mut buf = buffer_at("ab\ncd", 0, 2);
        buf.move_cursor(Direction::Right);
        assert_eq!(buf.cursor(), Cursor::at(1, 0));
        buf.move_cursor(Direction::Left);
        assert_eq!((buf.cursor().line, buf.cursor().col), (0, 2));
    }

    #[test]
    fn test_word_motion() {
        let mut buf = buffer_at("cond(yes)->op1", 0, 14);
        buf.move_word_left();
        assert_eq!(buf.cursor().col, 11);
        buf.move_word_left();
        assert_eq!(buf.cursor().col, 5);
        buf.move_word_right();
        assert_eq!(buf.cursor().col, 11);
        buf.move_end();
        buf.move_word_right();
        assert_eq!(buf.cursor().col, 14);
    }

    #[test]
    fn test_move_to_display_handles_wide_chars() {
        let mut buf = EditorBuffer::from_text("流程图 ok");
        buf.move_to_display(0, 3);
        assert_eq!(buf.cursor().col, "流".len());
        assert_eq!(buf.cursor_display_col(), 2);
        buf.move_to_display(0, 99);
        assert_eq!(buf.cursor().col, buf.line_len(0));
    }

    #[test]
    fn test_word_before_cursor_and_indent() {
        let buf = buffer_at("    cond(yes)->wh", 0, 17);
        assert_eq!(buf.word_before_cursor(), "wh");
        assert_eq!(buf.current_indent(), "    ");
        let buf = buffer_at("a->", 0, 3);
        assert_eq!(buf.word_before_cursor(), "");
    }

    #[test]
    fn test_replace_before_cursor_swaps_word() {
        let mut buf = buffer_at("x = pri", 0, 7);
        buf.replace_before_cursor(3, "print(\"message\")");
        assert_eq!(buf.text(), "x = print(\"message\")");
        assert_eq!(buf.cursor().col, buf.line_len(0));
    }

    #[test]
    fn test_set_text_clamps_cursor() {
        let mut buf = buffer_at("one\ntwo\nthree", 2, 5);
        buf.set_text("a");
        assert_eq!(buf.cursor(), Cursor::at(0, 1));
        assert!(buf.is_dirty());
    }
}
