use ropey::Rope;

/// Visible window over the item's lines.
#[derive(Debug, Clone)]
pub struct Viewport {
    pub top_line: usize,
    pub height: u16,
    pub scroll_off: u16,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            top_line: 0,
            height: 24,
            scroll_off: 3,
        }
    }
}

/// The item being edited in the host. Snapshots of the rope are what the
/// autosave component persists.
#[derive(Debug, Clone, Default)]
pub struct ItemDraft {
    rope: Rope,
    /// Cursor as a char index into the rope.
    cursor: usize,
    /// Column to return to when moving vertically through shorter lines.
    desired_col: Option<usize>,
    pub viewport: Viewport,
}

impl ItemDraft {
    pub fn from_rope(rope: Rope) -> Self {
        Self {
            rope,
            ..Self::default()
        }
    }

    pub fn snapshot(&self) -> Rope {
        self.rope.clone()
    }

    pub fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    /// Line text without its line ending.
    pub fn line_text(&self, idx: usize) -> Option<String> {
        if idx >= self.rope.len_lines() {
            return None;
        }
        let line = self.rope.line(idx).to_string();
        Some(line.trim_end_matches(['\n', '\r']).to_string())
    }

    /// Cursor as (row, column), both in chars.
    pub fn cursor(&self) -> (usize, usize) {
        let row = self.rope.char_to_line(self.cursor);
        (row, self.cursor - self.rope.line_to_char(row))
    }

    pub fn insert_char(&mut self, ch: char) {
        self.rope.insert_char(self.cursor, ch);
        self.cursor += 1;
        self.touch();
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    /// Backspace. Returns false when there was nothing to delete.
    pub fn delete_char_before(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.rope.remove(self.cursor - 1..self.cursor);
        self.cursor -= 1;
        self.touch();
        true
    }

    pub fn move_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
        self.desired_col = None;
    }

    pub fn move_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.rope.len_chars());
        self.desired_col = None;
    }

    pub fn move_line_start(&mut self) {
        let (row, _) = self.cursor();
        self.cursor = self.rope.line_to_char(row);
        self.desired_col = None;
    }

    pub fn move_line_end(&mut self) {
        let (row, _) = self.cursor();
        self.cursor = self.rope.line_to_char(row) + self.line_len(row);
        self.desired_col = None;
    }

    pub fn move_vertical(&mut self, delta: isize) {
        let (row, col) = self.cursor();
        let target = row.saturating_add_signed(delta).min(self.line_count().saturating_sub(1));
        if target == row {
            return;
        }
        let col = *self.desired_col.get_or_insert(col);
        self.cursor = self.rope.line_to_char(target) + col.min(self.line_len(target));
    }

    /// Keep the cursor row inside the viewport, honoring `scroll_off`.
    pub fn scroll_to_cursor(&mut self) {
        let (row, _) = self.cursor();
        let height = usize::from(self.viewport.height.max(1));
        let off = usize::from(self.viewport.scroll_off).min(height.saturating_sub(1) / 2);

        if row < self.viewport.top_line + off {
            self.viewport.top_line = row.saturating_sub(off);
        } else if row + off >= self.viewport.top_line + height {
            self.viewport.top_line = row + off + 1 - height;
        }
    }

    fn line_len(&self, row: usize) -> usize {
        self.line_text(row).map(|line| line.chars().count()).unwrap_or(0)
    }

    fn touch(&mut self) {
        self.desired_col = None;
    }
}
