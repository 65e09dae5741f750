//! Single-line input buffer with a cursor.

use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Left,
    Right,
    Up,
    Down,
    Tab,
    CtrlC,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown key: {0}")]
pub struct KeyParseError(pub String);

impl FromStr for Key {
    type Err = KeyParseError;

    /// Accepts a single character or a key name such as `Enter`, `ArrowUp`
    /// or `Ctrl+C` (case-insensitive).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            return match ch {
                '\r' | '\n' => Ok(Key::Enter),
                '\t' => Ok(Key::Tab),
                '\u{7f}' | '\u{8}' => Ok(Key::Backspace),
                '\u{3}' => Ok(Key::CtrlC),
                ch => Ok(Key::Char(ch)),
            };
        }
        match s.to_ascii_lowercase().as_str() {
            "enter" | "return" => Ok(Key::Enter),
            "backspace" => Ok(Key::Backspace),
            "left" | "arrowleft" => Ok(Key::Left),
            "right" | "arrowright" => Ok(Key::Right),
            "up" | "arrowup" => Ok(Key::Up),
            "down" | "arrowdown" => Ok(Key::Down),
            "tab" => Ok(Key::Tab),
            "space" => Ok(Key::Char(' ')),
            "ctrl+c" | "ctrlc" | "control+c" => Ok(Key::CtrlC),
            _ => Err(KeyParseError(s.to_string())),
        }
    }
}

/// `cursor` counts characters, not bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineEditor {
    line: String,
    cursor: usize,
}

impl LineEditor {
    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    fn byte_offset(&self, char_index: usize) -> usize {
        self.line
            .char_indices()
            .nth(char_index)
            .map_or(self.line.len(), |(offset, _)| offset)
    }

    pub fn before_cursor(&self) -> &str {
        &self.line[..self.byte_offset(self.cursor)]
    }

    pub fn insert(&mut self, ch: char) {
        let offset = self.byte_offset(self.cursor);
        self.line.insert(offset, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        let offset = self.byte_offset(self.cursor);
        self.line.remove(offset);
        true
    }

    pub fn move_left(&mut self) -> bool {
        if self.cursor == 0 {
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn move_right(&mut self) -> bool {
        if self.cursor >= self.line.chars().count() {
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Replaces the whole line and moves the cursor to its end.
    pub fn set_line(&mut self, line: impl Into<String>) {
        self.line = line.into();
        self.cursor = self.line.chars().count();
    }

    pub fn clear(&mut self) {
        self.line.clear();
        self.cursor = 0;
    }

    pub fn take_line(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.line)
    }

    /// Replaces the text between byte offset `start` and the cursor, leaving
    /// the cursor right after `replacement`.
    pub fn replace_before_cursor(&mut self, start: usize, replacement: &str) {
        let end = self.byte_offset(self.cursor);
        let start = start.min(end);
        self.line.replace_range(start..end, replacement);
        self.cursor = self.line[..start].chars().count() + replacement.chars().count();
    }
}
