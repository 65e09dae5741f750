//! Per-session command history, most recent first.

pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Result of stepping through history with Up/Down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recall {
    /// Replace the input line with this entry.
    Entry(String),
    /// Stepped past the newest entry; clear the input line.
    Cleared,
    /// Already at the end in that direction.
    Unchanged,
}

#[derive(Debug, Clone)]
pub struct CommandHistory {
    entries: Vec<String>,
    limit: usize,
    cursor: Option<usize>,
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl CommandHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit,
            cursor: None,
        }
    }

    /// Pushes `command` to the front, dropping any older copy and anything
    /// past the limit. Blank commands are ignored. Always resets the cursor.
    pub fn record(&mut self, command: &str) {
        self.cursor = None;
        let command = command.trim();
        if command.is_empty() {
            return;
        }
        self.entries.retain(|entry| entry != command);
        self.entries.insert(0, command.to_string());
        self.entries.truncate(self.limit);
    }

    pub fn older(&mut self) -> Recall {
        let next = self.cursor.map_or(0, |cursor| cursor + 1);
        match self.entries.get(next) {
            Some(entry) => {
                self.cursor = Some(next);
                Recall::Entry(entry.clone())
            }
            None => Recall::Unchanged,
        }
    }

    pub fn newer(&mut self) -> Recall {
        match self.cursor {
            Some(0) => {
                self.cursor = None;
                Recall::Cleared
            }
            Some(cursor) => {
                self.cursor = Some(cursor - 1);
                self.entries
                    .get(cursor - 1)
                    .map_or(Recall::Unchanged, |entry| Recall::Entry(entry.clone()))
            }
            None => Recall::Unchanged,
        }
    }

    pub fn reset_cursor(&mut self) {
        self.cursor = None;
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
