use super::piece_table::{Piece, PieceTable};
use crate::error::EditResult;
use crate::observer::{Listeners, Subscription};
use log::debug;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Payload delivered to listeners after every completed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextChange {
    Inserted {
        position: usize,
        length: usize,
        text: String,
    },
    Deleted {
        position: usize,
        length: usize,
        text: String,
    },
}

impl TextChange {
    pub fn position(&self) -> usize {
        match self {
            TextChange::Inserted { position, .. } | TextChange::Deleted { position, .. } => {
                *position
            }
        }
    }

    /// Length of the affected run in characters.
    pub fn len(&self) -> usize {
        match self {
            TextChange::Inserted { length, .. } | TextChange::Deleted { length, .. } => *length,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Observer of text mutations. Called inline, before the mutating call
/// returns, so every listener sees the same post-mutation state.
pub trait ChangeListener {
    fn text_changed(&mut self, change: &TextChange);
}

impl<F: FnMut(&TextChange)> ChangeListener for F {
    fn text_changed(&mut self, change: &TextChange) {
        self(change)
    }
}

/// Canonical text storage: a piece table plus its change listeners.
///
/// Listeners must not mutate the buffer from inside `text_changed`.
#[derive(Default)]
pub struct TextBuffer {
    piece_table: PieceTable,
    listeners: Listeners<dyn ChangeListener>,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_string(content: String) -> Self {
        Self {
            piece_table: PieceTable::from_string(content),
            listeners: Listeners::new(),
        }
    }

    pub fn subscribe(&mut self, listener: Rc<RefCell<dyn ChangeListener>>) -> Subscription {
        self.listeners.add(listener)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.listeners.remove(subscription)
    }

    fn notify(&self, change: TextChange) {
        debug!("text change: {change:?}");
        self.listeners.notify(|listener| listener.text_changed(&change));
    }

    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let position = self.piece_table.len();
        self.piece_table.append(text);
        self.notify(TextChange::Inserted {
            position,
            length: self.piece_table.len() - position,
            text: text.to_string(),
        });
    }

    pub fn insert(&mut self, position: usize, text: &str) -> EditResult<()> {
        let before = self.piece_table.len();
        self.piece_table.insert(position, text)?;
        if text.is_empty() {
            return Ok(());
        }
        self.notify(TextChange::Inserted {
            position,
            length: self.piece_table.len() - before,
            text: text.to_string(),
        });
        Ok(())
    }

    /// Delete up to `length` characters at `position`; returns what was
    /// removed. The length is clamped to the end of the text.
    pub fn delete(&mut self, position: usize, length: usize) -> EditResult<String> {
        let removed = self.piece_table.delete(position, length)?;
        if !removed.is_empty() {
            self.notify(TextChange::Deleted {
                position,
                length: removed.chars().count(),
                text: removed.clone(),
            });
        }
        Ok(removed)
    }

    pub fn text(&self) -> String {
        self.piece_table.text()
    }

    pub fn text_range(&self, start: usize, end: usize) -> EditResult<String> {
        self.piece_table.text_range(start, end)
    }

    pub(crate) fn text_between(&self, start: usize, end: usize) -> String {
        self.piece_table.collect_range(start, end)
    }

    pub fn char_at(&self, position: usize) -> Option<char> {
        self.piece_table.char_at(position)
    }

    pub fn len(&self) -> usize {
        self.piece_table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.piece_table.is_empty()
    }

    pub fn pieces(&self) -> &[Piece] {
        self.piece_table.pieces()
    }
}

impl fmt::Display for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.piece_table)
    }
}

impl fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBuffer")
            .field("piece_table", &self.piece_table)
            .field("listeners", &self.listeners)
            .finish()
    }
}
