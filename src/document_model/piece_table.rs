use crate::error::{EditError, EditResult};
use log::trace;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferType {
    Original,
    Add,
}

/// A run of text borrowed from one of the backing buffers.
///
/// `start` and `length` are byte offsets, so a piece always slices to a
/// valid `&str`. `chars` caches the character count, which is the unit
/// of every public position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    buffer: BufferType,
    start: usize,
    length: usize,
    chars: usize,
}

impl Piece {
    fn new(buffer: BufferType, start: usize, length: usize, chars: usize) -> Self {
        Self {
            buffer,
            start,
            length,
            chars,
        }
    }

    pub fn buffer(&self) -> BufferType {
        self.buffer
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn char_len(&self) -> usize {
        self.chars
    }

    fn end(&self) -> usize {
        self.start + self.length
    }

    /// True when `next` continues this piece in the same backing buffer.
    fn is_followed_by(&self, next: &Piece) -> bool {
        self.buffer == next.buffer && self.end() == next.start
    }
}

/// Byte offset of the `chars`-th character, or the end of `text`.
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(index, _)| index)
}

#[derive(Clone, Default)]
pub struct PieceTable {
    original: String,
    add: String,
    pieces: Vec<Piece>,
    total_chars: usize,
}

impl PieceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_string(text: String) -> Self {
        let chars = text.chars().count();
        let pieces = if text.is_empty() {
            Vec::new()
        } else {
            vec![Piece::new(BufferType::Original, 0, text.len(), chars)]
        };
        Self {
            original: text,
            add: String::new(),
            pieces,
            total_chars: chars,
        }
    }

    pub fn len(&self) -> usize {
        self.total_chars
    }

    pub fn is_empty(&self) -> bool {
        self.total_chars == 0
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    fn slice(&self, piece: &Piece) -> &str {
        let backing = match piece.buffer {
            BufferType::Original => &self.original,
            BufferType::Add => &self.add,
        };
        &backing[piece.start..piece.end()]
    }

    /// Cut `piece` after `at` characters.
    fn split_piece(&self, piece: &Piece, at: usize) -> (Piece, Piece) {
        let bytes = byte_offset(self.slice(piece), at);
        (
            Piece::new(piece.buffer, piece.start, bytes, at),
            Piece::new(
                piece.buffer,
                piece.start + bytes,
                piece.length - bytes,
                piece.chars - at,
            ),
        )
    }

    /// Index of the piece holding `position` and the offset inside it.
    /// `position == len` yields `(pieces.len(), 0)`.
    fn locate(&self, position: usize) -> (usize, usize) {
        let mut offset = 0;
        for (index, piece) in self.pieces.iter().enumerate() {
            if offset + piece.chars > position {
                return (index, position - offset);
            }
            offset += piece.chars;
        }
        (self.pieces.len(), 0)
    }

    /// Push `text` onto the add buffer and describe it as a piece.
    fn push_add(&mut self, text: &str) -> Piece {
        let start = self.add.len();
        self.add.push_str(text);
        Piece::new(BufferType::Add, start, text.len(), text.chars().count())
    }

    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let piece = self.push_add(text);
        self.total_chars += piece.chars;

        match self.pieces.last_mut() {
            Some(last) if last.is_followed_by(&piece) => {
                last.length += piece.length;
                last.chars += piece.chars;
            }
            _ => self.pieces.push(piece),
        }
        trace!("append: {} chars, {} pieces", piece.chars, self.pieces.len());
    }

    pub fn insert(&mut self, position: usize, text: &str) -> EditResult<()> {
        if position > self.total_chars {
            return Err(EditError::InvalidPosition {
                position,
                length: self.total_chars,
            });
        }
        if position == self.total_chars {
            self.append(text);
            return Ok(());
        }
        if text.is_empty() {
            return Ok(());
        }

        let (index, offset) = self.locate(position);
        let piece = self.push_add(text);
        self.total_chars += piece.chars;

        if offset == 0 {
            // Typing at the same spot keeps extending the previous add piece
            match index.checked_sub(1).map(|prev| &mut self.pieces[prev]) {
                Some(prev) if prev.is_followed_by(&piece) => {
                    prev.length += piece.length;
                    prev.chars += piece.chars;
                }
                _ => self.pieces.insert(index, piece),
            }
        } else {
            let (left, right) = self.split_piece(&self.pieces[index], offset);
            self.pieces[index] = left;
            self.pieces.splice(index + 1..index + 1, [piece, right]);
        }
        trace!("insert at {position}: {} pieces", self.pieces.len());
        Ok(())
    }

    /// Remove up to `length` characters starting at `position` and return
    /// them. Overlong deletes are clamped to the end of the text.
    pub fn delete(&mut self, position: usize, length: usize) -> EditResult<String> {
        if position >= self.total_chars {
            return Err(EditError::InvalidPosition {
                position,
                length: self.total_chars,
            });
        }
        let end = position + length.min(self.total_chars - position);
        if end == position {
            return Ok(String::new());
        }

        let removed = self.collect_range(position, end);
        let mut kept = Vec::with_capacity(self.pieces.len() + 1);
        let mut offset = 0;

        for piece in &self.pieces {
            let piece_start = offset;
            let piece_end = offset + piece.chars;
            offset = piece_end;

            if piece_end <= position || piece_start >= end {
                kept.push(*piece);
                continue;
            }
            if piece_start < position {
                let (left, _) = self.split_piece(piece, position - piece_start);
                kept.push(left);
            }
            if piece_end > end {
                let (_, right) = self.split_piece(piece, end - piece_start);
                kept.push(right);
            }
        }

        self.pieces = kept;
        self.total_chars -= end - position;
        self.normalize();
        trace!("delete {position}..{end}: {} pieces", self.pieces.len());
        Ok(removed)
    }

    /// Drop empty pieces and fuse neighbours that are contiguous in the
    /// same backing buffer.
    fn normalize(&mut self) {
        let mut merged: Vec<Piece> = Vec::with_capacity(self.pieces.len());
        for piece in self.pieces.drain(..) {
            if piece.chars == 0 {
                continue;
            }
            match merged.last_mut() {
                Some(last) if last.is_followed_by(&piece) => {
                    last.length += piece.length;
                    last.chars += piece.chars;
                }
                _ => merged.push(piece),
            }
        }
        self.pieces = merged;
    }

    pub fn text(&self) -> String {
        let mut result = String::with_capacity(self.original.len() + self.add.len());
        for piece in &self.pieces {
            result.push_str(self.slice(piece));
        }
        result
    }

    pub fn text_range(&self, start: usize, end: usize) -> EditResult<String> {
        if start > end || end > self.total_chars {
            return Err(EditError::InvalidRange {
                start,
                end,
                length: self.total_chars,
            });
        }
        Ok(self.collect_range(start, end))
    }

    /// Characters in `start..end`, clamped to the text.
    pub(crate) fn collect_range(&self, start: usize, end: usize) -> String {
        let end = end.min(self.total_chars);
        let mut result = String::new();
        if start >= end {
            return result;
        }

        let mut offset = 0;
        for piece in &self.pieces {
            let piece_end = offset + piece.chars;
            if offset >= end {
                break;
            }
            if piece_end > start {
                let text = self.slice(piece);
                let from = byte_offset(text, start.saturating_sub(offset));
                let to = byte_offset(text, end.min(piece_end) - offset);
                result.push_str(&text[from..to]);
            }
            offset = piece_end;
        }
        result
    }

    pub fn char_at(&self, position: usize) -> Option<char> {
        if position >= self.total_chars {
            return None;
        }
        let (index, offset) = self.locate(position);
        self.slice(&self.pieces[index]).chars().nth(offset)
    }
}

impl fmt::Display for PieceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for piece in &self.pieces {
            f.write_str(self.slice(piece))?;
        }
        Ok(())
    }
}

impl fmt::Debug for PieceTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PieceTable")
            .field("pieces", &self.pieces)
            .field("total_chars", &self.total_chars)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_normalized(table: &PieceTable) {
        let total: usize = table.pieces().iter().map(Piece::char_len).sum();
        assert_eq!(total, table.len());
        assert!(table.pieces().iter().all(|piece| piece.char_len() > 0));
        for pair in table.pieces().windows(2) {
            assert!(!pair[0].is_followed_by(&pair[1]), "unmerged pieces {pair:?}");
        }
    }

    #[test]
    fn test_new_empty() {
        let table = PieceTable::new();
        assert_eq!(table.len(), 0);
        assert!(table.is_empty());
        assert_eq!(table.text(), "");
        assert!(table.pieces().is_empty());
    }

    #[test]
    fn test_from_string() {
        let table = PieceTable::from_string("Hello, World!".to_string());
        assert_eq!(table.len(), 13);
        assert!(!table.is_empty());
        assert_eq!(table.text(), "Hello, World!");
    }

    #[test]
    fn test_insert_at_beginning() {
        let mut table = PieceTable::from_string("World!".to_string());
        table.insert(0, "Hello, ").unwrap();
        assert_eq!(table.text(), "Hello, World!");
        assert_normalized(&table);
    }

    #[test]
    fn test_insert_at_end_is_append() {
        let mut table = PieceTable::from_string("Hello".to_string());
        table.insert(5, ", World").unwrap();
        table.append("!");
        assert_eq!(table.text(), "Hello, World!");
        // The append continues the add piece written by the insert
        assert_eq!(table.pieces().len(), 2);
    }

    #[test]
    fn test_insert_in_middle_splits_piece() {
        let mut table = PieceTable::from_string("HelloWorld!".to_string());
        table.insert(5, ", ").unwrap();
        assert_eq!(table.text(), "Hello, World!");
        assert_eq!(table.pieces().len(), 3);
        assert_normalized(&table);
    }

    #[test]
    fn test_sequential_typing_extends_piece() {
        let mut table = PieceTable::from_string("ac".to_string());
        table.insert(1, "b").unwrap();
        table.insert(2, "b").unwrap();
        table.insert(3, "b").unwrap();
        assert_eq!(table.text(), "abbbc");
        assert_eq!(table.pieces().len(), 3);
    }

    #[test]
    fn test_insert_past_end_rejected() {
        let mut table = PieceTable::from_string("abc".to_string());
        let err = table.insert(4, "x").unwrap_err();
        assert_eq!(err, EditError::InvalidPosition { position: 4, length: 3 });
        assert_eq!(table.text(), "abc");
    }

    #[test]
    fn test_delete_index_bounds() {
        let mut table = PieceTable::new();
        table.insert(0, "Hello World").unwrap();

        assert_eq!(table.delete(5, 6).unwrap(), " World");
        assert_eq!(table.text(), "Hello");

        table.insert(5, " Beautiful Day").unwrap();
        assert_eq!(table.text(), "Hello Beautiful Day");

        table.delete(5, 10).unwrap();
        assert_eq!(table.text(), "Hello Day");
        assert_normalized(&table);
    }

    #[test]
    fn test_delete_across_pieces() {
        let mut table = PieceTable::from_string("Hello, Cruel World!".to_string());
        table.insert(7, "very ").unwrap();
        assert_eq!(table.delete(5, 13).unwrap(), ", very Cruel ");
        assert_eq!(table.text(), "HelloWorld!");
        assert_normalized(&table);
    }

    #[test]
    fn test_delete_clamps_length() {
        let mut table = PieceTable::from_string("abcdef".to_string());
        assert_eq!(table.delete(4, 100).unwrap(), "ef");
        assert_eq!(table.text(), "abcd");
    }

    #[test]
    fn test_delete_rejects_bad_start() {
        let mut table = PieceTable::from_string("abc".to_string());
        assert!(matches!(
            table.delete(3, 1),
            Err(EditError::InvalidPosition { position: 3, length: 3 })
        ));
        assert_eq!(table.text(), "abc");
    }

    #[test]
    fn test_delete_then_restore_merges_pieces() {
        let mut table = PieceTable::from_string("abcdef".to_string());
        table.delete(2, 2).unwrap();
        table.insert(2, "cd").unwrap();
        assert_eq!(table.text(), "abcdef");
        // The split halves of the original piece are no longer adjacent
        assert_eq!(table.pieces().len(), 3);
        table.delete(0, 6).unwrap();
        assert!(table.pieces().is_empty());
    }

    #[test]
    fn test_multibyte_positions_are_chars() {
        let mut table = PieceTable::from_string("héllo wörld".to_string());
        table.insert(6, "grüne ").unwrap();
        assert_eq!(table.text(), "héllo grüne wörld");
        assert_eq!(table.char_at(1), Some('é'));
        assert_eq!(table.char_at(14), Some('r'));
        assert_eq!(table.text_range(6, 11).unwrap(), "grüne");
        assert_eq!(table.delete(1, 1).unwrap(), "é");
        assert_eq!(table.text(), "hllo grüne wörld");
        assert_eq!(table.len(), 16);
    }

    #[test]
    fn test_text_range_validation() {
        let table = PieceTable::from_string("abc".to_string());
        assert_eq!(table.text_range(0, 3).unwrap(), "abc");
        assert_eq!(table.text_range(3, 3).unwrap(), "");
        assert!(matches!(
            table.text_range(2, 1),
            Err(EditError::InvalidRange { .. })
        ));
        assert!(matches!(
            table.text_range(0, 4),
            Err(EditError::InvalidRange { .. })
        ));
    }
}
