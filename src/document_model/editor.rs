use super::decoration::{
    DecorationModel, EmbeddedObject, OBJECT_REPLACEMENT, ParagraphDecoration, Span, SpanValue,
    TextDecoration,
};
use super::document::Document;
use super::paragraph::{ParagraphIndex, ParagraphListener};
use super::text_buffer::{ChangeListener, TextBuffer};
use crate::error::{DocumentError, EditError, EditResult};
use crate::observer::Subscription;
use log::debug;
use std::cell::{Ref, RefCell};
use std::rc::Rc;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorOptions {
    /// Treat U+2029 as a paragraph delimiter in addition to '\n'.
    pub unicode_separators: bool,
    /// Decoration given to text typed into an empty document.
    pub default_decoration: TextDecoration,
}

/// Paragraph decorations replaced by `Editor::decorate_paragraphs`,
/// together with the widened range they were taken from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParagraphRestyle {
    pub start: usize,
    pub end: usize,
    pub previous: Vec<Span<ParagraphDecoration>>,
}

/// The text buffer, its paragraph index and its decorations, kept in
/// step. Every edit goes through the buffer; the index and the
/// decoration model follow as change listeners, and the editor finishes
/// each edit with a paragraph refresh.
pub struct Editor {
    buffer: TextBuffer,
    paragraphs: Rc<RefCell<ParagraphIndex>>,
    decorations: Rc<RefCell<DecorationModel>>,
    caret: usize,
    modified: bool,
}

impl Editor {
    pub fn new(options: &EditorOptions) -> Self {
        Self::assemble(
            TextBuffer::new(),
            DecorationModel::new(options.default_decoration.clone()),
            options,
            0,
        )
    }

    pub fn from_text(text: &str, options: &EditorOptions) -> Self {
        let decorations =
            DecorationModel::uniform(text.chars().count(), options.default_decoration.clone());
        Self::assemble(
            TextBuffer::from_string(text.to_string()),
            decorations,
            options,
            0,
        )
    }

    pub fn from_document(
        document: &Document,
        options: &EditorOptions,
    ) -> Result<Self, DocumentError> {
        document.validate()?;
        let decorations = DecorationModel::from_spans(
            document.text_spans(),
            document.paragraph_spans(),
            options.default_decoration.clone(),
        );
        Ok(Self::assemble(
            TextBuffer::from_string(document.text().to_string()),
            decorations,
            options,
            document.caret_position(),
        ))
    }

    fn assemble(
        mut buffer: TextBuffer,
        decorations: DecorationModel,
        options: &EditorOptions,
        caret: usize,
    ) -> Self {
        let paragraphs = Rc::new(RefCell::new(ParagraphIndex::new(
            &buffer,
            options.unicode_separators,
        )));
        let decorations = Rc::new(RefCell::new(decorations));
        let listener: Rc<RefCell<dyn ChangeListener>> = decorations.clone();
        let _ = buffer.subscribe(listener);
        let listener: Rc<RefCell<dyn ChangeListener>> = paragraphs.clone();
        let _ = buffer.subscribe(listener);
        let caret = caret.min(buffer.len());
        Self {
            buffer,
            paragraphs,
            decorations,
            caret,
            modified: false,
        }
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn text(&self) -> String {
        self.buffer.text()
    }

    pub fn text_range(&self, start: usize, end: usize) -> EditResult<String> {
        self.buffer.text_range(start, end)
    }

    pub fn char_at(&self, position: usize) -> Option<char> {
        self.buffer.char_at(position)
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn caret(&self) -> usize {
        self.caret
    }

    pub fn set_caret(&mut self, caret: usize) {
        self.caret = caret.min(self.buffer.len());
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    pub fn subscribe_text(&mut self, listener: Rc<RefCell<dyn ChangeListener>>) -> Subscription {
        self.buffer.subscribe(listener)
    }

    pub fn unsubscribe_text(&mut self, subscription: Subscription) -> bool {
        self.buffer.unsubscribe(subscription)
    }

    pub fn subscribe_paragraphs(
        &mut self,
        listener: Rc<RefCell<dyn ParagraphListener>>,
    ) -> Subscription {
        self.paragraphs.borrow_mut().subscribe(listener)
    }

    pub fn unsubscribe_paragraphs(&mut self, subscription: Subscription) -> bool {
        self.paragraphs.borrow_mut().unsubscribe(subscription)
    }

    pub fn paragraphs(&self) -> Ref<'_, ParagraphIndex> {
        self.paragraphs.borrow()
    }

    pub fn decorations(&self) -> Ref<'_, DecorationModel> {
        self.decorations.borrow()
    }

    pub fn insert(&mut self, position: usize, text: &str) -> EditResult<()> {
        let length = text.chars().count();
        self.buffer.insert(position, text)?;
        self.settle_insert(position, length)?;
        self.finish_edit(position + length);
        Ok(())
    }

    /// Insert `text` styled with `decoration` instead of the inherited one.
    pub fn insert_decorated(
        &mut self,
        position: usize,
        text: &str,
        decoration: TextDecoration,
    ) -> EditResult<()> {
        let length = text.chars().count();
        if decoration.is_atomic() && text != OBJECT_REPLACEMENT.to_string() {
            return Err(EditError::DecorationConflict {
                start: position,
                end: position + length,
                reason: "an embedded object covers exactly one character",
            });
        }
        self.buffer.insert(position, text)?;
        let applied = self
            .decorations
            .borrow_mut()
            .apply_text(position, position + length, decoration);
        if let Err(error) = applied {
            self.buffer.delete(position, length)?;
            self.sync();
            return Err(error);
        }
        self.settle_insert(position, length)?;
        self.finish_edit(position + length);
        Ok(())
    }

    pub fn append(&mut self, text: &str) {
        self.buffer.append(text);
        self.finish_edit(self.buffer.len());
    }

    /// Delete up to `length` characters at `position`, returning them.
    pub fn delete(&mut self, position: usize, length: usize) -> EditResult<String> {
        if position >= self.buffer.len() {
            return Err(EditError::InvalidPosition {
                position,
                length: self.buffer.len(),
            });
        }
        let end = position.saturating_add(length).min(self.buffer.len());
        self.decorations.borrow().check_text_range(position, end)?;
        let removed = self.buffer.delete(position, length)?;
        self.sync();
        let merged = {
            let paragraphs = self.paragraphs.borrow();
            removed.chars().any(|c| paragraphs.is_delimiter(c))
        };
        if merged {
            self.settle_merge(position)?;
        }
        self.mark_edited(position);
        Ok(removed)
    }

    /// Text typed at the start of a paragraph joins that paragraph, so it
    /// takes the paragraph decoration that follows it instead of the one
    /// closed by the preceding delimiter.
    fn settle_insert(&mut self, position: usize, length: usize) -> EditResult<()> {
        let after = position + length;
        if length == 0 || after >= self.buffer.len() {
            return Ok(());
        }
        let starts_paragraph = position
            .checked_sub(1)
            .and_then(|previous| self.buffer.char_at(previous))
            .is_some_and(|c| self.paragraphs.borrow().is_delimiter(c));
        if !starts_paragraph {
            return Ok(());
        }
        let mut decorations = self.decorations.borrow_mut();
        let value = decorations.paragraph_decoration_at(after);
        decorations.restore_paragraph(&[Span::new(position, length, value)])
    }

    /// After a delete joins paragraphs, the merged paragraph takes the
    /// decoration found at its start.
    fn settle_merge(&mut self, position: usize) -> EditResult<()> {
        let (start, end) = self.paragraph_extent(position, position);
        if start == end {
            return Ok(());
        }
        let mut decorations = self.decorations.borrow_mut();
        let value = decorations.paragraph_decoration_at(start);
        decorations.restore_paragraph(&[Span::new(start, end - start, value)])
    }

    /// Insert an image or table as a single object replacement character
    /// carrying the inherited styling plus the object.
    pub fn insert_object(&mut self, position: usize, object: EmbeddedObject) -> EditResult<()> {
        let decoration = self
            .decorations
            .borrow()
            .inherited_text_decoration(position)
            .with_object(object);
        self.insert_decorated(position, &OBJECT_REPLACEMENT.to_string(), decoration)
    }

    /// Restyle `start..end`, returning the spans that were replaced.
    pub fn decorate_text(
        &mut self,
        start: usize,
        end: usize,
        decoration: TextDecoration,
    ) -> EditResult<Vec<Span<TextDecoration>>> {
        self.check_range(start, end)?;
        if decoration.is_atomic() && self.buffer.char_at(start) != Some(OBJECT_REPLACEMENT) {
            return Err(EditError::DecorationConflict {
                start,
                end,
                reason: "an embedded object needs an object replacement character",
            });
        }
        let previous = self
            .decorations
            .borrow_mut()
            .apply_text(start, end, decoration)?;
        self.modified = true;
        Ok(previous)
    }

    /// Restyle every paragraph touched by `start..end`. The range is
    /// widened to whole paragraphs, each with its closing delimiter.
    pub fn decorate_paragraphs(
        &mut self,
        start: usize,
        end: usize,
        decoration: ParagraphDecoration,
    ) -> EditResult<ParagraphRestyle> {
        self.check_range(start, end)?;
        let (start, end) = self.paragraph_extent(start, end);
        self.restyle_paragraphs(start, end, decoration)
    }

    /// Set the paragraph decoration over exactly `start..end`, which is
    /// expected to be a range already widened by `paragraph_extent`.
    pub fn restyle_paragraphs(
        &mut self,
        start: usize,
        end: usize,
        decoration: ParagraphDecoration,
    ) -> EditResult<ParagraphRestyle> {
        let previous = self
            .decorations
            .borrow_mut()
            .apply_paragraph(start, end, decoration)?;
        self.modified = true;
        Ok(ParagraphRestyle {
            start,
            end,
            previous,
        })
    }

    /// Whole paragraphs touched by `start..end`, each with its closing
    /// delimiter.
    pub fn paragraph_extent(&self, start: usize, end: usize) -> (usize, usize) {
        let index = self.paragraphs.borrow();
        let first = index.paragraph_at(start);
        let last = index.paragraph_at(if end > start { end - 1 } else { end });
        let paragraphs = index.paragraphs();
        let widened_end = (paragraphs[last].end() + 1).min(self.buffer.len());
        (paragraphs[first].start(), widened_end)
    }

    pub fn restore_text_spans(&mut self, spans: &[Span<TextDecoration>]) -> EditResult<()> {
        self.decorations.borrow_mut().restore_text(spans)?;
        self.modified = true;
        Ok(())
    }

    pub fn restore_paragraph_spans(
        &mut self,
        spans: &[Span<ParagraphDecoration>],
    ) -> EditResult<()> {
        self.decorations.borrow_mut().restore_paragraph(spans)?;
        self.modified = true;
        Ok(())
    }

    pub fn text_decoration_at(&self, offset: usize) -> TextDecoration {
        self.decorations.borrow().text_decoration_at(offset)
    }

    /// Decoration of the paragraph at `index`, read at its first character.
    pub fn paragraph_decoration(&self, index: usize) -> Option<ParagraphDecoration> {
        let start = self.paragraphs.borrow().get(index)?.start();
        Some(self.decorations.borrow().paragraph_decoration_at(start))
    }

    pub fn snapshot(&self) -> Document {
        let decorations = self.decorations.borrow();
        Document::from_spans(
            self.buffer.text(),
            decorations.text_spans(),
            decorations.paragraph_spans(),
            self.caret,
        )
    }

    /// Rebuild the paragraph index from scratch. Identities are lost.
    pub fn resync(&mut self) {
        self.paragraphs.borrow_mut().rebuild(&self.buffer);
    }

    fn check_range(&self, start: usize, end: usize) -> EditResult<()> {
        if start > end || end > self.buffer.len() {
            return Err(EditError::InvalidRange {
                start,
                end,
                length: self.buffer.len(),
            });
        }
        Ok(())
    }

    fn finish_edit(&mut self, caret: usize) {
        self.sync();
        self.mark_edited(caret);
    }

    fn mark_edited(&mut self, caret: usize) {
        self.caret = caret.min(self.buffer.len());
        self.modified = true;
    }

    fn sync(&mut self) {
        let mut paragraphs = self.paragraphs.borrow_mut();
        paragraphs.reset_traversal();
        if let Some(change) = paragraphs.refresh(&self.buffer) {
            debug!(
                "{} paragraph(s): +{:?} -{:?} ~{:?}",
                paragraphs.len(),
                change.added,
                change.removed,
                change.updated
            );
        }
        let len = self.buffer.len();
        debug_assert_eq!(self.decorations.borrow().covered(), (len, len));
    }
}

impl std::fmt::Debug for Editor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Editor")
            .field("buffer", &self.buffer)
            .field("paragraphs", &self.paragraphs.borrow())
            .field("caret", &self.caret)
            .field("modified", &self.modified)
            .finish()
    }
}
