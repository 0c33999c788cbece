use super::text_buffer::{ChangeListener, TextChange};
use crate::error::{EditError, EditResult};
use serde::{Deserialize, Serialize};

/// Character standing in for an embedded image or table in the text.
pub const OBJECT_REPLACEMENT: char = '\u{FFFC}';

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbeddedObject {
    Image {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        width: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        height: Option<u32>,
    },
    Table {
        rows: usize,
        columns: usize,
    },
}

/// Character-level styling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextDecoration {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strikethrough: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font_size: Option<u16>,
    /// `#rrggbb`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub foreground: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// An embedded object makes the span an indivisible unit of length 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<EmbeddedObject>,
}

impl TextDecoration {
    pub fn with_object(&self, object: EmbeddedObject) -> Self {
        Self {
            object: Some(object),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListGraphic {
    #[default]
    None,
    Bullet,
    Numbered,
}

/// Paragraph-level styling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParagraphDecoration {
    pub alignment: Alignment,
    pub indent: u8,
    pub spacing_above: u16,
    pub spacing_below: u16,
    pub graphic: ListGraphic,
}

/// Values that can be laid out as spans.
pub trait SpanValue: Clone + PartialEq {
    /// Atomic values cover exactly one character and are never split,
    /// extended or merged.
    fn is_atomic(&self) -> bool {
        false
    }

    /// The value text typed right after this one receives.
    fn continuation(&self) -> Self {
        self.clone()
    }
}

impl SpanValue for TextDecoration {
    fn is_atomic(&self) -> bool {
        self.object.is_some()
    }

    fn continuation(&self) -> Self {
        Self {
            object: None,
            ..self.clone()
        }
    }
}

impl SpanValue for ParagraphDecoration {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span<T> {
    pub start: usize,
    pub length: usize,
    pub value: T,
}

impl<T> Span<T> {
    pub fn new(start: usize, length: usize, value: T) -> Self {
        Self {
            start,
            length,
            value,
        }
    }

    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Ordered spans tiling `0..len` without gaps or overlaps.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanList<T> {
    spans: Vec<Span<T>>,
    default: T,
}

impl<T: SpanValue> SpanList<T> {
    pub fn new(default: T) -> Self {
        Self {
            spans: Vec::new(),
            default,
        }
    }

    /// Build from spans that are already contiguous from 0.
    pub fn from_spans(spans: Vec<Span<T>>, default: T) -> Self {
        let mut list = Self { spans, default };
        list.normalize();
        list
    }

    pub fn spans(&self) -> &[Span<T>] {
        &self.spans
    }

    pub fn default_value(&self) -> &T {
        &self.default
    }

    /// Total length covered; equals the text length.
    pub fn covered(&self) -> usize {
        self.spans.last().map_or(0, Span::end)
    }

    /// Value of the character at `offset`; at the end of the text the
    /// last span answers.
    pub fn value_at(&self, offset: usize) -> Option<&T> {
        let index = self
            .spans
            .partition_point(|span| span.end() <= offset)
            .min(self.spans.len().checked_sub(1)?);
        Some(&self.spans[index].value)
    }

    /// The value text inserted at `position` would receive.
    pub fn inherited_at(&self, position: usize) -> T {
        if self.spans.is_empty() {
            return self.default.clone();
        }
        let index = self.inherit_index(position);
        let value = &self.spans[index].value;
        if value.is_atomic() {
            value.continuation()
        } else {
            value.clone()
        }
    }

    /// Span whose value an insertion at `position` inherits: the one
    /// ending at or covering `position`, or the first span at offset 0.
    fn inherit_index(&self, position: usize) -> usize {
        if position == 0 {
            return 0;
        }
        self.spans
            .partition_point(|span| span.end() < position)
            .min(self.spans.len() - 1)
    }

    /// Spans intersecting `start..end`, clipped to that range.
    pub fn slice(&self, start: usize, end: usize) -> Vec<Span<T>> {
        let first = self.spans.partition_point(|span| span.end() <= start);
        self.spans[first..]
            .iter()
            .take_while(|span| span.start < end)
            .map(|span| {
                let clipped_start = span.start.max(start);
                let clipped_end = span.end().min(end);
                Span::new(clipped_start, clipped_end - clipped_start, span.value.clone())
            })
            .collect()
    }

    pub fn insert(&mut self, position: usize, length: usize) {
        if length == 0 {
            return;
        }
        if self.spans.is_empty() {
            self.spans.push(Span::new(0, length, self.default.clone()));
            return;
        }

        let index = self.inherit_index(position);
        let shift_from = if self.spans[index].value.is_atomic() {
            let at = if position <= self.spans[index].start {
                index
            } else {
                index + 1
            };
            let value = self.spans[index].value.continuation();
            self.spans.insert(at, Span::new(position, length, value));
            at + 1
        } else {
            self.spans[index].length += length;
            index + 1
        };
        for span in &mut self.spans[shift_from..] {
            span.start += length;
        }
        self.normalize();
    }

    pub fn remove(&mut self, position: usize, length: usize) {
        let end = position + length;
        let map = |x: usize| {
            if x <= position {
                x
            } else if x <= end {
                position
            } else {
                x - length
            }
        };
        let first = self.spans.partition_point(|span| span.end() <= position);
        for span in &mut self.spans[first..] {
            let start = map(span.start);
            span.length = map(span.end()) - start;
            span.start = start;
        }
        self.normalize();
    }

    /// Fails when `start..end` would cut through an atomic span.
    pub fn check_range(&self, start: usize, end: usize) -> EditResult<()> {
        let cuts = |offset: usize| {
            self.spans
                .iter()
                .any(|span| span.value.is_atomic() && span.start < offset && offset < span.end())
        };
        if cuts(start) || cuts(end) {
            return Err(EditError::DecorationConflict {
                start,
                end,
                reason: "range splits an embedded object",
            });
        }
        Ok(())
    }

    /// Set `value` over `start..end`, returning the spans it replaced.
    pub fn apply(&mut self, start: usize, end: usize, value: T) -> EditResult<Vec<Span<T>>> {
        let covered = self.covered();
        if start > end || end > covered {
            return Err(EditError::InvalidRange {
                start,
                end,
                length: covered,
            });
        }
        if start == end {
            return Ok(Vec::new());
        }
        if value.is_atomic() && end - start != 1 {
            return Err(EditError::DecorationConflict {
                start,
                end,
                reason: "an embedded object covers exactly one character",
            });
        }
        let previous = self.slice(start, end);
        let replaces_object = previous.iter().any(|span| span.value.is_atomic());
        if replaces_object && !value.is_atomic() {
            return Err(EditError::DecorationConflict {
                start,
                end,
                reason: "an embedded object cannot be restyled as text",
            });
        }

        self.overwrite(start, end, value);
        self.normalize();
        Ok(previous)
    }

    /// Put back spans captured by `apply` or `slice`. Objects may be
    /// replaced here, which is what undoing an object insertion needs.
    pub fn restore(&mut self, spans: &[Span<T>]) -> EditResult<()> {
        let covered = self.covered();
        if let Some(span) = spans.iter().find(|span| span.end() > covered) {
            return Err(EditError::InvalidRange {
                start: span.start,
                end: span.end(),
                length: covered,
            });
        }
        for span in spans.iter().filter(|span| span.length > 0) {
            self.overwrite(span.start, span.end(), span.value.clone());
        }
        self.normalize();
        Ok(())
    }

    fn overwrite(&mut self, start: usize, end: usize, value: T) {
        self.split_at(start);
        self.split_at(end);
        let first = self.spans.partition_point(|span| span.end() <= start);
        let last = self.spans.partition_point(|span| span.start < end);
        self.spans
            .splice(first..last, [Span::new(start, end - start, value)]);
    }

    fn split_at(&mut self, offset: usize) {
        let index = self.spans.partition_point(|span| span.end() <= offset);
        if let Some(span) = self.spans.get(index) {
            if span.start < offset && offset < span.end() {
                let right = Span::new(offset, span.end() - offset, span.value.clone());
                self.spans[index].length = offset - self.spans[index].start;
                self.spans.insert(index + 1, right);
            }
        }
    }

    /// Drop empty spans and coalesce equal neighbours. Atomic spans stay
    /// separate.
    fn normalize(&mut self) {
        let mut merged: Vec<Span<T>> = Vec::with_capacity(self.spans.len());
        for span in self.spans.drain(..) {
            if span.length == 0 {
                continue;
            }
            match merged.last_mut() {
                Some(last) if !span.value.is_atomic() && last.value == span.value => {
                    last.length += span.length;
                }
                _ => merged.push(span),
            }
        }
        debug_assert!(
            merged.windows(2).all(|pair| pair[0].end() == pair[1].start),
            "span list has gaps or overlaps"
        );
        debug_assert!(merged.first().is_none_or(|span| span.start == 0));
        self.spans = merged;
    }
}

/// Character and paragraph decorations kept in step with the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct DecorationModel {
    text: SpanList<TextDecoration>,
    paragraph: SpanList<ParagraphDecoration>,
}

impl DecorationModel {
    pub fn new(default_text: TextDecoration) -> Self {
        Self {
            text: SpanList::new(default_text),
            paragraph: SpanList::new(ParagraphDecoration::default()),
        }
    }

    /// A single default span over `length` characters of plain text.
    pub fn uniform(length: usize, default_text: TextDecoration) -> Self {
        let mut model = Self::new(default_text);
        model.text.insert(0, length);
        model.paragraph.insert(0, length);
        model
    }

    pub fn from_spans(
        text: Vec<Span<TextDecoration>>,
        paragraph: Vec<Span<ParagraphDecoration>>,
        default_text: TextDecoration,
    ) -> Self {
        Self {
            text: SpanList::from_spans(text, default_text),
            paragraph: SpanList::from_spans(paragraph, ParagraphDecoration::default()),
        }
    }

    pub fn text_spans(&self) -> &[Span<TextDecoration>] {
        self.text.spans()
    }

    pub fn paragraph_spans(&self) -> &[Span<ParagraphDecoration>] {
        self.paragraph.spans()
    }

    pub fn text_spans_in(&self, start: usize, end: usize) -> Vec<Span<TextDecoration>> {
        self.text.slice(start, end)
    }

    pub fn paragraph_spans_in(&self, start: usize, end: usize) -> Vec<Span<ParagraphDecoration>> {
        self.paragraph.slice(start, end)
    }

    pub fn text_decoration_at(&self, offset: usize) -> TextDecoration {
        self.text
            .value_at(offset)
            .cloned()
            .unwrap_or_else(|| self.text.default_value().clone())
    }

    pub fn paragraph_decoration_at(&self, offset: usize) -> ParagraphDecoration {
        self.paragraph
            .value_at(offset)
            .cloned()
            .unwrap_or_default()
    }

    pub fn inherited_text_decoration(&self, position: usize) -> TextDecoration {
        self.text.inherited_at(position)
    }

    pub fn check_text_range(&self, start: usize, end: usize) -> EditResult<()> {
        self.text.check_range(start, end)
    }

    pub fn apply_text(
        &mut self,
        start: usize,
        end: usize,
        decoration: TextDecoration,
    ) -> EditResult<Vec<Span<TextDecoration>>> {
        self.text.apply(start, end, decoration)
    }

    pub fn apply_paragraph(
        &mut self,
        start: usize,
        end: usize,
        decoration: ParagraphDecoration,
    ) -> EditResult<Vec<Span<ParagraphDecoration>>> {
        self.paragraph.apply(start, end, decoration)
    }

    pub fn restore_text(&mut self, spans: &[Span<TextDecoration>]) -> EditResult<()> {
        self.text.restore(spans)
    }

    pub fn restore_paragraph(&mut self, spans: &[Span<ParagraphDecoration>]) -> EditResult<()> {
        self.paragraph.restore(spans)
    }

    pub fn covered(&self) -> (usize, usize) {
        (self.text.covered(), self.paragraph.covered())
    }
}

impl ChangeListener for DecorationModel {
    fn text_changed(&mut self, change: &TextChange) {
        match change {
            TextChange::Inserted {
                position, length, ..
            } => {
                self.text.insert(*position, *length);
                self.paragraph.insert(*position, *length);
            }
            TextChange::Deleted {
                position, length, ..
            } => {
                self.text.remove(*position, *length);
                self.paragraph.remove(*position, *length);
            }
        }
    }
}
