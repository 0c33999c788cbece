use super::decoration::{
    OBJECT_REPLACEMENT, ParagraphDecoration, Span, SpanValue, TextDecoration,
};
use crate::error::DocumentError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// One run of text sharing both a character and a paragraph decoration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecorationRun {
    pub start: usize,
    pub length: usize,
    pub text: TextDecoration,
    pub paragraph: ParagraphDecoration,
}

/// Immutable snapshot of an editor: text, decoration runs and the caret
/// position to restore. This is the unit of open and save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    text: String,
    decorations: Vec<DecorationRun>,
    caret_position: usize,
}

impl Document {
    pub fn new(
        text: String,
        decorations: Vec<DecorationRun>,
        caret_position: usize,
    ) -> Result<Self, DocumentError> {
        let document = Self {
            text,
            decorations,
            caret_position,
        };
        document.validate()?;
        Ok(document)
    }

    /// Undecorated text with the caret at the start.
    pub fn plain(text: &str) -> Self {
        let length = text.chars().count();
        let decorations = if length == 0 {
            Vec::new()
        } else {
            vec![DecorationRun {
                start: 0,
                length,
                text: TextDecoration::default(),
                paragraph: ParagraphDecoration::default(),
            }]
        };
        Self {
            text: text.to_string(),
            decorations,
            caret_position: 0,
        }
    }

    /// Combine the two span lists into runs cut wherever either changes.
    pub fn from_spans(
        text: String,
        text_spans: &[Span<TextDecoration>],
        paragraph_spans: &[Span<ParagraphDecoration>],
        caret_position: usize,
    ) -> Self {
        let mut decorations = Vec::with_capacity(text_spans.len().max(paragraph_spans.len()));
        let (mut i, mut j) = (0, 0);
        let mut offset = 0;
        while i < text_spans.len() && j < paragraph_spans.len() {
            let end = text_spans[i].end().min(paragraph_spans[j].end());
            decorations.push(DecorationRun {
                start: offset,
                length: end - offset,
                text: text_spans[i].value.clone(),
                paragraph: paragraph_spans[j].value.clone(),
            });
            offset = end;
            if text_spans[i].end() == end {
                i += 1;
            }
            if paragraph_spans[j].end() == end {
                j += 1;
            }
        }
        Self {
            text,
            decorations,
            caret_position,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn decorations(&self) -> &[DecorationRun] {
        &self.decorations
    }

    pub fn caret_position(&self) -> usize {
        self.caret_position
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn text_spans(&self) -> Vec<Span<TextDecoration>> {
        self.decorations
            .iter()
            .map(|run| Span::new(run.start, run.length, run.text.clone()))
            .collect()
    }

    pub fn paragraph_spans(&self) -> Vec<Span<ParagraphDecoration>> {
        self.decorations
            .iter()
            .map(|run| Span::new(run.start, run.length, run.paragraph.clone()))
            .collect()
    }

    /// Runs must tile the text exactly and embedded objects must sit on a
    /// single object replacement character.
    pub fn validate(&self) -> Result<(), DocumentError> {
        let chars: Vec<char> = self.text.chars().collect();
        let mut offset = 0;
        for run in &self.decorations {
            if run.start != offset || run.length == 0 {
                return Err(DocumentError::Malformed(format!(
                    "decoration run at {} (length {}) does not continue from {offset}",
                    run.start, run.length
                )));
            }
            if run.text.is_atomic()
                && (run.length != 1 || chars.get(run.start) != Some(&OBJECT_REPLACEMENT))
            {
                return Err(DocumentError::Malformed(format!(
                    "embedded object at {} must cover one object replacement character",
                    run.start
                )));
            }
            offset += run.length;
        }
        if offset != chars.len() {
            return Err(DocumentError::Malformed(format!(
                "decorations cover {offset} of {} characters",
                chars.len()
            )));
        }
        if self.caret_position > chars.len() {
            return Err(DocumentError::Malformed(format!(
                "caret {} is past the end of the text",
                self.caret_position
            )));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        let document: Document = serde_json::from_str(json)?;
        document.validate()?;
        Ok(document)
    }
}

pub fn read_document(path: &Path) -> Result<Document, DocumentError> {
    let content = fs::read_to_string(path)?;
    Document::from_json(&content)
}

pub fn write_document(path: &Path, document: &Document) -> Result<usize, DocumentError> {
    let json = document.to_json()?;
    fs::write(path, &json)?;
    Ok(json.len())
}
