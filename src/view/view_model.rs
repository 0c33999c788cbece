/// View Model - Abstracts editor data for the view layer
/// This ensures the view has no direct dependencies on Editor internals
use crate::document_model::decoration::{ParagraphDecoration, TextDecoration};
use crate::document_model::editor::Editor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaretPosition {
    pub paragraph: usize,
    pub column: usize,
}

/// A stretch of one paragraph drawn with a single decoration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    pub text: String,
    pub decoration: TextDecoration,
}

pub trait ViewModel {
    fn get_caret_position(&self) -> CaretPosition;

    fn get_paragraph_count(&self) -> usize;

    /// Paragraph text without its delimiter.
    fn get_paragraph(&self, index: usize) -> Option<String>;

    /// Paragraph text split at decoration changes.
    fn get_paragraph_runs(&self, index: usize) -> Vec<StyledRun>;

    fn get_paragraph_decoration(&self, index: usize) -> ParagraphDecoration;
}

/// Concrete implementation that adapts Editor to ViewModel
pub struct EditorViewModel<'a> {
    editor: &'a Editor,
}

impl<'a> EditorViewModel<'a> {
    pub fn new(editor: &'a Editor) -> Self {
        Self { editor }
    }

    fn paragraph_range(&self, index: usize) -> Option<(usize, usize)> {
        self.editor
            .paragraphs()
            .get(index)
            .map(|paragraph| (paragraph.start(), paragraph.end()))
    }
}

impl ViewModel for EditorViewModel<'_> {
    fn get_caret_position(&self) -> CaretPosition {
        let caret = self.editor.caret();
        let paragraphs = self.editor.paragraphs();
        let paragraph = paragraphs.paragraph_at(caret);
        let start = paragraphs.get(paragraph).map_or(0, |p| p.start());
        CaretPosition {
            paragraph,
            column: caret.saturating_sub(start),
        }
    }

    fn get_paragraph_count(&self) -> usize {
        self.editor.paragraphs().len()
    }

    fn get_paragraph(&self, index: usize) -> Option<String> {
        let (start, end) = self.paragraph_range(index)?;
        self.editor.text_range(start, end).ok()
    }

    fn get_paragraph_runs(&self, index: usize) -> Vec<StyledRun> {
        let Some((start, end)) = self.paragraph_range(index) else {
            return Vec::new();
        };
        self.editor
            .decorations()
            .text_spans_in(start, end)
            .into_iter()
            .filter_map(|span| {
                let text = self.editor.text_range(span.start, span.end()).ok()?;
                Some(StyledRun {
                    text,
                    decoration: span.value,
                })
            })
            .collect()
    }

    fn get_paragraph_decoration(&self, index: usize) -> ParagraphDecoration {
        self.editor.paragraph_decoration(index).unwrap_or_default()
    }
}
