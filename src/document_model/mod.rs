/// Document model subsystem - Core data structures and text operations
///
/// Text storage and its change notifications, the paragraph index, the
/// decoration model, the editor that keeps them in step, and the
/// serializable document snapshot.
pub mod decoration;
pub mod document;
pub mod editor;
pub mod paragraph;
pub mod piece_table;
pub mod text_buffer;

// Re-export main types for convenience
pub use decoration::{
    Alignment, DecorationModel, EmbeddedObject, ListGraphic, OBJECT_REPLACEMENT,
    ParagraphDecoration, Span, SpanValue, TextDecoration,
};
pub use document::{DecorationRun, Document, read_document, write_document};
pub use editor::{Editor, EditorOptions, ParagraphRestyle};
pub use paragraph::{
    PARAGRAPH_SEPARATOR, Paragraph, ParagraphChange, ParagraphId, ParagraphIndex,
    ParagraphListener,
};
pub use text_buffer::{ChangeListener, TextBuffer, TextChange};
