//! Rich-text editing engine: piece-table text storage with change
//! notification, an incremental paragraph index, character and paragraph
//! decorations, and command-based undo/redo.

pub mod command;
pub mod config;
pub mod document_model;
pub mod error;
pub mod observer;
pub mod script;
pub mod undo;
pub mod view;

pub use command::Command;
pub use document_model::{Document, Editor, EditorOptions};
pub use error::{DocumentError, EditError, EditResult};
pub use undo::CommandManager;
