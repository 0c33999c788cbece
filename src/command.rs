use crate::document_model::decoration::{
    EmbeddedObject, OBJECT_REPLACEMENT, ParagraphDecoration, Span, TextDecoration,
};
use crate::document_model::editor::{Editor, ParagraphRestyle};
use crate::error::EditResult;
use log::warn;

/// Text taken out by a delete, with the decorations it carried. The
/// paragraph spans cover every paragraph the delete touched, since a
/// merge restyles the joined paragraph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovedText {
    pub text: String,
    pub text_spans: Vec<Span<TextDecoration>>,
    pub paragraph_spans: Vec<Span<ParagraphDecoration>>,
}

/// A reversible edit. State needed to reverse it is captured the first
/// time the command runs and reused verbatim on every later undo or redo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    InsertText {
        position: usize,
        text: String,
        /// Styling for the new text. `None` inherits from the surrounding
        /// text; the first run records what was inherited.
        decoration: Option<TextDecoration>,
    },
    AppendText {
        text: String,
        position: Option<usize>,
        decoration: Option<TextDecoration>,
    },
    DeleteText {
        position: usize,
        length: usize,
        removed: Option<RemovedText>,
    },
    DecorateText {
        start: usize,
        end: usize,
        decoration: TextDecoration,
        previous: Option<Vec<Span<TextDecoration>>>,
    },
    DecorateParagraphs {
        start: usize,
        end: usize,
        decoration: ParagraphDecoration,
        previous: Option<ParagraphRestyle>,
    },
    InsertObject {
        position: usize,
        object: EmbeddedObject,
        decoration: Option<TextDecoration>,
    },
    /// Runs as one history entry; undone in reverse order.
    Composite {
        label: String,
        commands: Vec<Command>,
    },
}

impl Command {
    pub fn insert(position: usize, text: &str) -> Self {
        Command::InsertText {
            position,
            text: text.to_string(),
            decoration: None,
        }
    }

    pub fn append(text: &str) -> Self {
        Command::AppendText {
            text: text.to_string(),
            position: None,
            decoration: None,
        }
    }

    pub fn delete(position: usize, length: usize) -> Self {
        Command::DeleteText {
            position,
            length,
            removed: None,
        }
    }

    pub fn decorate_text(start: usize, end: usize, decoration: TextDecoration) -> Self {
        Command::DecorateText {
            start,
            end,
            decoration,
            previous: None,
        }
    }

    pub fn decorate_paragraphs(start: usize, end: usize, decoration: ParagraphDecoration) -> Self {
        Command::DecorateParagraphs {
            start,
            end,
            decoration,
            previous: None,
        }
    }

    pub fn insert_object(position: usize, object: EmbeddedObject) -> Self {
        Command::InsertObject {
            position,
            object,
            decoration: None,
        }
    }

    /// Delete followed by insert, undone as a unit.
    pub fn replace(position: usize, length: usize, text: &str) -> Self {
        Command::Composite {
            label: "replace".to_string(),
            commands: vec![Command::delete(position, length), Command::insert(position, text)],
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Command::InsertText { .. } => "insert",
            Command::AppendText { .. } => "append",
            Command::DeleteText { .. } => "delete",
            Command::DecorateText { .. } => "style",
            Command::DecorateParagraphs { .. } => "paragraph style",
            Command::InsertObject { .. } => "insert object",
            Command::Composite { label, .. } => label,
        }
    }

    /// Apply the command. The first call captures undo state.
    pub fn redo(&mut self, editor: &mut Editor) -> EditResult<()> {
        match self {
            Command::InsertText {
                position,
                text,
                decoration,
            } => {
                let resolved = match decoration {
                    Some(decoration) => decoration.clone(),
                    None => editor.decorations().inherited_text_decoration(*position),
                };
                editor.insert_decorated(*position, text, resolved.clone())?;
                decoration.get_or_insert(resolved);
                Ok(())
            }
            Command::AppendText {
                text,
                position,
                decoration,
            } => {
                let start = position.unwrap_or(editor.len());
                let resolved = match decoration {
                    Some(decoration) => decoration.clone(),
                    None => editor.decorations().inherited_text_decoration(start),
                };
                editor.insert_decorated(start, text, resolved.clone())?;
                position.get_or_insert(start);
                decoration.get_or_insert(resolved);
                Ok(())
            }
            Command::DeleteText {
                position,
                length,
                removed,
            } => match removed {
                Some(removed) => editor
                    .delete(*position, removed.text.chars().count())
                    .map(|_| ()),
                None => {
                    let end = position.saturating_add(*length).min(editor.len());
                    // Through the paragraph holding the first surviving
                    // character, which a merge joins to the first one.
                    let (first, last) =
                        editor.paragraph_extent(*position, (end + 1).min(editor.len()));
                    let decorations = editor.decorations();
                    let text_spans = decorations.text_spans_in(*position, end);
                    let paragraph_spans = decorations.paragraph_spans_in(first, last);
                    drop(decorations);
                    let text = editor.delete(*position, *length)?;
                    *removed = Some(RemovedText {
                        text,
                        text_spans,
                        paragraph_spans,
                    });
                    Ok(())
                }
            },
            Command::DecorateText {
                start,
                end,
                decoration,
                previous,
            } => {
                let replaced = editor.decorate_text(*start, *end, decoration.clone())?;
                previous.get_or_insert(replaced);
                Ok(())
            }
            Command::DecorateParagraphs {
                start,
                end,
                decoration,
                previous,
            } => match previous {
                Some(restyle) => editor
                    .restyle_paragraphs(restyle.start, restyle.end, decoration.clone())
                    .map(|_| ()),
                None => {
                    let restyle = editor.decorate_paragraphs(*start, *end, decoration.clone())?;
                    *previous = Some(restyle);
                    Ok(())
                }
            },
            Command::InsertObject {
                position,
                object,
                decoration,
            } => {
                let resolved = match decoration {
                    Some(decoration) => decoration.clone(),
                    None => editor
                        .decorations()
                        .inherited_text_decoration(*position)
                        .with_object(object.clone()),
                };
                let text = OBJECT_REPLACEMENT.to_string();
                editor.insert_decorated(*position, &text, resolved.clone())?;
                decoration.get_or_insert(resolved);
                Ok(())
            }
            Command::Composite { commands, .. } => {
                for index in 0..commands.len() {
                    if let Err(error) = commands[index].redo(editor) {
                        for done in commands[..index].iter_mut().rev() {
                            done.undo(editor)?;
                        }
                        return Err(error);
                    }
                }
                Ok(())
            }
        }
    }

    pub fn undo(&mut self, editor: &mut Editor) -> EditResult<()> {
        match self {
            Command::InsertText { position, text, .. } => {
                remove_inserted(editor, *position, text.chars().count())
            }
            Command::AppendText { text, position, .. } => match position {
                Some(position) => remove_inserted(editor, *position, text.chars().count()),
                None => not_executed("append"),
            },
            Command::DeleteText {
                position, removed, ..
            } => match removed {
                Some(removed) => {
                    if removed.text.is_empty() {
                        return Ok(());
                    }
                    editor.insert(*position, &removed.text)?;
                    editor.restore_text_spans(&removed.text_spans)?;
                    editor.restore_paragraph_spans(&removed.paragraph_spans)
                }
                None => not_executed("delete"),
            },
            Command::DecorateText { previous, .. } => match previous {
                Some(previous) => editor.restore_text_spans(previous),
                None => not_executed("style"),
            },
            Command::DecorateParagraphs { previous, .. } => match previous {
                Some(restyle) => editor.restore_paragraph_spans(&restyle.previous),
                None => not_executed("paragraph style"),
            },
            Command::InsertObject { position, .. } => remove_inserted(editor, *position, 1),
            Command::Composite { commands, .. } => {
                for command in commands.iter_mut().rev() {
                    command.undo(editor)?;
                }
                Ok(())
            }
        }
    }
}

fn remove_inserted(editor: &mut Editor, position: usize, length: usize) -> EditResult<()> {
    if length == 0 {
        return Ok(());
    }
    editor.delete(position, length).map(|_| ())
}

fn not_executed(label: &str) -> EditResult<()> {
    warn!("undo of {label} command that never ran; ignored");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_model::decoration::Alignment;
    use crate::document_model::editor::EditorOptions;
    use crate::error::EditError;

    fn bold() -> TextDecoration {
        TextDecoration {
            bold: true,
            ..TextDecoration::default()
        }
    }

    fn styled_editor() -> Editor {
        let mut editor = Editor::from_text("Hello\nWorld\nLine 3", &EditorOptions::default());
        editor.decorate_text(2, 8, bold()).unwrap();
        editor
            .decorate_paragraphs(
                6,
                6,
                ParagraphDecoration {
                    alignment: Alignment::Right,
                    ..ParagraphDecoration::default()
                },
            )
            .unwrap();
        editor
    }

    /// Run, undo, redo, undo again, checking the states line up.
    fn assert_reversible(mut command: Command) {
        let mut editor = styled_editor();
        let before = editor.snapshot();

        command.redo(&mut editor).unwrap();
        let after = editor.snapshot();
        command.undo(&mut editor).unwrap();
        assert_eq!(editor.snapshot().text(), before.text());
        assert_eq!(editor.snapshot().decorations(), before.decorations());

        command.redo(&mut editor).unwrap();
        assert_eq!(editor.snapshot().decorations(), after.decorations());
        assert_eq!(editor.text(), after.text());
        command.undo(&mut editor).unwrap();
        assert_eq!(editor.snapshot().decorations(), before.decorations());
    }

    #[test]
    fn test_every_command_reverses() {
        assert_reversible(Command::insert(4, "xx\nyy"));
        assert_reversible(Command::InsertText {
            position: 0,
            text: "new".to_string(),
            decoration: Some(bold()),
        });
        assert_reversible(Command::append("\ntail"));
        assert_reversible(Command::delete(3, 9));
        assert_reversible(Command::delete(5, 1));
        assert_reversible(Command::delete(11, 1));
        assert_reversible(Command::delete(0, 100));
        assert_reversible(Command::decorate_text(0, 18, TextDecoration::default()));
        assert_reversible(Command::decorate_paragraphs(
            0,
            18,
            ParagraphDecoration::default(),
        ));
        assert_reversible(Command::insert_object(
            6,
            EmbeddedObject::Table {
                rows: 1,
                columns: 2,
            },
        ));
        assert_reversible(Command::replace(6, 5, "Earth"));
    }

    #[test]
    fn test_delete_captures_once() {
        let mut editor = Editor::from_text("abcdef", &EditorOptions::default());
        let mut command = Command::delete(1, 3);
        command.redo(&mut editor).unwrap();
        command.undo(&mut editor).unwrap();

        // A different editor state does not change what the command restores
        editor.decorate_text(0, 6, bold()).unwrap();
        command.redo(&mut editor).unwrap();
        command.undo(&mut editor).unwrap();
        assert_eq!(editor.text(), "abcdef");
        assert!(!editor.text_decoration_at(2).bold);
        assert!(editor.text_decoration_at(0).bold);

        // An over-long delete removes what it removed the first time
        let mut command = Command::delete(4, 10);
        command.redo(&mut editor).unwrap();
        command.undo(&mut editor).unwrap();
        editor.append("gh");
        command.redo(&mut editor).unwrap();
        assert_eq!(editor.text(), "abcdgh");
    }

    #[test]
    fn test_inserts_reuse_inherited_decoration() {
        let table = EmbeddedObject::Table {
            rows: 1,
            columns: 1,
        };
        for mut command in [Command::insert(1, "x"), Command::insert_object(1, table)] {
            let mut editor = Editor::from_text("ab", &EditorOptions::default());
            editor.decorate_text(0, 2, bold()).unwrap();
            command.redo(&mut editor).unwrap();
            command.undo(&mut editor).unwrap();

            editor.decorate_text(0, 2, TextDecoration::default()).unwrap();
            command.redo(&mut editor).unwrap();
            assert!(editor.text_decoration_at(1).bold, "{}", command.label());
            assert!(!editor.text_decoration_at(0).bold);
        }
    }

    #[test]
    fn test_paragraph_style_reuses_widened_range() {
        let centered = ParagraphDecoration {
            alignment: Alignment::Center,
            ..ParagraphDecoration::default()
        };
        let mut editor = Editor::from_text("one\ntwo", &EditorOptions::default());
        let mut command = Command::decorate_paragraphs(5, 5, centered.clone());
        command.redo(&mut editor).unwrap();
        command.undo(&mut editor).unwrap();

        // Splitting "two" would narrow a fresh widening to "t\n"
        editor.insert(5, "\n").unwrap();
        command.redo(&mut editor).unwrap();
        assert_eq!(editor.paragraph_decoration(1), Some(centered.clone()));
        assert_eq!(editor.paragraph_decoration(2), Some(centered));
        assert_eq!(editor.paragraph_decoration(0), Some(ParagraphDecoration::default()));
    }

    #[test]
    fn test_object_undo_removes_replacement_char() {
        let mut editor = Editor::from_text("ab", &EditorOptions::default());
        let mut command = Command::insert_object(
            2,
            EmbeddedObject::Image {
                url: "x.png".to_string(),
                width: Some(4),
                height: Some(4),
            },
        );
        command.redo(&mut editor).unwrap();
        assert_eq!(editor.char_at(2), Some(OBJECT_REPLACEMENT));
        command.undo(&mut editor).unwrap();
        assert_eq!(editor.text(), "ab");
        assert_eq!(editor.decorations().text_spans().len(), 1);
    }

    #[test]
    fn test_composite_rolls_back_on_failure() {
        let mut editor = Editor::from_text("abc", &EditorOptions::default());
        let mut command = Command::Composite {
            label: "broken".to_string(),
            commands: vec![Command::insert(0, "zz"), Command::delete(40, 1)],
        };
        assert!(matches!(
            command.redo(&mut editor),
            Err(EditError::InvalidPosition { .. })
        ));
        assert_eq!(editor.text(), "abc");
        assert_eq!(command.label(), "broken");
    }
}
