use crate::command::Command;
use crate::document_model::editor::Editor;
use crate::error::EditResult;
use log::debug;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEvent {
    Executed,
    Undone,
    Redone,
}

/// Editor state captured before a command first ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandContext {
    pub caret: usize,
}

#[derive(Debug, Clone)]
struct HistoryEntry {
    command: Command,
    context: CommandContext,
}

type ChangeCallback = Box<dyn FnMut(HistoryEvent, &Editor)>;

/// Linear undo/redo history over `Command`s.
#[derive(Default)]
pub struct CommandManager {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    history_limit: Option<usize>,
    on_change: Option<ChangeCallback>,
}

impl CommandManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `limit` undo entries; 0 means unbounded.
    pub fn with_history_limit(limit: usize) -> Self {
        Self {
            history_limit: (limit > 0).then_some(limit),
            ..Self::default()
        }
    }

    /// Called once after every successful execute, undo or redo.
    pub fn set_on_change(&mut self, callback: impl FnMut(HistoryEvent, &Editor) + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    fn notify(&mut self, event: HistoryEvent, editor: &Editor) {
        if let Some(callback) = self.on_change.as_mut() {
            callback(event, editor);
        }
    }

    /// Run `command` and record it. A failed command leaves both stacks
    /// untouched.
    pub fn execute(&mut self, editor: &mut Editor, mut command: Command) -> EditResult<()> {
        let context = CommandContext {
            caret: editor.caret(),
        };
        command.redo(editor)?;
        debug!("executed {}", command.label());
        self.undo_stack.push(HistoryEntry { command, context });
        if let Some(limit) = self.history_limit {
            if self.undo_stack.len() > limit {
                let excess = self.undo_stack.len() - limit;
                self.undo_stack.drain(..excess);
            }
        }
        self.redo_stack.clear();
        self.notify(HistoryEvent::Executed, editor);
        Ok(())
    }

    /// Returns `Ok(false)` when there is nothing to undo.
    pub fn undo(&mut self, editor: &mut Editor) -> EditResult<bool> {
        let Some(mut entry) = self.undo_stack.pop() else {
            return Ok(false);
        };
        if let Err(error) = entry.command.undo(editor) {
            self.undo_stack.push(entry);
            return Err(error);
        }
        editor.set_caret(entry.context.caret);
        debug!("undid {}", entry.command.label());
        self.redo_stack.push(entry);
        self.notify(HistoryEvent::Undone, editor);
        Ok(true)
    }

    /// Returns `Ok(false)` when there is nothing to redo.
    pub fn redo(&mut self, editor: &mut Editor) -> EditResult<bool> {
        let Some(mut entry) = self.redo_stack.pop() else {
            return Ok(false);
        };
        editor.set_caret(entry.context.caret);
        if let Err(error) = entry.command.redo(editor) {
            self.redo_stack.push(entry);
            return Err(error);
        }
        debug!("redid {}", entry.command.label());
        self.undo_stack.push(entry);
        self.notify(HistoryEvent::Redone, editor);
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    pub fn history_limit(&self) -> Option<usize> {
        self.history_limit
    }
}

impl fmt::Debug for CommandManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandManager")
            .field("undo_stack", &self.undo_stack)
            .field("redo_stack", &self.redo_stack)
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document_model::decoration::TextDecoration;
    use crate::document_model::editor::EditorOptions;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn editor(text: &str) -> Editor {
        Editor::from_text(text, &EditorOptions::default())
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut editor = editor("Original Text");
        let mut manager = CommandManager::new();
        let before = editor.snapshot();

        manager.execute(&mut editor, Command::insert(9, "Bigger ")).unwrap();
        manager
            .execute(
                &mut editor,
                Command::decorate_text(
                    9,
                    15,
                    TextDecoration {
                        italic: true,
                        ..TextDecoration::default()
                    },
                ),
            )
            .unwrap();
        let after = editor.snapshot();
        assert_eq!(after.text(), "Original Bigger Text");

        assert!(manager.undo(&mut editor).unwrap());
        assert!(manager.undo(&mut editor).unwrap());
        assert_eq!(editor.snapshot(), before);

        assert!(manager.redo(&mut editor).unwrap());
        assert!(manager.redo(&mut editor).unwrap());
        assert_eq!(editor.snapshot().decorations(), after.decorations());
        assert_eq!(editor.text(), after.text());
    }

    #[test]
    fn test_empty_stacks_are_no_ops() {
        let mut editor = editor("abc");
        let mut manager = CommandManager::new();
        assert!(!manager.undo(&mut editor).unwrap());
        assert!(!manager.redo(&mut editor).unwrap());
        assert_eq!(editor.text(), "abc");
    }

    #[test]
    fn test_execute_clears_redo() {
        let mut editor = editor("abc");
        let mut manager = CommandManager::new();
        manager.execute(&mut editor, Command::append("d")).unwrap();
        manager.undo(&mut editor).unwrap();
        assert!(manager.can_redo());

        manager.execute(&mut editor, Command::insert(0, "z")).unwrap();
        assert!(!manager.can_redo());
        assert_eq!(manager.undo_len(), 1);
        assert_eq!(editor.text(), "zabc");
    }

    #[test]
    fn test_failed_execute_keeps_history() {
        let mut editor = editor("abc");
        let mut manager = CommandManager::new();
        manager.execute(&mut editor, Command::append("d")).unwrap();
        manager.undo(&mut editor).unwrap();

        assert!(manager.execute(&mut editor, Command::delete(10, 1)).is_err());
        assert_eq!(manager.undo_len(), 0);
        assert_eq!(manager.redo_len(), 1);
    }

    #[test]
    fn test_caret_restored_on_undo() {
        let mut editor = editor("hello");
        let mut manager = CommandManager::new();
        editor.set_caret(2);
        manager.execute(&mut editor, Command::insert(5, " world")).unwrap();
        assert_eq!(editor.caret(), 11);
        manager.undo(&mut editor).unwrap();
        assert_eq!(editor.caret(), 2);
    }

    #[test]
    fn test_history_limit_drops_oldest() {
        let mut editor = editor("");
        let mut manager = CommandManager::with_history_limit(2);
        for text in ["a", "b", "c"] {
            manager.execute(&mut editor, Command::append(text)).unwrap();
        }
        assert_eq!(manager.undo_len(), 2);
        while manager.undo(&mut editor).unwrap() {}
        assert_eq!(editor.text(), "a");
        assert_eq!(CommandManager::with_history_limit(0).history_limit(), None);
    }

    #[test]
    fn test_callback_runs_once_per_operation() {
        let mut editor = editor("");
        let mut manager = CommandManager::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        manager.set_on_change(move |event, editor: &Editor| {
            sink.borrow_mut().push((event, editor.len()))
        });

        manager.execute(&mut editor, Command::append("xy")).unwrap();
        manager.undo(&mut editor).unwrap();
        manager.redo(&mut editor).unwrap();
        manager.undo(&mut editor).unwrap();
        manager.clear();
        assert!(!manager.undo(&mut editor).unwrap());

        assert_eq!(
            *events.borrow(),
            vec![
                (HistoryEvent::Executed, 2),
                (HistoryEvent::Undone, 0),
                (HistoryEvent::Redone, 2),
                (HistoryEvent::Undone, 0),
            ]
        );
    }
}
