use crate::command::Command;
use crate::document_model::decoration::{
    Alignment, EmbeddedObject, ListGraphic, ParagraphDecoration, TextDecoration,
};
use crate::document_model::editor::Editor;
use crate::error::EditError;
use crate::undo::CommandManager;
use lazy_static::lazy_static;
use log::debug;
use regex::{Captures, Regex};
use thiserror::Error;

lazy_static! {
    static ref INSERT: Regex = Regex::new(r#"^insert\s+(\d+)\s+"((?:[^"\\]|\\.)*)"$"#)
        .expect("Invalid INSERT regex pattern");
    static ref APPEND: Regex =
        Regex::new(r#"^append\s+"((?:[^"\\]|\\.)*)"$"#).expect("Invalid APPEND regex pattern");
    static ref DELETE: Regex =
        Regex::new(r"^delete\s+(\d+)\s+(\d+)$").expect("Invalid DELETE regex pattern");
    static ref REPLACE: Regex = Regex::new(r#"^replace\s+(\d+)\s+(\d+)\s+"((?:[^"\\]|\\.)*)"$"#)
        .expect("Invalid REPLACE regex pattern");
    static ref STYLE: Regex = Regex::new(r"^(style|para)\s+(\d+)\s+(\d+)\s+(.+)$")
        .expect("Invalid STYLE regex pattern");
    static ref IMAGE: Regex =
        Regex::new(r#"^image\s+(\d+)\s+"((?:[^"\\]|\\.)*)"(?:\s+(\d+)\s+(\d+))?$"#)
            .expect("Invalid IMAGE regex pattern");
    static ref TABLE: Regex =
        Regex::new(r"^table\s+(\d+)\s+(\d+)\s+(\d+)$").expect("Invalid TABLE regex pattern");
}

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: cannot parse `{text}`")]
    Syntax { line: usize, text: String },
    #[error("line {line}: unknown {kind} flag `{flag}`")]
    UnknownFlag {
        line: usize,
        kind: &'static str,
        flag: String,
    },
    #[error("line {line}: {source}")]
    Edit { line: usize, source: EditError },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOp {
    Execute(Command),
    Undo,
    Redo,
}

/// A parsed operation with the 1-based line it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub line: usize,
    pub op: ScriptOp,
}

pub fn parse_script(source: &str) -> Result<Vec<ScriptLine>, ScriptError> {
    let mut lines = Vec::new();
    for (index, text) in source.lines().enumerate() {
        let text = text.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let line = index + 1;
        lines.push(ScriptLine {
            line,
            op: parse_line(text, line)?,
        });
    }
    Ok(lines)
}

pub fn parse_line(text: &str, line: usize) -> Result<ScriptOp, ScriptError> {
    let syntax = || ScriptError::Syntax {
        line,
        text: text.to_string(),
    };
    let number = |captures: &Captures, group: usize| -> Result<usize, ScriptError> {
        captures[group].parse().map_err(|_| syntax())
    };

    let op = match text {
        "undo" => ScriptOp::Undo,
        "redo" => ScriptOp::Redo,
        _ if INSERT.is_match(text) => {
            let captures = INSERT.captures(text).ok_or_else(syntax)?;
            ScriptOp::Execute(Command::insert(
                number(&captures, 1)?,
                &unescape(&captures[2]),
            ))
        }
        _ if APPEND.is_match(text) => {
            let captures = APPEND.captures(text).ok_or_else(syntax)?;
            ScriptOp::Execute(Command::append(&unescape(&captures[1])))
        }
        _ if DELETE.is_match(text) => {
            let captures = DELETE.captures(text).ok_or_else(syntax)?;
            ScriptOp::Execute(Command::delete(
                number(&captures, 1)?,
                number(&captures, 2)?,
            ))
        }
        _ if REPLACE.is_match(text) => {
            let captures = REPLACE.captures(text).ok_or_else(syntax)?;
            ScriptOp::Execute(Command::replace(
                number(&captures, 1)?,
                number(&captures, 2)?,
                &unescape(&captures[3]),
            ))
        }
        _ if STYLE.is_match(text) => {
            let captures = STYLE.captures(text).ok_or_else(syntax)?;
            let start = number(&captures, 2)?;
            let end = number(&captures, 3)?;
            if &captures[1] == "style" {
                let decoration = text_flags(&captures[4], line)?;
                ScriptOp::Execute(Command::decorate_text(start, end, decoration))
            } else {
                let decoration = paragraph_flags(&captures[4], line)?;
                ScriptOp::Execute(Command::decorate_paragraphs(start, end, decoration))
            }
        }
        _ if IMAGE.is_match(text) => {
            let captures = IMAGE.captures(text).ok_or_else(syntax)?;
            let size = |group: usize| captures.get(group).and_then(|m| m.as_str().parse().ok());
            ScriptOp::Execute(Command::insert_object(
                number(&captures, 1)?,
                EmbeddedObject::Image {
                    url: unescape(&captures[2]),
                    width: size(3),
                    height: size(4),
                },
            ))
        }
        _ if TABLE.is_match(text) => {
            let captures = TABLE.captures(text).ok_or_else(syntax)?;
            ScriptOp::Execute(Command::insert_object(
                number(&captures, 1)?,
                EmbeddedObject::Table {
                    rows: number(&captures, 2)?,
                    columns: number(&captures, 3)?,
                },
            ))
        }
        _ => return Err(syntax()),
    };
    Ok(op)
}

/// Resolve `\n`, `\t`, `\"` and `\\`; other escapes keep the character.
fn unescape(quoted: &str) -> String {
    let mut result = String::with_capacity(quoted.len());
    let mut chars = quoted.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => result.push('\n'),
            Some('t') => result.push('\t'),
            Some(other) => result.push(other),
            None => result.push('\\'),
        }
    }
    result
}

/// Flags describe the whole decoration, starting from plain text.
fn text_flags(flags: &str, line: usize) -> Result<TextDecoration, ScriptError> {
    let mut decoration = TextDecoration::default();
    for flag in flags.split(',').map(str::trim) {
        let unknown = || ScriptError::UnknownFlag {
            line,
            kind: "style",
            flag: flag.to_string(),
        };
        match flag.split_once('=') {
            None => match flag {
                "bold" => decoration.bold = true,
                "italic" => decoration.italic = true,
                "underline" => decoration.underline = true,
                "strike" => decoration.strikethrough = true,
                "plain" => decoration = TextDecoration::default(),
                _ => return Err(unknown()),
            },
            Some((key, value)) => match key {
                "font" => decoration.font_family = Some(value.to_string()),
                "size" => decoration.font_size = Some(value.parse().map_err(|_| unknown())?),
                "fg" => decoration.foreground = Some(color(value).ok_or_else(unknown)?),
                "bg" => decoration.background = Some(color(value).ok_or_else(unknown)?),
                "link" => decoration.link = Some(value.to_string()),
                _ => return Err(unknown()),
            },
        }
    }
    Ok(decoration)
}

fn color(value: &str) -> Option<String> {
    crate::view::parse_color(value).map(|_| value.to_ascii_lowercase())
}

fn paragraph_flags(flags: &str, line: usize) -> Result<ParagraphDecoration, ScriptError> {
    let mut decoration = ParagraphDecoration::default();
    for flag in flags.split(',').map(str::trim) {
        let unknown = || ScriptError::UnknownFlag {
            line,
            kind: "paragraph",
            flag: flag.to_string(),
        };
        match flag {
            "left" => decoration.alignment = Alignment::Left,
            "center" => decoration.alignment = Alignment::Center,
            "right" => decoration.alignment = Alignment::Right,
            "justify" => decoration.alignment = Alignment::Justify,
            "bullet" => decoration.graphic = ListGraphic::Bullet,
            "numbered" => decoration.graphic = ListGraphic::Numbered,
            "none" => decoration.graphic = ListGraphic::None,
            _ => {
                let (key, value) = flag.split_once('=').ok_or_else(unknown)?;
                let value: u16 = value.parse().map_err(|_| unknown())?;
                match key {
                    "indent" => {
                        decoration.indent = u8::try_from(value).map_err(|_| unknown())?;
                    }
                    "above" => decoration.spacing_above = value,
                    "below" => decoration.spacing_below = value,
                    _ => return Err(unknown()),
                }
            }
        }
    }
    Ok(decoration)
}

/// Apply parsed lines in order, stopping at the first failing one.
/// Returns how many lines changed the editor.
pub fn run_script(
    editor: &mut Editor,
    manager: &mut CommandManager,
    lines: &[ScriptLine],
) -> Result<usize, ScriptError> {
    let mut applied = 0;
    for ScriptLine { line, op } in lines {
        let edit = |source| ScriptError::Edit {
            line: *line,
            source,
        };
        let changed = match op {
            ScriptOp::Execute(command) => {
                manager.execute(editor, command.clone()).map_err(edit)?;
                true
            }
            ScriptOp::Undo => manager.undo(editor).map_err(edit)?,
            ScriptOp::Redo => manager.redo(editor).map_err(edit)?,
        };
        debug!("script line {line}: {op:?} changed={changed}");
        if changed {
            applied += 1;
        }
    }
    Ok(applied)
}
