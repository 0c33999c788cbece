use super::view_model::{StyledRun, ViewModel};
use crate::document_model::decoration::{
    Alignment, EmbeddedObject, ListGraphic, OBJECT_REPLACEMENT, TextDecoration,
};
use crossterm::{
    queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor},
};
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

const INDENT_WIDTH: usize = 2;

/// Writes paragraphs as terminal lines. Paragraphs are not wrapped;
/// alignment pads lines shorter than the width, and justified text is
/// laid out like left-aligned text since each paragraph is a single line.
pub struct View {
    width: usize,
    color: bool,
    tab_stop: usize,
}

impl View {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            color: true,
            tab_stop: 4,
        }
    }

    /// Width of the terminal, or 80 columns when it cannot be queried.
    pub fn terminal_width() -> usize {
        crossterm::terminal::size().map_or(80, |(width, _)| width as usize)
    }

    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    pub fn set_tab_stop(&mut self, tab_stop: usize) {
        self.tab_stop = tab_stop.max(1);
    }

    pub fn render(&self, view_model: &dyn ViewModel, out: &mut impl Write) -> io::Result<()> {
        let mut number = 0;
        for index in 0..view_model.get_paragraph_count() {
            let decoration = view_model.get_paragraph_decoration(index);
            for _ in 0..decoration.spacing_above {
                queue!(out, Print("\n"))?;
            }

            let mut prefix = " ".repeat(decoration.indent as usize * INDENT_WIDTH);
            match decoration.graphic {
                ListGraphic::None => number = 0,
                ListGraphic::Bullet => {
                    number = 0;
                    prefix.push_str("• ");
                }
                ListGraphic::Numbered => {
                    number += 1;
                    prefix.push_str(&format!("{number}. "));
                }
            }

            let runs: Vec<StyledRun> = view_model
                .get_paragraph_runs(index)
                .into_iter()
                .map(|run| StyledRun {
                    text: self.visible_text(&run),
                    decoration: run.decoration,
                })
                .collect();
            let used = self.display_width(&prefix)
                + runs
                    .iter()
                    .map(|run| self.display_width(&run.text))
                    .sum::<usize>();
            let free = self.width.saturating_sub(used);
            let padding = match decoration.alignment {
                Alignment::Left | Alignment::Justify => 0,
                Alignment::Center => free / 2,
                Alignment::Right => free,
            };

            queue!(out, Print(" ".repeat(padding)), Print(&prefix))?;
            for run in &runs {
                self.write_run(run, out)?;
            }
            queue!(out, Print("\n"))?;
            for _ in 0..decoration.spacing_below {
                queue!(out, Print("\n"))?;
            }
        }
        out.flush()
    }

    /// Text of a run as displayed; embedded objects become placeholders.
    fn visible_text(&self, run: &StyledRun) -> String {
        let Some(object) = &run.decoration.object else {
            return run.text.replace('\t', &" ".repeat(self.tab_stop));
        };
        let placeholder = match object {
            EmbeddedObject::Image { url, .. } => format!("[image: {url}]"),
            EmbeddedObject::Table { rows, columns } => format!("[table {rows}x{columns}]"),
        };
        run.text
            .chars()
            .map(|c| {
                if c == OBJECT_REPLACEMENT {
                    placeholder.clone()
                } else {
                    c.to_string()
                }
            })
            .collect()
    }

    fn write_run(&self, run: &StyledRun, out: &mut impl Write) -> io::Result<()> {
        if !self.color || run.decoration == TextDecoration::default() {
            return queue!(out, Print(&run.text));
        }
        let decoration = &run.decoration;
        if decoration.bold {
            queue!(out, SetAttribute(Attribute::Bold))?;
        }
        if decoration.italic {
            queue!(out, SetAttribute(Attribute::Italic))?;
        }
        if decoration.underline || decoration.link.is_some() {
            queue!(out, SetAttribute(Attribute::Underlined))?;
        }
        if decoration.strikethrough {
            queue!(out, SetAttribute(Attribute::CrossedOut))?;
        }
        if let Some(color) = decoration.foreground.as_deref().and_then(parse_color) {
            queue!(out, SetForegroundColor(color))?;
        }
        if let Some(color) = decoration.background.as_deref().and_then(parse_color) {
            queue!(out, SetBackgroundColor(color))?;
        }
        queue!(out, Print(&run.text), SetAttribute(Attribute::Reset), ResetColor)
    }

    /// Columns taken by `text`, accounting for wide characters.
    pub fn display_width(&self, text: &str) -> usize {
        text.chars().map(|c| c.width().unwrap_or(0)).sum()
    }
}

/// Parse `#rrggbb` into a terminal colour.
pub fn parse_color(value: &str) -> Option<Color> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 || !hex.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    Some(Color::Rgb {
        r: channel(0..2)?,
        g: channel(2..4)?,
        b: channel(4..6)?,
    })
}
