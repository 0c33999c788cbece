use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};
use rich_edit::config::RcLoader;
use rich_edit::document_model::{Document, Editor, EditorOptions, read_document, write_document};
use rich_edit::script::{ScriptLine, parse_line, parse_script, run_script};
use rich_edit::undo::CommandManager;
use rich_edit::view::{EditorViewModel, View};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Apply edit scripts to a rich-text document and print the result.
#[derive(Parser, Debug)]
#[command(name = "rich-edit", version, about)]
struct Cli {
    /// Document to open; `.json` files keep their decorations, anything
    /// else is read as plain text
    file: Option<PathBuf>,

    /// Edit script to run, one command per line
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// Single script command, run after --script (repeatable)
    #[arg(short = 'e', long = "exec")]
    exec: Vec<String>,

    /// Where to save the edited document (`.json` keeps decorations)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List paragraph ranges before the rendered text
    #[arg(long)]
    paragraphs: bool,

    /// Print the raw text instead of rendering it
    #[arg(long)]
    plain: bool,

    /// Render without terminal styling
    #[arg(long)]
    no_color: bool,

    /// Render width in columns
    #[arg(long)]
    width: Option<usize>,

    /// Debug logging for the editor
    #[arg(short, long)]
    verbose: bool,

    /// Print a sample .richeditrc and exit
    #[arg(long)]
    sample_rc: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut logger = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        logger.filter_level(LevelFilter::Warn);
        let level = if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        };
        logger.filter_module("rich_edit", level);
    }
    logger.init();

    if cli.sample_rc {
        print!("{}", RcLoader::generate_sample_rc());
        return Ok(());
    }

    let config = RcLoader::load_config();
    let options = config.editor_options();

    let mut editor = match &cli.file {
        Some(path) => open(path, &options)?,
        None => Editor::new(&options),
    };
    let mut manager = CommandManager::with_history_limit(config.undo_levels);
    manager.set_on_change(|event, editor: &Editor| {
        debug!("{event:?}: {} characters, caret {}", editor.len(), editor.caret())
    });

    let lines = collect_script(&cli)?;
    if !lines.is_empty() {
        let applied = run_script(&mut editor, &mut manager, &lines)?;
        info!(
            "applied {applied} of {} script command(s); {} undo step(s) recorded",
            lines.len(),
            manager.undo_len()
        );
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.paragraphs {
        print_paragraphs(&editor, &mut out)?;
    }
    if cli.plain {
        writeln!(out, "{}", editor.text())?;
    } else {
        let width = cli
            .width
            .or(config.width)
            .unwrap_or_else(View::terminal_width);
        let mut view = View::new(width);
        view.set_color(config.color && !cli.no_color);
        view.set_tab_stop(config.tab_stop);
        view.render(&EditorViewModel::new(&editor), &mut out)?;
    }

    if let Some(path) = &cli.output {
        save(&mut editor, path)?;
    }
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension().is_some_and(|extension| extension == "json")
}

fn open(path: &Path, options: &EditorOptions) -> Result<Editor> {
    if is_json(path) {
        let document = read_document(path)
            .with_context(|| format!("failed to open document {}", path.display()))?;
        info!("opened {} ({} characters)", path.display(), document.text().chars().count());
        return Ok(Editor::from_document(&document, options)?);
    }
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    info!("imported plain text from {}", path.display());
    Ok(Editor::from_document(&Document::plain(&text), options)?)
}

fn collect_script(cli: &Cli) -> Result<Vec<ScriptLine>> {
    let mut lines = match &cli.script {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read script {}", path.display()))?;
            parse_script(&source).with_context(|| format!("in script {}", path.display()))?
        }
        None => Vec::new(),
    };
    for (index, command) in cli.exec.iter().enumerate() {
        let op = parse_line(command.trim(), index + 1)
            .with_context(|| format!("in --exec argument {}", index + 1))?;
        lines.push(ScriptLine {
            line: index + 1,
            op,
        });
    }
    Ok(lines)
}

fn print_paragraphs(editor: &Editor, out: &mut impl Write) -> Result<()> {
    let paragraphs = editor.paragraphs();
    for (index, paragraph) in paragraphs.paragraphs().iter().enumerate() {
        let text = editor.text_range(paragraph.start(), paragraph.end())?;
        writeln!(
            out,
            "{index:>3} {:?} {}..{} {text:?}",
            paragraph.id(),
            paragraph.start(),
            paragraph.end()
        )?;
    }
    Ok(())
}

fn save(editor: &mut Editor, path: &Path) -> Result<()> {
    if is_json(path) {
        let bytes = write_document(path, &editor.snapshot())
            .with_context(|| format!("failed to save {}", path.display()))?;
        info!("wrote {bytes} bytes to {}", path.display());
    } else {
        fs::write(path, editor.text())
            .with_context(|| format!("failed to save {}", path.display()))?;
        info!("wrote plain text to {}", path.display());
    }
    editor.mark_saved();
    Ok(())
}
