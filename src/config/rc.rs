use crate::document_model::decoration::TextDecoration;
use crate::document_model::editor::EditorOptions;
use log::{info, warn};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const RC_FILE: &str = ".richeditrc";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RcConfig {
    /// Maximum undo entries; 0 keeps the whole history.
    pub undo_levels: usize,
    pub unicode_separators: bool,
    pub font_family: Option<String>,
    pub font_size: Option<u16>,
    /// Render width; `None` asks the terminal.
    pub width: Option<usize>,
    pub color: bool,
    /// Columns a tab expands to when rendering.
    pub tab_stop: usize,
}

impl Default for RcConfig {
    fn default() -> Self {
        Self {
            undo_levels: 0,
            unicode_separators: false,
            font_family: None,
            font_size: None,
            width: None,
            color: true,
            tab_stop: 4,
        }
    }
}

impl RcConfig {
    /// Editor settings derived from this configuration.
    pub fn editor_options(&self) -> EditorOptions {
        EditorOptions {
            unicode_separators: self.unicode_separators,
            default_decoration: TextDecoration {
                font_family: self.font_family.clone(),
                font_size: self.font_size,
                ..TextDecoration::default()
            },
        }
    }
}

pub struct RcLoader;

impl RcLoader {
    /// Looks for .richeditrc in:
    /// 1. Current directory
    /// 2. Home directory (~/.richeditrc)
    pub fn get_rc_path() -> Option<PathBuf> {
        let current_rc = Path::new(RC_FILE);
        if current_rc.exists() {
            return Some(current_rc.to_path_buf());
        }

        if let Ok(home) = env::var("HOME") {
            let home_rc = Path::new(&home).join(RC_FILE);
            if home_rc.exists() {
                return Some(home_rc);
            }
        }

        None
    }

    pub fn load_config() -> RcConfig {
        match Self::get_rc_path() {
            Some(rc_path) => Self::load_config_from(&rc_path),
            None => RcConfig::default(),
        }
    }

    /// Parse the file at `path`; unreadable files give the defaults.
    pub fn load_config_from(path: &Path) -> RcConfig {
        let mut config = RcConfig::default();
        match fs::read_to_string(path) {
            Ok(content) => {
                info!("loading settings from {}", path.display());
                Self::parse_config_content(&content, &mut config);
            }
            Err(error) => warn!("cannot read {}: {error}", path.display()),
        }
        config
    }

    fn parse_config_content(content: &str, config: &mut RcConfig) {
        for (number, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') || line.starts_with('"') {
                continue;
            }

            if !Self::parse_config_line(line, config) {
                warn!("{RC_FILE}:{}: ignoring `{line}`", number + 1);
            }
        }
    }

    /// Returns false for lines that set nothing.
    fn parse_config_line(line: &str, config: &mut RcConfig) -> bool {
        let line = if let Some(pos) = line.find('#') {
            &line[..pos]
        } else {
            line
        }
        .trim();

        // Both `set key=value` and bare `key=value` are accepted
        let setting = line.strip_prefix("set ").unwrap_or(line).trim();

        match setting {
            "unicodeseparators" | "usep" => config.unicode_separators = true,
            "nounicodeseparators" | "nousep" => config.unicode_separators = false,
            "color" => config.color = true,
            "nocolor" => config.color = false,
            _ => {
                let Some((key, value)) = setting.split_once('=') else {
                    return false;
                };
                return Self::apply_value(key.trim(), value.trim(), config);
            }
        }
        true
    }

    fn apply_value(key: &str, value: &str, config: &mut RcConfig) -> bool {
        match key {
            "undolevels" | "undo_levels" => match value.parse::<usize>() {
                Ok(levels) => config.undo_levels = levels,
                Err(_) => return false,
            },
            "font" | "font_family" if !value.is_empty() => {
                config.font_family = Some(value.to_string());
            }
            "fontsize" | "font_size" => match value.parse::<u16>() {
                Ok(size) if (1..=512).contains(&size) => config.font_size = Some(size),
                _ => return false,
            },
            "tabstop" | "ts" | "tab_stop" => match value.parse::<usize>() {
                Ok(tab_stop) if (1..=16).contains(&tab_stop) => config.tab_stop = tab_stop,
                _ => return false,
            },
            "width" => match value.parse::<usize>() {
                Ok(width) if width >= 10 => config.width = Some(width),
                _ => return false,
            },
            "unicodeseparators" | "unicode_separators" => {
                config.unicode_separators = value == "true" || value == "1" || value == "yes";
            }
            "color" => {
                config.color = value == "true" || value == "1" || value == "yes";
            }
            _ => return false,
        }
        true
    }

    pub fn generate_sample_rc() -> String {
        r#"# rich-edit configuration file (.richeditrc)
# Lines starting with # or " are comments

# History
set undolevels=200      # Keep at most 200 undo steps (0 = unlimited)

# Paragraphs
set unicodeseparators   # Also split paragraphs at U+2029 (or set nounicodeseparators)

# Default text styling
set font=Fira Sans
set fontsize=12

# Output
set width=72            # Render width in columns
set tabstop=4           # Columns per tab
set color               # Styled terminal output (or set nocolor)

# Alternative key=value syntax:
# undo_levels=200
# unicode_separators=true
# font_size=12
"#
        .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_vim_style_config() {
        let mut config = RcConfig::default();
        let content = r#"
            set undolevels=50
            set unicodeseparators
            set font=Fira Sans
            set fontsize=14
            set width=60
            set ts=2
            set nocolor
        "#;

        RcLoader::parse_config_content(content, &mut config);

        assert_eq!(config.undo_levels, 50);
        assert!(config.unicode_separators);
        assert_eq!(config.font_family.as_deref(), Some("Fira Sans"));
        assert_eq!(config.font_size, Some(14));
        assert_eq!(config.width, Some(60));
        assert_eq!(config.tab_stop, 2);
        assert!(!config.color);
    }

    #[test]
    fn test_parse_key_value_config() {
        let mut config = RcConfig::default();
        let content = r#"
            undo_levels=3
            unicode_separators=yes
            font_size=9
            color=false
        "#;

        RcLoader::parse_config_content(content, &mut config);

        assert_eq!(config.undo_levels, 3);
        assert!(config.unicode_separators);
        assert_eq!(config.font_size, Some(9));
        assert!(!config.color);
    }

    #[test]
    fn test_parse_mixed_config_with_comments() {
        let mut config = RcConfig::default();
        let content = r#"
            # This is a comment
            set undolevels=10      # Short history
            " This is also a comment

            # set nocolor          # This is commented out
            set nounicodeseparators
        "#;

        RcLoader::parse_config_content(content, &mut config);

        assert_eq!(config.undo_levels, 10);
        assert!(config.color);
        assert!(!config.unicode_separators);
    }

    #[test]
    fn test_invalid_values_ignored() {
        let mut config = RcConfig::default();
        let content = r#"
            set fontsize=0         # Invalid: too small
            set width=3            # Invalid: too narrow
            set tabstop=0          # Invalid: no columns
            undolevels=many        # Invalid: not a number
            set font=
            unknown_setting=value  # Unknown setting
            set ruler
        "#;

        RcLoader::parse_config_content(content, &mut config);

        assert_eq!(config, RcConfig::default());
    }

    #[test]
    fn test_sample_rc_parses_cleanly() {
        let mut config = RcConfig::default();
        let sample = RcLoader::generate_sample_rc();
        for line in sample.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            assert!(RcLoader::parse_config_line(line, &mut config), "{line}");
        }
        assert_eq!(config.undo_levels, 200);
        assert_eq!(config.width, Some(72));
    }

    #[test]
    fn test_load_from_file_and_editor_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RC_FILE);
        fs::write(&path, "set font=Serif\nset unicodeseparators\n").unwrap();

        let options = RcLoader::load_config_from(&path).editor_options();
        assert!(options.unicode_separators);
        assert_eq!(options.default_decoration.font_family.as_deref(), Some("Serif"));
        assert_eq!(
            RcLoader::load_config_from(&dir.path().join("absent")),
            RcConfig::default()
        );
    }
}
