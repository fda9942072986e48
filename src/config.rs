//! Configuration file loading.
//!
//! Preferences persist in `~/.config/ai-chat-export/config.toml`; every
//! field is optional and the CLI overrides anything set here. The engine
//! itself never reads configuration — resolved values reach it as plain
//! parameters.

use eyre::{Context, Result, eyre};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Deserialize, Default)]
pub struct FileConfig {
    /// Directory notes are written to.
    pub out_dir: Option<PathBuf>,
    /// Directory watched for new HTML exports.
    pub downloads_dir: Option<PathBuf>,
    /// strftime-style date format for frontmatter.
    pub date_format: Option<String>,
    /// Character budget for titles and the filenames derived from them.
    pub max_filename_length: Option<usize>,
    /// Rewrite verbose questions into concise headings.
    pub smart_titles: Option<bool>,
}

pub fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        // Search: XDG/OS config dir, then nothing
        dirs::config_dir()
            .map(|d| d.join("ai-chat-export/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}
