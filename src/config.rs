//! Optional config file loading. Search order: ./litscrape.toml, then
//! $XDG_CONFIG_HOME/litscrape/config.toml (or ~/.config/litscrape/config.toml).

use crate::formats::OutputFormat;
use serde::Deserialize;
use std::path::PathBuf;

/// Config file contents. All fields optional; only present keys override defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct Config {
    /// Default output directory when -o is not set. Paths are relative to CWD.
    pub output_dir: Option<PathBuf>,
    /// Pin one HTTP User-Agent header.
    pub user_agent: Option<String>,
    /// Pool the per-run User-Agent is picked from, replacing the built-in one.
    pub user_agents: Option<Vec<String>>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Default output format: html, txt, or md.
    pub format: Option<String>,
}

impl Config {
    /// The configured format, if any. An unknown name is an error, not a fallback.
    pub fn output_format(&self) -> Result<Option<OutputFormat>, String> {
        self.format
            .as_deref()
            .map(|f| f.parse::<OutputFormat>().map_err(|e| format!("Invalid config: {}", e)))
            .transpose()
    }
}

/// Search order: (1) ./litscrape.toml, (2) $XDG_CONFIG_HOME/litscrape/config.toml.
/// Missing file returns Ok(None). Invalid TOML or I/O error reading a present file returns Err.
pub fn load_config() -> Result<Option<Config>, String> {
    let cwd = std::env::current_dir()
        .map_err(|e| format!("Cannot determine current directory: {}", e))?;
    let mut paths = vec![cwd.join("litscrape.toml")];
    if let Some(d) = dirs::config_dir() {
        paths.push(d.join("litscrape").join("config.toml"));
    }
    for path in &paths {
        if path.exists() {
            let s = std::fs::read_to_string(path)
                .map_err(|e| format!("Cannot read config {}: {}", path.display(), e))?;
            let config: Config = toml::from_str(&s)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?;
            tracing::debug!(path = %path.display(), "loaded config");
            return Ok(Some(config));
        }
    }
    Ok(None)
}
