//! Configuration file (nbpages.toml).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub notebooks: NotebooksConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub execute: ExecuteConfig,
    #[serde(default)]
    pub build: BuildSettings,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct NotebooksConfig {
    #[serde(default = "default_notebook_dir")]
    pub dir: PathBuf,
    /// Notebooks to convert, relative to `dir`; empty means discover
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub recursive: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct OutputConfig {
    pub dir: Option<PathBuf>,
    #[serde(default = "default_stylesheet")]
    pub stylesheet: String,
    #[serde(default = "default_footer")]
    pub footer: String,
    #[serde(default)]
    pub minify_stylesheet: bool,
}

#[derive(Debug, Deserialize, PartialEq)]
pub struct ExecuteConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_command")]
    pub command: Vec<String>,
    #[serde(default = "default_kernel")]
    pub kernel: String,
    #[serde(default = "default_cell_timeout")]
    pub cell_timeout_secs: u64,
    /// Wall-clock limit per notebook
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub allow_errors: bool,
}

#[derive(Debug, Deserialize, Default, PartialEq)]
pub struct BuildSettings {
    #[serde(default)]
    pub fail_fast: bool,
}

fn default_notebook_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_stylesheet() -> String {
    "style.css".to_string()
}
fn default_footer() -> String {
    "Generated with nbpages".to_string()
}
fn default_true() -> bool {
    true
}
fn default_command() -> Vec<String> {
    vec!["jupyter".to_string()]
}
fn default_kernel() -> String {
    "python3".to_string()
}
fn default_cell_timeout() -> u64 {
    600
}

impl Default for NotebooksConfig {
    fn default() -> Self {
        Self {
            dir: default_notebook_dir(),
            files: vec![],
            recursive: false,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: None,
            stylesheet: default_stylesheet(),
            footer: default_footer(),
            minify_stylesheet: false,
        }
    }
}

impl Default for ExecuteConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_command(),
            kernel: default_kernel(),
            cell_timeout_secs: default_cell_timeout(),
            timeout_secs: None,
            allow_errors: false,
        }
    }
}

impl NotebooksConfig {
    /// Configured notebook paths, resolved against `dir`.
    pub fn resolved_files(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| self.dir.join(f)).collect()
    }
}

/// Load configuration from `path` if it exists.
/// Returns an error if the config file exists but is malformed.
pub fn load_config(path: &Path) -> Result<ConfigFile> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: ConfigFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        tracing::info!("Loaded config from {}", path.display());
        return Ok(config);
    }
    Ok(ConfigFile::default())
}

/// Default config written by `nbpages init`.
pub const DEFAULT_CONFIG: &str = r#"# nbpages configuration

[notebooks]
# Directory containing the notebooks
dir = "."

# Notebooks to convert; leave empty to convert every *.ipynb in `dir`
files = []

# Also look in subdirectories
recursive = false

[output]
# Where pages are written; defaults to next to each notebook
# dir = "site"

# Stylesheet linked from every page, relative to the output directory
stylesheet = "style.css"

footer = "Generated with nbpages"

minify_stylesheet = false

[execute]
# Set to false to render the outputs already saved in the notebooks
enabled = true

command = ["jupyter"]
kernel = "python3"
cell_timeout_secs = 600

# Render raising cells as errors instead of failing the notebook
allow_errors = false

[build]
# Stop at the first notebook that fails
fail_fast = false
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn missing_file_uses_defaults() {
        let temp = tempdir().unwrap();

        let config = load_config(&temp.path().join("nbpages.toml")).unwrap();

        assert_eq!(config, ConfigFile::default());
        assert_eq!(config.output.stylesheet, "style.css");
        assert_eq!(config.execute.command, vec!["jupyter"]);
        assert!(config.execute.enabled);
    }

    #[test]
    fn default_config_matches_defaults() {
        let config: ConfigFile = toml::from_str(DEFAULT_CONFIG).unwrap();

        assert_eq!(config, ConfigFile::default());
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config: ConfigFile = toml::from_str(
            r#"
[notebooks]
dir = "notebooks"
files = ["coords.ipynb", "pga.ipynb"]

[execute]
kernel = "python3.12"
timeout_secs = 900
"#,
        )
        .unwrap();

        assert_eq!(
            config.notebooks.resolved_files(),
            vec![
                PathBuf::from("notebooks/coords.ipynb"),
                PathBuf::from("notebooks/pga.ipynb"),
            ]
        );
        assert_eq!(config.execute.kernel, "python3.12");
        assert_eq!(config.execute.timeout_secs, Some(900));
        assert_eq!(config.execute.cell_timeout_secs, 600);
        assert_eq!(config.output.footer, "Generated with nbpages");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nbpages.toml");
        fs::write(&path, "[output\nstylesheet = ").unwrap();

        let err = load_config(&path).unwrap_err();

        assert!(err.to_string().contains("Failed to parse"));
    }
}
