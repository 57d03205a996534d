//! Initialize nbpages in a notebook directory.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use nbpages_static::AssetPipeline;

use crate::config::DEFAULT_CONFIG;

/// Run the init command.
///
/// Writes the config file at `config_path` and a default `style.css` next to
/// it. Existing files are kept unless `yes` is set.
pub fn run(config_path: &Path, yes: bool) -> Result<()> {
    tracing::info!("Initializing nbpages...");

    let base = match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(base).context("Failed to create config directory")?;

    if !config_path.exists() || yes {
        fs::write(config_path, DEFAULT_CONFIG)
            .with_context(|| format!("Failed to write {}", config_path.display()))?;
        tracing::info!("Created {}", config_path.display());
    } else {
        tracing::warn!(
            "{} already exists. Use --yes to overwrite.",
            config_path.display()
        );
    }

    let style_path = base.join("style.css");
    if !style_path.exists() || yes {
        fs::write(&style_path, AssetPipeline::generate_css())
            .with_context(|| format!("Failed to write {}", style_path.display()))?;
        tracing::info!("Created {}", style_path.display());
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'nbpages build' to convert your notebooks.");

    Ok(())
}
