//! Notebook build command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use nbpages_exec::{Executor, JupyterExecutor, StoredOutputs};
use nbpages_static::{ConversionReport, ConvertConfig, Converter};

use crate::config::{load_config, ConfigFile};

/// Options for `nbpages build`; every flag overrides nbpages.toml.
#[derive(Debug, Default, Args)]
pub struct BuildArgs {
    /// Notebooks to convert (defaults to the configured list, or every
    /// *.ipynb in the notebook directory)
    pub notebooks: Vec<PathBuf>,

    /// Output directory (defaults to next to each notebook)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Render the outputs saved in the notebooks without running them
    #[arg(long)]
    pub no_execute: bool,

    /// Render raising cells as errors instead of failing the notebook
    #[arg(long)]
    pub allow_errors: bool,

    /// Kernel used to execute code cells
    #[arg(short, long)]
    pub kernel: Option<String>,

    /// Per-cell timeout in seconds
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Stop at the first notebook that fails
    #[arg(long)]
    pub fail_fast: bool,
}

/// Merge the config file with command-line overrides.
fn convert_config(file: &ConfigFile, args: &BuildArgs) -> ConvertConfig {
    let notebooks = if args.notebooks.is_empty() {
        file.notebooks.resolved_files()
    } else {
        args.notebooks.clone()
    };

    ConvertConfig {
        notebook_dir: file.notebooks.dir.clone(),
        notebooks,
        recursive: file.notebooks.recursive,
        output_dir: args.output.clone().or_else(|| file.output.dir.clone()),
        stylesheet: file.output.stylesheet.clone(),
        footer: file.output.footer.clone(),
        minify_stylesheet: file.output.minify_stylesheet,
        kernel: args
            .kernel
            .clone()
            .unwrap_or_else(|| file.execute.kernel.clone()),
        cell_timeout: Duration::from_secs(args.timeout.unwrap_or(file.execute.cell_timeout_secs)),
        allow_errors: args.allow_errors || file.execute.allow_errors,
        fail_fast: args.fail_fast || file.build.fail_fast,
    }
}

/// Run the build command.
pub async fn run(config_path: &Path, args: BuildArgs) -> Result<()> {
    let file_config = load_config(config_path)?;
    let config = convert_config(&file_config, &args);

    let report = if file_config.execute.enabled && !args.no_execute {
        let executor = JupyterExecutor::new()
            .with_command(file_config.execute.command.clone())
            .with_timeout(file_config.execute.timeout_secs.map(Duration::from_secs));
        convert(config, executor).await?
    } else {
        tracing::info!("Execution disabled, rendering saved outputs");
        convert(config, StoredOutputs).await?
    };

    summarize(&report)
}

async fn convert<E: Executor>(config: ConvertConfig, executor: E) -> Result<ConversionReport> {
    let converter = Converter::new(config, executor)?;
    Ok(converter.convert_all().await?)
}

/// Log the outcome; any failed notebook makes the command fail.
fn summarize(report: &ConversionReport) -> Result<()> {
    let total = report.converted.len() + report.failed.len();

    if report.is_success() {
        tracing::info!(
            "Converted {} notebooks in {}ms (stylesheet linked from every page)",
            report.converted.len(),
            report.duration_ms
        );
        return Ok(());
    }

    for failure in &report.failed {
        tracing::error!("  {}: {}", failure.path.display(), failure.error);
        if let Some(stale) = &failure.stale_page {
            tracing::warn!("  {} is out of date", stale.display());
        }
    }

    if let Some(error) = &report.stylesheet_error {
        tracing::error!("  {}", error);
        if report.failed.is_empty() {
            anyhow::bail!("{}", error);
        }
    }

    anyhow::bail!("{} of {} notebooks failed to convert", report.failed.len(), total)
}
