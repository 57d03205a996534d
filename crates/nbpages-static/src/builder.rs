//! Notebook to page conversion driver.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};

use walkdir::WalkDir;

use nbpages_exec::{ExecuteContext, ExecuteError, Executor};
use nbpages_notebook::{notebook_title, parse_notebook, NotebookError};

use crate::assets::AssetPipeline;
use crate::renderer::cell_views;
use crate::templates::{PageContext, TemplateEngine};

/// Directory name Jupyter uses for autosave copies.
const CHECKPOINTS_DIR: &str = ".ipynb_checkpoints";

/// Configuration for converting notebooks.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    /// Directory searched for notebooks (and holding the source stylesheet)
    pub notebook_dir: PathBuf,

    /// Explicit notebooks to convert; empty means discover `*.ipynb`
    pub notebooks: Vec<PathBuf>,

    /// Search subdirectories when discovering
    pub recursive: bool,

    /// Where pages are written; `None` writes each page next to its notebook
    pub output_dir: Option<PathBuf>,

    /// Stylesheet path, relative to the output root
    pub stylesheet: String,

    /// Footer text on every page
    pub footer: String,

    /// Minify the stylesheet when copying or generating it
    pub minify_stylesheet: bool,

    /// Kernel used to execute code cells
    pub kernel: String,

    /// Per-cell execution timeout
    pub cell_timeout: Duration,

    /// Render raising cells as error outputs instead of failing the notebook
    pub allow_errors: bool,

    /// Stop at the first failed notebook
    pub fail_fast: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        let exec = ExecuteContext::default();
        Self {
            notebook_dir: PathBuf::from("."),
            notebooks: vec![],
            recursive: false,
            output_dir: None,
            stylesheet: "style.css".to_string(),
            footer: "Generated with nbpages".to_string(),
            minify_stylesheet: false,
            kernel: exec.kernel,
            cell_timeout: exec.cell_timeout,
            allow_errors: exec.allow_errors,
            fail_fast: false,
        }
    }
}

/// Result of converting a set of notebooks.
#[derive(Debug, Default)]
pub struct ConversionReport {
    /// Pages written
    pub converted: Vec<PathBuf>,

    /// Notebooks that failed, with the reason
    pub failed: Vec<FailedNotebook>,

    /// Set when the shared stylesheet could not be put in place
    pub stylesheet_error: Option<ConvertError>,

    /// Total time in milliseconds
    pub duration_ms: u64,
}

/// A notebook whose conversion failed.
#[derive(Debug)]
pub struct FailedNotebook {
    pub path: PathBuf,
    pub error: ConvertError,
    /// Page left over from an earlier build that no longer matches the notebook
    pub stale_page: Option<PathBuf>,
}

impl ConversionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.stylesheet_error.is_none()
    }
}

/// Errors that can occur during conversion.
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("Notebook directory not found: {}", .0.display())]
    MissingDir(PathBuf),

    #[error("Failed to read notebook directory: {0}")]
    Discover(String),

    #[error("Failed to load {}: {source}", path.display())]
    Notebook {
        path: PathBuf,
        #[source]
        source: NotebookError,
    },

    #[error("Failed to execute {}: {source}", path.display())]
    Execute {
        path: PathBuf,
        #[source]
        source: ExecuteError,
    },

    #[error("Failed to render {}: {source}", path.display())]
    Render {
        path: PathBuf,
        #[source]
        source: minijinja::Error,
    },

    #[error(
        "{} would overwrite {}, already written for {}",
        path.display(),
        page.display(),
        first.display()
    )]
    DuplicateOutput {
        path: PathBuf,
        page: PathBuf,
        first: PathBuf,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load templates: {0}")]
    Template(#[source] minijinja::Error),

    #[error("Stylesheet error: {0}")]
    Stylesheet(String),
}

/// Converts notebooks into styled HTML pages.
pub struct Converter<E> {
    config: ConvertConfig,
    executor: E,
    templates: TemplateEngine,
}

impl<E: Executor> Converter<E> {
    /// Create a converter that runs notebooks with `executor`.
    pub fn new(config: ConvertConfig, executor: E) -> Result<Self, ConvertError> {
        let templates = TemplateEngine::new().map_err(ConvertError::Template)?;
        Ok(Self {
            config,
            executor,
            templates,
        })
    }

    /// Convert every configured or discovered notebook, one after another.
    ///
    /// A failing notebook is recorded and the rest still convert, unless
    /// `fail_fast` is set. Only a discovery problem aborts the whole run; a
    /// stylesheet problem is recorded in the report.
    pub async fn convert_all(&self) -> Result<ConversionReport, ConvertError> {
        let start = Instant::now();

        let notebooks = if self.config.notebooks.is_empty() {
            self.discover_notebooks()?
        } else {
            self.config.notebooks.clone()
        };

        if notebooks.is_empty() {
            tracing::warn!(
                "No notebooks found in {}",
                self.config.notebook_dir.display()
            );
        }

        tracing::info!(
            "Converting {} notebooks with the {} engine",
            notebooks.len(),
            self.executor.name()
        );

        let mut report = ConversionReport::default();
        // page -> notebook that produced it in this run
        let mut written: HashMap<PathBuf, PathBuf> = HashMap::new();

        for path in notebooks {
            let page = self.output_path_for(&path);

            let result = match written.get(&page) {
                Some(first) => Err(ConvertError::DuplicateOutput {
                    path: path.clone(),
                    page: page.clone(),
                    first: first.clone(),
                }),
                None => self.convert(&path).await,
            };

            match result {
                Ok(output) => {
                    written.insert(output.clone(), path);
                    report.converted.push(output);
                }
                Err(error) => {
                    tracing::error!("{}", error);

                    let stale_page = match error {
                        ConvertError::DuplicateOutput { .. } => None,
                        _ => page.exists().then_some(page),
                    };
                    if let Some(stale) = &stale_page {
                        tracing::warn!(
                            "Leaving previous {} untouched; it does not reflect the current notebook",
                            stale.display()
                        );
                    }

                    report.failed.push(FailedNotebook {
                        path,
                        error,
                        stale_page,
                    });
                    if self.config.fail_fast {
                        tracing::warn!("Stopping after first failure");
                        break;
                    }
                }
            }
        }

        if !report.converted.is_empty() {
            if let Err(e) = AssetPipeline::ensure_stylesheet(
                &self.config.notebook_dir,
                self.output_root(),
                &self.config.stylesheet,
                self.config.minify_stylesheet,
            ) {
                let error = ConvertError::Stylesheet(e);
                tracing::error!("{}", error);
                report.stylesheet_error = Some(error);
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        Ok(report)
    }

    /// Convert a single notebook and return the page path.
    ///
    /// The page is rendered completely before anything touches the disk, then
    /// swapped into place. On failure any existing page is left untouched.
    pub async fn convert(&self, path: &Path) -> Result<PathBuf, ConvertError> {
        tracing::info!("Processing {}...", path.display());

        let notebook = parse_notebook(path).map_err(|source| ConvertError::Notebook {
            path: path.to_path_buf(),
            source,
        })?;

        let ctx = ExecuteContext {
            working_dir: parent_dir(path).to_path_buf(),
            kernel: self.config.kernel.clone(),
            cell_timeout: self.config.cell_timeout,
            allow_errors: self.config.allow_errors,
        };

        let output_path = self.output_path_for(path);

        let executed = self
            .executor
            .execute(path, &notebook, &ctx)
            .await
            .map_err(|source| ConvertError::Execute {
                path: path.to_path_buf(),
                source,
            })?;

        if executed.has_errors() {
            tracing::warn!("{} has cells that raised errors", path.display());
        }

        let html = self.render(path, &executed, &output_path)?;

        write_atomic(&output_path, &html).map_err(|source| ConvertError::Write {
            path: output_path.clone(),
            source,
        })?;

        tracing::info!("  Converted to {}", output_path.display());

        Ok(output_path)
    }

    fn render(
        &self,
        path: &Path,
        notebook: &nbpages_notebook::Notebook,
        output_path: &Path,
    ) -> Result<String, ConvertError> {
        let render_err = |source| ConvertError::Render {
            path: path.to_path_buf(),
            source,
        };

        let body = self
            .templates
            .render_notebook(&cell_views(notebook))
            .map_err(render_err)?;

        let page = PageContext {
            title: notebook_title(notebook, path),
            stylesheet: self.stylesheet_href(output_path),
            footer: self.config.footer.clone(),
            body,
        };

        self.templates.render_page(&page).map_err(render_err)
    }

    /// Find `*.ipynb` files, skipping checkpoint copies, sorted by path.
    pub fn discover_notebooks(&self) -> Result<Vec<PathBuf>, ConvertError> {
        let dir = &self.config.notebook_dir;
        if !dir.is_dir() {
            return Err(ConvertError::MissingDir(dir.clone()));
        }

        let max_depth = if self.config.recursive { usize::MAX } else { 1 };
        let mut notebooks = Vec::new();

        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(max_depth)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.file_name() != CHECKPOINTS_DIR)
        {
            let entry = entry.map_err(|e| ConvertError::Discover(e.to_string()))?;
            let path = entry.path();

            if !entry.file_type().is_file() {
                continue;
            }

            if path.extension().and_then(|e| e.to_str()) == Some("ipynb") {
                notebooks.push(path.to_path_buf());
            }
        }

        notebooks.sort();
        Ok(notebooks)
    }

    /// Page path for a notebook: `coords.ipynb` -> `coords.html`.
    ///
    /// With an output directory, the notebook's position below the notebook
    /// directory is kept.
    pub fn output_path_for(&self, notebook: &Path) -> PathBuf {
        let page = notebook.with_extension("html");

        let Some(output_dir) = &self.config.output_dir else {
            return page;
        };

        match page.strip_prefix(&self.config.notebook_dir) {
            Ok(relative) => output_dir.join(relative),
            Err(_) => output_dir.join(page.file_name().unwrap_or(page.as_os_str())),
        }
    }

    /// Stylesheet link for a page: the path from the page's directory to the
    /// shared stylesheet in the output root.
    pub fn stylesheet_href(&self, page: &Path) -> String {
        let stylesheet = self.output_root().join(&self.config.stylesheet);
        relative_href(&absolute(parent_dir(page)), &absolute(&stylesheet))
    }

    /// Directory the shared stylesheet lives in.
    fn output_root(&self) -> &Path {
        self.config
            .output_dir
            .as_deref()
            .unwrap_or(&self.config.notebook_dir)
    }
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Make `path` absolute against the working directory and fold away `.` and
/// `..` components without touching the filesystem.
fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut normal = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normal.pop();
            }
            other => normal.push(other.as_os_str()),
        }
    }
    normal
}

/// URL path from directory `from` to file `to`, both absolute.
fn relative_href(from: &Path, to: &Path) -> String {
    let from: Vec<_> = from.components().collect();
    let to: Vec<_> = to.components().collect();
    let common = from
        .iter()
        .zip(&to)
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    parts.join("/")
}

/// Write through a temporary file in the same directory, then rename.
fn write_atomic(path: &Path, contents: &str) -> std::io::Result<()> {
    let dir = parent_dir(path);
    fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(fs::Permissions::from_mode(0o644))?;
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
