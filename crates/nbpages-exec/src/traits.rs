//! Trait definitions for execution engines.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nbpages_notebook::{Notebook, NotebookError};

/// Default kernel used to run code cells.
pub const DEFAULT_KERNEL: &str = "python3";

/// Default per-cell timeout, in seconds.
pub const DEFAULT_CELL_TIMEOUT_SECS: u64 = 600;

/// Settings for executing one notebook.
#[derive(Debug, Clone)]
pub struct ExecuteContext {
    /// Directory the kernel runs in (relative paths in cells resolve here)
    pub working_dir: PathBuf,

    /// Kernel name, e.g. "python3"
    pub kernel: String,

    /// Maximum time a single cell may run
    pub cell_timeout: Duration,

    /// Record raising cells as error outputs instead of failing
    pub allow_errors: bool,
}

impl Default for ExecuteContext {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            kernel: DEFAULT_KERNEL.to_string(),
            cell_timeout: Duration::from_secs(DEFAULT_CELL_TIMEOUT_SECS),
            allow_errors: false,
        }
    }
}

/// Errors that can occur while executing a notebook.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    #[error("Execution command is empty")]
    EmptyCommand,

    #[error("Failed to start execution engine `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Notebook execution failed ({}): {summary}", status_label(.status))]
    CellFailed {
        status: Option<i32>,
        summary: String,
        stderr: String,
    },

    #[error("Notebook execution timed out after {0:?}")]
    Timeout(Duration),

    #[error("Execution engine returned an unreadable notebook: {0}")]
    InvalidOutput(#[source] NotebookError),

    #[error("I/O error while executing: {0}")]
    Io(#[from] std::io::Error),
}

fn status_label(status: &Option<i32>) -> String {
    match status {
        Some(code) => format!("exit status {}", code),
        None => "terminated by signal".to_string(),
    }
}

/// An engine that runs a notebook's code cells and returns the notebook with
/// fresh outputs.
pub trait Executor: Send + Sync {
    /// Engine identifier for logs (e.g., "jupyter")
    fn name(&self) -> &'static str;

    /// Execute a notebook.
    ///
    /// # Arguments
    /// * `path` - The notebook file on disk
    /// * `notebook` - The already-parsed contents of `path`
    /// * `ctx` - Kernel, timeout and error policy
    fn execute(
        &self,
        path: &Path,
        notebook: &Notebook,
        ctx: &ExecuteContext,
    ) -> impl Future<Output = Result<Notebook, ExecuteError>> + Send;
}
