//! Pass-through engine that keeps saved outputs.

use std::path::Path;

use nbpages_notebook::Notebook;

use crate::traits::{ExecuteContext, ExecuteError, Executor};

/// Skips execution and renders whatever outputs the notebook already holds.
///
/// Useful when only the page wrapping changed and re-running the code is
/// slow or impossible on the publishing machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoredOutputs;

impl Executor for StoredOutputs {
    fn name(&self) -> &'static str {
        "stored"
    }

    async fn execute(
        &self,
        path: &Path,
        notebook: &Notebook,
        _ctx: &ExecuteContext,
    ) -> Result<Notebook, ExecuteError> {
        let unexecuted = notebook
            .code_cells()
            .filter(|c| c.execution_count.is_none() && !c.source.as_str().trim().is_empty())
            .count();
        if unexecuted > 0 {
            tracing::warn!(
                "{} has {} code cells without saved outputs",
                path.display(),
                unexecuted
            );
        }
        Ok(notebook.clone())
    }
}
