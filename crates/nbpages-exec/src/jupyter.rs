//! Execution through `jupyter nbconvert`.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use nbpages_notebook::{parse_notebook_str, Notebook};
use tokio::process::Command;

use crate::traits::{ExecuteContext, ExecuteError, Executor};

/// Runs notebooks with `jupyter nbconvert --execute` and reads the executed
/// notebook back from stdout.
#[derive(Debug, Clone)]
pub struct JupyterExecutor {
    /// Launcher program followed by any leading arguments
    command: Vec<String>,

    /// Wall-clock limit for the whole notebook
    timeout: Option<Duration>,
}

impl JupyterExecutor {
    /// Create an executor that launches `jupyter` from `PATH`.
    pub fn new() -> Self {
        Self {
            command: vec!["jupyter".to_string()],
            timeout: None,
        }
    }

    /// Use a different launcher, e.g. `["python", "-m", "jupyter"]`.
    pub fn with_command(mut self, command: Vec<String>) -> Self {
        self.command = command;
        self
    }

    /// Kill the engine if a notebook takes longer than `timeout` overall.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Arguments passed after the launcher.
    pub fn nbconvert_args(&self, notebook: &Path, ctx: &ExecuteContext) -> Vec<String> {
        let mut args = vec![
            "nbconvert".to_string(),
            "--to".to_string(),
            "notebook".to_string(),
            "--execute".to_string(),
            "--stdout".to_string(),
            format!("--ExecutePreprocessor.kernel_name={}", ctx.kernel),
            format!("--ExecutePreprocessor.timeout={}", ctx.cell_timeout.as_secs()),
        ];
        if ctx.allow_errors {
            args.push("--allow-errors".to_string());
        }
        args.push(notebook.display().to_string());
        args
    }
}

impl Default for JupyterExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl Executor for JupyterExecutor {
    fn name(&self) -> &'static str {
        "jupyter"
    }

    async fn execute(
        &self,
        path: &Path,
        _notebook: &Notebook,
        ctx: &ExecuteContext,
    ) -> Result<Notebook, ExecuteError> {
        let (program, leading) = self
            .command
            .split_first()
            .ok_or(ExecuteError::EmptyCommand)?;

        // The engine runs inside the notebook's directory
        let absolute = tokio::fs::canonicalize(path).await?;
        let args = self.nbconvert_args(&absolute, ctx);

        tracing::debug!(
            "Running {} {} {} in {}",
            program,
            leading.join(" "),
            args.join(" "),
            ctx.working_dir.display()
        );

        let child = Command::new(program)
            .args(leading)
            .args(&args)
            .current_dir(&ctx.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecuteError::Spawn {
                program: program.clone(),
                source,
            })?;

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| ExecuteError::Timeout(limit))??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            return Err(ExecuteError::CellFailed {
                status: output.status.code(),
                summary: summarize_stderr(&stderr),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_notebook_str(&stdout).map_err(ExecuteError::InvalidOutput)
    }
}

/// Last non-empty line of the engine's stderr, which names the exception.
fn summarize_stderr(stderr: &str) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("no output on stderr")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    const NOTEBOOK: &str = r#"{"cells": [{"cell_type": "code", "execution_count": 1, "metadata": {}, "source": "print('hi')", "outputs": [{"output_type": "stream", "name": "stdout", "text": "hi\n"}]}], "metadata": {}, "nbformat": 4, "nbformat_minor": 5}"#;

    fn setup(script: &str) -> (tempfile::TempDir, std::path::PathBuf, JupyterExecutor) {
        let temp = tempdir().unwrap();
        let notebook = temp.path().join("coords.ipynb");
        fs::write(&notebook, NOTEBOOK).unwrap();

        let script_path = temp.path().join("fake-jupyter.sh");
        fs::write(&script_path, script).unwrap();

        let executor = JupyterExecutor::new().with_command(vec![
            "sh".to_string(),
            script_path.display().to_string(),
        ]);
        (temp, notebook, executor)
    }

    fn context(dir: &Path) -> ExecuteContext {
        ExecuteContext {
            working_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn builds_nbconvert_arguments() {
        let executor = JupyterExecutor::new();
        let ctx = ExecuteContext {
            kernel: "julia-1.10".to_string(),
            cell_timeout: Duration::from_secs(30),
            allow_errors: true,
            ..Default::default()
        };

        let args = executor.nbconvert_args(Path::new("/nb/coords.ipynb"), &ctx);

        assert_eq!(
            args,
            vec![
                "nbconvert",
                "--to",
                "notebook",
                "--execute",
                "--stdout",
                "--ExecutePreprocessor.kernel_name=julia-1.10",
                "--ExecutePreprocessor.timeout=30",
                "--allow-errors",
                "/nb/coords.ipynb",
            ]
        );
    }

    #[test]
    fn omits_allow_errors_by_default() {
        let args = JupyterExecutor::new()
            .nbconvert_args(Path::new("a.ipynb"), &ExecuteContext::default());

        assert!(!args.contains(&"--allow-errors".to_string()));
        assert!(args.contains(&"--ExecutePreprocessor.kernel_name=python3".to_string()));
        assert!(args.contains(&"--ExecutePreprocessor.timeout=600".to_string()));
    }

    #[test]
    fn summarizes_last_stderr_line() {
        let stderr = "[NbConvertApp] Converting\nTraceback...\nZeroDivisionError: division by zero\n\n";

        assert_eq!(
            summarize_stderr(stderr),
            "ZeroDivisionError: division by zero"
        );
        assert_eq!(summarize_stderr(""), "no output on stderr");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reads_executed_notebook_from_stdout() {
        let (temp, notebook, executor) = setup("for last; do :; done\ncat \"$last\"\n");
        let nb = nbpages_notebook::parse_notebook(&notebook).unwrap();

        let executed = executor
            .execute(&notebook, &nb, &context(temp.path()))
            .await
            .unwrap();

        assert_eq!(executed, nb);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reports_cell_failure() {
        let (temp, notebook, executor) = setup(
            "echo 'Traceback (most recent call last):' >&2\necho 'ValueError: boom' >&2\nexit 1\n",
        );
        let nb = nbpages_notebook::parse_notebook(&notebook).unwrap();

        let err = executor
            .execute(&notebook, &nb, &context(temp.path()))
            .await
            .unwrap_err();

        match err {
            ExecuteError::CellFailed {
                status, summary, ..
            } => {
                assert_eq!(status, Some(1));
                assert_eq!(summary, "ValueError: boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn rejects_garbage_output() {
        let (temp, notebook, executor) = setup("echo 'not json'\n");
        let nb = nbpages_notebook::parse_notebook(&notebook).unwrap();

        let err = executor
            .execute(&notebook, &nb, &context(temp.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecuteError::InvalidOutput(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn kills_engine_after_timeout() {
        let (temp, notebook, executor) = setup("sleep 5\n");
        let executor = executor.with_timeout(Some(Duration::from_millis(100)));
        let nb = nbpages_notebook::parse_notebook(&notebook).unwrap();

        let err = executor
            .execute(&notebook, &nb, &context(temp.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecuteError::Timeout(_)));
    }

    #[tokio::test]
    async fn reports_missing_engine() {
        let (temp, notebook, _) = setup("");
        let executor =
            JupyterExecutor::new().with_command(vec!["nbpages-no-such-engine".to_string()]);
        let nb = nbpages_notebook::parse_notebook(&notebook).unwrap();

        let err = executor
            .execute(&notebook, &nb, &context(temp.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecuteError::Spawn { .. }));
    }

    #[tokio::test]
    async fn rejects_empty_command() {
        let (temp, notebook, _) = setup("");
        let executor = JupyterExecutor::new().with_command(vec![]);
        let nb = nbpages_notebook::parse_notebook(&notebook).unwrap();

        let err = executor
            .execute(&notebook, &nb, &context(temp.path()))
            .await
            .unwrap_err();

        assert!(matches!(err, ExecuteError::EmptyCommand));
    }
}
