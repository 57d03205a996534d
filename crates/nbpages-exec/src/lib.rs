//! Notebook execution engines.
//!
//! Execution is delegated to an external engine. [`JupyterExecutor`] runs
//! `jupyter nbconvert --execute` as a subprocess; [`StoredOutputs`] keeps the
//! outputs already saved in the notebook.

pub mod jupyter;
pub mod stored;
pub mod traits;

pub use jupyter::JupyterExecutor;
pub use stored::StoredOutputs;
pub use traits::{ExecuteContext, ExecuteError, Executor};
