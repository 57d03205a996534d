//! Jupyter notebook model and parser.
//!
//! This crate reads nbformat 4 documents into typed cells and outputs, and
//! derives a page title from a notebook's first heading.

pub mod notebook;
pub mod output;
pub mod title;

pub use notebook::{
    parse_notebook, parse_notebook_str, Cell, CodeCell, KernelSpec, LanguageInfo, MarkdownCell,
    MultilineString, Notebook, NotebookError, NotebookMetadata, RawCell,
};
pub use output::{MimeBundle, Output};
pub use title::{notebook_title, title_case};
