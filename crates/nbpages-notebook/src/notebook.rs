//! Notebook documents and cells.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::output::{MimeBundle, Output};

/// The only nbformat major version we understand.
pub const NBFORMAT_MAJOR: u64 = 4;

/// A parsed nbformat 4 notebook.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct Notebook {
    /// Ordered cells
    pub cells: Vec<Cell>,

    /// Document-level metadata
    #[serde(default)]
    pub metadata: NotebookMetadata,

    /// Major format version
    pub nbformat: u64,

    /// Minor format version
    #[serde(default)]
    pub nbformat_minor: u64,
}

/// Document-level notebook metadata.
///
/// Only the fields we render from are kept; everything else is ignored.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct NotebookMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kernelspec: Option<KernelSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_info: Option<LanguageInfo>,
}

/// Kernel the notebook was written against.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct KernelSpec {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub display_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// Language of the notebook's code cells.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct LanguageInfo {
    #[serde(default)]
    pub name: String,
}

/// A notebook cell, tagged by `cell_type`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "cell_type", rename_all = "lowercase")]
pub enum Cell {
    Code(CodeCell),
    Markdown(MarkdownCell),
    Raw(RawCell),
}

/// A code cell with its captured outputs.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct CodeCell {
    /// Cell id (nbformat 4.5 and later)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub source: MultilineString,

    /// `None` when the cell has never been executed
    #[serde(default)]
    pub execution_count: Option<u32>,

    #[serde(default)]
    pub outputs: Vec<Output>,

    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A narrative markdown cell.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct MarkdownCell {
    /// Cell id (nbformat 4.5 and later)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub source: MultilineString,

    /// Inline files referenced as `attachment:<name>`
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attachments: BTreeMap<String, MimeBundle>,

    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// A raw cell, passed through untouched by the kernel.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct RawCell {
    /// Cell id (nbformat 4.5 and later)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub source: MultilineString,

    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Text stored either as one string or as a list of lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "RawMultiline", into = "String")]
pub struct MultilineString(pub String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMultiline {
    One(String),
    Many(Vec<String>),
}

impl From<RawMultiline> for MultilineString {
    fn from(raw: RawMultiline) -> Self {
        match raw {
            RawMultiline::One(s) => Self(s),
            RawMultiline::Many(lines) => Self(lines.concat()),
        }
    }
}

impl From<MultilineString> for String {
    fn from(s: MultilineString) -> Self {
        s.0
    }
}

impl From<&str> for MultilineString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl MultilineString {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Cell {
    /// Source text of the cell.
    pub fn source(&self) -> &str {
        match self {
            Cell::Code(c) => c.source.as_str(),
            Cell::Markdown(c) => c.source.as_str(),
            Cell::Raw(c) => c.source.as_str(),
        }
    }

    /// Cell id, when the notebook records one.
    pub fn id(&self) -> Option<&str> {
        match self {
            Cell::Code(c) => c.id.as_deref(),
            Cell::Markdown(c) => c.id.as_deref(),
            Cell::Raw(c) => c.id.as_deref(),
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Cell::Code(_))
    }
}

impl Notebook {
    /// Iterate over code cells in document order.
    pub fn code_cells(&self) -> impl Iterator<Item = &CodeCell> {
        self.cells.iter().filter_map(|cell| match cell {
            Cell::Code(c) => Some(c),
            _ => None,
        })
    }

    /// Whether any code cell carries an `error` output.
    pub fn has_errors(&self) -> bool {
        self.code_cells()
            .flat_map(|c| c.outputs.iter())
            .any(|o| matches!(o, Output::Error { .. }))
    }

    /// Language used to label code blocks.
    pub fn language(&self) -> &str {
        if let Some(info) = &self.metadata.language_info {
            if !info.name.is_empty() {
                return &info.name;
            }
        }
        self.metadata
            .kernelspec
            .as_ref()
            .and_then(|k| k.language.as_deref())
            .unwrap_or("python")
    }
}

/// Errors that can occur when loading a notebook.
#[derive(Debug, thiserror::Error)]
pub enum NotebookError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed notebook: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Missing nbformat version")]
    MissingVersion,

    #[error("Unsupported nbformat version {0} (expected 4)")]
    UnsupportedVersion(u64),
}

/// Read and parse a notebook file.
pub fn parse_notebook(path: impl AsRef<Path>) -> Result<Notebook, NotebookError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| NotebookError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_notebook_str(&content)
}

/// Parse a notebook from its JSON text.
///
/// The version is checked before the structure so that old formats report a
/// version error instead of a confusing missing-field error.
pub fn parse_notebook_str(content: &str) -> Result<Notebook, NotebookError> {
    let value: serde_json::Value = serde_json::from_str(content)?;

    let version = value
        .get("nbformat")
        .and_then(|v| v.as_u64())
        .ok_or(NotebookError::MissingVersion)?;
    if version != NBFORMAT_MAJOR {
        return Err(NotebookError::UnsupportedVersion(version));
    }

    Ok(serde_json::from_value(value)?)
}
