//! Code cell outputs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::notebook::MultilineString;

/// An output captured from running a code cell, tagged by `output_type`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    /// Text written to stdout or stderr
    Stream { name: String, text: MultilineString },

    /// The value of the cell's last expression
    ExecuteResult {
        #[serde(default)]
        execution_count: Option<u32>,
        data: MimeBundle,
        #[serde(default)]
        metadata: serde_json::Value,
    },

    /// Rich output produced explicitly (plots, tables, ...)
    DisplayData {
        data: MimeBundle,
        #[serde(default)]
        metadata: serde_json::Value,
    },

    /// An exception raised by the cell
    Error {
        ename: String,
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
}

/// Output data keyed by mime type.
///
/// Values are strings, lists of lines, or arbitrary JSON for types such as
/// `application/json`.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct MimeBundle(pub BTreeMap<String, serde_json::Value>);

impl MimeBundle {
    pub fn contains(&self, mime: &str) -> bool {
        self.0.contains_key(mime)
    }

    /// Text content for a mime type.
    ///
    /// Line lists are joined; structured JSON is pretty-printed.
    pub fn text(&self, mime: &str) -> Option<String> {
        let value = self.0.get(mime)?;
        match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) if items.iter().all(|v| v.is_string()) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str())
                    .collect::<String>(),
            ),
            other => serde_json::to_string_pretty(other).ok(),
        }
    }

    pub fn mime_types(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }
}

impl<K: Into<String>, V: Into<serde_json::Value>> FromIterator<(K, V)> for MimeBundle {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl Output {
    /// Execution count shown in the `Out[n]:` prompt, if any.
    pub fn execution_count(&self) -> Option<u32> {
        match self {
            Output::ExecuteResult {
                execution_count, ..
            } => *execution_count,
            _ => None,
        }
    }
}
