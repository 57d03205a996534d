//! Page title derivation.

use std::path::Path;

use crate::notebook::{Cell, Notebook};

/// Pick a page title for a notebook.
///
/// The first markdown cell that starts with `#` wins: its first line with all
/// `#` characters removed. Otherwise the file stem is used, with underscores
/// turned into spaces and each word capitalized.
pub fn notebook_title(notebook: &Notebook, path: &Path) -> String {
    for cell in &notebook.cells {
        if let Cell::Markdown(md) = cell {
            let source = md.source.as_str();
            if source.starts_with('#') {
                let first_line = source.lines().next().unwrap_or("");
                return first_line.replace('#', "").trim().to_string();
            }
        }
    }

    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("Untitled");
    title_case(&stem.replace('_', " "))
}

/// Capitalize the first letter of every alphabetic run and lowercase the rest.
///
/// `"linear_algebra 2d"` becomes `"Linear_Algebra 2D"`.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;

    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_alpha {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(c);
            prev_alpha = false;
        }
    }

    out
}
