//! Shared stylesheet handling.

use std::fs;
use std::path::{Path, PathBuf};

/// What happened to the shared stylesheet during a build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StylesheetStatus {
    /// A stylesheet was already in place and left alone
    Existing(PathBuf),
    /// Copied from the notebook directory into the output directory
    Copied(PathBuf),
    /// No stylesheet existed, so the default one was written
    Generated(PathBuf),
}

/// Asset pipeline utilities.
pub struct AssetPipeline;

impl AssetPipeline {
    /// Generate the default notebook stylesheet.
    pub fn generate_css() -> String {
        DEFAULT_CSS.to_string()
    }

    /// Minify CSS using lightningcss.
    pub fn minify_css(css: &str) -> Result<String, String> {
        use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

        let stylesheet = StyleSheet::parse(css, ParserOptions::default())
            .map_err(|e| format!("CSS parse error: {}", e))?;

        let minified = stylesheet
            .to_css(PrinterOptions {
                minify: true,
                ..Default::default()
            })
            .map_err(|e| format!("CSS minify error: {}", e))?;

        Ok(minified.code)
    }

    /// Make sure the stylesheet every page links to exists.
    ///
    /// `source_dir` is where hand-written stylesheets live (the notebook
    /// directory); `output_dir` is where pages are written. When they differ
    /// and a source stylesheet exists, it is copied over. Otherwise a missing
    /// stylesheet is replaced by the default one.
    pub fn ensure_stylesheet(
        source_dir: &Path,
        output_dir: &Path,
        stylesheet: &str,
        minify: bool,
    ) -> Result<StylesheetStatus, String> {
        let target = output_dir.join(stylesheet);
        let source = source_dir.join(stylesheet);

        if source != target && source.is_file() {
            let css = fs::read_to_string(&source)
                .map_err(|e| format!("Failed to read {}: {}", source.display(), e))?;
            write_css(&target, &css, minify)?;
            tracing::info!("Copied stylesheet from {}", source.display());
            return Ok(StylesheetStatus::Copied(target));
        }

        if target.exists() {
            return Ok(StylesheetStatus::Existing(target));
        }

        tracing::warn!(
            "Stylesheet not found, writing default to {}",
            target.display()
        );
        write_css(&target, &Self::generate_css(), minify)?;
        Ok(StylesheetStatus::Generated(target))
    }
}

fn write_css(target: &Path, css: &str, minify: bool) -> Result<(), String> {
    let css = if minify {
        AssetPipeline::minify_css(css).unwrap_or_else(|e| {
            tracing::warn!("Keeping stylesheet unminified: {}", e);
            css.to_string()
        })
    } else {
        css.to_string()
    };

    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create {}: {}", parent.display(), e))?;
    }
    fs::write(target, css).map_err(|e| format!("Failed to write {}: {}", target.display(), e))
}

// Classic notebook layout: prompts in a left gutter, inputs and outputs in
// bordered areas.
const DEFAULT_CSS: &str = r#"/* nbpages notebook theme */

:root {
  --background: #ffffff;
  --foreground: #1f2328;
  --muted: #f6f8fa;
  --border: #d0d7de;
  --prompt-in: #303f9f;
  --prompt-out: #d84315;
  --error: #b3261e;
  --link: #0969da;
  --prompt-width: 7.5rem;
  --content-max-width: 960px;
}

* {
  box-sizing: border-box;
}

body {
  margin: 0;
  font-family: system-ui, -apple-system, "Segoe UI", sans-serif;
  background: var(--background);
  color: var(--foreground);
  line-height: 1.6;
}

.container {
  max-width: var(--content-max-width);
  margin: 0 auto;
  padding: 2rem 1rem;
}

a {
  color: var(--link);
}

pre,
code {
  font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace;
  font-size: 0.875rem;
}

pre {
  margin: 0;
  white-space: pre-wrap;
  word-break: break-word;
}

/* Cells */
.cell {
  margin-bottom: 1rem;
}

.input,
.output_area {
  display: flex;
  align-items: flex-start;
}

.prompt {
  flex: 0 0 var(--prompt-width);
  padding: 0.4rem 0.5rem 0 0;
  text-align: right;
  font-family: ui-monospace, SFMono-Regular, Menlo, Consolas, monospace;
  font-size: 0.8rem;
}

.input_prompt {
  color: var(--prompt-in);
}

.output_prompt {
  color: var(--prompt-out);
}

.input_area {
  flex: 1;
  min-width: 0;
  background: var(--muted);
  border: 1px solid var(--border);
  border-radius: 4px;
  padding: 0.4rem 0.6rem;
  overflow-x: auto;
}

.output_wrapper {
  margin-top: 0.25rem;
}

.output_subarea {
  flex: 1;
  min-width: 0;
  padding: 0.4rem 0.6rem;
  overflow-x: auto;
}

.output_stderr {
  background: #fff5f5;
}

.output_error pre {
  color: var(--error);
}

.output_image img {
  max-width: 100%;
  height: auto;
}

.output_html table,
.text_cell_render table {
  border-collapse: collapse;
  margin: 0.5rem 0;
}

.output_html th,
.output_html td,
.text_cell_render th,
.text_cell_render td {
  border: 1px solid var(--border);
  padding: 0.25rem 0.6rem;
}

/* Markdown */
.text_cell_render {
  margin-left: var(--prompt-width);
}

.text_cell_render h1,
.text_cell_render h2,
.text_cell_render h3 {
  line-height: 1.25;
  margin: 1.5rem 0 0.75rem;
}

.text_cell_render img {
  max-width: 100%;
}

.raw_cell pre {
  margin-left: var(--prompt-width);
}

footer {
  margin-top: 3rem;
  padding-top: 1rem;
  border-top: 1px solid var(--border);
  color: #57606a;
  font-size: 0.85rem;
  text-align: center;
}

@media (max-width: 720px) {
  .input,
  .output_area {
    flex-direction: column;
  }

  .prompt {
    flex-basis: auto;
    text-align: left;
  }

  .text_cell_render,
  .raw_cell pre {
    margin-left: 0;
  }
}
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generates_css() {
        let css = AssetPipeline::generate_css();
        assert!(css.contains(":root"));
        assert!(css.contains(".input_prompt"));
        assert!(css.contains(".output_error"));
    }

    #[test]
    fn minifies_css() {
        let css = r#"
.container {
    max-width: 960px;
    margin: 0 auto;
}
        "#;

        let minified = AssetPipeline::minify_css(css).unwrap();

        assert!(!minified.contains('\n'));
        assert!(minified.contains(".container"));
    }

    #[test]
    fn default_css_minifies() {
        let minified = AssetPipeline::minify_css(&AssetPipeline::generate_css()).unwrap();

        assert!(minified.len() < DEFAULT_CSS.len());
    }

    #[test]
    fn keeps_existing_stylesheet() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("style.css"), "body { color: red; }").unwrap();

        let status =
            AssetPipeline::ensure_stylesheet(temp.path(), temp.path(), "style.css", false)
                .unwrap();

        assert_eq!(status, StylesheetStatus::Existing(temp.path().join("style.css")));
        assert_eq!(
            fs::read_to_string(temp.path().join("style.css")).unwrap(),
            "body { color: red; }"
        );
    }

    #[test]
    fn writes_default_when_missing() {
        let temp = tempdir().unwrap();

        let status =
            AssetPipeline::ensure_stylesheet(temp.path(), temp.path(), "style.css", false)
                .unwrap();

        assert_eq!(status, StylesheetStatus::Generated(temp.path().join("style.css")));
        assert_eq!(
            fs::read_to_string(temp.path().join("style.css")).unwrap(),
            DEFAULT_CSS
        );
    }

    #[test]
    fn copies_source_stylesheet_to_output() {
        let temp = tempdir().unwrap();
        let out = temp.path().join("site");
        fs::write(temp.path().join("style.css"), "body { color: blue; }").unwrap();

        let status =
            AssetPipeline::ensure_stylesheet(temp.path(), &out, "style.css", false).unwrap();

        assert_eq!(status, StylesheetStatus::Copied(out.join("style.css")));
        assert_eq!(
            fs::read_to_string(out.join("style.css")).unwrap(),
            "body { color: blue; }"
        );
    }

    #[test]
    fn minifies_copied_stylesheet() {
        let temp = tempdir().unwrap();
        let out = temp.path().join("site");
        fs::write(temp.path().join("style.css"), "body {\n  color: blue;\n}\n").unwrap();

        AssetPipeline::ensure_stylesheet(temp.path(), &out, "style.css", true).unwrap();

        let css = fs::read_to_string(out.join("style.css")).unwrap();
        assert!(!css.contains('\n'));
        assert!(css.contains("body"));
    }
}
