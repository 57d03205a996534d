//! Conversion of executed notebooks into template views.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use pulldown_cmark::{html, CowStr, Event, Options, Parser, Tag};
use regex::Regex;

use nbpages_notebook::{Cell, MimeBundle, Notebook, Output};

use crate::templates::{CellView, OutputView};

/// Mime types we can display, best first.
pub const DISPLAY_PRIORITY: &[&str] = &[
    "text/html",
    "image/svg+xml",
    "image/png",
    "image/jpeg",
    "image/gif",
    "text/markdown",
    "text/latex",
    "application/json",
    "text/plain",
];

/// Build template views for every cell of a notebook.
pub fn cell_views(notebook: &Notebook) -> Vec<CellView> {
    let language = notebook.language().to_string();

    notebook
        .cells
        .iter()
        .map(|cell| match cell {
            Cell::Code(code) => CellView::Code {
                id: code.id.clone(),
                prompt: input_prompt(code.execution_count),
                language: language.clone(),
                source: code.source.as_str().to_string(),
                outputs: code.outputs.iter().filter_map(output_view).collect(),
            },
            Cell::Markdown(md) => CellView::Markdown {
                id: md.id.clone(),
                html: render_markdown(md.source.as_str(), &md.attachments),
            },
            Cell::Raw(raw) => CellView::Raw {
                id: raw.id.clone(),
                source: raw.source.as_str().to_string(),
            },
        })
        .collect()
}

fn input_prompt(execution_count: Option<u32>) -> String {
    match execution_count {
        Some(n) => format!("In [{}]:", n),
        None => "In [ ]:".to_string(),
    }
}

/// Convert one output to its view, or `None` if nothing in it is displayable.
fn output_view(output: &Output) -> Option<OutputView> {
    match output {
        Output::Stream { name, text } => Some(OutputView::Stream {
            name: name.clone(),
            text: strip_ansi(text.as_str()),
        }),
        Output::ExecuteResult {
            execution_count,
            data,
            ..
        } => {
            let prompt = execution_count.map(|n| format!("Out[{}]:", n));
            mime_view(data, prompt)
        }
        Output::DisplayData { data, .. } => mime_view(data, None),
        Output::Error {
            ename,
            evalue,
            traceback,
        } => Some(OutputView::Error {
            ename: ename.clone(),
            evalue: strip_ansi(evalue),
            traceback: strip_ansi(&traceback.join("\n")),
        }),
    }
}

/// Pick the best representation from a mime bundle.
fn mime_view(data: &MimeBundle, prompt: Option<String>) -> Option<OutputView> {
    for mime in DISPLAY_PRIORITY {
        let Some(content) = data.text(mime) else {
            continue;
        };

        let view = match *mime {
            "text/html" | "image/svg+xml" => OutputView::Html {
                prompt,
                html: content,
            },
            "image/png" | "image/jpeg" | "image/gif" => {
                let Some(src) = data_uri(mime, &content) else {
                    tracing::warn!("Skipping {} output with invalid base64 data", mime);
                    continue;
                };
                OutputView::Image { prompt, src }
            }
            "text/markdown" => OutputView::Html {
                prompt,
                html: render_markdown(&content, &BTreeMap::new()),
            },
            "text/latex" => OutputView::Latex {
                prompt,
                text: content,
            },
            _ => OutputView::Text {
                prompt,
                text: strip_ansi(&content),
            },
        };
        return Some(view);
    }

    tracing::debug!(
        "No displayable representation among: {}",
        data.mime_types().collect::<Vec<_>>().join(", ")
    );
    None
}

/// Build a `data:` URI from base64 payload, rejecting anything that is not
/// plain base64 so the URI is safe inside an attribute.
fn data_uri(mime: &str, payload: &str) -> Option<String> {
    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    let valid = !cleaned.is_empty()
        && cleaned
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=');

    valid.then(|| format!("data:{};base64,{}", mime, cleaned))
}

/// Render markdown to HTML, resolving `attachment:` image links.
pub fn render_markdown(source: &str, attachments: &BTreeMap<String, MimeBundle>) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_MATH;

    let parser = Parser::new_ext(source, options).map(|event| match event {
        Event::Start(Tag::Image {
            link_type,
            dest_url,
            title,
            id,
        }) => {
            let resolved = dest_url
                .strip_prefix("attachment:")
                .and_then(|name| attachment_uri(attachments, name));
            let dest_url = match resolved {
                Some(uri) => CowStr::from(uri),
                None => dest_url,
            };
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            })
        }
        other => other,
    });

    let mut html_output = String::new();
    html::push_html(&mut html_output, parser);

    html_output
}

fn attachment_uri(attachments: &BTreeMap<String, MimeBundle>, name: &str) -> Option<String> {
    let bundle = attachments.get(name)?;
    bundle
        .mime_types()
        .filter(|mime| mime.starts_with("image/"))
        .find_map(|mime| data_uri(mime, &bundle.text(mime)?))
}

/// Remove ANSI escape sequences (colored tracebacks, progress bars).
pub fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| {
        Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").expect("ANSI pattern is valid")
    });
    re.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbpages_notebook::parse_notebook_str;
    use pretty_assertions::assert_eq;

    fn notebook(cells: &str) -> Notebook {
        parse_notebook_str(&format!(
            r#"{{"cells": [{cells}], "metadata": {{"language_info": {{"name": "python"}}}}, "nbformat": 4, "nbformat_minor": 5}}"#
        ))
        .unwrap()
    }

    #[test]
    fn renders_print_cell() {
        let nb = notebook(
            r#"{"cell_type": "code", "execution_count": 1, "metadata": {}, "source": "print(\"hi\")",
                "outputs": [{"output_type": "stream", "name": "stdout", "text": "hi\n"}]}"#,
        );

        let views = cell_views(&nb);

        assert_eq!(
            views,
            vec![CellView::Code {
                id: None,
                prompt: "In [1]:".to_string(),
                language: "python".to_string(),
                source: "print(\"hi\")".to_string(),
                outputs: vec![OutputView::Stream {
                    name: "stdout".to_string(),
                    text: "hi\n".to_string(),
                }],
            }]
        );
    }

    #[test]
    fn marks_unexecuted_cells() {
        let nb = notebook(
            r#"{"cell_type": "code", "execution_count": null, "metadata": {}, "source": "x", "outputs": []}"#,
        );

        let CellView::Code { prompt, outputs, .. } = &cell_views(&nb)[0] else {
            panic!("expected code cell");
        };
        assert_eq!(prompt, "In [ ]:");
        assert!(outputs.is_empty());
    }

    #[test]
    fn prefers_html_over_plain_text() {
        let bundle: MimeBundle = [
            ("text/plain", "   a\n0  1"),
            ("text/html", "<table></table>"),
        ]
        .into_iter()
        .collect();

        let view = mime_view(&bundle, Some("Out[4]:".to_string())).unwrap();

        assert_eq!(
            view,
            OutputView::Html {
                prompt: Some("Out[4]:".to_string()),
                html: "<table></table>".to_string(),
            }
        );
    }

    #[test]
    fn prefers_png_over_plain_text() {
        let bundle: MimeBundle = [
            ("text/plain", "<Figure size 640x480>"),
            ("image/png", "iVBORw0K\nGgo=\n"),
        ]
        .into_iter()
        .collect();

        let view = mime_view(&bundle, None).unwrap();

        assert_eq!(
            view,
            OutputView::Image {
                prompt: None,
                src: "data:image/png;base64,iVBORw0KGgo=".to_string(),
            }
        );
    }

    #[test]
    fn falls_back_when_image_data_is_invalid() {
        let bundle: MimeBundle = [
            ("text/plain", "fallback"),
            ("image/png", "\" onerror=\"alert(1)"),
        ]
        .into_iter()
        .collect();

        let view = mime_view(&bundle, None).unwrap();

        assert_eq!(
            view,
            OutputView::Text {
                prompt: None,
                text: "fallback".to_string(),
            }
        );
    }

    #[test]
    fn skips_undisplayable_bundles() {
        let bundle: MimeBundle = [(
            "application/vnd.jupyter.widget-view+json",
            serde_json::json!({"model_id": "x"}),
        )]
        .into_iter()
        .collect();

        assert_eq!(mime_view(&bundle, None), None);
    }

    #[test]
    fn renders_markdown_output_and_latex() {
        let md: MimeBundle = [("text/markdown", "**bold**")].into_iter().collect();
        let latex: MimeBundle = [("text/latex", "$x^2$")].into_iter().collect();

        assert_eq!(
            mime_view(&md, None),
            Some(OutputView::Html {
                prompt: None,
                html: "<p><strong>bold</strong></p>\n".to_string(),
            })
        );
        assert_eq!(
            mime_view(&latex, None),
            Some(OutputView::Latex {
                prompt: None,
                text: "$x^2$".to_string(),
            })
        );
    }

    #[test]
    fn strips_ansi_from_tracebacks() {
        let nb = notebook(
            r#"{"cell_type": "code", "execution_count": 2, "metadata": {}, "source": "1/0",
                "outputs": [{"output_type": "error", "ename": "ZeroDivisionError", "evalue": "division by zero",
                "traceback": ["\u001b[0;31m---------\u001b[0m", "\u001b[0;31mZeroDivisionError\u001b[0m: division by zero"]}]}"#,
        );

        let CellView::Code { outputs, .. } = &cell_views(&nb)[0] else {
            panic!("expected code cell");
        };

        assert_eq!(
            outputs[0],
            OutputView::Error {
                ename: "ZeroDivisionError".to_string(),
                evalue: "division by zero".to_string(),
                traceback: "---------\nZeroDivisionError: division by zero".to_string(),
            }
        );
    }

    #[test]
    fn renders_markdown_cells() {
        let nb = notebook(
            r##"{"cell_type": "markdown", "id": "m1", "metadata": {}, "source": ["# Title\n", "\n", "| a |\n", "|---|\n", "| 1 |\n"]}"##,
        );

        let CellView::Markdown { id, html } = &cell_views(&nb)[0] else {
            panic!("expected markdown cell");
        };

        assert_eq!(id.as_deref(), Some("m1"));
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<table>"));
    }

    #[test]
    fn resolves_attachment_images() {
        let mut attachments = BTreeMap::new();
        attachments.insert(
            "diagram.png".to_string(),
            [("image/png", "iVBORw0KGgo=")].into_iter().collect::<MimeBundle>(),
        );

        let html = render_markdown(
            "![diagram](attachment:diagram.png) ![other](attachment:missing.png)",
            &attachments,
        );

        assert!(html.contains(r#"src="data:image/png;base64,iVBORw0KGgo=""#));
        assert!(html.contains(r#"src="attachment:missing.png""#));
    }

    #[test]
    fn strip_ansi_keeps_plain_text() {
        assert_eq!(strip_ansi("plain"), "plain");
        assert_eq!(strip_ansi("\x1b[1;32mok\x1b[0m done"), "ok done");
    }
}
