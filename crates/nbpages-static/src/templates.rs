//! Template engine for notebook pages.

use minijinja::{context, Environment, Value};
use serde::Serialize;

/// Context for rendering the page wrapper.
#[derive(Debug, Clone, Serialize)]
pub struct PageContext {
    /// Page title
    pub title: String,
    /// Relative path to the shared stylesheet
    pub stylesheet: String,
    /// Footer text
    pub footer: String,
    /// Rendered notebook HTML
    pub body: String,
}

/// A cell prepared for the notebook template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CellView {
    Code {
        id: Option<String>,
        prompt: String,
        language: String,
        source: String,
        outputs: Vec<OutputView>,
    },
    Markdown {
        id: Option<String>,
        /// Rendered from markdown, inserted verbatim
        html: String,
    },
    Raw {
        id: Option<String>,
        source: String,
    },
}

/// An output prepared for the notebook template.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutputView {
    Stream {
        name: String,
        text: String,
    },
    /// HTML, SVG or rendered markdown, inserted verbatim
    Html {
        prompt: Option<String>,
        html: String,
    },
    Image {
        prompt: Option<String>,
        /// Complete `data:` URI, already validated
        src: String,
    },
    Latex {
        prompt: Option<String>,
        text: String,
    },
    Text {
        prompt: Option<String>,
        text: String,
    },
    Error {
        ename: String,
        evalue: String,
        traceback: String,
    },
}

/// Template engine using minijinja.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Create a new template engine with the built-in templates.
    pub fn new() -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();

        env.add_template_owned("page.html".to_string(), PAGE_TEMPLATE.to_string())?;
        env.add_template_owned("notebook.html".to_string(), NOTEBOOK_TEMPLATE.to_string())?;
        env.add_template_owned("output.html".to_string(), OUTPUT_TEMPLATE.to_string())?;

        Ok(Self { env })
    }

    /// Wrap a rendered notebook body in the full page.
    pub fn render_page(&self, page: &PageContext) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template("page.html")?;

        tmpl.render(context! {
            title => &page.title,
            stylesheet => Value::from_safe_string(escape_attr(&page.stylesheet)),
            footer => &page.footer,
            body => Value::from_safe_string(page.body.clone()),
        })
    }

    /// Render prepared cells into the notebook body fragment.
    pub fn render_notebook(&self, cells: &[CellView]) -> Result<String, minijinja::Error> {
        let tmpl = self.env.get_template("notebook.html")?;

        tmpl.render(context! { cells => cells })
    }
}

/// Escape a value for a double-quoted attribute, leaving path separators alone.
fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

const PAGE_TEMPLATE: &str = r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ title }}</title>
  <link rel="stylesheet" href="{{ stylesheet }}">
</head>
<body>
  <div class="container">
    {{ body }}
    <footer>
      <p>{{ footer }}</p>
    </footer>
  </div>
</body>
</html>
"##;

const NOTEBOOK_TEMPLATE: &str = r##"<div class="notebook">
{%- for cell in cells %}
{%- if cell.kind == "code" %}
<div class="cell code_cell"{% if cell.id %} id="cell-{{ cell.id }}"{% endif %}>
  <div class="input">
    <div class="prompt input_prompt">{{ cell.prompt }}</div>
    <div class="input_area"><pre><code class="language-{{ cell.language }}">{{ cell.source }}</code></pre></div>
  </div>
  {%- if cell.outputs %}
  <div class="output_wrapper">
    {%- for output in cell.outputs %}
    {% include "output.html" %}
    {%- endfor %}
  </div>
  {%- endif %}
</div>
{%- elif cell.kind == "markdown" %}
<div class="cell text_cell"{% if cell.id %} id="cell-{{ cell.id }}"{% endif %}>
  <div class="text_cell_render">
{{ cell.html | safe }}
  </div>
</div>
{%- else %}
<div class="cell raw_cell"{% if cell.id %} id="cell-{{ cell.id }}"{% endif %}>
  <pre>{{ cell.source }}</pre>
</div>
{%- endif %}
{%- endfor %}
</div>"##;

const OUTPUT_TEMPLATE: &str = r##"<div class="output_area">
      <div class="prompt output_prompt">{% if output.prompt %}{{ output.prompt }}{% endif %}</div>
      {%- if output.kind == "stream" %}
      <div class="output_subarea output_stream output_{{ output.name }}"><pre>{{ output.text }}</pre></div>
      {%- elif output.kind == "html" %}
      <div class="output_subarea output_html">{{ output.html | safe }}</div>
      {%- elif output.kind == "image" %}
      <div class="output_subarea output_image"><img src="{{ output.src | safe }}" alt="output"></div>
      {%- elif output.kind == "latex" %}
      <div class="output_subarea output_latex">{{ output.text }}</div>
      {%- elif output.kind == "error" %}
      <div class="output_subarea output_error"><pre><span class="ename">{{ output.ename }}</span>: {{ output.evalue }}
{{ output.traceback }}</pre></div>
      {%- else %}
      <div class="output_subarea output_text"><pre>{{ output.text }}</pre></div>
      {%- endif %}
    </div>"##;
