//! Notebook to static HTML page conversion.
//!
//! Executes notebooks, renders them to HTML and wraps each one in a page that
//! links a shared stylesheet.

pub mod assets;
pub mod builder;
pub mod renderer;
pub mod templates;

pub use assets::{AssetPipeline, StylesheetStatus};
pub use builder::{ConversionReport, ConvertConfig, ConvertError, Converter, FailedNotebook};
pub use templates::{PageContext, TemplateEngine};
