//! Template rendering seam.
//!
//! The engine does not load or parse templates itself. Applications install a
//! [`TemplateRenderer`] with [`Engine::set_renderer`](crate::engine::Engine::set_renderer)
//! and handlers call [`Context::html`](crate::context::Context::html), which hands the
//! template name and the serialized data to it.

use serde_json::Value;
use thiserror::Error;

/// Errors a renderer reports back to [`Context::html`](crate::context::Context::html).
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("template not found: {0}")]
    TemplateNotFound(String),

    #[error("no template renderer installed")]
    NoRenderer,

    #[error("failed to render template {name}: {message}")]
    Render { name: String, message: String },
}

/// Turns a named template plus JSON data into an HTML page.
///
/// Implemented for any `Fn(&str, &Value) -> Result<String, RenderError>` closure, so a
/// renderer backed by a template engine can be plugged in without a wrapper type.
///
/// ```
/// use gantry::render::{RenderError, TemplateRenderer};
/// use serde_json::{Value, json};
///
/// let renderer = |name: &str, data: &Value| -> Result<String, RenderError> {
///     match name {
///         "hello" => Ok(format!("<p>Hello, {}</p>", data["name"].as_str().unwrap_or("?"))),
///         other => Err(RenderError::TemplateNotFound(other.to_owned())),
///     }
/// };
///
/// assert_eq!(renderer.render("hello", &json!({"name": "gantry"})).unwrap(), "<p>Hello, gantry</p>");
/// assert!(renderer.render("missing", &json!({})).is_err());
/// ```
pub trait TemplateRenderer: Send + Sync + 'static {
    fn render(&self, name: &str, data: &Value) -> Result<String, RenderError>;
}

impl<F> TemplateRenderer for F
where
    F: Fn(&str, &Value) -> Result<String, RenderError> + Send + Sync + 'static,
{
    fn render(&self, name: &str, data: &Value) -> Result<String, RenderError> {
        (self)(name, data)
    }
}
