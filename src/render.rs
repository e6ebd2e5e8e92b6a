use std::path::Path;

use async_trait::async_trait;

use crate::error::RenderError;

/// Produces the HTML for a page route. The edge only knows this contract;
/// the real renderer may be anything that can turn a URL into a document.
#[async_trait]
pub trait Renderer: Send + Sync + 'static {
    async fn render(
        &self,
        full_url: &str,
        document_path: &Path,
        base_path: &str,
    ) -> Result<String, RenderError>;
}

/// Serves the built index document for every route, with a `<base href>`
/// pointing at the base path so client-side routing resolves assets.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentShellRenderer;

#[async_trait]
impl Renderer for DocumentShellRenderer {
    async fn render(
        &self,
        full_url: &str,
        document_path: &Path,
        base_path: &str,
    ) -> Result<String, RenderError> {
        let document = tokio::fs::read_to_string(document_path)
            .await
            .map_err(|source| RenderError::Document {
                path: document_path.to_owned(),
                source,
            })?;
        tracing::trace!(url = full_url, "rendering document shell");
        Ok(with_base_href(document, base_path))
    }
}

fn with_base_href(document: String, base_path: &str) -> String {
    if document.contains("<base ") {
        return document;
    }
    match document.find("<head>") {
        Some(at) => {
            let insert_at = at + "<head>".len();
            let mut out = String::with_capacity(document.len() + 32);
            out.push_str(&document[..insert_at]);
            out.push_str(&format!("<base href=\"{base_path}\">"));
            out.push_str(&document[insert_at..]);
            out
        }
        None => document,
    }
}
