//! Error type shared by both rendering routes.

use std::path::PathBuf;

use thiserror::Error;

use crate::markup::MarkupError;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("cannot read '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("paragraph markup error: {0}")]
    Markup(#[from] MarkupError),

    #[error("layout failed: {0}")]
    Layout(String),

    #[error("PDF rendering failed: {0}")]
    Render(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}
