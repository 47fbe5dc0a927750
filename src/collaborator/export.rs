//! Exporting annotations alongside a document
//!
//! Embedding annotations into PDF bytes belongs to the rendering side; the
//! store only hands an exporter the current collection. The sidecar exporter
//! here writes that collection as JSON next to the document.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::annotations::Annotation;

/// The document being annotated
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentHandle {
    /// File name or URL of the source document
    pub name: String,
    /// Page count, when the viewer knows it
    #[serde(rename = "pageCount", default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Annotation {id} is on page {page}, document has {page_count} pages")]
    PageOutOfRange { id: String, page: u32, page_count: u32 },

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Produces an annotated export of a document
pub trait DocumentExporter: Send + Sync {
    /// Export `annotations` for `document`, returning the output bytes
    fn export(
        &self,
        document: &DocumentHandle,
        annotations: &[Annotation],
    ) -> Result<Vec<u8>, ExportError>;

    /// MIME type of the bytes returned by [`export`](Self::export)
    fn content_type(&self) -> &'static str;
}

#[derive(Serialize)]
struct Sidecar<'a> {
    document: &'a DocumentHandle,
    #[serde(rename = "exportedAt")]
    exported_at: String,
    annotations: &'a [Annotation],
}

/// Writes annotations as a JSON sidecar document
#[derive(Debug, Clone, Default)]
pub struct JsonSidecarExporter {
    pretty: bool,
}

impl JsonSidecarExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indent the output
    pub fn pretty(mut self) -> Self {
        self.pretty = true;
        self
    }
}

impl DocumentExporter for JsonSidecarExporter {
    fn export(
        &self,
        document: &DocumentHandle,
        annotations: &[Annotation],
    ) -> Result<Vec<u8>, ExportError> {
        if document.name.trim().is_empty() {
            return Err(ExportError::InvalidDocument(
                "document name is empty".to_string(),
            ));
        }

        if let Some(page_count) = document.page_count {
            if let Some(a) = annotations
                .iter()
                .find(|a| a.page_number() == 0 || a.page_number() > page_count)
            {
                return Err(ExportError::PageOutOfRange {
                    id: a.id.clone(),
                    page: a.page_number(),
                    page_count,
                });
            }
        }

        let sidecar = Sidecar {
            document,
            exported_at: Utc::now().to_rfc3339(),
            annotations,
        };

        let bytes = if self.pretty {
            serde_json::to_vec_pretty(&sidecar)?
        } else {
            serde_json::to_vec(&sidecar)?
        };

        tracing::debug!(
            document = %document.name,
            annotations = annotations.len(),
            bytes = bytes.len(),
            "Exported annotation sidecar"
        );
        Ok(bytes)
    }

    fn content_type(&self) -> &'static str {
        "application/json"
    }
}
