//! Interfaces shared with the document viewer
//!
//! The viewer renders pages and overlays, reports finished selections,
//! scrolls to annotations and produces annotated exports. The store only
//! depends on it through the types and traits here.

mod export;
mod navigation;
mod selection;

pub use export::{DocumentExporter, DocumentHandle, ExportError, JsonSidecarExporter};
pub use navigation::{highlight_hash, parse_id_from_hash, scroll_to_hash, Viewer};
pub use selection::{Selection, SelectionContent};
