//! Scrolling to annotations via the location hash
//!
//! The sidebar links to `#highlight-<id>`; the viewer resolves the hash back
//! to a record and scrolls to it.

use crate::annotations::{Annotation, AnnotationStore};

const HASH_PREFIX: &str = "highlight-";

/// Scrolls the rendered document to an annotation
pub trait Viewer {
    fn scroll_to(&self, annotation: &Annotation);
}

/// Location hash linking to annotation `id`
pub fn highlight_hash(id: &str) -> String {
    format!("#{}{}", HASH_PREFIX, urlencoding::encode(id))
}

/// Annotation id from a location hash, with or without the leading `#`
pub fn parse_id_from_hash(hash: &str) -> Option<String> {
    let fragment = hash.strip_prefix('#').unwrap_or(hash);
    let encoded = fragment.strip_prefix(HASH_PREFIX)?;
    if encoded.is_empty() {
        return None;
    }

    match urlencoding::decode(encoded) {
        Ok(id) => Some(id.into_owned()),
        Err(e) => {
            tracing::debug!(hash = %hash, error = %e, "Ignoring undecodable location hash");
            None
        }
    }
}

/// Scroll `viewer` to the annotation named by `hash`
///
/// Returns `false` when the hash names no annotation in `store`.
pub fn scroll_to_hash(store: &AnnotationStore, viewer: &dyn Viewer, hash: &str) -> bool {
    let Some(annotation) = parse_id_from_hash(hash).and_then(|id| store.get(&id)) else {
        return false;
    };

    viewer.scroll_to(&annotation);
    true
}
