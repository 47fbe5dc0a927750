//! Annotation module
//!
//! Provides the annotation record types and the persisted store the viewer,
//! sidebar and toolbars treat as their single source of truth.
//!
//! # Features
//!
//! - Annotation kinds:
//!   - Text and area highlights
//!   - Free-text notes
//!   - Images and signatures
//!   - Freehand drawings
//!   - Shapes (rectangle, circle, arrow)
//!
//! - Newest-first collection with search and per-page grouping
//! - Pluggable persistence and change subscriptions

mod store;
mod types;

pub use store::{AnnotationState, AnnotationStore, StoreEvent, ANNOTATIONS_NAMESPACE};
pub use types::{
    Annotation, AnnotationKind, AnnotationType, AnnotationUpdate, ContentUpdate, DrawingContent,
    DrawingStroke, FreetextStyle, HighlightMark, HighlightStyle, ImageContent, NewAnnotation, Point,
    Scaled, ScaledPosition, ShapeContent, ShapeData, ShapeStyle, ShapeType, TextContent,
    ViewportRect,
};
