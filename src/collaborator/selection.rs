//! Selections reported by the viewer

use serde::{Deserialize, Serialize};

use crate::annotations::{
    AnnotationKind, HighlightStyle, ImageContent, NewAnnotation, ScaledPosition, TextContent,
};

/// A finished text or area selection, before it becomes an annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub position: ScaledPosition,
    #[serde(flatten)]
    pub content: SelectionContent,
}

/// What the viewer extracted from the selection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SelectionContent {
    /// Selected text
    Text { content: TextContent },
    /// Screenshot of a rectangular region
    Area { content: ImageContent },
}

impl NewAnnotation {
    /// Wrap a finished selection into a highlight with `comment`
    pub fn from_selection(selection: Selection, comment: &str) -> Self {
        let kind = match selection.content {
            SelectionContent::Text { content } => AnnotationKind::Text {
                content,
                style: HighlightStyle::default(),
            },
            SelectionContent::Area { content } => AnnotationKind::Area {
                content,
                style: HighlightStyle::default(),
            },
        };

        Self {
            kind,
            position: selection.position,
            comment: Some(comment.to_string()),
        }
    }
}
