//! Annotation types
//!
//! Records are keyed by a `type` discriminator that selects both the content
//! payload and the style fields, so a record can never pair e.g. a shape
//! descriptor with a text highlight.
//!
//! The JSON layout matches what the viewer writes to local storage:
//! `{"id": "...", "type": "freetext", "position": {...}, "content": {...}, "comment": ""}`,
//! with style attributes such as `highlightColor` or `fontSize` stored flat on
//! the record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique identifier (UUID), assigned by the store
    pub id: String,
    /// Variant payload; serialized as a flattened `type` tag, `content` and style fields
    #[serde(flatten)]
    pub kind: AnnotationKind,
    /// Where on the page the annotation sits
    pub position: ScaledPosition,
    /// Free-text comment attached by the user
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Creation timestamp
    #[serde(rename = "createdAt", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

/// An annotation that has not been added to a store yet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAnnotation {
    #[serde(flatten)]
    pub kind: AnnotationKind,
    pub position: ScaledPosition,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Partial update for an existing annotation
///
/// `id` and `type` are not part of an update. Content and style fields only
/// apply when the stored record's type carries them; see [`AnnotationUpdate::fits`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<ScaledPosition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentUpdate>,
    #[serde(flatten)]
    pub highlight: HighlightStyle,
    #[serde(flatten)]
    pub freetext: FreetextStyle,
    #[serde(flatten)]
    pub shape: ShapeStyle,
}

/// Content fields to replace; each belongs to specific annotation types
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentUpdate {
    /// Text and freetext
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Area, image and drawing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Drawing only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strokes: Option<Vec<DrawingStroke>>,
    /// Shape only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shape: Option<ShapeData>,
}

/// Discriminant of [`AnnotationKind`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    /// Text selection highlight
    Text,
    /// Rectangular area highlight
    Area,
    /// Free-floating text note
    Freetext,
    /// Embedded image or signature
    Image,
    /// Freehand drawing
    Drawing,
    /// Rectangle, circle or arrow
    Shape,
}

/// Variant payload of an annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnnotationKind {
    Text {
        content: TextContent,
        #[serde(flatten)]
        style: HighlightStyle,
    },
    Area {
        content: ImageContent,
        #[serde(flatten)]
        style: HighlightStyle,
    },
    Freetext {
        content: TextContent,
        #[serde(flatten)]
        style: FreetextStyle,
    },
    Image {
        content: ImageContent,
    },
    Drawing {
        content: DrawingContent,
    },
    Shape {
        content: ShapeContent,
        #[serde(flatten)]
        style: ShapeStyle,
    },
}

/// Selected or typed text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

/// Image data, usually a `data:` URL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    pub image: String,
}

/// Rendered drawing plus the strokes it was made from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingContent {
    pub image: String,
    #[serde(default)]
    pub strokes: Vec<DrawingStroke>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeContent {
    pub shape: ShapeData,
}

/// One freehand stroke, in page-relative coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingStroke {
    pub points: Vec<Point>,
    pub color: String,
    pub width: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Geometric shape descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeData {
    #[serde(rename = "shapeType")]
    pub shape_type: ShapeType,
    #[serde(rename = "strokeColor")]
    pub stroke_color: String,
    #[serde(rename = "strokeWidth")]
    pub stroke_width: f64,
    /// Arrow tail, as a fraction of the bounding box
    #[serde(rename = "startPoint", default, skip_serializing_if = "Option::is_none")]
    pub start_point: Option<Point>,
    /// Arrow head, as a fraction of the bounding box
    #[serde(rename = "endPoint", default, skip_serializing_if = "Option::is_none")]
    pub end_point: Option<Point>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeType {
    Rectangle,
    Circle,
    Arrow,
}

/// Style overrides for text and area highlights
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HighlightStyle {
    /// CSS color value
    #[serde(rename = "highlightColor", default, skip_serializing_if = "Option::is_none")]
    pub highlight_color: Option<String>,
    #[serde(rename = "highlightStyle", default, skip_serializing_if = "Option::is_none")]
    pub highlight_style: Option<HighlightMark>,
}

/// How a text highlight is drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightMark {
    Highlight,
    Underline,
    Strikethrough,
}

/// Style overrides for free-text notes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FreetextStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(rename = "backgroundColor", default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(rename = "fontSize", default, skip_serializing_if = "Option::is_none")]
    pub font_size: Option<String>,
    #[serde(rename = "fontFamily", default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

/// Shape attributes kept flat on the record, beside `content.shape`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    #[serde(rename = "shapeType", default, skip_serializing_if = "Option::is_none")]
    pub shape_type: Option<ShapeType>,
    #[serde(rename = "strokeColor", default, skip_serializing_if = "Option::is_none")]
    pub stroke_color: Option<String>,
    #[serde(rename = "strokeWidth", default, skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

/// A rectangle stored with the page size it was measured against
///
/// Keeping `width`/`height` alongside the corners makes the rectangle
/// independent of the zoom level it was captured at.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaled {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    /// Reference page width
    pub width: f64,
    /// Reference page height
    pub height: f64,
    #[serde(rename = "pageNumber", default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
}

/// A rectangle in viewport pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

/// Page-relative position of an annotation
///
/// The viewer records the page on `boundingRect.pageNumber`; a top-level
/// `pageNumber` wins when both are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScaledPosition")]
pub struct ScaledPosition {
    #[serde(rename = "boundingRect")]
    pub bounding_rect: Scaled,
    /// Per-line rectangles of a text highlight; empty for other kinds
    pub rects: Vec<Scaled>,
    /// 1-based page number
    #[serde(rename = "pageNumber")]
    pub page_number: u32,
}

#[derive(Deserialize)]
struct RawScaledPosition {
    #[serde(rename = "boundingRect")]
    bounding_rect: Scaled,
    #[serde(default)]
    rects: Vec<Scaled>,
    #[serde(rename = "pageNumber", default)]
    page_number: Option<u32>,
}

impl TryFrom<RawScaledPosition> for ScaledPosition {
    type Error = String;

    fn try_from(raw: RawScaledPosition) -> Result<Self, Self::Error> {
        let page_number = raw
            .page_number
            .or(raw.bounding_rect.page_number)
            .or_else(|| raw.rects.iter().find_map(|r| r.page_number))
            .ok_or_else(|| "position has no pageNumber".to_string())?;

        Ok(ScaledPosition::with_rects(page_number, raw.bounding_rect, raw.rects))
    }
}

impl AnnotationKind {
    /// The discriminant of this payload
    pub fn annotation_type(&self) -> AnnotationType {
        match self {
            AnnotationKind::Text { .. } => AnnotationType::Text,
            AnnotationKind::Area { .. } => AnnotationType::Area,
            AnnotationKind::Freetext { .. } => AnnotationType::Freetext,
            AnnotationKind::Image { .. } => AnnotationType::Image,
            AnnotationKind::Drawing { .. } => AnnotationType::Drawing,
            AnnotationKind::Shape { .. } => AnnotationType::Shape,
        }
    }

    /// Text carried by text highlights and notes
    pub fn text(&self) -> Option<&str> {
        match self {
            AnnotationKind::Text { content, .. } | AnnotationKind::Freetext { content, .. } => {
                Some(content.text.as_str())
            }
            _ => None,
        }
    }

    /// Image data carried by area highlights, images and drawings
    pub fn image(&self) -> Option<&str> {
        match self {
            AnnotationKind::Area { content, .. } | AnnotationKind::Image { content } => {
                Some(content.image.as_str())
            }
            AnnotationKind::Drawing { content } => Some(content.image.as_str()),
            _ => None,
        }
    }
}

impl Annotation {
    /// Finalize a new annotation with a fresh id
    pub fn from_new(new: NewAnnotation) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind: new.kind,
            position: new.position,
            comment: new.comment,
            created_at: Utc::now(),
        }
    }

    pub fn annotation_type(&self) -> AnnotationType {
        self.kind.annotation_type()
    }

    pub fn page_number(&self) -> u32 {
        self.position.page_number
    }

    /// Case-insensitive match against the text content or the comment
    ///
    /// `needle` must already be lowercase.
    pub(crate) fn matches_lowercase(&self, needle: &str) -> bool {
        let in_text = self
            .kind
            .text()
            .map(|t| t.to_lowercase().contains(needle))
            .unwrap_or(false);
        let in_comment = self
            .comment
            .as_deref()
            .map(|c| c.to_lowercase().contains(needle))
            .unwrap_or(false);
        in_text || in_comment
    }

    /// Merge a partial update into this record
    ///
    /// Returns `false` when the update carried content or style fields this
    /// record's type doesn't have. Those are dropped as a whole; position and
    /// comment still apply.
    pub fn apply(&mut self, update: AnnotationUpdate) -> bool {
        let fits = update.fits(self.annotation_type());

        if let Some(position) = update.position {
            self.position = position;
        }
        if let Some(comment) = update.comment {
            self.comment = Some(comment);
        }
        if !fits {
            return false;
        }

        let content = update.content.unwrap_or_default();
        match &mut self.kind {
            AnnotationKind::Text { content: current, style } => {
                if let Some(text) = content.text {
                    current.text = text;
                }
                style.merge(update.highlight);
            }
            AnnotationKind::Area { content: current, style } => {
                if let Some(image) = content.image {
                    current.image = image;
                }
                style.merge(update.highlight);
            }
            AnnotationKind::Freetext { content: current, style } => {
                if let Some(text) = content.text {
                    current.text = text;
                }
                style.merge(update.freetext);
            }
            AnnotationKind::Image { content: current } => {
                if let Some(image) = content.image {
                    current.image = image;
                }
            }
            AnnotationKind::Drawing { content: current } => {
                if let Some(image) = content.image {
                    current.image = image;
                }
                if let Some(strokes) = content.strokes {
                    current.strokes = strokes;
                }
            }
            AnnotationKind::Shape { content: current, style } => {
                if let Some(shape) = content.shape {
                    current.shape = shape;
                }
                style.merge(update.shape);
            }
        }
        true
    }
}

impl NewAnnotation {
    /// Create a text-selection highlight
    pub fn text_highlight(position: ScaledPosition, text: &str) -> Self {
        Self {
            kind: AnnotationKind::Text {
                content: TextContent {
                    text: text.to_string(),
                },
                style: HighlightStyle::default(),
            },
            position,
            comment: None,
        }
    }

    /// Create a rectangular area highlight from a page screenshot
    pub fn area_highlight(position: ScaledPosition, image: &str) -> Self {
        Self {
            kind: AnnotationKind::Area {
                content: ImageContent {
                    image: image.to_string(),
                },
                style: HighlightStyle::default(),
            },
            position,
            comment: None,
        }
    }

    /// Create a free-text note
    pub fn freetext(position: ScaledPosition, text: &str) -> Self {
        Self {
            kind: AnnotationKind::Freetext {
                content: TextContent {
                    text: text.to_string(),
                },
                style: FreetextStyle::default(),
            },
            position,
            comment: Some(String::new()),
        }
    }

    /// Create an embedded image (uploads and signatures)
    pub fn image(position: ScaledPosition, image: &str) -> Self {
        Self {
            kind: AnnotationKind::Image {
                content: ImageContent {
                    image: image.to_string(),
                },
            },
            position,
            comment: Some(String::new()),
        }
    }

    /// Create a freehand drawing
    pub fn drawing(position: ScaledPosition, image: &str, strokes: Vec<DrawingStroke>) -> Self {
        Self {
            kind: AnnotationKind::Drawing {
                content: DrawingContent {
                    image: image.to_string(),
                    strokes,
                },
            },
            position,
            comment: Some(String::new()),
        }
    }

    /// Create a shape
    pub fn shape(position: ScaledPosition, shape: ShapeData) -> Self {
        let style = ShapeStyle {
            shape_type: Some(shape.shape_type),
            stroke_color: Some(shape.stroke_color.clone()),
            stroke_width: Some(shape.stroke_width),
        };
        Self {
            kind: AnnotationKind::Shape {
                content: ShapeContent { shape },
                style,
            },
            position,
            comment: Some(String::new()),
        }
    }

    /// Set the comment
    pub fn with_comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    /// Set the highlight color of a text or area highlight
    ///
    /// Other kinds have no highlight color and are returned unchanged.
    pub fn with_highlight_color(mut self, color: &str) -> Self {
        if let AnnotationKind::Text { style, .. } | AnnotationKind::Area { style, .. } =
            &mut self.kind
        {
            style.highlight_color = Some(color.to_string());
        }
        self
    }
}

impl AnnotationUpdate {
    /// Update that only replaces the comment
    pub fn comment(comment: &str) -> Self {
        Self {
            comment: Some(comment.to_string()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.comment.is_none()
            && self.content.is_none()
            && self.highlight.is_empty()
            && self.freetext.is_empty()
            && self.shape.is_empty()
    }

    /// Whether every content and style field set here exists on `annotation_type`
    pub fn fits(&self, annotation_type: AnnotationType) -> bool {
        use AnnotationType::*;

        let content_fits = self.content.as_ref().map_or(true, |c| {
            (c.text.is_none() || matches!(annotation_type, Text | Freetext))
                && (c.image.is_none() || matches!(annotation_type, Area | Image | Drawing))
                && (c.strokes.is_none() || annotation_type == Drawing)
                && (c.shape.is_none() || annotation_type == Shape)
        });

        content_fits
            && (self.highlight.is_empty() || matches!(annotation_type, Text | Area))
            && (self.freetext.is_empty() || annotation_type == Freetext)
            && (self.shape.is_empty() || annotation_type == Shape)
    }
}

impl HighlightStyle {
    pub fn is_empty(&self) -> bool {
        self.highlight_color.is_none() && self.highlight_style.is_none()
    }

    /// Overwrite the fields `other` sets
    pub fn merge(&mut self, other: HighlightStyle) {
        self.highlight_color = other.highlight_color.or(self.highlight_color.take());
        self.highlight_style = other.highlight_style.or(self.highlight_style);
    }
}

impl FreetextStyle {
    pub fn is_empty(&self) -> bool {
        self.color.is_none()
            && self.background_color.is_none()
            && self.font_size.is_none()
            && self.font_family.is_none()
    }

    /// Overwrite the fields `other` sets
    pub fn merge(&mut self, other: FreetextStyle) {
        self.color = other.color.or(self.color.take());
        self.background_color = other.background_color.or(self.background_color.take());
        self.font_size = other.font_size.or(self.font_size.take());
        self.font_family = other.font_family.or(self.font_family.take());
    }
}

impl ShapeStyle {
    pub fn is_empty(&self) -> bool {
        self.shape_type.is_none() && self.stroke_color.is_none() && self.stroke_width.is_none()
    }

    /// Overwrite the fields `other` sets
    pub fn merge(&mut self, other: ShapeStyle) {
        self.shape_type = other.shape_type.or(self.shape_type);
        self.stroke_color = other.stroke_color.or(self.stroke_color.take());
        self.stroke_width = other.stroke_width.or(self.stroke_width);
    }
}

impl Scaled {
    /// Rectangle on a page of the given reference size
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64, width: f64, height: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            width,
            height,
            page_number: None,
        }
    }

    /// Corners as fractions of the page (0.0-1.0)
    pub fn normalized(&self) -> (f64, f64, f64, f64) {
        if self.width <= 0.0 || self.height <= 0.0 {
            return (0.0, 0.0, 0.0, 0.0);
        }
        (
            self.x1 / self.width,
            self.y1 / self.height,
            self.x2 / self.width,
            self.y2 / self.height,
        )
    }

    /// Project onto a page rendered at `page_width` x `page_height` pixels
    pub fn to_viewport(&self, page_width: f64, page_height: f64) -> ViewportRect {
        let (x1, y1, x2, y2) = self.normalized();
        ViewportRect {
            left: x1 * page_width,
            top: y1 * page_height,
            width: (x2 - x1) * page_width,
            height: (y2 - y1) * page_height,
        }
    }
}

impl ScaledPosition {
    /// Position covering a single rectangle
    pub fn from_rect(page_number: u32, rect: Scaled) -> Self {
        Self::with_rects(page_number, rect, Vec::new())
    }

    /// Position of a multi-line text selection
    ///
    /// The page is also stamped on the bounding rect, where the viewer reads it.
    pub fn with_rects(page_number: u32, mut bounding_rect: Scaled, rects: Vec<Scaled>) -> Self {
        bounding_rect.page_number = Some(page_number);
        Self {
            bounding_rect,
            rects,
            page_number,
        }
    }
}
