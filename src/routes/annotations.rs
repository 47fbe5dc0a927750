//! Annotation API endpoints
//!
//! REST surface over the shared annotation store, plus a server-sent event
//! stream of store changes.

use std::collections::BTreeMap;
use std::convert::Infallible;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

use crate::annotations::{Annotation, AnnotationUpdate, NewAnnotation};
use crate::collaborator::{DocumentHandle, Selection};
use crate::error::{AppError, Result};
use crate::state::AppState;

/// Create the annotations router
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(list_annotations)
                .post(create_annotation)
                .delete(reset_annotations),
        )
        .route("/selection", post(create_from_selection))
        .route("/pages", get(list_by_page))
        .route("/events", get(annotation_events))
        .route("/export", post(export_annotations))
        .route(
            "/:id",
            get(get_annotation)
                .patch(update_annotation)
                .delete(delete_annotation),
        )
}

/// Query parameters for listing annotations
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    /// Case-insensitive text/comment filter
    q: Option<String>,
}

/// Request body for creating an annotation from a viewer selection
#[derive(Debug, Deserialize)]
pub struct SelectionRequest {
    #[serde(flatten)]
    pub selection: Selection,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct ExportRequest {
    pub document: DocumentHandle,
}

/// Response types
#[derive(Debug, Serialize, Deserialize)]
pub struct AnnotationResponse {
    pub annotation: Annotation,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnnotationsListResponse {
    pub annotations: Vec<Annotation>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PageGroup {
    #[serde(rename = "pageNumber")]
    pub page_number: u32,
    pub annotations: Vec<Annotation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PagesResponse {
    pub pages: Vec<PageGroup>,
    pub total: usize,
}

/// List annotations, newest first
async fn list_annotations(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<AnnotationsListResponse> {
    let annotations = state.annotations().search(params.q.as_deref().unwrap_or(""));
    let total = annotations.len();
    Json(AnnotationsListResponse { annotations, total })
}

/// List annotations grouped by page
async fn list_by_page(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<PagesResponse> {
    let grouped: BTreeMap<u32, Vec<Annotation>> =
        state.annotations().by_page(params.q.as_deref().unwrap_or(""));

    let pages: Vec<PageGroup> = grouped
        .into_iter()
        .map(|(page_number, annotations)| PageGroup {
            page_number,
            annotations,
        })
        .collect();
    let total = pages.iter().map(|p| p.annotations.len()).sum();

    Json(PagesResponse { pages, total })
}

/// Get a single annotation
async fn get_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnnotationResponse>> {
    let annotation = state
        .annotations()
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("Annotation not found: {}", id)))?;
    Ok(Json(AnnotationResponse { annotation }))
}

/// Create a new annotation
async fn create_annotation(
    State(state): State<AppState>,
    Json(new): Json<NewAnnotation>,
) -> Result<(StatusCode, Json<AnnotationResponse>)> {
    let annotation = state.with_annotations(move |store| store.add(new)).await?;
    Ok((StatusCode::CREATED, Json(AnnotationResponse { annotation })))
}

/// Create a highlight from a finished viewer selection
async fn create_from_selection(
    State(state): State<AppState>,
    Json(req): Json<SelectionRequest>,
) -> Result<(StatusCode, Json<AnnotationResponse>)> {
    let new = NewAnnotation::from_selection(req.selection, &req.comment);
    let annotation = state.with_annotations(move |store| store.add(new)).await?;
    Ok((StatusCode::CREATED, Json(AnnotationResponse { annotation })))
}

/// Merge a partial update; unknown ids are accepted and ignored
async fn update_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(update): Json<AnnotationUpdate>,
) -> Result<StatusCode> {
    if update.is_empty() {
        return Err(AppError::BadRequest("Update has no fields".to_string()));
    }

    let applied = state
        .with_annotations(move |store| {
            if let Some(existing) = store.get(&id) {
                let annotation_type = existing.annotation_type();
                if !update.fits(annotation_type) {
                    return Err(annotation_type);
                }
            }
            store.update(&id, update);
            Ok(())
        })
        .await?;

    applied.map_err(|annotation_type| {
        AppError::BadRequest(format!(
            "Update has fields a {:?} annotation doesn't have",
            annotation_type
        ))
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// Delete an annotation; unknown ids are accepted and ignored
async fn delete_annotation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.with_annotations(move |store| store.delete(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Remove all annotations
async fn reset_annotations(State(state): State<AppState>) -> Result<StatusCode> {
    state.with_annotations(|store| store.reset()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Export the current annotations for a document
async fn export_annotations(
    State(state): State<AppState>,
    Json(req): Json<ExportRequest>,
) -> Result<impl IntoResponse> {
    let exporter = state.exporter();
    let bytes = state.annotations().export_with(exporter, &req.document)?;

    Ok(([(header::CONTENT_TYPE, exporter.content_type())], bytes))
}

/// Stream store changes as server-sent events
async fn annotation_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let rx = state.subscribe_events();

    let events = stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(change) => match Event::default().event(change.name()).json_data(&change) {
                    Ok(event) => return Some((Ok(event), rx)),
                    Err(e) => tracing::warn!(error = %e, "Failed to encode store event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event stream lagged, dropping events");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::default())
}
