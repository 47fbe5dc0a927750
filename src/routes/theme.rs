//! Theme preference API routes

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::state::AppState;
use crate::theme::{EffectiveTheme, ThemePreference, ThemeUpdate};

/// Create the theme router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_theme).put(update_theme))
        .route("/effective", get(effective_theme))
}

#[derive(Debug, Deserialize)]
pub struct EffectiveParams {
    /// Whether the client prefers a dark color scheme
    #[serde(rename = "systemDark", default)]
    system_dark: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EffectiveThemeResponse {
    pub theme: EffectiveTheme,
}

/// Get the stored preference
async fn get_theme(State(state): State<AppState>) -> Json<ThemePreference> {
    Json(state.theme().get())
}

/// Change one or both preference fields
async fn update_theme(
    State(state): State<AppState>,
    Json(update): Json<ThemeUpdate>,
) -> Result<Json<ThemePreference>> {
    let preference = state.with_theme(move |theme| theme.apply(update)).await?;
    tracing::debug!(theme = ?preference.theme, color_theme = ?preference.color_theme, "Theme updated");
    Ok(Json(preference))
}

/// Resolve `system` against the client's preference
async fn effective_theme(
    State(state): State<AppState>,
    Query(params): Query<EffectiveParams>,
) -> Json<EffectiveThemeResponse> {
    Json(EffectiveThemeResponse {
        theme: state.theme().effective_theme(params.system_dark),
    })
}
