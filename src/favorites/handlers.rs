use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{FavoritesQuery, ToggleFavoriteRequest, ToggleFavoriteResponse};
use super::services;
use crate::{auth::AuthUser, error::AppError, payload::Payload, state::AppState, store::Favorite};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/favorites", post(toggle_favorite).get(list_own_favorites))
        .route("/:id/favorites", get(list_user_favorites))
}

#[instrument(skip(state, payload))]
pub async fn toggle_favorite(
    State(state): State<AppState>,
    auth: AuthUser,
    payload: Payload<ToggleFavoriteRequest>,
) -> Result<Json<ToggleFavoriteResponse>, AppError> {
    let action = services::toggle_favorite(&state, auth.id, payload.into_inner()).await?;
    Ok(Json(ToggleFavoriteResponse { action }))
}

#[instrument(skip(state))]
pub async fn list_own_favorites(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(q): Query<FavoritesQuery>,
) -> Result<Json<Vec<Favorite>>, AppError> {
    let favorites = services::list_favorites(&state, auth.id, auth.id, q.item_type).await?;
    Ok(Json(favorites))
}

#[instrument(skip(state))]
pub async fn list_user_favorites(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<String>,
    Query(q): Query<FavoritesQuery>,
) -> Result<Json<Vec<Favorite>>, AppError> {
    let owner = Uuid::parse_str(&id).map_err(|_| AppError::NotFound)?;
    let favorites = services::list_favorites(&state, auth.id, owner, q.item_type).await?;
    Ok(Json(favorites))
}
