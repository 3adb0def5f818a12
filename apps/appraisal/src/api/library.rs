//! Goal, competency and value library handlers.

use super::AppState;
use super::auth::Principal;
use super::error::ApiError;
use appraisal_core::library::{EntryUpdate, NewEntry};
use appraisal_core::{LibraryEntry, LibraryKind, TemplateId};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct LibraryQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
}

pub async fn list(
    State(state): State<AppState>,
    _principal: Principal,
    Path(kind): Path<LibraryKind>,
    Query(query): Query<LibraryQuery>,
) -> Result<Json<Vec<LibraryEntry>>, ApiError> {
    let entries = state
        .run(move |cycle| cycle.library(kind, query.include_inactive))
        .await?;
    let entries = match query.category {
        Some(category) => entries
            .into_iter()
            .filter(|entry| entry.category.as_deref() == Some(category.as_str()))
            .collect(),
        None => entries,
    };
    Ok(Json(entries))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Path(kind): Path<LibraryKind>,
    Json(new): Json<NewEntry>,
) -> Result<(StatusCode, Json<LibraryEntry>), ApiError> {
    let entry = state
        .run(move |cycle| cycle.create_library_entry(&principal.actor, kind, new))
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn categories(
    State(state): State<AppState>,
    _principal: Principal,
    Path(kind): Path<LibraryKind>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.run(move |cycle| cycle.categories(kind)).await?))
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path((kind, id)): Path<(LibraryKind, u64)>,
    Json(update): Json<EntryUpdate>,
) -> Result<Json<LibraryEntry>, ApiError> {
    let entry = state
        .run(move |cycle| cycle.update_library_entry(&principal.actor, kind, TemplateId(id), update))
        .await?;
    Ok(Json(entry))
}

/// Soft delete.
pub async fn deactivate(
    State(state): State<AppState>,
    principal: Principal,
    Path((kind, id)): Path<(LibraryKind, u64)>,
) -> Result<Json<LibraryEntry>, ApiError> {
    let entry = state
        .run(move |cycle| cycle.deactivate_library_entry(&principal.actor, kind, TemplateId(id)))
        .await?;
    Ok(Json(entry))
}
