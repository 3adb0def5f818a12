//! Review period handlers.

use super::AppState;
use super::auth::Principal;
use super::error::ApiError;
use appraisal_core::cycle::{GenerationReport, PeriodOverview};
use appraisal_core::period::{NewPeriod, PeriodUpdate};
use appraisal_core::{ProfileId, ReviewPeriod, ReviewPeriodId, Weightage};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::Deserialize;

pub async fn list(
    State(state): State<AppState>,
    _principal: Principal,
) -> Result<Json<Vec<ReviewPeriod>>, ApiError> {
    Ok(Json(state.run(|cycle| cycle.list_periods()).await?))
}

/// Open periods with their score-card counts.
pub async fn active(
    State(state): State<AppState>,
    _principal: Principal,
) -> Result<Json<Vec<PeriodOverview>>, ApiError> {
    Ok(Json(state.run(|cycle| cycle.active_periods()).await?))
}

pub async fn detail(
    State(state): State<AppState>,
    _principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<ReviewPeriod>, ApiError> {
    Ok(Json(state.run(move |cycle| cycle.period(ReviewPeriodId(id))).await?))
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(new): Json<NewPeriod>,
) -> Result<(StatusCode, Json<ReviewPeriod>), ApiError> {
    let period = state
        .run(move |cycle| cycle.create_period(&principal.actor, new, Utc::now()))
        .await?;
    Ok((StatusCode::CREATED, Json(period)))
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Json(update): Json<PeriodUpdate>,
) -> Result<Json<ReviewPeriod>, ApiError> {
    let period = state
        .run(move |cycle| {
            cycle.update_period(&principal.actor, ReviewPeriodId(id), update, Utc::now())
        })
        .await?;
    Ok(Json(period))
}

pub async fn remove(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state
        .run(move |cycle| cycle.delete_period(&principal.actor, ReviewPeriodId(id)))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn open(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<ReviewPeriod>, ApiError> {
    let period = state
        .run(move |cycle| cycle.open_period(&principal.actor, ReviewPeriodId(id), Utc::now()))
        .await?;
    Ok(Json(period))
}

pub async fn close(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<ReviewPeriod>, ApiError> {
    let period = state
        .run(move |cycle| cycle.close_period(&principal.actor, ReviewPeriodId(id), Utc::now()))
        .await?;
    Ok(Json(period))
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    pub profile_ids: Vec<ProfileId>,
    #[serde(default)]
    pub weightage: Option<Weightage>,
}

/// Bulk generation from eligibility profiles.
pub async fn generate(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerationReport>, ApiError> {
    let report = state
        .run(move |cycle| {
            cycle.generate_score_cards(
                &principal.actor,
                ReviewPeriodId(id),
                &request.profile_ids,
                request.weightage,
                Utc::now(),
            )
        })
        .await?;
    Ok(Json(report))
}
