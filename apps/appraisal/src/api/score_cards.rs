//! Score-card handlers: planning, transitions, evaluation and comments.
//!
//! Mutations accept `?expected_version=N`; a stale version is a 409.

use super::auth::Principal;
use super::error::ApiError;
use super::{AppState, VersionQuery};
use appraisal_core::cycle::{AddItem, CardFilter};
use appraisal_core::scorecard::{ItemUpdate, ScoreCardSummary};
use appraisal_core::{
    EmployeeId, ItemId, ItemStatus, PlanItem, PlanningComment, Rating, ReviewPeriodId,
    ScoreCard, ScoreCardId, Section, Weightage,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use serde::{Deserialize, Serialize};

// =============================================================================
// CARDS
// =============================================================================

pub async fn list(
    State(state): State<AppState>,
    principal: Principal,
    Query(filter): Query<CardFilter>,
) -> Result<Json<Vec<ScoreCard>>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| cycle.list_score_cards(&principal.actor, filter))
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct CreateCard {
    pub review_period_id: ReviewPeriodId,
    pub employee_id: EmployeeId,
    #[serde(default)]
    pub weightage: Option<Weightage>,
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreateCard>,
) -> Result<(StatusCode, Json<ScoreCard>), ApiError> {
    let card = state
        .run(move |cycle| {
            cycle.create_score_card(
                &principal.actor,
                request.review_period_id,
                request.employee_id,
                request.weightage,
                Utc::now(),
            )
        })
        .await?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn detail(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| cycle.score_card(&principal.actor, ScoreCardId(id)))
            .await?,
    ))
}

pub async fn remove(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state
        .run(move |cycle| cycle.delete_score_card(&principal.actor, ScoreCardId(id)))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn summary(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<ScoreCardSummary>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| cycle.summary(&principal.actor, ScoreCardId(id)))
            .await?,
    ))
}

// =============================================================================
// PLAN ITEMS
// =============================================================================

pub async fn list_items(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, section)): Path<(u64, Section)>,
) -> Result<Json<Vec<PlanItem>>, ApiError> {
    let card = state
        .run(move |cycle| cycle.score_card(&principal.actor, ScoreCardId(id)))
        .await?;
    Ok(Json(card.items(section).to_vec()))
}

#[derive(Debug, Serialize)]
pub struct ItemAdded {
    pub item_id: ItemId,
    pub score_card: ScoreCard,
}

pub async fn add_item(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, section)): Path<(u64, Section)>,
    Query(version): Query<VersionQuery>,
    Json(item): Json<AddItem>,
) -> Result<(StatusCode, Json<ItemAdded>), ApiError> {
    let (item_id, score_card) = state
        .run(move |cycle| {
            cycle.add_item(
                &principal.actor,
                ScoreCardId(id),
                section,
                item,
                version.expected_version,
                Utc::now(),
            )
        })
        .await?;
    Ok((StatusCode::CREATED, Json(ItemAdded { item_id, score_card })))
}

pub async fn update_item(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, item_id)): Path<(u64, u64)>,
    Query(version): Query<VersionQuery>,
    Json(update): Json<ItemUpdate>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| {
                cycle.update_item(
                    &principal.actor,
                    ScoreCardId(id),
                    ItemId(item_id),
                    update,
                    version.expected_version,
                    Utc::now(),
                )
            })
            .await?,
    ))
}

pub async fn remove_item(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, item_id)): Path<(u64, u64)>,
    Query(version): Query<VersionQuery>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| {
                cycle.remove_item(
                    &principal.actor,
                    ScoreCardId(id),
                    ItemId(item_id),
                    version.expected_version,
                    Utc::now(),
                )
            })
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub status: ItemStatus,
}

pub async fn set_progress(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, item_id)): Path<(u64, u64)>,
    Query(version): Query<VersionQuery>,
    Json(request): Json<ProgressRequest>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| {
                cycle.set_item_progress(
                    &principal.actor,
                    ScoreCardId(id),
                    ItemId(item_id),
                    request.status,
                    version.expected_version,
                    Utc::now(),
                )
            })
            .await?,
    ))
}

// =============================================================================
// WEIGHTAGE
// =============================================================================

pub async fn set_weightage(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Query(version): Query<VersionQuery>,
    Json(weightage): Json<Weightage>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| {
                cycle.set_weightage(
                    &principal.actor,
                    ScoreCardId(id),
                    weightage,
                    version.expected_version,
                    Utc::now(),
                )
            })
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct RebalanceRequest {
    pub section: Section,
    pub value: u8,
}

pub async fn rebalance(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Query(version): Query<VersionQuery>,
    Json(request): Json<RebalanceRequest>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| {
                cycle.rebalance_weightage(
                    &principal.actor,
                    ScoreCardId(id),
                    request.section,
                    request.value,
                    version.expected_version,
                    Utc::now(),
                )
            })
            .await?,
    ))
}

// =============================================================================
// TRANSITIONS
// =============================================================================

pub async fn send_for_acceptance(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Query(version): Query<VersionQuery>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| {
                cycle.send_for_acceptance(
                    &principal.actor,
                    ScoreCardId(id),
                    version.expected_version,
                    Utc::now(),
                )
            })
            .await?,
    ))
}

pub async fn accept(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Query(version): Query<VersionQuery>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| {
                cycle.accept(&principal.actor, ScoreCardId(id), version.expected_version, Utc::now())
            })
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: String,
}

pub async fn reject(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Query(version): Query<VersionQuery>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| {
                cycle.reject(
                    &principal.actor,
                    ScoreCardId(id),
                    &request.reason,
                    version.expected_version,
                    Utc::now(),
                )
            })
            .await?,
    ))
}

pub async fn start_evaluation(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Query(version): Query<VersionQuery>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| {
                cycle.start_evaluation(
                    &principal.actor,
                    ScoreCardId(id),
                    version.expected_version,
                    Utc::now(),
                )
            })
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct RatingRequest {
    /// `null` clears the draft.
    pub rating: Option<Rating>,
}

pub async fn rate_item(
    State(state): State<AppState>,
    principal: Principal,
    Path((id, item_id)): Path<(u64, u64)>,
    Query(version): Query<VersionQuery>,
    Json(request): Json<RatingRequest>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| {
                cycle.rate_item(
                    &principal.actor,
                    ScoreCardId(id),
                    ItemId(item_id),
                    request.rating,
                    version.expected_version,
                    Utc::now(),
                )
            })
            .await?,
    ))
}

pub async fn submit_ratings(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Query(version): Query<VersionQuery>,
) -> Result<Json<ScoreCard>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| {
                cycle.submit_ratings(
                    &principal.actor,
                    ScoreCardId(id),
                    version.expected_version,
                    Utc::now(),
                )
            })
            .await?,
    ))
}

// =============================================================================
// COMMENTS
// =============================================================================

pub async fn comments(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<Vec<PlanningComment>>, ApiError> {
    let card = state
        .run(move |cycle| cycle.score_card(&principal.actor, ScoreCardId(id)))
        .await?;
    Ok(Json(card.comments))
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub text: String,
}

pub async fn add_comment(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Json(request): Json<CommentRequest>,
) -> Result<(StatusCode, Json<PlanningComment>), ApiError> {
    let (comment_id, card) = state
        .run(move |cycle| {
            cycle.add_comment(&principal.actor, ScoreCardId(id), &request.text, Utc::now())
        })
        .await?;
    let comment = card
        .comments
        .into_iter()
        .find(|comment| comment.id == comment_id)
        .ok_or_else(|| ApiError::Internal(format!("comment {comment_id} was not stored")))?;
    Ok((StatusCode::CREATED, Json(comment)))
}
