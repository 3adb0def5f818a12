//! # HTTP API
//!
//! axum router over the [`ReviewCycle`]. Every route except `/health` and
//! `/auth/login` requires a bearer token; the [`auth::Principal`] extractor
//! resolves it to an actor and the core enforces the actor's scope.
//!
//! Store calls are synchronous redb transactions, so handlers hand them to
//! the blocking pool through [`AppState::run`].

pub mod auth;
pub mod error;
pub mod rate_limit;

mod account;
mod directory;
mod library;
mod periods;
mod score_cards;

use crate::config::{ConfigError, ServerConfig};
use appraisal_core::ReviewCycle;
use axum::http::HeaderValue;
use axum::routing::{get, post, put};
use axum::{Json, Router, middleware};
use error::ApiError;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

// =============================================================================
// STATE
// =============================================================================

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub cycle: Arc<ReviewCycle>,
    pub keys: Arc<auth::TokenKeys>,
    pub limiter: Arc<rate_limit::Limiter>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("cycle", &self.cycle)
            .field("keys", &self.keys)
            .finish_non_exhaustive()
    }
}

impl AppState {
    pub fn new(cycle: ReviewCycle, config: &ServerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            cycle: Arc::new(cycle),
            keys: Arc::new(auth::TokenKeys::new(&config.jwt_secret, config.token_ttl_hours)),
            limiter: Arc::new(rate_limit::limiter(config.quota()?)),
        })
    }

    /// Run a core operation on the blocking pool.
    pub async fn run<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&ReviewCycle) -> appraisal_core::Result<T> + Send + 'static,
    {
        let cycle = Arc::clone(&self.cycle);
        tokio::task::spawn_blocking(move || f(&cycle))
            .await
            .map_err(|err| ApiError::Internal(format!("worker failed: {err}")))?
            .map_err(ApiError::from)
    }
}

/// Optimistic concurrency token accepted by every mutating route.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct VersionQuery {
    #[serde(default)]
    pub expected_version: Option<u64>,
}

// =============================================================================
// ROUTER
// =============================================================================

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let values: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    layer.allow_origin(AllowOrigin::list(values))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the application router.
pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(auth::login))
        .route("/me", get(account::me))
        // Review periods
        .route("/review-periods", get(periods::list).post(periods::create))
        .route("/review-periods/active", get(periods::active))
        .route(
            "/review-periods/{id}",
            get(periods::detail).put(periods::update).delete(periods::remove),
        )
        .route("/review-periods/{id}/open", post(periods::open))
        .route("/review-periods/{id}/close", post(periods::close))
        .route("/review-periods/{id}/generate", post(periods::generate))
        // Directory and eligibility
        .route("/employees", get(directory::list_employees).post(directory::create_employee))
        .route(
            "/employees/{id}",
            put(directory::update_employee).delete(directory::delete_employee),
        )
        .route("/users", get(directory::list_users).post(directory::create_user))
        .route("/users/{id}", put(directory::update_user))
        .route("/users/{id}/deactivate", post(directory::deactivate_user))
        .route(
            "/departments",
            get(directory::list_departments).post(directory::create_department),
        )
        .route(
            "/departments/{id}",
            put(directory::update_department).delete(directory::delete_department),
        )
        .route("/positions", get(directory::list_positions).post(directory::create_position))
        .route(
            "/positions/{id}",
            put(directory::update_position).delete(directory::delete_position),
        )
        .route(
            "/eligibility-profiles",
            get(directory::list_profiles).post(directory::create_profile),
        )
        .route("/eligibility-profiles/{id}/employees", get(directory::matching_employees))
        // Score cards
        .route("/score-cards", get(score_cards::list).post(score_cards::create))
        .route("/score-cards/{id}", get(score_cards::detail).delete(score_cards::remove))
        .route("/score-cards/{id}/summary", get(score_cards::summary))
        .route(
            "/score-cards/{id}/comments",
            get(score_cards::comments).post(score_cards::add_comment),
        )
        .route("/score-cards/{id}/weightage", put(score_cards::set_weightage))
        .route("/score-cards/{id}/weightage/rebalance", post(score_cards::rebalance))
        .route("/score-cards/{id}/send-for-acceptance", post(score_cards::send_for_acceptance))
        .route("/score-cards/{id}/accept", post(score_cards::accept))
        .route("/score-cards/{id}/reject", post(score_cards::reject))
        .route("/score-cards/{id}/start-evaluation", post(score_cards::start_evaluation))
        .route("/score-cards/{id}/submit-ratings", post(score_cards::submit_ratings))
        .route(
            "/score-cards/{id}/items/{item_id}",
            put(score_cards::update_item).delete(score_cards::remove_item),
        )
        .route("/score-cards/{id}/items/{item_id}/progress", put(score_cards::set_progress))
        .route("/score-cards/{id}/items/{item_id}/rating", put(score_cards::rate_item))
        .route(
            "/score-cards/{id}/{section}",
            get(score_cards::list_items).post(score_cards::add_item),
        )
        // Libraries
        .route("/library/{kind}", get(library::list).post(library::create))
        .route("/library/{kind}/categories", get(library::categories))
        .route("/library/{kind}/{id}", put(library::update).delete(library::deactivate))
        // Account
        .route("/notifications", get(account::notifications))
        .route("/notifications/{id}/read", post(account::mark_read))
        .route("/permissions", get(account::permission_catalog))
        .route(
            "/roles/{role}/permissions",
            get(account::role_permissions).put(account::set_role_permissions),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

// =============================================================================
// SERVER
// =============================================================================

/// Bind and serve until Ctrl+C.
pub async fn serve(config: ServerConfig, cycle: ReviewCycle) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::new(cycle, &config)?;
    let app = router(state, &config.cors_origins);
    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    tracing::info!(addr = %config.bind, "appraisal server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
