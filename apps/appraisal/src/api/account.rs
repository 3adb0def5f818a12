//! The signed-in user: access view, notifications, and role grants.

use super::AppState;
use super::auth::Principal;
use super::error::ApiError;
use appraisal_core::access::{PermissionInfo, catalog};
use appraisal_core::cycle::AccessView;
use appraisal_core::{Notification, NotificationId, Permission, PermissionSet, Role};
use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct Me {
    pub username: String,
    #[serde(flatten)]
    pub access: AccessView,
}

/// `GET /me`
pub async fn me(State(state): State<AppState>, principal: Principal) -> Result<Json<Me>, ApiError> {
    let actor = principal.actor;
    let access = state.run(move |cycle| cycle.access_view(&actor)).await?;
    Ok(Json(Me {
        username: principal.username,
        access,
    }))
}

pub async fn notifications(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| cycle.unread_notifications(&principal.actor))
            .await?,
    ))
}

pub async fn mark_read(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<Notification>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| cycle.mark_notification_read(&principal.actor, NotificationId(id)))
            .await?,
    ))
}

#[derive(Debug, Serialize)]
pub struct RoleGrants {
    pub role: Role,
    pub permissions: PermissionSet,
}

fn parse_role(role: &str) -> Result<Role, ApiError> {
    Ok(role.parse::<Role>()?)
}

/// `GET /roles/{role}/permissions`. Accepts a label, snake case name, or id.
pub async fn role_permissions(
    State(state): State<AppState>,
    principal: Principal,
    Path(role): Path<String>,
) -> Result<Json<RoleGrants>, ApiError> {
    let role = parse_role(&role)?;
    let permissions = state
        .run(move |cycle| {
            cycle.require_permission(&principal.actor, Permission::ManagePermissions)?;
            cycle.permissions(role)
        })
        .await?;
    Ok(Json(RoleGrants { role, permissions }))
}

/// `PUT /roles/{role}/permissions`: replace the role's grants.
pub async fn set_role_permissions(
    State(state): State<AppState>,
    principal: Principal,
    Path(role): Path<String>,
    Json(permissions): Json<PermissionSet>,
) -> Result<Json<RoleGrants>, ApiError> {
    let role = parse_role(&role)?;
    let stored = permissions.clone();
    state
        .run(move |cycle| cycle.set_permissions(&principal.actor, role, stored))
        .await?;
    Ok(Json(RoleGrants { role, permissions }))
}

#[derive(Debug, Serialize)]
pub struct PermissionCatalog {
    pub permissions: Vec<PermissionInfo>,
    pub grouped_by_category: BTreeMap<&'static str, Vec<Permission>>,
}

/// `GET /permissions`: every code, flat and by category.
pub async fn permission_catalog(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<PermissionCatalog>, ApiError> {
    state
        .run(move |cycle| cycle.require_permission(&principal.actor, Permission::ManagePermissions))
        .await?;
    let permissions = catalog();
    let mut grouped_by_category: BTreeMap<&'static str, Vec<Permission>> = BTreeMap::new();
    for info in &permissions {
        grouped_by_category.entry(info.category).or_default().push(info.code);
    }
    Ok(Json(PermissionCatalog {
        permissions,
        grouped_by_category,
    }))
}
