//! Directory handlers: employees, accounts, departments, positions and
//! eligibility profiles.

use super::AppState;
use super::auth::{Principal, hash_password};
use super::error::ApiError;
use appraisal_core::cycle::ProfileCount;
use appraisal_core::directory::{EmployeeUpdate, NewEmployee, NewUser, UserUpdate, UserView, double_option};
use appraisal_core::eligibility::NewProfile;
use appraisal_core::organization::{NewDepartment, NewPosition};
use appraisal_core::{
    Department, DepartmentId, EligibilityProfile, Employee, EmployeeId, Permission, Position,
    PositionId, ProfileId, Role, UserId,
};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

// =============================================================================
// EMPLOYEES
// =============================================================================

pub async fn list_employees(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<Employee>>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| cycle.list_employees(&principal.actor))
            .await?,
    ))
}

pub async fn create_employee(
    State(state): State<AppState>,
    principal: Principal,
    Json(new): Json<NewEmployee>,
) -> Result<(StatusCode, Json<Employee>), ApiError> {
    let employee = state
        .run(move |cycle| cycle.create_employee(&principal.actor, new))
        .await?;
    Ok((StatusCode::CREATED, Json(employee)))
}

pub async fn update_employee(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Json(update): Json<EmployeeUpdate>,
) -> Result<Json<Employee>, ApiError> {
    let employee = state
        .run(move |cycle| cycle.update_employee(&principal.actor, EmployeeId(id), update))
        .await?;
    Ok(Json(employee))
}

/// Soft delete; also deactivates the employee's accounts.
pub async fn delete_employee(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<Employee>, ApiError> {
    let employee = state
        .run(move |cycle| cycle.delete_employee(&principal.actor, EmployeeId(id)))
        .await?;
    Ok(Json(employee))
}

// =============================================================================
// ACCOUNTS
// =============================================================================

pub async fn list_users(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<UserView>>, ApiError> {
    let users = state
        .run(move |cycle| cycle.list_users(&principal.actor))
        .await?;
    Ok(Json(users.iter().map(|user| user.view()).collect()))
}

#[derive(Debug, Deserialize)]
pub struct CreateUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
    #[serde(default)]
    pub employee_id: Option<EmployeeId>,
}

pub async fn create_user(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<CreateUser>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let role = request.role.parse::<Role>()?;
    let password = request.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))??;
    let new = NewUser {
        username: request.username,
        email: request.email,
        password_hash,
        role,
        employee_id: request.employee_id,
    };
    let user = state
        .run(move |cycle| cycle.create_user(&principal.actor, new))
        .await?;
    Ok((StatusCode::CREATED, Json(user.view())))
}

/// Partial account edit. `employee_id: null` unlinks the employee.
#[derive(Debug, Default, Deserialize)]
pub struct EditUser {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub employee_id: Option<Option<EmployeeId>>,
    #[serde(default)]
    pub active: Option<bool>,
}

pub async fn update_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Json(request): Json<EditUser>,
) -> Result<Json<UserView>, ApiError> {
    let role = request.role.as_deref().map(str::parse::<Role>).transpose()?;
    let password_hash = match request.password {
        Some(password) => Some(
            tokio::task::spawn_blocking(move || hash_password(&password))
                .await
                .map_err(|err| ApiError::Internal(err.to_string()))??,
        ),
        None => None,
    };
    let update = UserUpdate {
        username: request.username,
        email: request.email,
        password_hash,
        role,
        employee_id: request.employee_id,
        active: request.active,
    };
    let user = state
        .run(move |cycle| cycle.update_user(&principal.actor, UserId(id), update))
        .await?;
    Ok(Json(user.view()))
}

pub async fn deactivate_user(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<UserView>, ApiError> {
    let user = state
        .run(move |cycle| cycle.deactivate_user(&principal.actor, UserId(id)))
        .await?;
    Ok(Json(user.view()))
}

// =============================================================================
// DEPARTMENTS AND POSITIONS
// =============================================================================

pub async fn list_departments(
    State(state): State<AppState>,
    _principal: Principal,
) -> Result<Json<Vec<Department>>, ApiError> {
    Ok(Json(state.run(|cycle| cycle.departments()).await?))
}

pub async fn create_department(
    State(state): State<AppState>,
    principal: Principal,
    Json(new): Json<NewDepartment>,
) -> Result<(StatusCode, Json<Department>), ApiError> {
    let department = state
        .run(move |cycle| cycle.create_department(&principal.actor, new))
        .await?;
    Ok((StatusCode::CREATED, Json(department)))
}

pub async fn update_department(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Json(new): Json<NewDepartment>,
) -> Result<Json<Department>, ApiError> {
    let department = state
        .run(move |cycle| cycle.update_department(&principal.actor, DepartmentId(id), new))
        .await?;
    Ok(Json(department))
}

pub async fn delete_department(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state
        .run(move |cycle| cycle.delete_department(&principal.actor, DepartmentId(id)))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Default, Deserialize)]
pub struct PositionQuery {
    #[serde(default)]
    pub department_id: Option<DepartmentId>,
}

pub async fn list_positions(
    State(state): State<AppState>,
    _principal: Principal,
    Query(query): Query<PositionQuery>,
) -> Result<Json<Vec<Position>>, ApiError> {
    Ok(Json(
        state
            .run(move |cycle| cycle.positions(query.department_id))
            .await?,
    ))
}

pub async fn create_position(
    State(state): State<AppState>,
    principal: Principal,
    Json(new): Json<NewPosition>,
) -> Result<(StatusCode, Json<Position>), ApiError> {
    let position = state
        .run(move |cycle| cycle.create_position(&principal.actor, new))
        .await?;
    Ok((StatusCode::CREATED, Json(position)))
}

pub async fn update_position(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
    Json(new): Json<NewPosition>,
) -> Result<Json<Position>, ApiError> {
    let position = state
        .run(move |cycle| cycle.update_position(&principal.actor, PositionId(id), new))
        .await?;
    Ok(Json(position))
}

pub async fn delete_position(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<StatusCode, ApiError> {
    state
        .run(move |cycle| cycle.delete_position(&principal.actor, PositionId(id)))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// ELIGIBILITY PROFILES
// =============================================================================

pub async fn list_profiles(
    State(state): State<AppState>,
    principal: Principal,
) -> Result<Json<Vec<ProfileCount>>, ApiError> {
    let profiles = state
        .run(move |cycle| {
            cycle.require_permission(&principal.actor, Permission::GenerateScoreCards)?;
            cycle.profiles_with_counts()
        })
        .await?;
    Ok(Json(profiles))
}

pub async fn create_profile(
    State(state): State<AppState>,
    principal: Principal,
    Json(new): Json<NewProfile>,
) -> Result<(StatusCode, Json<EligibilityProfile>), ApiError> {
    let profile = state
        .run(move |cycle| cycle.create_profile(&principal.actor, new))
        .await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

#[derive(Debug, Serialize)]
pub struct MatchingEmployees {
    pub profile_id: ProfileId,
    pub employee_ids: Vec<EmployeeId>,
}

pub async fn matching_employees(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<u64>,
) -> Result<Json<MatchingEmployees>, ApiError> {
    let employee_ids = state
        .run(move |cycle| {
            cycle.require_permission(&principal.actor, Permission::GenerateScoreCards)?;
            cycle.matching_employees(ProfileId(id))
        })
        .await?;
    Ok(Json(MatchingEmployees {
        profile_id: ProfileId(id),
        employee_ids,
    }))
}
