use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use lifecycle::audit::{SystemEvent, record_system_event};
use lifecycle::Capability;
use model::entities::{prelude::User, user};
use model::enums::UserRole;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, IntoActiveModel, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::{CurrentUser, hash_password};
use crate::errors::{ApiError, ApiResult};
use crate::helpers::pagination::{PageQuery, Paginated};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Account as returned by the API. Never carries the password hash.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub bank: Option<String>,
    pub dsa_id: Option<String>,
    #[schema(value_type = Option<String>)]
    pub annual_income: Option<Decimal>,
    pub education: Option<String>,
    pub is_active: bool,
    pub is_verified: bool,
    pub created_at: DateTime<Utc>,
}

impl From<user::Model> for UserResponse {
    fn from(model: user::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            phone: model.phone,
            role: model.role,
            bank: model.bank,
            dsa_id: model.dsa_id,
            annual_income: model.annual_income,
            education: model.education,
            is_active: model.is_active,
            is_verified: model.is_verified,
            created_at: model.created_at,
        }
    }
}

/// Request body for editing one's own profile
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    #[schema(value_type = Option<String>)]
    pub annual_income: Option<Decimal>,
    #[validate(length(max = 200))]
    pub education: Option<String>,
    /// New password, at least 8 characters
    #[validate(length(min = 8, max = 128))]
    pub password: Option<String>,
}

/// Filter for the admin user listing
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilter {
    pub role: Option<UserRole>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct VerifyRequest {
    pub is_verified: bool,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

async fn find_user(state: &AppState, user_id: i32) -> ApiResult<user::Model> {
    User::find_by_id(user_id)
        .one(&state.db)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("User {user_id} not found")))
}

/// Get the signed-in account
#[utoipa::path(
    get,
    path = "/api/v1/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Current account", body = ApiResponse<UserResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(current), fields(user_id = current.id()))]
pub async fn get_me(current: CurrentUser) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering get_me function");
    Ok(Json(ApiResponse::ok(UserResponse::from(current.0), "User retrieved successfully")))
}

/// Edit the signed-in account's profile
#[utoipa::path(
    put,
    path = "/api/v1/users/me",
    tag = "users",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = ApiResponse<UserResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current, request), fields(user_id = current.id()))]
pub async fn update_me(
    State(state): State<AppState>,
    current: CurrentUser,
    Valid(Json(request)): Valid<Json<UpdateProfileRequest>>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering update_me function");
    let mut account = current.0.into_active_model();

    if let Some(name) = request.name {
        account.name = Set(name.trim().to_string());
    }
    if let Some(phone) = request.phone {
        account.phone = Set(Some(phone));
    }
    if let Some(income) = request.annual_income {
        account.annual_income = Set(Some(income));
    }
    if let Some(education) = request.education {
        account.education = Set(Some(education));
    }
    if let Some(password) = request.password {
        debug!("Password change requested");
        account.password_hash = Set(hash_password(&password)?);
    }
    account.updated_at = Set(Utc::now());

    let updated = account.update(&state.db).await?;
    info!("Profile of user {} updated", updated.id);
    Ok(Json(ApiResponse::ok(UserResponse::from(updated), "Profile updated successfully")))
}

/// List accounts
#[utoipa::path(
    get,
    path = "/api/v1/users",
    tag = "users",
    params(PageQuery, UserFilter),
    responses(
        (status = 200, description = "Page of accounts", body = ApiResponse<Paginated<UserResponse>>),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 403, description = "Admin only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
    Valid(Query(page)): Valid<Query<PageQuery>>,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Json<ApiResponse<Paginated<UserResponse>>>> {
    trace!("Entering list_users function");
    current.actor().require(Capability::ManageUsers)?;

    let mut select = User::find().order_by_asc(user::Column::Id);
    if let Some(role) = filter.role {
        debug!("Filtering users by role {}", role);
        select = select.filter(user::Column::Role.eq(role));
    }

    let paginator = select.paginate(&state.db, page.limit());
    let total = paginator.num_items().await?;
    let users = paginator.fetch_page(page.page_index()).await?;

    info!("Retrieved {} of {} users", users.len(), total);
    let items = users.into_iter().map(UserResponse::from).collect();
    Ok(Json(ApiResponse::ok(
        Paginated::new(items, &page, total),
        "Users retrieved successfully",
    )))
}

/// Get an account by id
#[utoipa::path(
    get,
    path = "/api/v1/users/{user_id}",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    responses(
        (status = 200, description = "Account found", body = ApiResponse<UserResponse>),
        (status = 403, description = "Not allowed to view this account", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(caller = current.id()))]
pub async fn get_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering get_user function");
    if user_id != current.id() && !current.actor().can(Capability::ManageUsers) {
        return Err(ApiError::Forbidden("you may only view your own account".to_string()));
    }
    let account = find_user(&state, user_id).await?;
    Ok(Json(ApiResponse::ok(UserResponse::from(account), "User retrieved successfully")))
}

/// Mark an account as verified or unverified
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/verify",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Verification updated", body = ApiResponse<UserResponse>),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(caller = current.id()))]
pub async fn verify_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<i32>,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<Json<ApiResponse<UserResponse>>> {
    trace!("Entering verify_user function");
    current.actor().require(Capability::ManageUsers)?;

    let now = Utc::now();
    let mut account = find_user(&state, user_id).await?.into_active_model();
    account.is_verified = Set(request.is_verified);
    account.updated_at = Set(now);
    let updated = account.update(&state.db).await?;

    let event = SystemEvent::info(
        "user.verification_changed",
        format!("{} verified = {}", updated.email, updated.is_verified),
    )
    .by(current.id());
    if let Err(e) = record_system_event(&state.db, event, now).await {
        warn!("Could not record verification change: {}", e);
    }
    state.invalidate_statistics();

    info!("User {} verification set to {}", updated.id, updated.is_verified);
    Ok(Json(ApiResponse::ok(UserResponse::from(updated), "Verification updated successfully")))
}

/// Deactivate or re-activate an account
#[utoipa::path(
    put,
    path = "/api/v1/users/{user_id}/active",
    tag = "users",
    params(("user_id" = i32, Path, description = "User ID")),
    request_body = SetActiveRequest,
    responses(
        (status = 200, description = "Account state updated", body = ApiResponse<UserResponse>),
        (status = 400, description = "Admins cannot deactivate themselves", body = ErrorResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Account not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(caller = current.id()))]
pub async fn set_user_active(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<i32>,
    Json(request): Json<SetActiveRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<UserResponse>>)> {
    trace!("Entering set_user_active function");
    current.actor().require(Capability::ManageUsers)?;
    if user_id == current.id() && !request.is_active {
        return Err(ApiError::Validation("you cannot deactivate your own account".to_string()));
    }

    let now = Utc::now();
    let mut account = find_user(&state, user_id).await?.into_active_model();
    account.is_active = Set(request.is_active);
    account.updated_at = Set(now);
    let updated = account.update(&state.db).await?;

    let action = if updated.is_active { "user.activated" } else { "user.deactivated" };
    let event = SystemEvent::info(action, format!("{} active = {}", updated.email, updated.is_active))
        .by(current.id());
    if let Err(e) = record_system_event(&state.db, event, now).await {
        warn!("Could not record activation change: {}", e);
    }
    state.invalidate_statistics();

    info!("User {} active set to {}", updated.id, updated.is_active);
    Ok((
        StatusCode::OK,
        Json(ApiResponse::ok(UserResponse::from(updated), "Account updated successfully")),
    ))
}
