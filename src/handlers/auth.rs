use axum::{extract::State, http::StatusCode, response::Json};
use axum_valid::Valid;
use chrono::Utc;
use lifecycle::accounts::create_account;
use lifecycle::audit::{SystemEvent, record_system_event};
use model::entities::{prelude::User, user};
use model::enums::UserRole;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::auth::{hash_password, verify_password};
use crate::errors::{ApiError, ApiResult};
use crate::handlers::users::UserResponse;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Roles open to self-registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationRole {
    User,
    Dsa,
}

/// Request body for registering an account
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    /// At least 8 characters
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: Option<String>,
    /// Defaults to `user`
    pub role: Option<RegistrationRole>,
    /// Required for DSAs
    #[validate(length(min = 2, max = 100))]
    pub bank: Option<String>,
    #[schema(value_type = Option<String>)]
    pub annual_income: Option<Decimal>,
    #[validate(length(max = 200))]
    pub education: Option<String>,
}

/// Request body for signing in
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Session token and the signed-in account
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub token_type: String,
    /// Token lifetime in seconds
    pub expires_in: i64,
    pub user: UserResponse,
}

fn auth_response(state: &AppState, account: user::Model) -> ApiResult<AuthResponse> {
    Ok(AuthResponse {
        token: state.tokens.issue(&account)?,
        token_type: "Bearer".to_string(),
        expires_in: state.tokens.ttl_seconds(),
        user: UserResponse::from(account),
    })
}

/// Register a new applicant or DSA
#[utoipa::path(
    post,
    path = "/api/v1/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn register(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<RegisterRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<AuthResponse>>)> {
    trace!("Entering register function");
    let email = request.email.trim().to_lowercase();
    let role = request.role.unwrap_or(RegistrationRole::User);

    let (role, bank, is_verified) = match role {
        RegistrationRole::User => (UserRole::User, None, true),
        RegistrationRole::Dsa => {
            let bank = request
                .bank
                .as_deref()
                .map(str::trim)
                .filter(|bank| !bank.is_empty())
                .ok_or_else(|| ApiError::Validation("bank is required for DSA accounts".into()))?
                .to_string();
            (UserRole::Dsa, Some(bank), false)
        }
    };

    let now = Utc::now();
    let account = user::ActiveModel {
        name: Set(request.name.trim().to_string()),
        password_hash: Set(hash_password(&request.password)?),
        phone: Set(request.phone),
        role: Set(role),
        bank: Set(bank.clone()),
        dsa_id: Set(None),
        annual_income: Set(request.annual_income.filter(|_| role == UserRole::User)),
        education: Set(request.education.filter(|_| role == UserRole::User)),
        is_active: Set(true),
        is_verified: Set(is_verified),
        notifications_read_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let account = create_account(&state.db, &email, bank.as_deref(), account).await?;
    if let Some(dsa_id) = &account.dsa_id {
        debug!("Generated DSA id {}", dsa_id);
    }

    let event = SystemEvent::info(
        "auth.registered",
        format!("{} registered as {}", account.email, account.role),
    )
    .by(account.id);
    if let Err(e) = record_system_event(&state.db, event, now).await {
        warn!("Could not record registration: {}", e);
    }
    state.invalidate_statistics();

    info!("Registered user {} with role {}", account.id, account.role);
    let response = ApiResponse::ok(auth_response(&state, account)?, "Registration successful");
    Ok((StatusCode::CREATED, Json(response)))
}

/// Exchange credentials for a session token
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = ApiResponse<AuthResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 401, description = "Wrong credentials or deactivated account", body = ErrorResponse)
    )
)]
#[instrument(skip(state, request), fields(email = %request.email))]
pub async fn login(
    State(state): State<AppState>,
    Valid(Json(request)): Valid<Json<LoginRequest>>,
) -> ApiResult<Json<ApiResponse<AuthResponse>>> {
    trace!("Entering login function");
    let email = request.email.trim().to_lowercase();

    let account = User::find()
        .filter(user::Column::Email.eq(&email))
        .one(&state.db)
        .await?;

    let account = match account {
        Some(account) if verify_password(&request.password, &account.password_hash) => account,
        other => {
            warn!("Failed sign-in for {}", email);
            let mut event = SystemEvent::warn("auth.login_failed", format!("failed sign-in for {email}"));
            if let Some(known) = other {
                event = event.by(known.id);
            }
            if let Err(e) = record_system_event(&state.db, event, Utc::now()).await {
                warn!("Could not record failed sign-in: {}", e);
            }
            return Err(ApiError::Unauthorized("invalid email or password".to_string()));
        }
    };

    if !account.is_active {
        warn!("Sign-in attempt on deactivated account {}", account.id);
        return Err(ApiError::Unauthorized("account is deactivated".to_string()));
    }

    info!("User {} signed in", account.id);
    Ok(Json(ApiResponse::ok(auth_response(&state, account)?, "Login successful")))
}
