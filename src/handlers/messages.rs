use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::{DateTime, Utc};
use lifecycle::access::load_visible_application;
use lifecycle::messages::{mark_thread_read, post_message as post_to_thread, thread};
use model::entities::chat_message;
use model::enums::UserRole;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::errors::ApiResult;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessageResponse {
    pub id: i32,
    pub application_id: i32,
    pub sender_id: i32,
    pub sender_role: UserRole,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<chat_message::Model> for ChatMessageResponse {
    fn from(model: chat_message::Model) -> Self {
        Self {
            id: model.id,
            application_id: model.application_id,
            sender_id: model.sender_id,
            sender_role: model.sender_role,
            message: model.message,
            is_read: model.is_read,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct PostMessageRequest {
    /// Up to 4000 characters
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MarkReadResponse {
    /// Messages flagged read by this call
    pub updated: u64,
}

/// Chat thread of an application, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/applications/{application_id}/messages",
    tag = "messages",
    params(("application_id" = i32, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Messages", body = ApiResponse<Vec<ChatMessageResponse>>),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn list_messages(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<Vec<ChatMessageResponse>>>> {
    trace!("Entering list_messages function");
    let application = load_visible_application(&state.db, &current.actor(), application_id).await?;
    let messages: Vec<ChatMessageResponse> = thread(&state.db, application.id)
        .await?
        .into_iter()
        .map(ChatMessageResponse::from)
        .collect();
    debug!("Thread of application {} has {} messages", application.id, messages.len());
    Ok(Json(ApiResponse::ok(messages, "Messages retrieved successfully")))
}

/// Post to an application's chat thread
#[utoipa::path(
    post,
    path = "/api/v1/applications/{application_id}/messages",
    tag = "messages",
    params(("application_id" = i32, Path, description = "Application ID")),
    request_body = PostMessageRequest,
    responses(
        (status = 201, description = "Message posted", body = ApiResponse<ChatMessageResponse>),
        (status = 400, description = "Empty or oversized message", body = ErrorResponse),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current, request), fields(user_id = current.id()))]
pub async fn post_message(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<i32>,
    Json(request): Json<PostMessageRequest>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ChatMessageResponse>>)> {
    trace!("Entering post_message function");
    let actor = current.actor();
    let application = load_visible_application(&state.db, &actor, application_id).await?;
    let message = post_to_thread(&state.db, &actor, &application, request.message, Utc::now()).await?;
    info!("Message {} posted on application {}", message.id, application.id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(ChatMessageResponse::from(message), "Message posted successfully")),
    ))
}

/// Mark the other participants' messages as read
#[utoipa::path(
    put,
    path = "/api/v1/applications/{application_id}/messages/read",
    tag = "messages",
    params(("application_id" = i32, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Messages marked read", body = ApiResponse<MarkReadResponse>),
        (status = 403, description = "Not a participant", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn mark_messages_read(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<MarkReadResponse>>> {
    trace!("Entering mark_messages_read function");
    let actor = current.actor();
    let application = load_visible_application(&state.db, &actor, application_id).await?;
    let updated = mark_thread_read(&state.db, &actor, application.id).await?;
    debug!("{} messages marked read", updated);
    Ok(Json(ApiResponse::ok(MarkReadResponse { updated }, "Messages marked as read")))
}
