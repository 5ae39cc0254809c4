use axum::{extract::State, response::Json};
use chrono::{DateTime, Duration, Utc};
use lifecycle::notifications::{
    FeedContext, Notification, NotificationWindows, derive_notifications, load_sources,
};
use model::entities::user;
use sea_orm::{ActiveModelTrait, IntoActiveModel, Set};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::ToSchema;

use crate::auth::CurrentUser;
use crate::errors::ApiResult;
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationFeed {
    /// Newest first
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct NotificationsReadResponse {
    pub read_at: DateTime<Utc>,
}

/// Notifications derived from current data for the caller's role
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    tag = "notifications",
    responses(
        (status = 200, description = "Notification feed", body = ApiResponse<NotificationFeed>),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn get_notifications(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<ApiResponse<NotificationFeed>>> {
    trace!("Entering get_notifications function");
    let ctx = FeedContext {
        role: current.role(),
        user_id: current.id(),
        now: Utc::now(),
        read_at: current.0.notifications_read_at,
        windows: NotificationWindows {
            stale_after: Duration::days(state.config.workflow.stale_after_days),
            ..NotificationWindows::default()
        },
    };

    let sources = load_sources(&state.db, &ctx).await?;
    let notifications = derive_notifications(&ctx, &sources);
    let unread_count = notifications.iter().filter(|n| !n.read).count();

    debug!("Derived {} notifications, {} unread", notifications.len(), unread_count);
    Ok(Json(ApiResponse::ok(
        NotificationFeed {
            notifications,
            unread_count,
        },
        "Notifications retrieved successfully",
    )))
}

/// Mark every current notification as read
#[utoipa::path(
    put,
    path = "/api/v1/notifications",
    tag = "notifications",
    responses(
        (status = 200, description = "Notifications marked read", body = ApiResponse<NotificationsReadResponse>),
        (status = 401, description = "Not signed in", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn mark_notifications_read(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<ApiResponse<NotificationsReadResponse>>> {
    trace!("Entering mark_notifications_read function");
    let now = Utc::now();
    let mut account: user::ActiveModel = current.0.into_active_model();
    account.notifications_read_at = Set(Some(now));
    account.update(&state.db).await?;

    info!("Notifications read up to {}", now);
    Ok(Json(ApiResponse::ok(
        NotificationsReadResponse { read_at: now },
        "Notifications marked as read",
    )))
}
