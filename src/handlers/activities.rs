use axum::{
    extract::{Query, State},
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use lifecycle::Capability;
use model::entities::{
    dsa_activity, prelude::{DsaActivity, SystemLog}, system_log,
};
use model::enums::{DsaAction, LogLevel};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};
use utoipa::{IntoParams, ToSchema};

use crate::auth::CurrentUser;
use crate::errors::ApiResult;
use crate::helpers::pagination::{PageQuery, Paginated};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DsaActivityResponse {
    pub id: i32,
    /// User id of the agent
    pub dsa_id: i32,
    pub application_id: Option<i32>,
    pub action: DsaAction,
    pub details: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<dsa_activity::Model> for DsaActivityResponse {
    fn from(model: dsa_activity::Model) -> Self {
        Self {
            id: model.id,
            dsa_id: model.dsa_id,
            application_id: model.application_id,
            action: model.action,
            details: model.details,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SystemLogResponse {
    pub id: i32,
    pub level: LogLevel,
    pub action: String,
    pub message: String,
    pub user_id: Option<i32>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<system_log::Model> for SystemLogResponse {
    fn from(model: system_log::Model) -> Self {
        Self {
            id: model.id,
            level: model.level,
            action: model.action,
            message: model.message,
            user_id: model.user_id,
            metadata: model.metadata,
            created_at: model.created_at,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ActivityFilter {
    /// Admins only: restrict to one agent
    pub dsa_id: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SystemLogFilter {
    pub level: Option<LogLevel>,
}

/// DSA activity feed
///
/// Agents see their own entries, admins see everyone's.
#[utoipa::path(
    get,
    path = "/api/v1/dsa/activities",
    tag = "activity",
    params(PageQuery, ActivityFilter),
    responses(
        (status = 200, description = "Page of activity entries", body = ApiResponse<Paginated<DsaActivityResponse>>),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 403, description = "Agents and admins only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn list_dsa_activities(
    State(state): State<AppState>,
    current: CurrentUser,
    Valid(Query(page)): Valid<Query<PageQuery>>,
    Query(filter): Query<ActivityFilter>,
) -> ApiResult<Json<ApiResponse<Paginated<DsaActivityResponse>>>> {
    trace!("Entering list_dsa_activities function");
    let actor = current.actor();
    actor.require(Capability::ViewDsaActivity)?;

    let agent = if actor.is_admin() { filter.dsa_id } else { Some(actor.id) };
    let mut select = DsaActivity::find()
        .order_by_desc(dsa_activity::Column::CreatedAt)
        .order_by_desc(dsa_activity::Column::Id);
    if let Some(agent) = agent {
        select = select.filter(dsa_activity::Column::DsaId.eq(agent));
    }

    let paginator = select.paginate(&state.db, page.limit());
    let total = paginator.num_items().await?;
    let entries = paginator.fetch_page(page.page_index()).await?;

    debug!("Retrieved {} of {} activity entries", entries.len(), total);
    let items = entries.into_iter().map(DsaActivityResponse::from).collect();
    Ok(Json(ApiResponse::ok(
        Paginated::new(items, &page, total),
        "Activities retrieved successfully",
    )))
}

/// System log entries, newest first
#[utoipa::path(
    get,
    path = "/api/v1/system-logs",
    tag = "activity",
    params(PageQuery, SystemLogFilter),
    responses(
        (status = 200, description = "Page of log entries", body = ApiResponse<Paginated<SystemLogResponse>>),
        (status = 400, description = "Invalid query", body = ErrorResponse),
        (status = 403, description = "Admin only", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn list_system_logs(
    State(state): State<AppState>,
    current: CurrentUser,
    Valid(Query(page)): Valid<Query<PageQuery>>,
    Query(filter): Query<SystemLogFilter>,
) -> ApiResult<Json<ApiResponse<Paginated<SystemLogResponse>>>> {
    trace!("Entering list_system_logs function");
    current.actor().require(Capability::ViewSystemLogs)?;

    let mut select = SystemLog::find()
        .order_by_desc(system_log::Column::CreatedAt)
        .order_by_desc(system_log::Column::Id);
    if let Some(level) = filter.level {
        select = select.filter(system_log::Column::Level.eq(level));
    }

    let paginator = select.paginate(&state.db, page.limit());
    let total = paginator.num_items().await?;
    let entries = paginator.fetch_page(page.page_index()).await?;

    debug!("Retrieved {} of {} log entries", entries.len(), total);
    let items = entries.into_iter().map(SystemLogResponse::from).collect();
    Ok(Json(ApiResponse::ok(
        Paginated::new(items, &page, total),
        "System logs retrieved successfully",
    )))
}
