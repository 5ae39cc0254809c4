use axum::{extract::State, response::Json};
use chrono::Utc;
use lifecycle::statistics::{StatisticsReport, load_statistics};
use tracing::{debug, info, instrument, trace};

use crate::auth::CurrentUser;
use crate::errors::ApiResult;
use crate::schemas::{ApiResponse, AppState, CachedData, ErrorResponse};

/// Application statistics scoped to the caller's role
///
/// Admins also receive user counts and per-DSA performance.
#[utoipa::path(
    get,
    path = "/api/v1/statistics",
    tag = "statistics",
    responses(
        (status = 200, description = "Statistics", body = ApiResponse<StatisticsReport>),
        (status = 401, description = "Not signed in", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn get_statistics(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<ApiResponse<StatisticsReport>>> {
    trace!("Entering get_statistics function");
    let cache_key = state.statistics_key(current.role(), current.id());

    if let Some(CachedData::Statistics(report)) = state.cache.get(&cache_key).await {
        debug!("Statistics served from cache");
        return Ok(Json(ApiResponse::ok(report, "Statistics retrieved from cache")));
    }

    let report = load_statistics(&state.db, &current.actor(), Utc::now()).await?;
    state
        .cache
        .insert(cache_key, CachedData::Statistics(report.clone()))
        .await;

    info!(
        "Computed statistics over {} applications",
        report.applications.total
    );
    Ok(Json(ApiResponse::ok(report, "Statistics retrieved successfully")))
}
