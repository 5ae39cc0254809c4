use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, Utc};
use lifecycle::tickets::{
    NewTicket, load_visible_ticket, open_ticket, respond_to_ticket, ticket_responses, ticket_scope,
    update_ticket_status as move_ticket,
};
use model::entities::{prelude::SupportTicket, support_ticket, ticket_response};
use model::enums::{Priority, TicketStatus, UserRole};
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, trace};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::CurrentUser;
use crate::errors::ApiResult;
use crate::helpers::pagination::{PageQuery, Paginated};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Request body for opening a support ticket
#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
    /// Free-form category, e.g. `documents` or `payments`
    #[validate(length(min = 1, max = 50))]
    pub category: String,
    /// Defaults to `medium`
    pub priority: Option<Priority>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema, Validate)]
pub struct TicketReplyRequest {
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct TicketStatusRequest {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketResponse {
    pub id: i32,
    pub ticket_number: String,
    pub user_id: i32,
    pub subject: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
    pub status: TicketStatus,
    pub assigned_to: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<support_ticket::Model> for TicketResponse {
    fn from(model: support_ticket::Model) -> Self {
        Self {
            id: model.id,
            ticket_number: model.ticket_number,
            user_id: model.user_id,
            subject: model.subject,
            description: model.description,
            category: model.category,
            priority: model.priority,
            status: model.status,
            assigned_to: model.assigned_to,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketReplyResponse {
    pub id: i32,
    pub ticket_id: i32,
    pub responder_id: i32,
    pub responder_role: UserRole,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<ticket_response::Model> for TicketReplyResponse {
    fn from(model: ticket_response::Model) -> Self {
        Self {
            id: model.id,
            ticket_id: model.ticket_id,
            responder_id: model.responder_id,
            responder_role: model.responder_role,
            message: model.message,
            created_at: model.created_at,
        }
    }
}

/// A ticket with its conversation
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TicketDetailResponse {
    pub ticket: TicketResponse,
    pub responses: Vec<TicketReplyResponse>,
}

/// Open a support ticket
#[utoipa::path(
    post,
    path = "/api/v1/tickets",
    tag = "tickets",
    request_body = CreateTicketRequest,
    responses(
        (status = 201, description = "Ticket opened", body = ApiResponse<TicketResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Role may not open tickets", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current, request), fields(user_id = current.id()))]
pub async fn create_ticket(
    State(state): State<AppState>,
    current: CurrentUser,
    Valid(Json(request)): Valid<Json<CreateTicketRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TicketResponse>>)> {
    trace!("Entering create_ticket function");
    let new = NewTicket {
        subject: request.subject.trim().to_string(),
        description: request.description.trim().to_string(),
        category: request.category.trim().to_lowercase(),
        priority: request.priority.unwrap_or(Priority::Medium),
    };
    let ticket = open_ticket(&state.db, &current.actor(), new, Utc::now()).await?;
    info!("Ticket {} opened", ticket.ticket_number);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(TicketResponse::from(ticket), "Ticket created successfully")),
    ))
}

/// List tickets visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/tickets",
    tag = "tickets",
    params(PageQuery, TicketFilter),
    responses(
        (status = 200, description = "Page of tickets", body = ApiResponse<Paginated<TicketResponse>>),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn list_tickets(
    State(state): State<AppState>,
    current: CurrentUser,
    Valid(Query(page)): Valid<Query<PageQuery>>,
    Query(filter): Query<TicketFilter>,
) -> ApiResult<Json<ApiResponse<Paginated<TicketResponse>>>> {
    trace!("Entering list_tickets function");
    let mut select = SupportTicket::find()
        .filter(ticket_scope(&current.actor()))
        .order_by_desc(support_ticket::Column::CreatedAt)
        .order_by_desc(support_ticket::Column::Id);
    if let Some(status) = filter.status {
        select = select.filter(support_ticket::Column::Status.eq(status));
    }

    let paginator = select.paginate(&state.db, page.limit());
    let total = paginator.num_items().await?;
    let tickets = paginator.fetch_page(page.page_index()).await?;

    debug!("Retrieved {} of {} tickets", tickets.len(), total);
    let items = tickets.into_iter().map(TicketResponse::from).collect();
    Ok(Json(ApiResponse::ok(
        Paginated::new(items, &page, total),
        "Tickets retrieved successfully",
    )))
}

/// Get a ticket and its responses
#[utoipa::path(
    get,
    path = "/api/v1/tickets/{ticket_id}",
    tag = "tickets",
    params(("ticket_id" = i32, Path, description = "Ticket ID")),
    responses(
        (status = 200, description = "Ticket found", body = ApiResponse<TicketDetailResponse>),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn get_ticket(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(ticket_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<TicketDetailResponse>>> {
    trace!("Entering get_ticket function");
    let ticket = load_visible_ticket(&state.db, &current.actor(), ticket_id).await?;
    let responses = ticket_responses(&state.db, ticket.id)
        .await?
        .into_iter()
        .map(TicketReplyResponse::from)
        .collect();
    Ok(Json(ApiResponse::ok(
        TicketDetailResponse {
            ticket: TicketResponse::from(ticket),
            responses,
        },
        "Ticket retrieved successfully",
    )))
}

/// Reply to a ticket
#[utoipa::path(
    post,
    path = "/api/v1/tickets/{ticket_id}/responses",
    tag = "tickets",
    params(("ticket_id" = i32, Path, description = "Ticket ID")),
    request_body = TicketReplyRequest,
    responses(
        (status = 201, description = "Response added", body = ApiResponse<TicketReplyResponse>),
        (status = 400, description = "Empty message or closed ticket", body = ErrorResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current, request), fields(user_id = current.id()))]
pub async fn add_ticket_response(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(ticket_id): Path<i32>,
    Valid(Json(request)): Valid<Json<TicketReplyRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<TicketReplyResponse>>)> {
    trace!("Entering add_ticket_response function");
    let response =
        respond_to_ticket(&state.db, &current.actor(), ticket_id, request.message, Utc::now()).await?;
    info!("Response {} added to ticket {}", response.id, ticket_id);
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(
            TicketReplyResponse::from(response),
            "Response added successfully",
        )),
    ))
}

/// Move a ticket along its workflow
#[utoipa::path(
    put,
    path = "/api/v1/tickets/{ticket_id}/status",
    tag = "tickets",
    params(("ticket_id" = i32, Path, description = "Ticket ID")),
    request_body = TicketStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<TicketResponse>),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Ticket not found", body = ErrorResponse),
        (status = 422, description = "Transition not allowed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn update_ticket_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(ticket_id): Path<i32>,
    Json(request): Json<TicketStatusRequest>,
) -> ApiResult<Json<ApiResponse<TicketResponse>>> {
    trace!("Entering update_ticket_status function");
    let ticket = move_ticket(&state.db, &current.actor(), ticket_id, request.status, Utc::now()).await?;
    info!("Ticket {} is now {}", ticket.ticket_number, ticket.status);
    Ok(Json(ApiResponse::ok(
        TicketResponse::from(ticket),
        "Ticket status updated successfully",
    )))
}
