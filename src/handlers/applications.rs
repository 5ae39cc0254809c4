use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use axum_valid::Valid;
use chrono::{DateTime, NaiveDate, Utc};
use lifecycle::access::{application_scope, load_visible_application};
use lifecycle::assignment::{Assignment, assign_dsa};
use lifecycle::audit::{SystemEvent, record_dsa_activity, record_system_event};
use lifecycle::completeness::{CompletenessReport, application_completeness};
use lifecycle::documents::active_documents;
use lifecycle::submission::{NewApplication, submit_application};
use lifecycle::transitions::{StatusChange, status_history, update_status};
use lifecycle::Capability;
use model::entities::{loan_application, prelude::LoanApplication, status_history};
use model::enums::{ApplicationStatus, DsaAction, LoanType, Priority, UserRole};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, trace, warn};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::auth::CurrentUser;
use crate::errors::{ApiError, ApiResult};
use crate::helpers::pagination::{PageQuery, Paginated};
use crate::helpers::uploads::{
    DocumentResponse, FailedUpload, UploadPolicy, read_upload_form, store_uploads, validate_uploads,
};
use crate::mailer::{assignment_email, send_quietly, status_update_email};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Request body for submitting a loan application
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, Validate)]
pub struct CreateApplicationRequest {
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 7, max = 20))]
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub loan_type: LoanType,
    /// Requested amount, must be positive
    #[schema(value_type = String, example = "1500000")]
    pub loan_amount: Decimal,
    /// Repayment tenure in months
    #[validate(range(min = 1, max = 360))]
    pub tenure_months: i32,
    #[validate(length(max = 1000))]
    pub purpose: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub course_name: String,
    #[validate(length(min = 1, max = 200))]
    pub institution: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    #[validate(range(min = 1, max = 120))]
    pub course_duration_months: Option<i32>,
    /// Defaults to `medium`
    pub priority: Option<Priority>,
}

impl From<CreateApplicationRequest> for NewApplication {
    fn from(request: CreateApplicationRequest) -> Self {
        Self {
            full_name: request.full_name.trim().to_string(),
            email: request.email.trim().to_string(),
            phone: request.phone.trim().to_string(),
            date_of_birth: request.date_of_birth,
            address: request.address,
            loan_type: request.loan_type,
            loan_amount: request.loan_amount,
            tenure_months: request.tenure_months,
            purpose: request.purpose,
            course_name: request.course_name.trim().to_string(),
            institution: request.institution.trim().to_string(),
            country: request.country.trim().to_string(),
            course_duration_months: request.course_duration_months,
            priority: request.priority.unwrap_or(Priority::Medium),
        }
    }
}

/// Loan application response model
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApplicationResponse {
    pub id: i32,
    pub application_number: String,
    pub user_id: i32,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub loan_type: LoanType,
    #[schema(value_type = String)]
    pub loan_amount: Decimal,
    pub tenure_months: i32,
    pub purpose: Option<String>,
    pub course_name: String,
    pub institution: String,
    pub country: String,
    pub course_duration_months: Option<i32>,
    pub priority: Priority,
    pub status: ApplicationStatus,
    pub assigned_dsa_id: Option<i32>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub review_deadline: Option<DateTime<Utc>>,
    /// Pass back as `expected_version` to guard a status update
    pub version: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<loan_application::Model> for ApplicationResponse {
    fn from(model: loan_application::Model) -> Self {
        Self {
            id: model.id,
            application_number: model.application_number,
            user_id: model.user_id,
            full_name: model.full_name,
            email: model.email,
            phone: model.phone,
            date_of_birth: model.date_of_birth,
            address: model.address,
            loan_type: model.loan_type,
            loan_amount: model.loan_amount,
            tenure_months: model.tenure_months,
            purpose: model.purpose,
            course_name: model.course_name,
            institution: model.institution,
            country: model.country,
            course_duration_months: model.course_duration_months,
            priority: model.priority,
            status: model.status,
            assigned_dsa_id: model.assigned_dsa_id,
            assigned_at: model.assigned_at,
            review_deadline: model.review_deadline,
            version: model.version,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// One entry of an application's status history
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StatusHistoryResponse {
    pub id: i32,
    pub status: ApplicationStatus,
    pub updated_by: i32,
    pub comments: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<status_history::Model> for StatusHistoryResponse {
    fn from(model: status_history::Model) -> Self {
        Self {
            id: model.id,
            status: model.status,
            updated_by: model.updated_by,
            comments: model.comments,
            updated_at: model.updated_at,
        }
    }
}

/// An application with everything a reviewer needs
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplicationDetailResponse {
    pub application: ApplicationResponse,
    pub history: Vec<StatusHistoryResponse>,
    pub documents: Vec<DocumentResponse>,
    pub completeness: CompletenessReport,
}

/// An application after a status change, with the full trail
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApplicationWithHistory {
    pub application: ApplicationResponse,
    pub history: Vec<StatusHistoryResponse>,
}

/// Result of an application-with-files submission
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmissionResponse {
    pub application: ApplicationResponse,
    pub uploaded: Vec<DocumentResponse>,
    /// Files that passed validation but could not be stored
    pub failed_uploads: Vec<FailedUpload>,
}

/// Filters for listing applications
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ApplicationFilter {
    pub status: Option<ApplicationStatus>,
    pub loan_type: Option<LoanType>,
}

async fn history_of(state: &AppState, application_id: i32) -> ApiResult<Vec<StatusHistoryResponse>> {
    Ok(status_history(&state.db, application_id)
        .await?
        .into_iter()
        .map(StatusHistoryResponse::from)
        .collect())
}

async fn record_submission(state: &AppState, application: &loan_application::Model, now: DateTime<Utc>) {
    let event = SystemEvent::info(
        "application.submitted",
        format!("{} submitted ({} loan)", application.application_number, application.loan_type),
    )
    .by(application.user_id);
    if let Err(e) = record_system_event(&state.db, event, now).await {
        warn!("Could not record submission: {}", e);
    }
    state.invalidate_statistics();
}

/// Submit a loan application
#[utoipa::path(
    post,
    path = "/api/v1/applications",
    tag = "applications",
    request_body = CreateApplicationRequest,
    responses(
        (status = 201, description = "Application submitted", body = ApiResponse<ApplicationResponse>),
        (status = 400, description = "Invalid request", body = ErrorResponse),
        (status = 403, description = "Only applicants may submit", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current, request), fields(user_id = current.id()))]
pub async fn create_application(
    State(state): State<AppState>,
    current: CurrentUser,
    Valid(Json(request)): Valid<Json<CreateApplicationRequest>>,
) -> ApiResult<(StatusCode, Json<ApiResponse<ApplicationResponse>>)> {
    trace!("Entering create_application function");
    let now = Utc::now();

    let application = submit_application(&state.db, &current.actor(), request.into(), now).await?;
    record_submission(&state, &application, now).await;

    info!(
        "Application {} submitted with id {}",
        application.application_number, application.id
    );
    let response = ApiResponse::ok(
        ApplicationResponse::from(application),
        "Application submitted successfully",
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// Submit a loan application together with its documents
///
/// Multipart body: an `applicationData` part holding the JSON application and
/// one file part per document, named after its document type.
#[utoipa::path(
    post,
    path = "/api/v1/applications/with-files",
    tag = "applications",
    request_body(content = Object, content_type = "multipart/form-data", description = "applicationData JSON plus document files"),
    responses(
        (status = 201, description = "Application submitted", body = ApiResponse<SubmissionResponse>),
        (status = 400, description = "Invalid application data or file", body = ErrorResponse),
        (status = 403, description = "Only applicants may submit", body = ErrorResponse),
        (status = 413, description = "A file exceeds its size limit", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current, multipart), fields(user_id = current.id()))]
pub async fn create_application_with_files(
    State(state): State<AppState>,
    current: CurrentUser,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<SubmissionResponse>>)> {
    trace!("Entering create_application_with_files function");
    let actor = current.actor();
    actor.require(Capability::SubmitApplication)?;

    let form = read_upload_form(multipart).await?;
    let raw = form.application_data.ok_or_else(|| {
        ApiError::Validation("missing 'applicationData' part".to_string())
    })?;
    let request: CreateApplicationRequest = serde_json::from_str(&raw).map_err(|e| {
        warn!("Unparseable applicationData: {}", e);
        ApiError::Validation(format!("applicationData is not valid JSON: {e}"))
    })?;
    request.validate()?;
    validate_uploads(&UploadPolicy::from_config(&state.config.upload), &form.files)?;
    debug!("Application data and {} files validated", form.files.len());

    let now = Utc::now();
    let application = submit_application(&state.db, &actor, request.into(), now).await?;
    record_submission(&state, &application, now).await;

    let report = store_uploads(&state, &application, current.id(), form.files, now).await;
    if !report.failed_uploads.is_empty() {
        error!(
            "{} of the files for {} could not be stored",
            report.failed_uploads.len(),
            application.application_number
        );
    }

    info!(
        "Application {} submitted with {} documents",
        application.application_number,
        report.uploaded.len()
    );
    let response = ApiResponse::ok(
        SubmissionResponse {
            application: ApplicationResponse::from(application),
            uploaded: report.uploaded,
            failed_uploads: report.failed_uploads,
        },
        "Application submitted successfully",
    );
    Ok((StatusCode::CREATED, Json(response)))
}

/// List applications visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/applications",
    tag = "applications",
    params(PageQuery, ApplicationFilter),
    responses(
        (status = 200, description = "Page of applications", body = ApiResponse<Paginated<ApplicationResponse>>),
        (status = 400, description = "Invalid query", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn list_applications(
    State(state): State<AppState>,
    current: CurrentUser,
    Valid(Query(page)): Valid<Query<PageQuery>>,
    Query(filter): Query<ApplicationFilter>,
) -> ApiResult<Json<ApiResponse<Paginated<ApplicationResponse>>>> {
    trace!("Entering list_applications function");
    let mut select = LoanApplication::find()
        .filter(application_scope(&current.actor()))
        .order_by_desc(loan_application::Column::CreatedAt)
        .order_by_desc(loan_application::Column::Id);
    if let Some(status) = filter.status {
        select = select.filter(loan_application::Column::Status.eq(status));
    }
    if let Some(loan_type) = filter.loan_type {
        select = select.filter(loan_application::Column::LoanType.eq(loan_type));
    }

    let paginator = select.paginate(&state.db, page.limit());
    let total = paginator.num_items().await?;
    let applications = paginator.fetch_page(page.page_index()).await?;

    info!("Retrieved {} of {} applications", applications.len(), total);
    let items = applications.into_iter().map(ApplicationResponse::from).collect();
    Ok(Json(ApiResponse::ok(
        Paginated::new(items, &page, total),
        "Applications retrieved successfully",
    )))
}

/// Get an application with its history, documents and completeness
#[utoipa::path(
    get,
    path = "/api/v1/applications/{application_id}",
    tag = "applications",
    params(("application_id" = i32, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Application found", body = ApiResponse<ApplicationDetailResponse>),
        (status = 403, description = "Not visible to the caller", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn get_application(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<ApplicationDetailResponse>>> {
    trace!("Entering get_application function");
    let application = load_visible_application(&state.db, &current.actor(), application_id).await?;

    let history = history_of(&state, application.id).await?;
    let documents = active_documents(&state.db, application.id)
        .await?
        .into_iter()
        .map(DocumentResponse::from)
        .collect();
    let completeness = application_completeness(&state.db, &application).await?;

    debug!("Application {} loaded with {} history entries", application.id, history.len());
    Ok(Json(ApiResponse::ok(
        ApplicationDetailResponse {
            application: ApplicationResponse::from(application),
            history,
            documents,
            completeness,
        },
        "Application retrieved successfully",
    )))
}

/// Move an application to a new status
#[utoipa::path(
    put,
    path = "/api/v1/applications/{application_id}",
    tag = "applications",
    params(("application_id" = i32, Path, description = "Application ID")),
    request_body = StatusChange,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<ApplicationWithHistory>),
        (status = 403, description = "Caller may not update this application", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse),
        (status = 409, description = "Application changed since it was read", body = ErrorResponse),
        (status = 422, description = "Transition not allowed", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current, change), fields(user_id = current.id(), to = %change.status))]
pub async fn update_application_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<i32>,
    Json(change): Json<StatusChange>,
) -> ApiResult<Json<ApiResponse<ApplicationWithHistory>>> {
    trace!("Entering update_application_status function");
    let now = Utc::now();
    let comments = change.comments.clone();

    let update = update_status(&state.db, &current.actor(), application_id, change, now).await?;
    let application = update.application;

    if current.role() == UserRole::Dsa {
        let details = format!("{} -> {}", update.previous_status, application.status);
        if let Err(e) = record_dsa_activity(
            &state.db,
            current.id(),
            Some(application.id),
            DsaAction::StatusUpdated,
            Some(details),
            now,
        )
        .await
        {
            warn!("Could not record DSA activity: {}", e);
        }
    }

    let event = SystemEvent::info(
        "application.status_updated",
        format!(
            "{} moved from {} to {}",
            application.application_number, update.previous_status, application.status
        ),
    )
    .by(current.id())
    .with_metadata(serde_json::json!({
        "application_id": application.id,
        "from": update.previous_status,
        "to": application.status,
        "version": application.version,
    }));
    if let Err(e) = record_system_event(&state.db, event, now).await {
        warn!("Could not record status update: {}", e);
    }
    state.invalidate_statistics();

    send_quietly(
        state.mailer.as_ref(),
        status_update_email(&application, comments.as_deref()),
    )
    .await;

    let history = history_of(&state, application.id).await?;
    info!(
        "Application {} is now {} (version {})",
        application.id, application.status, application.version
    );
    Ok(Json(ApiResponse::ok(
        ApplicationWithHistory {
            application: ApplicationResponse::from(application),
            history,
        },
        "Application status updated successfully",
    )))
}

/// Status history of an application, oldest first
#[utoipa::path(
    get,
    path = "/api/v1/applications/{application_id}/history",
    tag = "applications",
    params(("application_id" = i32, Path, description = "Application ID")),
    responses(
        (status = 200, description = "History entries", body = ApiResponse<Vec<StatusHistoryResponse>>),
        (status = 403, description = "Not visible to the caller", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn get_application_history(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<Vec<StatusHistoryResponse>>>> {
    trace!("Entering get_application_history function");
    let application = load_visible_application(&state.db, &current.actor(), application_id).await?;
    let history = history_of(&state, application.id).await?;
    Ok(Json(ApiResponse::ok(history, "History retrieved successfully")))
}

/// Assign a DSA to an application
#[utoipa::path(
    put,
    path = "/api/v1/applications/{application_id}/assign",
    tag = "applications",
    params(("application_id" = i32, Path, description = "Application ID")),
    request_body = Assignment,
    responses(
        (status = 200, description = "DSA assigned", body = ApiResponse<ApplicationResponse>),
        (status = 400, description = "Agent cannot take the application", body = ErrorResponse),
        (status = 403, description = "Admin only", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current, assignment), fields(user_id = current.id(), dsa_id = assignment.dsa_id))]
pub async fn assign_application(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<i32>,
    Json(assignment): Json<Assignment>,
) -> ApiResult<Json<ApiResponse<ApplicationResponse>>> {
    trace!("Entering assign_application function");
    let now = Utc::now();
    let outcome = assign_dsa(
        &state.db,
        &current.actor(),
        application_id,
        assignment,
        state.config.workflow.review_deadline_days,
        now,
    )
    .await?;
    let application = outcome.application;

    let event = SystemEvent::info(
        "application.assigned",
        format!(
            "{} assigned to {}",
            application.application_number,
            outcome.dsa.dsa_id.as_deref().unwrap_or(&outcome.dsa.name)
        ),
    )
    .by(current.id())
    .with_metadata(serde_json::json!({
        "application_id": application.id,
        "dsa_id": outcome.dsa.id,
        "previous_dsa_id": outcome.previous_dsa_id,
    }));
    if let Err(e) = record_system_event(&state.db, event, now).await {
        warn!("Could not record assignment: {}", e);
    }
    state.invalidate_statistics();

    send_quietly(state.mailer.as_ref(), assignment_email(&outcome.dsa, &application)).await;

    info!("Application {} assigned to DSA {}", application.id, outcome.dsa.id);
    Ok(Json(ApiResponse::ok(
        ApplicationResponse::from(application),
        "DSA assigned successfully",
    )))
}

/// Required, submitted and missing documents of an application
#[utoipa::path(
    get,
    path = "/api/v1/applications/{application_id}/completeness",
    tag = "applications",
    params(("application_id" = i32, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Completeness report", body = ApiResponse<CompletenessReport>),
        (status = 403, description = "Not visible to the caller", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn get_completeness(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<CompletenessReport>>> {
    trace!("Entering get_completeness function");
    let application = load_visible_application(&state.db, &current.actor(), application_id).await?;
    let report = application_completeness(&state.db, &application).await?;
    debug!("Application {} is {:.1}% complete", application.id, report.percentage);
    Ok(Json(ApiResponse::ok(report, "Completeness computed successfully")))
}
