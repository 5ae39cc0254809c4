use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use lifecycle::access::load_visible_application;
use lifecycle::audit::record_dsa_activity;
use lifecycle::documents::{active_documents, require_document_access, soft_delete_document};
use model::enums::DsaAction;
use tracing::{debug, info, instrument, trace, warn};

use crate::auth::CurrentUser;
use crate::errors::{ApiError, ApiResult};
use crate::helpers::uploads::{
    DocumentResponse, UploadPolicy, UploadReport, read_upload_form, store_uploads, validate_uploads,
};
use crate::schemas::{ApiResponse, AppState, ErrorResponse};

/// Active documents of an application
#[utoipa::path(
    get,
    path = "/api/v1/applications/{application_id}/documents",
    tag = "documents",
    params(("application_id" = i32, Path, description = "Application ID")),
    responses(
        (status = 200, description = "Documents", body = ApiResponse<Vec<DocumentResponse>>),
        (status = 403, description = "Not visible to the caller", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn list_documents(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<i32>,
) -> ApiResult<Json<ApiResponse<Vec<DocumentResponse>>>> {
    trace!("Entering list_documents function");
    let application = load_visible_application(&state.db, &current.actor(), application_id).await?;
    let documents: Vec<DocumentResponse> = active_documents(&state.db, application.id)
        .await?
        .into_iter()
        .map(DocumentResponse::from)
        .collect();
    debug!("Application {} has {} documents", application.id, documents.len());
    Ok(Json(ApiResponse::ok(documents, "Documents retrieved successfully")))
}

/// Upload documents to an existing application
///
/// Multipart body with one file part per document, named after its document
/// type. All files are validated before any is stored.
#[utoipa::path(
    post,
    path = "/api/v1/applications/{application_id}/documents",
    tag = "documents",
    params(("application_id" = i32, Path, description = "Application ID")),
    request_body(content = Object, content_type = "multipart/form-data", description = "Document files"),
    responses(
        (status = 201, description = "Files processed", body = ApiResponse<UploadReport>),
        (status = 400, description = "Invalid file", body = ErrorResponse),
        (status = 403, description = "Only the owner or an admin may upload", body = ErrorResponse),
        (status = 404, description = "Application not found", body = ErrorResponse),
        (status = 413, description = "A file exceeds its size limit", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current, multipart), fields(user_id = current.id()))]
pub async fn upload_documents(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(application_id): Path<i32>,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<UploadReport>>)> {
    trace!("Entering upload_documents function");
    let actor = current.actor();
    let application = load_visible_application(&state.db, &actor, application_id).await?;
    require_document_access(&actor, &application)?;

    let form = read_upload_form(multipart).await?;
    if form.application_data.is_some() {
        return Err(ApiError::Validation(
            "applicationData is only accepted when submitting an application".to_string(),
        ));
    }
    if form.files.is_empty() {
        return Err(ApiError::Validation("no files in request".to_string()));
    }
    validate_uploads(&UploadPolicy::from_config(&state.config.upload), &form.files)?;

    let now = Utc::now();
    let report = store_uploads(&state, &application, current.id(), form.files, now).await;

    if let Some(dsa_id) = application.assigned_dsa_id.filter(|_| !report.uploaded.is_empty()) {
        let details = format!(
            "{} document(s) uploaded to {}",
            report.uploaded.len(),
            application.application_number
        );
        if let Err(e) = record_dsa_activity(
            &state.db,
            dsa_id,
            Some(application.id),
            DsaAction::DocumentUploaded,
            Some(details),
            now,
        )
        .await
        {
            warn!("Could not record DSA activity: {}", e);
        }
    }

    info!(
        "Stored {} documents for application {} ({} failed)",
        report.uploaded.len(),
        application.id,
        report.failed_uploads.len()
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok(report, "Documents processed")),
    ))
}

/// Soft-delete a document
#[utoipa::path(
    delete,
    path = "/api/v1/applications/{application_id}/documents/{document_id}",
    tag = "documents",
    params(
        ("application_id" = i32, Path, description = "Application ID"),
        ("document_id" = i32, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document deleted", body = ApiResponse<DocumentResponse>),
        (status = 403, description = "Only the owner or an admin may delete", body = ErrorResponse),
        (status = 404, description = "Application or document not found", body = ErrorResponse)
    ),
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, current), fields(user_id = current.id()))]
pub async fn delete_document(
    State(state): State<AppState>,
    current: CurrentUser,
    Path((application_id, document_id)): Path<(i32, i32)>,
) -> ApiResult<Json<ApiResponse<DocumentResponse>>> {
    trace!("Entering delete_document function");
    let actor = current.actor();
    let application = load_visible_application(&state.db, &actor, application_id).await?;
    let document = soft_delete_document(&state.db, &actor, &application, document_id).await?;
    info!("Document {} of application {} deleted", document.id, application.id);
    Ok(Json(ApiResponse::ok(
        DocumentResponse::from(document),
        "Document deleted successfully",
    )))
}
