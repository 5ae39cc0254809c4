//! Multipart intake and storage of application documents.
//!
//! Every file in a request is validated before anything is written. Once
//! validation passes, files are stored one after another; a file that fails
//! to store is reported back and does not undo the files stored before it.

use axum::extract::Multipart;
use chrono::{DateTime, Utc};
use lifecycle::audit::{SystemEvent, record_system_event};
use lifecycle::documents::{StoredDocument, record_document};
use model::entities::{file_upload, loan_application};
use model::enums::DocumentType;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::config::UploadConfig;
use crate::errors::ApiError;
use crate::schemas::AppState;
use crate::storage::sanitize_file_name;

/// Name of the JSON part in an application-with-files request.
pub const APPLICATION_DATA_FIELD: &str = "applicationData";

/// Accepted MIME types and their size limits.
#[derive(Debug, Clone, Copy)]
pub struct UploadPolicy {
    pub max_image_bytes: u64,
    pub max_pdf_bytes: u64,
}

impl UploadPolicy {
    pub const IMAGE_TYPES: &'static [&'static str] = &["image/jpeg", "image/jpg", "image/png"];
    pub const PDF_TYPE: &'static str = "application/pdf";

    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            max_image_bytes: config.max_image_bytes,
            max_pdf_bytes: config.max_pdf_bytes,
        }
    }

    /// Size limit for a MIME type, `None` when the type is not accepted.
    pub fn limit_for(&self, content_type: &str) -> Option<u64> {
        let content_type = content_type.to_ascii_lowercase();
        if content_type == Self::PDF_TYPE {
            Some(self.max_pdf_bytes)
        } else if Self::IMAGE_TYPES.contains(&content_type.as_str()) {
            Some(self.max_image_bytes)
        } else {
            None
        }
    }

    pub fn check(&self, upload: &PendingUpload) -> Result<(), ApiError> {
        let limit = self.limit_for(&upload.content_type).ok_or_else(|| {
            ApiError::Validation(format!(
                "{}: file type '{}' is not accepted (PDF, JPEG or PNG only)",
                upload.file_name, upload.content_type
            ))
        })?;
        if upload.bytes.is_empty() {
            return Err(ApiError::Validation(format!("{}: file is empty", upload.file_name)));
        }
        let size = upload.bytes.len() as u64;
        if size > limit {
            return Err(ApiError::PayloadTooLarge(format!(
                "{}: {} bytes exceeds the {} byte limit for {}",
                upload.file_name, size, limit, upload.content_type
            )));
        }
        Ok(())
    }
}

/// A file read from the request and not yet stored.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub document_type: DocumentType,
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Parts of a document upload request.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub application_data: Option<String>,
    pub files: Vec<PendingUpload>,
}

/// Reads the whole multipart body. Unknown field names are rejected.
pub async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == APPLICATION_DATA_FIELD {
            form.application_data = Some(field.text().await?);
            continue;
        }

        let document_type = DocumentType::from_field_name(&name).ok_or_else(|| {
            ApiError::Validation(format!("'{name}' is not a known document type"))
        })?;
        let file_name = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());
        let content_type = field
            .content_type()
            .map(str::to_string)
            .ok_or_else(|| ApiError::Validation(format!("{file_name}: missing content type")))?;
        let bytes = field.bytes().await?.to_vec();

        debug!(%document_type, %file_name, %content_type, size = bytes.len(), "Read upload part");
        form.files.push(PendingUpload {
            document_type,
            file_name,
            content_type,
            bytes,
        });
    }
    Ok(form)
}

/// Validates every file; the first violation rejects the whole request.
pub fn validate_uploads(policy: &UploadPolicy, uploads: &[PendingUpload]) -> Result<(), ApiError> {
    uploads.iter().try_for_each(|upload| policy.check(upload))
}

/// A document as returned by the API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DocumentResponse {
    pub id: i32,
    pub application_id: i32,
    pub document_type: DocumentType,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub url: String,
    pub uploaded_by: i32,
    pub uploaded_at: DateTime<Utc>,
}

impl From<file_upload::Model> for DocumentResponse {
    fn from(model: file_upload::Model) -> Self {
        Self {
            id: model.id,
            application_id: model.application_id,
            document_type: model.document_type,
            original_name: model.original_name,
            content_type: model.content_type,
            size_bytes: model.size_bytes,
            url: model.url,
            uploaded_by: model.user_id,
            uploaded_at: model.uploaded_at,
        }
    }
}

/// A file that passed validation but could not be stored
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FailedUpload {
    pub document_type: DocumentType,
    pub file_name: String,
    pub error: String,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct UploadReport {
    pub uploaded: Vec<DocumentResponse>,
    pub failed_uploads: Vec<FailedUpload>,
}

fn storage_key(application_id: i32, index: usize, upload: &PendingUpload, now: DateTime<Utc>) -> String {
    format!(
        "applications/{}/{}-{}-{}-{}",
        application_id,
        upload.document_type,
        now.timestamp_millis(),
        index,
        sanitize_file_name(&upload.file_name)
    )
}

/// Stores validated files sequentially and records a row for each.
pub async fn store_uploads(
    state: &AppState,
    application: &loan_application::Model,
    uploader_id: i32,
    uploads: Vec<PendingUpload>,
    now: DateTime<Utc>,
) -> UploadReport {
    let mut report = UploadReport::default();

    for (index, upload) in uploads.into_iter().enumerate() {
        let key = storage_key(application.id, index, &upload, now);
        let outcome = match state.storage.put(&key, &upload.content_type, &upload.bytes).await {
            Ok(stored) => {
                let document = StoredDocument {
                    document_type: upload.document_type,
                    original_name: upload.file_name.clone(),
                    content_type: upload.content_type.clone(),
                    size_bytes: upload.bytes.len() as i64,
                    storage_key: stored.key,
                    url: stored.url,
                };
                record_document(&state.db, application.id, uploader_id, document, now)
                    .await
                    .map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(row) => report.uploaded.push(DocumentResponse::from(row)),
            Err(reason) => {
                error!(
                    application_id = application.id,
                    file_name = %upload.file_name,
                    "Failed to store upload: {}",
                    reason
                );
                let event = SystemEvent::warn(
                    "document.upload_failed",
                    format!("{} for {}: {}", upload.file_name, application.application_number, reason),
                )
                .by(uploader_id)
                .with_metadata(serde_json::json!({
                    "application_id": application.id,
                    "document_type": upload.document_type,
                }));
                if let Err(log_err) = record_system_event(&state.db, event, now).await {
                    warn!("Could not record upload failure: {}", log_err);
                }
                report.failed_uploads.push(FailedUpload {
                    document_type: upload.document_type,
                    file_name: upload.file_name,
                    error: reason,
                });
            }
        }
    }

    info!(
        application_id = application.id,
        stored = report.uploaded.len(),
        failed = report.failed_uploads.len(),
        "Upload batch processed"
    );
    report
}
