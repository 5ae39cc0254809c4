//! Document records attached to applications.

use chrono::{DateTime, Utc};
use model::entities::{file_upload, loan_application, prelude::FileUpload};
use model::enums::DocumentType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{info, warn};

use crate::error::{LifecycleError, Result};
use crate::roles::{Actor, Capability};

/// A file that has already been written to the object store.
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub document_type: DocumentType,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub url: String,
}

/// Owners and administrators manage an application's documents.
pub fn can_manage_documents(actor: &Actor, application: &loan_application::Model) -> bool {
    actor.can(Capability::UploadDocuments)
        && (actor.is_admin() || application.user_id == actor.id)
}

pub fn require_document_access(
    actor: &Actor,
    application: &loan_application::Model,
) -> Result<()> {
    if can_manage_documents(actor, application) {
        Ok(())
    } else {
        Err(LifecycleError::Forbidden(format!(
            "cannot manage documents of application {}",
            application.id
        )))
    }
}

pub async fn record_document<C: ConnectionTrait>(
    db: &C,
    application_id: i32,
    uploader_id: i32,
    document: StoredDocument,
    now: DateTime<Utc>,
) -> Result<file_upload::Model> {
    let row = file_upload::ActiveModel {
        application_id: Set(application_id),
        user_id: Set(uploader_id),
        document_type: Set(document.document_type),
        original_name: Set(document.original_name),
        content_type: Set(document.content_type),
        size_bytes: Set(document.size_bytes),
        storage_key: Set(document.storage_key),
        url: Set(document.url),
        is_deleted: Set(false),
        uploaded_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    info!(
        application_id,
        document_id = row.id,
        document_type = %row.document_type,
        "Document recorded"
    );
    Ok(row)
}

/// Non-deleted documents of an application, oldest first.
pub async fn active_documents<C: ConnectionTrait>(
    db: &C,
    application_id: i32,
) -> Result<Vec<file_upload::Model>> {
    let documents = FileUpload::find()
        .filter(file_upload::Column::ApplicationId.eq(application_id))
        .filter(file_upload::Column::IsDeleted.eq(false))
        .order_by_asc(file_upload::Column::UploadedAt)
        .order_by_asc(file_upload::Column::Id)
        .all(db)
        .await?;
    Ok(documents)
}

/// Flags a document deleted. The stored bytes are kept.
pub async fn soft_delete_document<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    application: &loan_application::Model,
    document_id: i32,
) -> Result<file_upload::Model> {
    require_document_access(actor, application)?;

    let document = FileUpload::find_by_id(document_id)
        .filter(file_upload::Column::ApplicationId.eq(application.id))
        .filter(file_upload::Column::IsDeleted.eq(false))
        .one(db)
        .await?
        .ok_or_else(|| LifecycleError::NotFound(format!("Document {document_id}")))?;

    let mut active: file_upload::ActiveModel = document.into();
    active.is_deleted = Set(true);
    let document = active.update(db).await?;
    warn!(
        application_id = application.id,
        document_id,
        actor_id = actor.id,
        "Document soft-deleted"
    );
    Ok(document)
}
