use crate::enums::DocumentType;
use sea_orm::entity::prelude::*;

/// A document uploaded for an application.
///
/// The bytes live in the object store under `storage_key`; this row is the
/// record of it. Deleting only sets `is_deleted`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "file_uploads")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub application_id: i32,
    /// The uploader.
    pub user_id: i32,
    pub document_type: DocumentType,
    pub original_name: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub storage_key: String,
    pub url: String,
    #[sea_orm(default_value = "false")]
    pub is_deleted: bool,
    pub uploaded_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::loan_application::Entity",
        from = "Column::ApplicationId",
        to = "super::loan_application::Column::Id",
        on_delete = "Cascade"
    )]
    LoanApplication,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::loan_application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoanApplication.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
