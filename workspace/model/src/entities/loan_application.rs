use crate::enums::{ApplicationStatus, LoanType, Priority};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

/// An education-loan application.
///
/// The personal, loan and education fields are a snapshot taken at
/// submission; later profile edits do not touch them. `status` only changes
/// together with an appended [`super::status_history`] row.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "loan_applications")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Generated once at submission, never updated.
    #[sea_orm(unique)]
    pub application_number: String,
    /// The applicant.
    pub user_id: i32,

    // Personal snapshot
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<Date>,
    pub address: Option<String>,

    // Loan snapshot
    pub loan_type: LoanType,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub loan_amount: Decimal,
    pub tenure_months: i32,
    pub purpose: Option<String>,

    // Education snapshot
    pub course_name: String,
    pub institution: String,
    pub country: String,
    pub course_duration_months: Option<i32>,

    pub priority: Priority,
    pub status: ApplicationStatus,
    pub assigned_dsa_id: Option<i32>,
    pub assigned_at: Option<DateTimeUtc>,
    pub review_deadline: Option<DateTimeUtc>,
    /// Incremented by every mutation; used for optional optimistic checks.
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Applicant,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AssignedDsaId",
        to = "super::user::Column::Id",
        on_delete = "SetNull"
    )]
    AssignedDsa,
    #[sea_orm(has_many = "super::status_history::Entity")]
    StatusHistory,
    #[sea_orm(has_many = "super::file_upload::Entity")]
    FileUpload,
    #[sea_orm(has_many = "super::chat_message::Entity")]
    ChatMessage,
}

impl Related<super::status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::file_upload::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FileUpload.def()
    }
}

impl Related<super::chat_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChatMessage.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
