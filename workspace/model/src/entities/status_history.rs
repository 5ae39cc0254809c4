use crate::enums::ApplicationStatus;
use sea_orm::entity::prelude::*;

/// One entry of an application's append-only status history.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "status_history")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub application_id: i32,
    pub status: ApplicationStatus,
    /// The user who caused the change.
    pub updated_by: i32,
    pub comments: Option<String>,
    pub updated_at: DateTimeUtc,
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
}

impl Related<super::loan_application::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoanApplication.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
