use crate::enums::UserRole;
use sea_orm::entity::prelude::*;

/// A message in the conversation thread of an application.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "chat_messages")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub application_id: i32,
    pub sender_id: i32,
    pub sender_role: UserRole,
    pub message: String,
    #[sea_orm(default_value = "false")]
    pub is_read: bool,
    pub created_at: DateTimeUtc,
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
