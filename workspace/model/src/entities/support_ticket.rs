use crate::enums::{Priority, TicketStatus};
use sea_orm::entity::prelude::*;

/// A help-desk ticket opened by a user.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "support_tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub ticket_number: String,
    pub user_id: i32,
    pub subject: String,
    pub description: String,
    /// Free-form category, e.g. "documents" or "account".
    pub category: String,
    pub priority: Priority,
    pub status: TicketStatus,
    /// Admin currently handling the ticket.
    pub assigned_to: Option<i32>,
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
    User,
    #[sea_orm(has_many = "super::ticket_response::Entity")]
    TicketResponse,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::ticket_response::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TicketResponse.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
