use crate::enums::LogLevel;
use sea_orm::entity::prelude::*;

/// Audit trail of notable events (registrations, status changes, failed uploads).
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "system_logs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub level: LogLevel,
    /// Machine-readable event name, e.g. `application.status_updated`.
    pub action: String,
    pub message: String,
    pub user_id: Option<i32>,
    pub metadata: Option<Json>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
