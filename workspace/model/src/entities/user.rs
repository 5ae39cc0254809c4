use crate::enums::UserRole;
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;

/// An account of the portal: administrator, DSA or applicant.
///
/// Users are never hard-deleted; `is_active = false` disables sign-in.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    /// Argon2 PHC string.
    pub password_hash: String,
    pub phone: Option<String>,
    pub role: UserRole,
    /// Bank the DSA works for.
    pub bank: Option<String>,
    /// Bank-prefixed agent code, e.g. `HDFC-0003`. Only set for DSAs.
    #[sea_orm(unique)]
    pub dsa_id: Option<String>,
    /// Declared yearly income of an applicant.
    #[sea_orm(column_type = "Decimal(Some((19, 4)))", nullable)]
    pub annual_income: Option<Decimal>,
    /// Highest qualification of an applicant.
    pub education: Option<String>,
    #[sea_orm(default_value = "true")]
    pub is_active: bool,
    #[sea_orm(default_value = "false")]
    pub is_verified: bool,
    /// Notifications created at or before this instant are reported as read.
    pub notifications_read_at: Option<DateTimeUtc>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::support_ticket::Entity")]
    SupportTicket,
}

impl Related<super::support_ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SupportTicket.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
