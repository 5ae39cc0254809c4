use crate::enums::DsaAction;
use sea_orm::entity::prelude::*;

/// Append-only log of what a DSA did, used for the activity feed.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "dsa_activities")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// User id of the DSA.
    pub dsa_id: i32,
    pub application_id: Option<i32>,
    pub action: DsaAction,
    pub details: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::DsaId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Dsa,
}

impl ActiveModelBehavior for ActiveModel {}
