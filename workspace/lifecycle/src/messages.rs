//! Per-application chat between the applicant, the assigned DSA and admins.

use chrono::{DateTime, Utc};
use model::entities::{chat_message, loan_application, prelude::ChatMessage};
use model::enums::{DsaAction, UserRole};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use tracing::debug;

use crate::audit::record_dsa_activity;
use crate::error::{LifecycleError, Result};
use crate::roles::Actor;

const MAX_MESSAGE_LEN: usize = 4_000;

pub async fn thread<C: ConnectionTrait>(
    db: &C,
    application_id: i32,
) -> Result<Vec<chat_message::Model>> {
    let messages = ChatMessage::find()
        .filter(chat_message::Column::ApplicationId.eq(application_id))
        .order_by_asc(chat_message::Column::CreatedAt)
        .order_by_asc(chat_message::Column::Id)
        .all(db)
        .await?;
    Ok(messages)
}

/// Posts to a thread the caller already has access to.
pub async fn post_message<C: TransactionTrait>(
    db: &C,
    actor: &Actor,
    application: &loan_application::Model,
    body: String,
    now: DateTime<Utc>,
) -> Result<chat_message::Model> {
    let body = body.trim().to_string();
    if body.is_empty() {
        return Err(LifecycleError::Validation("message must not be empty".into()));
    }
    if body.chars().count() > MAX_MESSAGE_LEN {
        return Err(LifecycleError::Validation(format!(
            "message must be at most {MAX_MESSAGE_LEN} characters"
        )));
    }

    let txn = db.begin().await?;
    let message = chat_message::ActiveModel {
        application_id: Set(application.id),
        sender_id: Set(actor.id),
        sender_role: Set(actor.role),
        message: Set(body),
        is_read: Set(false),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    if actor.role == UserRole::Dsa {
        record_dsa_activity(
            &txn,
            actor.id,
            Some(application.id),
            DsaAction::MessageSent,
            Some(format!("Message on {}", application.application_number)),
            now,
        )
        .await?;
    }
    txn.commit().await?;

    debug!(application_id = application.id, message_id = message.id, "Message posted");
    Ok(message)
}

/// Marks every message not sent by `actor` as read. Returns how many changed.
pub async fn mark_thread_read<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    application_id: i32,
) -> Result<u64> {
    let result = ChatMessage::update_many()
        .col_expr(chat_message::Column::IsRead, Expr::value(true))
        .filter(chat_message::Column::ApplicationId.eq(application_id))
        .filter(chat_message::Column::SenderId.ne(actor.id))
        .filter(chat_message::Column::IsRead.eq(false))
        .exec(db)
        .await?;
    Ok(result.rows_affected)
}
