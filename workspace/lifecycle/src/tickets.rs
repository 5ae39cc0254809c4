//! Support tickets and their responses.

use chrono::{DateTime, Utc};
use model::entities::{prelude::*, support_ticket, ticket_response};
use model::enums::{Priority, TicketStatus};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use tracing::{info, warn};

use crate::error::{LifecycleError, Result};
use crate::numbering::generate_ticket_number;
use crate::roles::{Actor, Capability};

#[derive(Debug, Clone)]
pub struct NewTicket {
    pub subject: String,
    pub description: String,
    pub category: String,
    pub priority: Priority,
}

pub fn check_ticket_transition(from: TicketStatus, to: TicketStatus) -> Result<()> {
    use TicketStatus::*;

    match (from, to) {
        (Open, InProgress | Closed)
        | (InProgress, Resolved | Closed)
        | (Resolved, InProgress | Closed) => Ok(()),
        _ => Err(LifecycleError::InvalidTicketTransition { from, to }),
    }
}

pub fn ticket_scope(actor: &Actor) -> Condition {
    if actor.can(Capability::ManageTickets) {
        Condition::all()
    } else {
        Condition::all().add(support_ticket::Column::UserId.eq(actor.id))
    }
}

pub async fn load_visible_ticket<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    ticket_id: i32,
) -> Result<support_ticket::Model> {
    let ticket = SupportTicket::find_by_id(ticket_id)
        .one(db)
        .await?
        .ok_or_else(|| LifecycleError::NotFound(format!("Ticket {ticket_id}")))?;
    if ticket.user_id != actor.id && !actor.can(Capability::ManageTickets) {
        warn!(ticket_id, actor_id = actor.id, "Ticket outside actor scope");
        return Err(LifecycleError::Forbidden(format!(
            "no access to ticket {ticket_id}"
        )));
    }
    Ok(ticket)
}

pub async fn open_ticket<C: TransactionTrait>(
    db: &C,
    actor: &Actor,
    new: NewTicket,
    now: DateTime<Utc>,
) -> Result<support_ticket::Model> {
    actor.require(Capability::OpenTicket)?;
    if new.subject.trim().is_empty() || new.description.trim().is_empty() {
        return Err(LifecycleError::Validation(
            "subject and description are required".into(),
        ));
    }

    let txn = db.begin().await?;
    let ticket_number = generate_ticket_number(&txn, now).await?;
    let ticket = support_ticket::ActiveModel {
        ticket_number: Set(ticket_number),
        user_id: Set(actor.id),
        subject: Set(new.subject.trim().to_string()),
        description: Set(new.description),
        category: Set(new.category),
        priority: Set(new.priority),
        status: Set(TicketStatus::Open),
        assigned_to: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    info!(ticket_id = ticket.id, ticket_number = %ticket.ticket_number, "Ticket opened");
    Ok(ticket)
}

/// Appends a response. An administrator answering an open ticket picks it up.
pub async fn respond_to_ticket<C: TransactionTrait>(
    db: &C,
    actor: &Actor,
    ticket_id: i32,
    message: String,
    now: DateTime<Utc>,
) -> Result<ticket_response::Model> {
    if message.trim().is_empty() {
        return Err(LifecycleError::Validation("message must not be empty".into()));
    }

    let txn = db.begin().await?;
    let ticket = load_visible_ticket(&txn, actor, ticket_id).await?;
    if ticket.status == TicketStatus::Closed {
        return Err(LifecycleError::Validation(format!(
            "ticket {} is closed",
            ticket.ticket_number
        )));
    }

    let response = ticket_response::ActiveModel {
        ticket_id: Set(ticket_id),
        responder_id: Set(actor.id),
        responder_role: Set(actor.role),
        message: Set(message),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let picks_up = actor.can(Capability::ManageTickets) && ticket.status == TicketStatus::Open;
    let unassigned = ticket.assigned_to.is_none();
    let mut active: support_ticket::ActiveModel = ticket.into();
    if picks_up {
        active.status = Set(TicketStatus::InProgress);
        if unassigned {
            active.assigned_to = Set(Some(actor.id));
        }
    }
    active.updated_at = Set(now);
    active.update(&txn).await?;
    txn.commit().await?;

    info!(ticket_id, response_id = response.id, "Ticket response added");
    Ok(response)
}

pub async fn update_ticket_status<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    ticket_id: i32,
    status: TicketStatus,
    now: DateTime<Utc>,
) -> Result<support_ticket::Model> {
    actor.require(Capability::ManageTickets)?;
    let ticket = load_visible_ticket(db, actor, ticket_id).await?;
    check_ticket_transition(ticket.status, status)?;

    let previous = ticket.status;
    let unassigned = ticket.assigned_to.is_none();
    let mut active: support_ticket::ActiveModel = ticket.into();
    active.status = Set(status);
    if unassigned {
        active.assigned_to = Set(Some(actor.id));
    }
    active.updated_at = Set(now);
    let ticket = active.update(db).await?;

    info!(ticket_id, from = %previous, to = %status, "Ticket status updated");
    Ok(ticket)
}

pub async fn ticket_responses<C: ConnectionTrait>(
    db: &C,
    ticket_id: i32,
) -> Result<Vec<ticket_response::Model>> {
    let responses = TicketResponse::find()
        .filter(ticket_response::Column::TicketId.eq(ticket_id))
        .order_by_asc(ticket_response::Column::CreatedAt)
        .order_by_asc(ticket_response::Column::Id)
        .all(db)
        .await?;
    Ok(responses)
}
