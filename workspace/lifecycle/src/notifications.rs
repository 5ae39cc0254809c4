//! Notifications derived on read.
//!
//! Nothing here is persisted. [`load_sources`] fetches the time-windowed rows
//! relevant to a role and [`derive_notifications`] turns them into a sorted
//! list. Ids are synthetic (`new_app_12`, `status_40`, ...) and stable for as
//! long as the underlying rows are unchanged, so two reads without data
//! changes return the same list.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, Utc};
use model::entities::{
    file_upload, loan_application, prelude::*, status_history, support_ticket, ticket_response,
};
use model::enums::{ApplicationStatus, DocumentType, Priority, TicketStatus, UserRole};
use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::completeness::compute_completeness;
use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewApplication,
    HighPriority,
    StaleApplication,
    NewTicket,
    Assigned,
    DeadlineApproaching,
    Overdue,
    NewDocument,
    StatusChanged,
    MissingDocuments,
    TicketReply,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Notification {
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub application_id: Option<i32>,
    pub ticket_id: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

/// Look-back and look-ahead windows.
#[derive(Debug, Clone, Copy)]
pub struct NotificationWindows {
    /// Admin and DSA feeds.
    pub recent: Duration,
    /// Applicant feed.
    pub history: Duration,
    /// Age at which a pending application is reported as stale.
    pub stale_after: Duration,
    /// How far ahead a review deadline counts as approaching.
    pub deadline_horizon: Duration,
}

impl Default for NotificationWindows {
    fn default() -> Self {
        Self {
            recent: Duration::hours(24),
            history: Duration::days(7),
            stale_after: Duration::days(3),
            deadline_horizon: Duration::hours(24),
        }
    }
}

/// Rows a notification feed is computed from.
#[derive(Debug, Clone, Default)]
pub struct NotificationSources {
    pub applications: Vec<loan_application::Model>,
    pub documents: Vec<file_upload::Model>,
    pub history: Vec<status_history::Model>,
    pub tickets: Vec<support_ticket::Model>,
    pub ticket_responses: Vec<ticket_response::Model>,
}

/// Caller identity and clock for a derivation.
#[derive(Debug, Clone, Copy)]
pub struct FeedContext {
    pub role: UserRole,
    pub user_id: i32,
    pub now: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
    pub windows: NotificationWindows,
}

fn is_open(status: ApplicationStatus) -> bool {
    !status.is_terminal()
}

fn application_notice(
    id: String,
    kind: NotificationKind,
    title: &str,
    message: String,
    application: &loan_application::Model,
    created_at: DateTime<Utc>,
) -> Notification {
    Notification {
        id,
        kind,
        title: title.to_string(),
        message,
        priority: application.priority,
        application_id: Some(application.id),
        ticket_id: None,
        created_at,
        read: false,
    }
}

fn admin_feed(ctx: &FeedContext, sources: &NotificationSources) -> Vec<Notification> {
    let recent_since = ctx.now - ctx.windows.recent;
    let stale_before = ctx.now - ctx.windows.stale_after;
    let mut feed = Vec::new();

    for app in &sources.applications {
        let number = &app.application_number;
        if app.created_at >= recent_since && app.created_at <= ctx.now {
            feed.push(application_notice(
                format!("new_app_{}", app.id),
                NotificationKind::NewApplication,
                "New application",
                format!("{} submitted {number} for a {} loan", app.full_name, app.loan_type),
                app,
                app.created_at,
            ));
        }
        if app.priority.is_elevated()
            && matches!(
                app.status,
                ApplicationStatus::Pending | ApplicationStatus::UnderReview
            )
        {
            feed.push(application_notice(
                format!("priority_app_{}", app.id),
                NotificationKind::HighPriority,
                "High priority application",
                format!("{number} is marked {} and still {}", app.priority, app.status),
                app,
                app.created_at,
            ));
        }
        if app.status == ApplicationStatus::Pending && app.created_at < stale_before {
            feed.push(application_notice(
                format!("stale_app_{}", app.id),
                NotificationKind::StaleApplication,
                "Application waiting for review",
                format!(
                    "{number} has been pending for {} days",
                    (ctx.now - app.created_at).num_days()
                ),
                app,
                app.created_at,
            ));
        }
    }

    for ticket in &sources.tickets {
        if ticket.created_at >= recent_since
            && ticket.created_at <= ctx.now
            && ticket.status == TicketStatus::Open
        {
            feed.push(Notification {
                id: format!("new_ticket_{}", ticket.id),
                kind: NotificationKind::NewTicket,
                title: "New support ticket".to_string(),
                message: format!("{}: {}", ticket.ticket_number, ticket.subject),
                priority: ticket.priority,
                application_id: None,
                ticket_id: Some(ticket.id),
                created_at: ticket.created_at,
                read: false,
            });
        }
    }
    feed
}

fn dsa_feed(ctx: &FeedContext, sources: &NotificationSources) -> Vec<Notification> {
    let recent_since = ctx.now - ctx.windows.recent;
    let horizon = ctx.now + ctx.windows.deadline_horizon;
    let mut feed = Vec::new();

    let assigned: HashMap<i32, &loan_application::Model> = sources
        .applications
        .iter()
        .filter(|app| app.assigned_dsa_id == Some(ctx.user_id))
        .map(|app| (app.id, app))
        .collect();

    for app in assigned.values() {
        let number = &app.application_number;
        if let Some(assigned_at) = app.assigned_at {
            if assigned_at >= recent_since && assigned_at <= ctx.now {
                feed.push(application_notice(
                    format!("assigned_app_{}", app.id),
                    NotificationKind::Assigned,
                    "New assignment",
                    format!("{number} ({}) was assigned to you", app.full_name),
                    app,
                    assigned_at,
                ));
            }
        }

        let Some(deadline) = app.review_deadline else {
            continue;
        };
        if !is_open(app.status) {
            continue;
        }
        if deadline <= ctx.now {
            feed.push(application_notice(
                format!("overdue_app_{}", app.id),
                NotificationKind::Overdue,
                "Review overdue",
                format!("Review of {number} was due {}", deadline.format("%Y-%m-%d %H:%M UTC")),
                app,
                deadline,
            ));
        } else if deadline <= horizon {
            feed.push(application_notice(
                format!("deadline_app_{}", app.id),
                NotificationKind::DeadlineApproaching,
                "Review deadline approaching",
                format!("Review of {number} is due {}", deadline.format("%Y-%m-%d %H:%M UTC")),
                app,
                deadline - ctx.windows.deadline_horizon,
            ));
        }
    }

    for document in &sources.documents {
        let Some(app) = assigned.get(&document.application_id) else {
            continue;
        };
        if !document.is_deleted
            && document.uploaded_at >= recent_since
            && document.uploaded_at <= ctx.now
        {
            feed.push(application_notice(
                format!("new_doc_{}", document.id),
                NotificationKind::NewDocument,
                "New document",
                format!(
                    "{} uploaded for {}",
                    document.document_type, app.application_number
                ),
                app,
                document.uploaded_at,
            ));
        }
    }
    feed
}

fn user_feed(ctx: &FeedContext, sources: &NotificationSources) -> Vec<Notification> {
    let history_since = ctx.now - ctx.windows.history;
    let mut feed = Vec::new();

    let own: HashMap<i32, &loan_application::Model> = sources
        .applications
        .iter()
        .filter(|app| app.user_id == ctx.user_id)
        .map(|app| (app.id, app))
        .collect();

    for entry in &sources.history {
        let Some(app) = own.get(&entry.application_id) else {
            continue;
        };
        if entry.updated_by != ctx.user_id
            && entry.updated_at >= history_since
            && entry.updated_at <= ctx.now
        {
            let mut message = format!("{} is now {}", app.application_number, entry.status);
            if let Some(comments) = entry.comments.as_deref().filter(|c| !c.is_empty()) {
                message.push_str(": ");
                message.push_str(comments);
            }
            feed.push(application_notice(
                format!("status_{}", entry.id),
                NotificationKind::StatusChanged,
                "Application status updated",
                message,
                app,
                entry.updated_at,
            ));
        }
    }

    let mut uploaded: HashMap<i32, HashSet<DocumentType>> = HashMap::new();
    for document in sources.documents.iter().filter(|d| !d.is_deleted) {
        uploaded
            .entry(document.application_id)
            .or_default()
            .insert(document.document_type);
    }
    for app in own.values().filter(|app| is_open(app.status)) {
        let types = uploaded.get(&app.id).cloned().unwrap_or_default();
        let report = compute_completeness(app.loan_type, types);
        if report.missing.is_empty() {
            continue;
        }
        let missing: Vec<String> = report.missing.iter().map(ToString::to_string).collect();
        feed.push(application_notice(
            format!("missing_docs_{}", app.id),
            NotificationKind::MissingDocuments,
            "Documents missing",
            format!(
                "{} still needs: {}",
                app.application_number,
                missing.join(", ")
            ),
            app,
            app.created_at,
        ));
    }

    let own_tickets: HashMap<i32, &support_ticket::Model> = sources
        .tickets
        .iter()
        .filter(|ticket| ticket.user_id == ctx.user_id)
        .map(|ticket| (ticket.id, ticket))
        .collect();
    for response in &sources.ticket_responses {
        let Some(ticket) = own_tickets.get(&response.ticket_id) else {
            continue;
        };
        if response.responder_id != ctx.user_id
            && response.created_at >= history_since
            && response.created_at <= ctx.now
        {
            feed.push(Notification {
                id: format!("ticket_reply_{}", response.id),
                kind: NotificationKind::TicketReply,
                title: "Support replied".to_string(),
                message: format!("New reply on {}: {}", ticket.ticket_number, ticket.subject),
                priority: ticket.priority,
                application_id: None,
                ticket_id: Some(ticket.id),
                created_at: response.created_at,
                read: false,
            });
        }
    }
    feed
}

/// Maps source rows to the caller's notifications, newest first.
///
/// Ties on `created_at` are broken by id. A notification is `read` when it
/// was created at or before `ctx.read_at`.
pub fn derive_notifications(ctx: &FeedContext, sources: &NotificationSources) -> Vec<Notification> {
    let mut feed = match ctx.role {
        UserRole::Admin => admin_feed(ctx, sources),
        UserRole::Dsa => dsa_feed(ctx, sources),
        UserRole::User => user_feed(ctx, sources),
    };

    for notification in &mut feed {
        notification.read = ctx
            .read_at
            .is_some_and(|read_at| notification.created_at <= read_at);
    }
    feed.sort_by(|a, b| {
        b.created_at
            .cmp(&a.created_at)
            .then_with(|| a.id.cmp(&b.id))
    });
    feed
}

/// Loads the rows [`derive_notifications`] needs for `ctx.role`.
pub async fn load_sources<C: ConnectionTrait>(
    db: &C,
    ctx: &FeedContext,
) -> Result<NotificationSources> {
    let recent_since = ctx.now - ctx.windows.recent;
    let history_since = ctx.now - ctx.windows.history;
    let mut sources = NotificationSources::default();

    match ctx.role {
        UserRole::Admin => {
            let stale_before = ctx.now - ctx.windows.stale_after;
            sources.applications = LoanApplication::find()
                .filter(
                    Condition::any()
                        .add(loan_application::Column::CreatedAt.gte(recent_since))
                        .add(
                            Condition::all()
                                .add(loan_application::Column::Priority.is_in([
                                    Priority::High,
                                    Priority::Urgent,
                                ]))
                                .add(loan_application::Column::Status.is_in([
                                    ApplicationStatus::Pending,
                                    ApplicationStatus::UnderReview,
                                ])),
                        )
                        .add(
                            Condition::all()
                                .add(loan_application::Column::Status.eq(ApplicationStatus::Pending))
                                .add(loan_application::Column::CreatedAt.lt(stale_before)),
                        ),
                )
                .all(db)
                .await?;
            sources.tickets = SupportTicket::find()
                .filter(support_ticket::Column::CreatedAt.gte(recent_since))
                .all(db)
                .await?;
        }
        UserRole::Dsa => {
            sources.applications = LoanApplication::find()
                .filter(loan_application::Column::AssignedDsaId.eq(ctx.user_id))
                .all(db)
                .await?;
            let ids: Vec<i32> = sources.applications.iter().map(|app| app.id).collect();
            sources.documents = FileUpload::find()
                .filter(file_upload::Column::ApplicationId.is_in(ids))
                .filter(file_upload::Column::UploadedAt.gte(recent_since))
                .filter(file_upload::Column::IsDeleted.eq(false))
                .all(db)
                .await?;
        }
        UserRole::User => {
            sources.applications = LoanApplication::find()
                .filter(loan_application::Column::UserId.eq(ctx.user_id))
                .all(db)
                .await?;
            let ids: Vec<i32> = sources.applications.iter().map(|app| app.id).collect();
            sources.history = StatusHistory::find()
                .filter(status_history::Column::ApplicationId.is_in(ids.clone()))
                .filter(status_history::Column::UpdatedAt.gte(history_since))
                .filter(status_history::Column::UpdatedBy.ne(ctx.user_id))
                .all(db)
                .await?;
            sources.documents = FileUpload::find()
                .filter(file_upload::Column::ApplicationId.is_in(ids))
                .filter(file_upload::Column::IsDeleted.eq(false))
                .all(db)
                .await?;
            sources.tickets = SupportTicket::find()
                .filter(support_ticket::Column::UserId.eq(ctx.user_id))
                .all(db)
                .await?;
            let ticket_ids: Vec<i32> = sources.tickets.iter().map(|ticket| ticket.id).collect();
            sources.ticket_responses = TicketResponse::find()
                .filter(ticket_response::Column::TicketId.is_in(ticket_ids))
                .filter(ticket_response::Column::CreatedAt.gte(history_since))
                .filter(ticket_response::Column::ResponderId.ne(ctx.user_id))
                .all(db)
                .await?;
        }
    }

    debug!(
        role = %ctx.role,
        user_id = ctx.user_id,
        applications = sources.applications.len(),
        documents = sources.documents.len(),
        history = sources.history.len(),
        tickets = sources.tickets.len(),
        responses = sources.ticket_responses.len(),
        "Loaded notification sources"
    );
    Ok(sources)
}
