//! DSA assignment with review deadlines.

use chrono::{DateTime, Duration, Utc};
use model::entities::{loan_application, prelude::*, user};
use model::enums::{DsaAction, UserRole};
use sea_orm::sea_query::Expr;
use sea_orm::{ConnectionTrait, EntityTrait, TransactionTrait};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::audit::record_dsa_activity;
use crate::error::{LifecycleError, Result};
use crate::roles::{Actor, Capability};
use crate::transitions::{MAX_WRITE_ATTEMPTS, current_version, versioned_update};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Assignment {
    /// User id of the DSA.
    pub dsa_id: i32,
    /// Overrides the configured review window.
    pub review_deadline: Option<DateTime<Utc>>,
}

/// Result of an assignment: the updated application and the assigned agent.
#[derive(Debug, Clone)]
pub struct AssignmentOutcome {
    pub application: loan_application::Model,
    pub dsa: user::Model,
    pub previous_dsa_id: Option<i32>,
}

pub fn default_review_deadline(now: DateTime<Utc>, review_days: i64) -> DateTime<Utc> {
    now + Duration::days(review_days)
}

fn eligible_dsa(candidate: Option<user::Model>, dsa_id: i32) -> Result<user::Model> {
    let dsa = candidate
        .ok_or_else(|| LifecycleError::Validation(format!("user {dsa_id} does not exist")))?;
    if dsa.role != UserRole::Dsa {
        return Err(LifecycleError::Validation(format!("user {dsa_id} is not a DSA")));
    }
    if !dsa.is_active {
        return Err(LifecycleError::Validation(format!("DSA {dsa_id} is deactivated")));
    }
    if !dsa.is_verified {
        return Err(LifecycleError::Validation(format!("DSA {dsa_id} is not verified")));
    }
    Ok(dsa)
}

/// Assigns (or re-assigns) a DSA. Does not touch the status history.
///
/// Like status updates, the write only lands on the version that was
/// checked; a writer that lost the race re-reads before trying again.
#[instrument(skip(db, assignment), fields(dsa_id = assignment.dsa_id))]
pub async fn assign_dsa<C: ConnectionTrait + TransactionTrait>(
    db: &C,
    actor: &Actor,
    application_id: i32,
    assignment: Assignment,
    review_days: i64,
    now: DateTime<Utc>,
) -> Result<AssignmentOutcome> {
    actor.require(Capability::AssignDsa)?;

    if let Some(deadline) = assignment.review_deadline {
        if deadline <= now {
            return Err(LifecycleError::Validation(
                "review_deadline must be in the future".into(),
            ));
        }
    }

    let deadline = assignment
        .review_deadline
        .unwrap_or_else(|| default_review_deadline(now, review_days));

    let mut attempt = 0;
    loop {
        attempt += 1;
        let application = LoanApplication::find_by_id(application_id)
            .one(db)
            .await?
            .ok_or_else(|| LifecycleError::application_not_found(application_id))?;

        if application.status.is_terminal() {
            warn!(application_id, status = %application.status, "Assignment on decided application");
            return Err(LifecycleError::Validation(format!(
                "application {application_id} is already {}",
                application.status
            )));
        }
        let dsa = eligible_dsa(
            User::find_by_id(assignment.dsa_id).one(db).await?,
            assignment.dsa_id,
        )?;
        let previous_dsa_id = application.assigned_dsa_id;

        let txn = db.begin().await?;
        let applied = versioned_update(application_id, application.version, now)
            .col_expr(loan_application::Column::AssignedDsaId, Expr::value(Some(dsa.id)))
            .col_expr(loan_application::Column::AssignedAt, Expr::value(Some(now)))
            .col_expr(
                loan_application::Column::ReviewDeadline,
                Expr::value(Some(deadline)),
            )
            .exec(&txn)
            .await?
            .rows_affected;
        if applied == 0 {
            txn.rollback().await?;
            if attempt >= MAX_WRITE_ATTEMPTS {
                let actual = current_version(db, application_id).await?;
                warn!(application_id, read = application.version, actual, "Lost assignment race");
                return Err(LifecycleError::Conflict {
                    expected: application.version,
                    actual,
                });
            }
            debug!(application_id, attempt, "Application changed underneath, re-reading");
            continue;
        }

        record_dsa_activity(
            &txn,
            dsa.id,
            Some(application_id),
            DsaAction::Assigned,
            Some(format!(
                "Assigned {} with review deadline {}",
                application.application_number,
                deadline.to_rfc3339()
            )),
            now,
        )
        .await?;
        let application = LoanApplication::find_by_id(application_id)
            .one(&txn)
            .await?
            .ok_or_else(|| LifecycleError::application_not_found(application_id))?;
        txn.commit().await?;

        info!(
            application_id,
            dsa_user_id = dsa.id,
            ?previous_dsa_id,
            %deadline,
            "DSA assigned"
        );
        return Ok(AssignmentOutcome {
            application,
            dsa,
            previous_dsa_id,
        });
    }
}
