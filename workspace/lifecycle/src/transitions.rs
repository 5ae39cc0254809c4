//! Status transitions of a loan application.
//!
//! A status only ever changes inside [`update_status`], which appends the
//! matching [`status_history`] row and bumps `version` in the same
//! transaction.

use chrono::{DateTime, Utc};
use model::entities::{loan_application, prelude::*, status_history};
use model::enums::{ApplicationStatus, UserRole};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait, UpdateMany,
};
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::access::can_view_application;
use crate::error::{LifecycleError, Result};
use crate::roles::{Actor, Capability, RoleCapabilities};

/// Requested status change.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct StatusChange {
    pub status: ApplicationStatus,
    pub comments: Option<String>,
    /// When present, the update is refused unless it matches the stored version.
    pub expected_version: Option<i32>,
}

/// Result of a successful status change.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub application: loan_application::Model,
    pub previous_status: ApplicationStatus,
    pub entry: status_history::Model,
}

/// Checks the transition table for `role`.
///
/// Re-opening a decided application is a legal move that only roles holding
/// [`Capability::ReopenDecidedApplication`] may make; anyone else gets
/// `Forbidden` rather than `InvalidTransition`.
pub fn check_transition(
    from: ApplicationStatus,
    to: ApplicationStatus,
    role: UserRole,
) -> Result<()> {
    use ApplicationStatus::*;

    match (from, to) {
        (Pending, UnderReview | Approved | Rejected) => Ok(()),
        (UnderReview, Pending | Approved | Rejected) => Ok(()),
        (Approved | Rejected, UnderReview) => {
            if role.grants(Capability::ReopenDecidedApplication) {
                Ok(())
            } else {
                Err(LifecycleError::Forbidden(format!(
                    "only administrators may reopen a {from} application"
                )))
            }
        }
        _ => Err(LifecycleError::InvalidTransition { from, to }),
    }
}

pub(crate) async fn append_history<C: ConnectionTrait>(
    db: &C,
    application_id: i32,
    status: ApplicationStatus,
    updated_by: i32,
    comments: Option<String>,
    now: DateTime<Utc>,
) -> Result<status_history::Model> {
    let entry = status_history::ActiveModel {
        application_id: Set(application_id),
        status: Set(status),
        updated_by: Set(updated_by),
        comments: Set(comments),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(entry)
}

/// Retries of a write without `expected_version` that lost a race.
pub(crate) const MAX_WRITE_ATTEMPTS: usize = 3;

/// `UPDATE loan_applications SET version = version + 1, updated_at = now`
/// restricted to the row still at `version`. Callers add the columns they
/// change and treat zero affected rows as a lost race.
pub(crate) fn versioned_update(
    application_id: i32,
    version: i32,
    now: DateTime<Utc>,
) -> UpdateMany<LoanApplication> {
    LoanApplication::update_many()
        .col_expr(
            loan_application::Column::Version,
            Expr::col(loan_application::Column::Version).add(1),
        )
        .col_expr(loan_application::Column::UpdatedAt, Expr::value(now))
        .filter(loan_application::Column::Id.eq(application_id))
        .filter(loan_application::Column::Version.eq(version))
}

pub(crate) async fn current_version<C: ConnectionTrait>(db: &C, application_id: i32) -> Result<i32> {
    LoanApplication::find_by_id(application_id)
        .one(db)
        .await?
        .map(|application| application.version)
        .ok_or_else(|| LifecycleError::application_not_found(application_id))
}

/// Moves an application to a new status on behalf of `actor`.
///
/// The status write only applies to the version the checks ran against, so
/// two writers can never both act on the same version. A stale
/// `expected_version` is a `Conflict`; without one the losing writer
/// re-reads and re-checks the transition, so the last write wins.
#[instrument(skip(db, change), fields(status = %change.status))]
pub async fn update_status<C>(
    db: &C,
    actor: &Actor,
    application_id: i32,
    change: StatusChange,
    now: DateTime<Utc>,
) -> Result<StatusUpdate>
where
    C: ConnectionTrait + TransactionTrait,
{
    actor.require(Capability::UpdateApplicationStatus)?;

    let mut attempt = 0;
    loop {
        attempt += 1;
        let application = LoanApplication::find_by_id(application_id)
            .one(db)
            .await?
            .ok_or_else(|| LifecycleError::application_not_found(application_id))?;

        if !can_view_application(actor, &application) {
            warn!(application_id, actor_id = actor.id, "Status update by unassigned actor");
            return Err(LifecycleError::Forbidden(format!(
                "application {application_id} is not assigned to you"
            )));
        }

        if let Some(expected) = change.expected_version {
            if expected != application.version {
                warn!(
                    application_id,
                    expected,
                    actual = application.version,
                    "Stale status update"
                );
                return Err(LifecycleError::Conflict {
                    expected,
                    actual: application.version,
                });
            }
        }

        let previous_status = application.status;
        check_transition(previous_status, change.status, actor.role)?;
        debug!(application_id, %previous_status, "Transition allowed");

        // The guarded UPDATE opens the transaction so the write lock is taken
        // before anything else is read in it.
        let txn = db.begin().await?;
        let applied = versioned_update(application_id, application.version, now)
            .col_expr(loan_application::Column::Status, Expr::value(change.status))
            .exec(&txn)
            .await?
            .rows_affected;
        if applied == 0 {
            txn.rollback().await?;
            let actual = current_version(db, application_id).await?;
            if change.expected_version.is_some() || attempt >= MAX_WRITE_ATTEMPTS {
                warn!(application_id, read = application.version, actual, "Lost status update race");
                return Err(LifecycleError::Conflict {
                    expected: application.version,
                    actual,
                });
            }
            debug!(application_id, attempt, "Application changed underneath, re-reading");
            continue;
        }

        let entry = append_history(
            &txn,
            application_id,
            change.status,
            actor.id,
            change.comments.clone(),
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
            from = %previous_status,
            to = %application.status,
            version = application.version,
            "Application status updated"
        );
        return Ok(StatusUpdate {
            application,
            previous_status,
            entry,
        });
    }
}

/// Full history of an application, oldest first.
pub async fn status_history<C: ConnectionTrait>(
    db: &C,
    application_id: i32,
) -> Result<Vec<status_history::Model>> {
    let entries = StatusHistory::find()
        .filter(status_history::Column::ApplicationId.eq(application_id))
        .order_by_asc(status_history::Column::UpdatedAt)
        .order_by_asc(status_history::Column::Id)
        .all(db)
        .await?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fixed_now, insert_user, setup_db, setup_file_db, submit_for};
    use sea_orm::{DatabaseConnection, IntoActiveModel};

    use ApplicationStatus::*;

    fn change(status: ApplicationStatus) -> StatusChange {
        StatusChange {
            status,
            comments: None,
            expected_version: None,
        }
    }

    async fn seeded() -> (DatabaseConnection, Actor, Actor, Actor, i32) {
        seeded_on(setup_db().await).await
    }

    async fn seeded_on(db: DatabaseConnection) -> (DatabaseConnection, Actor, Actor, Actor, i32) {
        let applicant = insert_user(&db, "meera@example.com", UserRole::User).await;
        let dsa = insert_user(&db, "dsa@example.com", UserRole::Dsa).await;
        let admin = insert_user(&db, "admin@example.com", UserRole::Admin).await;
        let application = submit_for(&db, &applicant).await;
        let applicant = Actor::new(applicant.id, applicant.role);

        let mut active = application.into_active_model();
        active.assigned_dsa_id = Set(Some(dsa.id));
        let application = active.update(&db).await.unwrap();

        (
            db,
            applicant,
            Actor::new(dsa.id, dsa.role),
            Actor::new(admin.id, admin.role),
            application.id,
        )
    }

    #[test]
    fn transition_table() {
        for (from, to) in [
            (Pending, UnderReview),
            (Pending, Approved),
            (Pending, Rejected),
            (UnderReview, Pending),
            (UnderReview, Approved),
            (UnderReview, Rejected),
        ] {
            assert!(check_transition(from, to, UserRole::Dsa).is_ok(), "{from} -> {to}");
        }

        for status in [Pending, UnderReview, Approved, Rejected] {
            assert!(matches!(
                check_transition(status, status, UserRole::Admin),
                Err(LifecycleError::InvalidTransition { .. })
            ));
        }

        assert!(matches!(
            check_transition(Approved, Rejected, UserRole::Admin),
            Err(LifecycleError::InvalidTransition { .. })
        ));
        assert!(matches!(
            check_transition(Rejected, Pending, UserRole::Admin),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn reopen_is_admin_only() {
        assert!(check_transition(Approved, UnderReview, UserRole::Admin).is_ok());
        assert!(check_transition(Rejected, UnderReview, UserRole::Admin).is_ok());
        assert!(matches!(
            check_transition(Approved, UnderReview, UserRole::Dsa),
            Err(LifecycleError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn every_valid_transition_appends_one_entry() {
        let (db, _, dsa, admin, id) = seeded().await;
        let steps = [
            (dsa, UnderReview),
            (dsa, Pending),
            (admin, Rejected),
            (admin, UnderReview),
            (dsa, Approved),
        ];

        for (actor, status) in steps {
            let before = status_history(&db, id).await.unwrap().len();
            let update = update_status(&db, &actor, id, change(status), fixed_now())
                .await
                .unwrap();
            let after = status_history(&db, id).await.unwrap();

            assert_eq!(after.len(), before + 1);
            assert_eq!(after.last().unwrap().status, status);
            assert_eq!(update.application.status, status);
            assert_eq!(update.entry.updated_by, actor.id);
        }

        let application = LoanApplication::find_by_id(id).one(&db).await.unwrap().unwrap();
        assert_eq!(application.version, 1 + steps.len() as i32);
    }

    #[tokio::test]
    async fn applicants_always_get_forbidden() {
        let (db, applicant, _, _, id) = seeded().await;
        for status in [Pending, UnderReview, Approved, Rejected] {
            let result = update_status(&db, &applicant, id, change(status), fixed_now()).await;
            assert!(matches!(result, Err(LifecycleError::Forbidden(_))));
        }
        assert_eq!(status_history(&db, id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unassigned_dsa_is_forbidden() {
        let (db, _, _, _, id) = seeded().await;
        let other = insert_user(&db, "other-dsa@example.com", UserRole::Dsa).await;
        let result = update_status(
            &db,
            &Actor::new(other.id, UserRole::Dsa),
            id,
            change(Approved),
            fixed_now(),
        )
        .await;
        assert!(matches!(result, Err(LifecycleError::Forbidden(_))));
    }

    #[tokio::test]
    async fn unknown_application_is_not_found() {
        let (db, _, _, admin, _) = seeded().await;
        let result = update_status(&db, &admin, 9_999, change(Approved), fixed_now()).await;
        assert!(matches!(result, Err(LifecycleError::NotFound(_))));
    }

    #[tokio::test]
    async fn stale_version_conflicts_without_history() {
        let (db, _, dsa, _, id) = seeded().await;
        let current = LoanApplication::find_by_id(id).one(&db).await.unwrap().unwrap();

        let stale = StatusChange {
            status: Approved,
            comments: None,
            expected_version: Some(current.version - 1),
        };
        let result = update_status(&db, &dsa, id, stale, fixed_now()).await;
        assert!(matches!(result, Err(LifecycleError::Conflict { .. })));
        assert_eq!(status_history(&db, id).await.unwrap().len(), 1);

        let fresh = StatusChange {
            status: Approved,
            comments: Some("Documents verified".into()),
            expected_version: Some(current.version),
        };
        let update = update_status(&db, &dsa, id, fresh, fixed_now()).await.unwrap();
        assert_eq!(update.application.version, current.version + 1);
        assert_eq!(update.entry.comments.as_deref(), Some("Documents verified"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_updates_at_one_version_yield_one_conflict() {
        let dir = tempfile::tempdir().unwrap();
        let (db, _, dsa, admin, id) = seeded_on(setup_file_db(&dir).await).await;
        let version = LoanApplication::find_by_id(id)
            .one(&db)
            .await
            .unwrap()
            .unwrap()
            .version;

        let at_version = |status| StatusChange {
            status,
            comments: None,
            expected_version: Some(version),
        };
        let (first, second) = tokio::join!(
            update_status(&db, &dsa, id, at_version(Rejected), fixed_now()),
            update_status(&db, &admin, id, at_version(Approved), fixed_now()),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(LifecycleError::Conflict { .. })))
                .count(),
            1
        );

        let application = LoanApplication::find_by_id(id).one(&db).await.unwrap().unwrap();
        assert_eq!(application.version, version + 1);
        let history = status_history(&db, id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].status, application.status);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_unversioned_updates_both_land_in_history() {
        let dir = tempfile::tempdir().unwrap();
        let (db, _, _, admin, id) = seeded_on(setup_file_db(&dir).await).await;

        let (first, second) = tokio::join!(
            update_status(&db, &admin, id, change(UnderReview), fixed_now()),
            update_status(&db, &admin, id, change(Approved), fixed_now()),
        );
        first.unwrap();
        second.unwrap();

        let application = LoanApplication::find_by_id(id).one(&db).await.unwrap().unwrap();
        assert_eq!(application.version, 3);
        let history = status_history(&db, id).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[2].status, application.status);
    }
}
