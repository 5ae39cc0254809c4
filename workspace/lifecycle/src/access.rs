//! Which applications an actor may see.

use model::entities::{loan_application, prelude::LoanApplication};
use sea_orm::{ColumnTrait, Condition, ConnectionTrait, EntityTrait};
use tracing::{debug, warn};

use crate::error::{LifecycleError, Result};
use crate::roles::{Actor, Capability};

/// Row filter restricting application queries to the actor's scope.
///
/// Mirrors [`can_view_application`]: built from the same capabilities, so
/// listings and single reads never disagree.
pub fn application_scope(actor: &Actor) -> Condition {
    if actor.can(Capability::ViewAllApplications) {
        return Condition::all();
    }

    let mut scope = Condition::any();
    if actor.can(Capability::ViewAssignedApplications) {
        scope = scope.add(loan_application::Column::AssignedDsaId.eq(actor.id));
    }
    if actor.can(Capability::ViewOwnApplications) {
        scope = scope.add(loan_application::Column::UserId.eq(actor.id));
    }
    if scope.is_empty() {
        // No viewing capability: match nothing.
        return Condition::all().add(loan_application::Column::Id.is_null());
    }
    scope
}

pub fn can_view_application(actor: &Actor, application: &loan_application::Model) -> bool {
    if actor.can(Capability::ViewAllApplications) {
        return true;
    }
    (actor.can(Capability::ViewAssignedApplications)
        && application.assigned_dsa_id == Some(actor.id))
        || (actor.can(Capability::ViewOwnApplications) && application.user_id == actor.id)
}

/// Loads an application the actor is allowed to see.
///
/// Unknown ids yield `NotFound`; existing applications outside the actor's
/// scope yield `Forbidden`.
pub async fn load_visible_application<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    application_id: i32,
) -> Result<loan_application::Model> {
    debug!(application_id, actor_id = actor.id, "Loading application");
    let application = LoanApplication::find_by_id(application_id)
        .one(db)
        .await?
        .ok_or_else(|| LifecycleError::application_not_found(application_id))?;

    if !can_view_application(actor, &application) {
        warn!(
            application_id,
            actor_id = actor.id,
            role = %actor.role,
            "Application outside actor scope"
        );
        return Err(LifecycleError::Forbidden(format!(
            "no access to application {application_id}"
        )));
    }
    Ok(application)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{application_fixture, insert_user, setup_db, submit_for};
    use model::enums::UserRole;
    use sea_orm::{ActiveModelTrait, IntoActiveModel, PaginatorTrait, QueryFilter, Set};

    async fn visible(db: &sea_orm::DatabaseConnection, actor: &Actor) -> u64 {
        LoanApplication::find()
            .filter(application_scope(actor))
            .count(db)
            .await
            .unwrap()
    }

    #[test]
    fn visibility_follows_role() {
        let mut application = application_fixture(1, 10);
        application.assigned_dsa_id = Some(20);

        assert!(can_view_application(&Actor::new(99, UserRole::Admin), &application));
        assert!(can_view_application(&Actor::new(10, UserRole::User), &application));
        assert!(can_view_application(&Actor::new(20, UserRole::Dsa), &application));
        assert!(!can_view_application(&Actor::new(11, UserRole::User), &application));
        assert!(!can_view_application(&Actor::new(21, UserRole::Dsa), &application));
        // A DSA never sees an application merely because the ids coincide.
        assert!(!can_view_application(&Actor::new(10, UserRole::Dsa), &application));
    }

    #[tokio::test]
    async fn listing_scope_matches_single_reads() {
        let db = setup_db().await;
        let first = insert_user(&db, "first@example.com", UserRole::User).await;
        let second = insert_user(&db, "second@example.com", UserRole::User).await;
        let dsa = insert_user(&db, "dsa@example.com", UserRole::Dsa).await;
        let idle = insert_user(&db, "idle@example.com", UserRole::Dsa).await;
        let admin = insert_user(&db, "admin@example.com", UserRole::Admin).await;

        submit_for(&db, &first).await;
        submit_for(&db, &first).await;
        let assigned = submit_for(&db, &second).await;
        let mut active = assigned.into_active_model();
        active.assigned_dsa_id = Set(Some(dsa.id));
        active.update(&db).await.unwrap();

        let applications = LoanApplication::find().all(&db).await.unwrap();
        for user in [&first, &second, &dsa, &idle, &admin] {
            let actor = Actor::new(user.id, user.role);
            let readable = applications
                .iter()
                .filter(|application| can_view_application(&actor, application))
                .count() as u64;
            assert_eq!(visible(&db, &actor).await, readable, "{}", user.email);
        }

        assert_eq!(visible(&db, &Actor::new(admin.id, UserRole::Admin)).await, 3);
        assert_eq!(visible(&db, &Actor::new(first.id, UserRole::User)).await, 2);
        assert_eq!(visible(&db, &Actor::new(dsa.id, UserRole::Dsa)).await, 1);
        assert_eq!(visible(&db, &Actor::new(idle.id, UserRole::Dsa)).await, 0);
    }
}
