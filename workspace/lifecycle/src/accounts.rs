//! Account creation.
//!
//! Emails and DSA ids are unique columns. Checking first keeps the common
//! error readable, but a concurrent insert can still win in between, so
//! unique violations from the insert itself are classified here too.

use model::entities::{prelude::*, user};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, SqlErr,
};
use tracing::{debug, instrument, warn};

use crate::error::{LifecycleError, Result};
use crate::numbering::generate_dsa_id;

const MAX_INSERT_ATTEMPTS: usize = 5;

pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

async fn email_taken<C: ConnectionTrait>(db: &C, email: &str) -> Result<bool> {
    let count = User::find()
        .filter(user::Column::Email.eq(email))
        .count(db)
        .await?;
    Ok(count > 0)
}

fn duplicate_email(email: &str) -> LifecycleError {
    LifecycleError::Duplicate(format!("email '{email}' is already registered"))
}

/// Inserts `account` under `email`.
///
/// With `dsa_bank` set a fresh DSA id is allocated for that bank; losing the
/// id to a concurrent registration allocates the next one.
#[instrument(skip(db, account))]
pub async fn create_account<C: ConnectionTrait>(
    db: &C,
    email: &str,
    dsa_bank: Option<&str>,
    account: user::ActiveModel,
) -> Result<user::Model> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        if email_taken(db, email).await? {
            warn!(%email, "Registration with taken email");
            return Err(duplicate_email(email));
        }

        let mut candidate = account.clone();
        candidate.email = Set(email.to_string());
        if let Some(bank) = dsa_bank {
            let dsa_id = generate_dsa_id(db, bank).await?;
            debug!(%dsa_id, attempt, "Allocated DSA id");
            candidate.dsa_id = Set(Some(dsa_id));
        }

        let err = match candidate.insert(db).await {
            Ok(created) => return Ok(created),
            Err(err) if is_unique_violation(&err) => err,
            Err(err) => return Err(err.into()),
        };
        if email_taken(db, email).await? {
            warn!(%email, "Email registered concurrently");
            return Err(duplicate_email(email));
        }
        match dsa_bank {
            Some(_) if attempt < MAX_INSERT_ATTEMPTS => {
                warn!(attempt, "DSA id taken concurrently, allocating another");
            }
            Some(_) => return Err(LifecycleError::Exhausted("DSA id")),
            None => return Err(err.into()),
        }
    }
}
