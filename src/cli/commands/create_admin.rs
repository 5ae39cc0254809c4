use anyhow::{Result, bail};
use chrono::Utc;
use lifecycle::LifecycleError;
use lifecycle::accounts::create_account;
use model::entities::user;
use model::enums::UserRole;
use sea_orm::{ConnectionTrait, Set};
use tracing::{info, trace, warn};

use super::initdb::connect;
use crate::auth::hash_password;

const MIN_PASSWORD_LEN: usize = 8;

pub async fn create_admin(database_url: &str, email: &str, name: &str, password: &str) -> Result<()> {
    trace!("Entering create_admin function");
    let db = connect(database_url).await?;
    let admin = insert_admin(&db, email, name, password).await?;
    info!("Administrator {} created with id {}", admin.email, admin.id);
    Ok(())
}

pub(crate) async fn insert_admin<C: ConnectionTrait>(
    db: &C,
    email: &str,
    name: &str,
    password: &str,
) -> Result<user::Model> {
    let email = email.trim().to_lowercase();
    if !email.contains('@') {
        bail!("'{email}' is not an email address");
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        bail!("password must be at least {MIN_PASSWORD_LEN} characters");
    }

    let now = Utc::now();
    let account = user::ActiveModel {
        name: Set(name.trim().to_string()),
        password_hash: Set(hash_password(password)?),
        phone: Set(None),
        role: Set(UserRole::Admin),
        bank: Set(None),
        dsa_id: Set(None),
        annual_income: Set(None),
        education: Set(None),
        is_active: Set(true),
        is_verified: Set(true),
        notifications_read_at: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    match create_account(db, &email, None, account).await {
        Ok(admin) => Ok(admin),
        Err(LifecycleError::Duplicate(msg)) => {
            warn!("Refusing to create a second account for {}", email);
            bail!(msg)
        }
        Err(err) => Err(err.into()),
    }
}
