//! Shared fixtures for the unit tests of this crate.

use chrono::{DateTime, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use model::entities::{loan_application, user};
use model::enums::{ApplicationStatus, LoanType, Priority, UserRole};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};

use crate::roles::Actor;
use crate::submission::{NewApplication, submit_application};

pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

pub async fn setup_db() -> DatabaseConnection {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .try_init();
    let db = Database::connect("sqlite::memory:").await.unwrap();
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// A pooled database backed by a file in `dir`, for tests that need several
/// connections writing at once.
pub async fn setup_file_db(dir: &tempfile::TempDir) -> DatabaseConnection {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .try_init();
    let path = dir.path().join("portal.db");
    let db = Database::connect(format!("sqlite://{}?mode=rwc", path.display()))
        .await
        .unwrap();
    Migrator::up(&db, None).await.unwrap();
    db
}

/// An unsaved account; the email is filled in by the caller.
pub fn account_fixture(role: UserRole) -> user::ActiveModel {
    let now = fixed_now();
    user::ActiveModel {
        name: Set("Test User".to_string()),
        password_hash: Set("not-a-hash".to_string()),
        phone: Set(None),
        role: Set(role),
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
    }
}

pub async fn insert_user(db: &DatabaseConnection, email: &str, role: UserRole) -> user::Model {
    let mut account = account_fixture(role);
    account.name = Set(email.split('@').next().unwrap_or(email).to_string());
    account.email = Set(email.to_string());
    account.insert(db).await.unwrap()
}

/// An unsaved application model for pure-function tests.
pub fn application_fixture(id: i32, user_id: i32) -> loan_application::Model {
    let now = fixed_now();
    loan_application::Model {
        id,
        application_number: format!("EL20240615{id:06}"),
        user_id,
        full_name: "Test Applicant".to_string(),
        email: "applicant@example.com".to_string(),
        phone: "9876543210".to_string(),
        date_of_birth: None,
        address: None,
        loan_type: LoanType::Domestic,
        loan_amount: Decimal::new(500_000, 0),
        tenure_months: 60,
        purpose: None,
        course_name: "B.Tech".to_string(),
        institution: "IIT Madras".to_string(),
        country: "India".to_string(),
        course_duration_months: Some(48),
        priority: Priority::Medium,
        status: ApplicationStatus::Pending,
        assigned_dsa_id: None,
        assigned_at: None,
        review_deadline: None,
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

pub fn new_application(loan_type: LoanType) -> NewApplication {
    NewApplication {
        full_name: "Test Applicant".into(),
        email: "applicant@example.com".into(),
        phone: "9876543210".into(),
        date_of_birth: None,
        address: None,
        loan_type,
        loan_amount: Decimal::new(500_000, 0),
        tenure_months: 60,
        purpose: None,
        course_name: "B.Tech".into(),
        institution: "IIT Madras".into(),
        country: "India".into(),
        course_duration_months: Some(48),
        priority: Priority::Medium,
    }
}

/// Submits a domestic application on behalf of `applicant`.
pub async fn submit_for(
    db: &DatabaseConnection,
    applicant: &user::Model,
) -> loan_application::Model {
    submit_application(
        db,
        &Actor::new(applicant.id, applicant.role),
        new_application(LoanType::Domestic),
        fixed_now(),
    )
    .await
    .unwrap()
}
