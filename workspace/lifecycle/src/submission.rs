//! Application intake.

use chrono::{DateTime, NaiveDate, Utc};
use model::entities::loan_application;
use model::enums::{ApplicationStatus, LoanType, Priority};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set, TransactionTrait};
use tracing::{info, instrument};

use crate::error::{LifecycleError, Result};
use crate::numbering::generate_application_number;
use crate::roles::{Actor, Capability};
use crate::transitions::append_history;

/// Snapshot captured from the applicant at submission time.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: Option<NaiveDate>,
    pub address: Option<String>,
    pub loan_type: LoanType,
    pub loan_amount: Decimal,
    pub tenure_months: i32,
    pub purpose: Option<String>,
    pub course_name: String,
    pub institution: String,
    pub country: String,
    pub course_duration_months: Option<i32>,
    pub priority: Priority,
}

impl NewApplication {
    fn validate(&self) -> Result<()> {
        let blank = [
            ("full_name", &self.full_name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("course_name", &self.course_name),
            ("institution", &self.institution),
            ("country", &self.country),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty());
        if let Some((field, _)) = blank {
            return Err(LifecycleError::Validation(format!("{field} must not be empty")));
        }
        if self.loan_amount <= Decimal::ZERO {
            return Err(LifecycleError::Validation("loan_amount must be positive".into()));
        }
        if self.tenure_months <= 0 {
            return Err(LifecycleError::Validation("tenure_months must be positive".into()));
        }
        if self.course_duration_months.is_some_and(|months| months <= 0) {
            return Err(LifecycleError::Validation(
                "course_duration_months must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Stores a new `pending` application together with its first history entry.
#[instrument(skip(db, new), fields(loan_type = %new.loan_type))]
pub async fn submit_application<C: TransactionTrait>(
    db: &C,
    actor: &Actor,
    new: NewApplication,
    now: DateTime<Utc>,
) -> Result<loan_application::Model> {
    actor.require(Capability::SubmitApplication)?;
    new.validate()?;

    let txn = db.begin().await?;
    let application_number = generate_application_number(&txn, now).await?;

    let application = loan_application::ActiveModel {
        application_number: Set(application_number),
        user_id: Set(actor.id),
        full_name: Set(new.full_name.trim().to_string()),
        email: Set(new.email.trim().to_string()),
        phone: Set(new.phone.trim().to_string()),
        date_of_birth: Set(new.date_of_birth),
        address: Set(new.address),
        loan_type: Set(new.loan_type),
        loan_amount: Set(new.loan_amount),
        tenure_months: Set(new.tenure_months),
        purpose: Set(new.purpose),
        course_name: Set(new.course_name.trim().to_string()),
        institution: Set(new.institution.trim().to_string()),
        country: Set(new.country.trim().to_string()),
        course_duration_months: Set(new.course_duration_months),
        priority: Set(new.priority),
        status: Set(ApplicationStatus::Pending),
        assigned_dsa_id: Set(None),
        assigned_at: Set(None),
        review_deadline: Set(None),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    append_history(
        &txn,
        application.id,
        ApplicationStatus::Pending,
        actor.id,
        Some("Application submitted".to_string()),
        now,
    )
    .await?;
    txn.commit().await?;

    info!(
        application_id = application.id,
        application_number = %application.application_number,
        "Application submitted"
    );
    Ok(application)
}
