//! Human-facing identifiers: application numbers, ticket numbers and DSA ids.

use chrono::{DateTime, Utc};
use model::entities::{loan_application, prelude::*, support_ticket, user};
use rand::Rng;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter};
use tracing::{debug, warn};

use crate::error::{LifecycleError, Result};

const MAX_ATTEMPTS: usize = 8;
const BANK_CODE_LEN: usize = 4;

/// `EL` + `YYYYMMDD` + six random digits.
pub fn application_number<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    format!(
        "EL{}{:06}",
        now.format("%Y%m%d"),
        rng.gen_range(0..1_000_000u32)
    )
}

/// `TKT-` + `YYMMDD` + four random digits.
pub fn ticket_number<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    format!("TKT-{}{:04}", now.format("%y%m%d"), rng.gen_range(0..10_000u32))
}

/// Upper-cased alphanumeric prefix of a bank name, at most four characters.
pub fn bank_code(bank: &str) -> Option<String> {
    let code: String = bank
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(BANK_CODE_LEN)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (!code.is_empty()).then_some(code)
}

pub fn format_dsa_id(code: &str, sequence: u64) -> String {
    format!("{code}-{sequence:04}")
}

/// Draws application numbers until one is not taken.
pub async fn generate_application_number<C: ConnectionTrait>(
    db: &C,
    now: DateTime<Utc>,
) -> Result<String> {
    for attempt in 0..MAX_ATTEMPTS {
        let candidate = application_number(now, &mut rand::thread_rng());
        let taken = LoanApplication::find()
            .filter(loan_application::Column::ApplicationNumber.eq(&candidate))
            .count(db)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        warn!(attempt, %candidate, "Application number collision");
    }
    Err(LifecycleError::Exhausted("application number"))
}

pub async fn generate_ticket_number<C: ConnectionTrait>(
    db: &C,
    now: DateTime<Utc>,
) -> Result<String> {
    for attempt in 0..MAX_ATTEMPTS {
        let candidate = ticket_number(now, &mut rand::thread_rng());
        let taken = SupportTicket::find()
            .filter(support_ticket::Column::TicketNumber.eq(&candidate))
            .count(db)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
        warn!(attempt, %candidate, "Ticket number collision");
    }
    Err(LifecycleError::Exhausted("ticket number"))
}

/// Next free `CODE-NNNN` id for agents of `bank`.
pub async fn generate_dsa_id<C: ConnectionTrait>(db: &C, bank: &str) -> Result<String> {
    let code = bank_code(bank)
        .ok_or_else(|| LifecycleError::Validation("bank name must contain a letter or digit".into()))?;

    let existing = User::find()
        .filter(user::Column::DsaId.starts_with(format!("{code}-")))
        .count(db)
        .await?;
    debug!(%code, existing, "Generating DSA id");

    for sequence in (existing + 1)..=(existing + MAX_ATTEMPTS as u64) {
        let candidate = format_dsa_id(&code, sequence);
        let taken = User::find()
            .filter(user::Column::DsaId.eq(&candidate))
            .count(db)
            .await?;
        if taken == 0 {
            return Ok(candidate);
        }
    }
    Err(LifecycleError::Exhausted("DSA id"))
}
