//! Role-scoped aggregates over applications and accounts.

use chrono::{DateTime, Utc};
use model::entities::{loan_application, prelude::*, user};
use model::enums::{ApplicationStatus, LoanType, UserRole};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::access::application_scope;
use crate::error::Result;
use crate::roles::Actor;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatusCounts {
    pub pending: u64,
    pub under_review: u64,
    pub approved: u64,
    pub rejected: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct LoanTypeCounts {
    pub domestic: u64,
    pub abroad: u64,
    pub vocational: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ApplicationStatistics {
    pub total: u64,
    pub by_status: StatusCounts,
    pub by_loan_type: LoanTypeCounts,
    #[schema(value_type = String)]
    pub total_requested: Decimal,
    /// Sum of loan amounts of approved applications.
    #[schema(value_type = String)]
    pub total_approved: Decimal,
    /// Approved share of decided applications, in percent.
    pub approval_rate: f64,
    /// Undecided applications past their review deadline.
    pub overdue_reviews: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UserCounts {
    pub admins: u64,
    pub dsas: u64,
    pub users: u64,
    pub inactive: u64,
    pub unverified_dsas: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DsaPerformance {
    pub user_id: i32,
    pub name: String,
    pub dsa_id: Option<String>,
    pub bank: Option<String>,
    pub assigned: u64,
    pub approved: u64,
    pub rejected: u64,
    /// Assigned applications not yet decided.
    pub pending: u64,
    pub approval_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatisticsReport {
    pub scope: UserRole,
    pub applications: ApplicationStatistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<UserCounts>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsa_performance: Option<Vec<DsaPerformance>>,
    pub generated_at: DateTime<Utc>,
}

fn rate(approved: u64, rejected: u64) -> f64 {
    let decided = approved + rejected;
    if decided == 0 {
        0.0
    } else {
        approved as f64 / decided as f64 * 100.0
    }
}

pub fn summarize_applications(
    applications: &[loan_application::Model],
    now: DateTime<Utc>,
) -> ApplicationStatistics {
    let mut stats = ApplicationStatistics::default();

    for app in applications {
        stats.total += 1;
        stats.total_requested += app.loan_amount;

        match app.status {
            ApplicationStatus::Pending => stats.by_status.pending += 1,
            ApplicationStatus::UnderReview => stats.by_status.under_review += 1,
            ApplicationStatus::Approved => {
                stats.by_status.approved += 1;
                stats.total_approved += app.loan_amount;
            }
            ApplicationStatus::Rejected => stats.by_status.rejected += 1,
        }

        match app.loan_type {
            LoanType::Domestic => stats.by_loan_type.domestic += 1,
            LoanType::Abroad => stats.by_loan_type.abroad += 1,
            LoanType::Vocational => stats.by_loan_type.vocational += 1,
        }

        if !app.status.is_terminal() && app.review_deadline.is_some_and(|d| d < now) {
            stats.overdue_reviews += 1;
        }
    }

    stats.approval_rate = rate(stats.by_status.approved, stats.by_status.rejected);
    stats
}

pub fn count_users(users: &[user::Model]) -> UserCounts {
    let mut counts = UserCounts::default();
    for account in users {
        match account.role {
            UserRole::Admin => counts.admins += 1,
            UserRole::Dsa => {
                counts.dsas += 1;
                if !account.is_verified {
                    counts.unverified_dsas += 1;
                }
            }
            UserRole::User => counts.users += 1,
        }
        if !account.is_active {
            counts.inactive += 1;
        }
    }
    counts
}

/// Per-agent workload and outcomes. Agents without assignments are included.
pub fn dsa_performance(
    agents: &[user::Model],
    applications: &[loan_application::Model],
) -> Vec<DsaPerformance> {
    agents
        .iter()
        .filter(|agent| agent.role == UserRole::Dsa)
        .map(|agent| {
            let mine = applications
                .iter()
                .filter(|app| app.assigned_dsa_id == Some(agent.id));
            let (mut assigned, mut approved, mut rejected) = (0, 0, 0);
            for app in mine {
                assigned += 1;
                match app.status {
                    ApplicationStatus::Approved => approved += 1,
                    ApplicationStatus::Rejected => rejected += 1,
                    _ => {}
                }
            }
            DsaPerformance {
                user_id: agent.id,
                name: agent.name.clone(),
                dsa_id: agent.dsa_id.clone(),
                bank: agent.bank.clone(),
                assigned,
                approved,
                rejected,
                pending: assigned - approved - rejected,
                approval_rate: rate(approved, rejected),
            }
        })
        .collect()
}

pub async fn load_statistics<C: ConnectionTrait>(
    db: &C,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<StatisticsReport> {
    let applications = LoanApplication::find()
        .filter(application_scope(actor))
        .all(db)
        .await?;
    debug!(
        actor_id = actor.id,
        role = %actor.role,
        applications = applications.len(),
        "Computing statistics"
    );

    let (users, performance) = if actor.is_admin() {
        let accounts = User::find().order_by_asc(user::Column::Id).all(db).await?;
        (
            Some(count_users(&accounts)),
            Some(dsa_performance(&accounts, &applications)),
        )
    } else {
        (None, None)
    };

    Ok(StatisticsReport {
        scope: actor.role,
        applications: summarize_applications(&applications, now),
        users,
        dsa_performance: performance,
        generated_at: now,
    })
}
