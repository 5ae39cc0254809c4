//! Closed vocabularies stored as short strings.
//!
//! Each enum is both a SeaORM active enum and a serde/OpenAPI type, so the
//! value written to the database is the same snake_case string the REST API
//! accepts and returns.

use sea_orm::entity::prelude::*;
use sea_orm::Iterable;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Role of an account. Drives every authorization decision.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[sea_orm(string_value = "admin")]
    Admin,
    /// Direct Sales Agent, a bank-affiliated loan officer.
    #[sea_orm(string_value = "dsa")]
    Dsa,
    /// Applicant.
    #[sea_orm(string_value = "user")]
    User,
}

/// Lifecycle status of a loan application.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "under_review")]
    UnderReview,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl ApplicationStatus {
    /// Approved and rejected applications are decided.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// Kind of education loan. Selects the required document set.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum LoanType {
    /// Study at an institution in the home country.
    #[sea_orm(string_value = "domestic")]
    Domestic,
    /// Study abroad.
    #[sea_orm(string_value = "abroad")]
    Abroad,
    /// Short vocational or skill course.
    #[sea_orm(string_value = "vocational")]
    Vocational,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

impl Priority {
    pub fn is_elevated(self) -> bool {
        matches!(self, Self::High | Self::Urgent)
    }
}

/// Tag attached to every uploaded document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(30))")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[sea_orm(string_value = "identity_proof")]
    IdentityProof,
    #[sea_orm(string_value = "address_proof")]
    AddressProof,
    #[sea_orm(string_value = "photograph")]
    Photograph,
    #[sea_orm(string_value = "academic_records")]
    AcademicRecords,
    #[sea_orm(string_value = "admission_letter")]
    AdmissionLetter,
    #[sea_orm(string_value = "fee_structure")]
    FeeStructure,
    #[sea_orm(string_value = "income_proof")]
    IncomeProof,
    #[sea_orm(string_value = "passport")]
    Passport,
    /// Standardised test results (GRE, IELTS, TOEFL, ...).
    #[sea_orm(string_value = "test_scores")]
    TestScores,
    #[sea_orm(string_value = "cost_of_attendance")]
    CostOfAttendance,
    #[sea_orm(string_value = "bank_statement")]
    BankStatement,
    #[sea_orm(string_value = "other")]
    Other,
}

impl DocumentType {
    /// Parses the snake_case form used in multipart field names.
    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::iter().find(|kind| kind.to_value() == name)
    }
}

/// Support ticket workflow status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "closed")]
    Closed,
}

/// Actions recorded in the DSA activity log.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(30))")]
#[serde(rename_all = "snake_case")]
pub enum DsaAction {
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "status_updated")]
    StatusUpdated,
    #[sea_orm(string_value = "document_uploaded")]
    DocumentUploaded,
    #[sea_orm(string_value = "message_sent")]
    MessageSent,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    #[sea_orm(string_value = "info")]
    Info,
    #[sea_orm(string_value = "warn")]
    Warn,
    #[sea_orm(string_value = "error")]
    Error,
}

macro_rules! display_as_db_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.to_value())
                }
            }
        )*
    };
}

display_as_db_value!(
    UserRole,
    ApplicationStatus,
    LoanType,
    Priority,
    DocumentType,
    TicketStatus,
    DsaAction,
    LogLevel,
);
