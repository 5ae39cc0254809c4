//! Document completeness of an application.
//!
//! Nothing is stored: the report is recomputed from the non-deleted uploads
//! each time it is asked for.

use std::collections::BTreeSet;

use model::entities::loan_application;
use model::enums::{DocumentType, LoanType};
use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::documents::active_documents;
use crate::error::Result;

use DocumentType::*;

const DOMESTIC: &[DocumentType] = &[
    IdentityProof,
    AddressProof,
    Photograph,
    AcademicRecords,
    AdmissionLetter,
    FeeStructure,
    IncomeProof,
];

const ABROAD: &[DocumentType] = &[
    IdentityProof,
    AddressProof,
    Photograph,
    AcademicRecords,
    AdmissionLetter,
    IncomeProof,
    Passport,
    TestScores,
    CostOfAttendance,
];

const VOCATIONAL: &[DocumentType] = &[
    IdentityProof,
    AddressProof,
    Photograph,
    AdmissionLetter,
    FeeStructure,
];

pub fn required_documents(loan_type: LoanType) -> &'static [DocumentType] {
    match loan_type {
        LoanType::Domestic => DOMESTIC,
        LoanType::Abroad => ABROAD,
        LoanType::Vocational => VOCATIONAL,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CompletenessReport {
    pub loan_type: LoanType,
    pub required: Vec<DocumentType>,
    /// Required types with at least one upload.
    pub submitted: Vec<DocumentType>,
    pub missing: Vec<DocumentType>,
    /// Uploaded types that are not required for this loan type.
    pub extra: Vec<DocumentType>,
    pub percentage: f64,
    pub is_complete: bool,
}

/// Compares uploaded types against a required set.
pub fn completeness_of(
    loan_type: LoanType,
    required: &[DocumentType],
    uploaded: impl IntoIterator<Item = DocumentType>,
) -> CompletenessReport {
    let required: BTreeSet<DocumentType> = required.iter().copied().collect();
    let uploaded: BTreeSet<DocumentType> = uploaded.into_iter().collect();

    let submitted: Vec<_> = required.intersection(&uploaded).copied().collect();
    let missing: Vec<_> = required.difference(&uploaded).copied().collect();
    let extra: Vec<_> = uploaded.difference(&required).copied().collect();

    let percentage = if required.is_empty() {
        100.0
    } else {
        (submitted.len() as f64 / required.len() as f64 * 100.0).clamp(0.0, 100.0)
    };

    CompletenessReport {
        loan_type,
        required: required.into_iter().collect(),
        is_complete: missing.is_empty(),
        submitted,
        missing,
        extra,
        percentage,
    }
}

pub fn compute_completeness(
    loan_type: LoanType,
    uploaded: impl IntoIterator<Item = DocumentType>,
) -> CompletenessReport {
    completeness_of(loan_type, required_documents(loan_type), uploaded)
}

pub async fn application_completeness<C: ConnectionTrait>(
    db: &C,
    application: &loan_application::Model,
) -> Result<CompletenessReport> {
    let documents = active_documents(db, application.id).await?;
    Ok(compute_completeness(
        application.loan_type,
        documents.into_iter().map(|document| document.document_type),
    ))
}
