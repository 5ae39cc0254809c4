use model::enums::{ApplicationStatus, TicketStatus};
use thiserror::Error;

/// Error types for the lifecycle module
#[derive(Error, Debug)]
pub enum LifecycleError {
    /// Error from the database operations
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A referenced record does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// The actor's role or relation to the record does not allow the operation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Input failed a domain rule
    #[error("Validation error: {0}")]
    Validation(String),

    /// The requested status is not reachable from the current one
    #[error("Cannot move application from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },

    /// The requested ticket status is not reachable from the current one
    #[error("Cannot move ticket from {from} to {to}")]
    InvalidTicketTransition { from: TicketStatus, to: TicketStatus },

    /// A unique value such as an email is already taken
    #[error("{0}")]
    Duplicate(String),

    /// Optimistic concurrency check failed
    #[error("Application was modified concurrently (expected version {expected}, found {actual})")]
    Conflict { expected: i32, actual: i32 },

    /// Identifier generation kept colliding with existing rows
    #[error("Could not generate a unique {0}")]
    Exhausted(&'static str),
}

impl LifecycleError {
    pub(crate) fn application_not_found(id: i32) -> Self {
        Self::NotFound(format!("Application {id}"))
    }
}

/// Type alias for Result with LifecycleError
pub type Result<T> = std::result::Result<T, LifecycleError>;
