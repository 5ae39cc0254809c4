//! Persistent records of the loan portal, mapped with SeaORM.

pub mod entities;
pub mod enums;

// Re-export tracing for use in this crate
pub use tracing;
