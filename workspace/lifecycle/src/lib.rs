//! Domain rules of the loan portal.
//!
//! Handlers in the server crate authenticate the caller and then call into
//! this crate, which owns authorization by capability, the status workflow,
//! DSA assignment, document completeness, derived notifications and
//! statistics. Functions take the clock as an argument so behavior is
//! reproducible in tests.

pub mod access;
pub mod accounts;
pub mod assignment;
pub mod audit;
pub mod completeness;
pub mod documents;
pub mod error;
pub mod messages;
pub mod notifications;
pub mod numbering;
pub mod roles;
pub mod statistics;
pub mod submission;
pub mod tickets;
pub mod transitions;

#[cfg(test)]
mod test_support;

pub use error::{LifecycleError, Result};
pub use roles::{Actor, Capability, RoleCapabilities};
