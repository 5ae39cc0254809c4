//! Role to capability dispatch.
//!
//! Every authorization decision goes through [`RoleCapabilities::capabilities`],
//! an exhaustive match over [`UserRole`]. A new role does not compile until
//! it is given a capability set here.

use model::enums::UserRole;
use tracing::warn;

use crate::error::{LifecycleError, Result};

/// A named permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    SubmitApplication,
    /// See every application regardless of owner or assignee.
    ViewAllApplications,
    /// See applications assigned to oneself.
    ViewAssignedApplications,
    /// See applications one submitted.
    ViewOwnApplications,
    UpdateApplicationStatus,
    /// Move an approved or rejected application back to review.
    ReopenDecidedApplication,
    AssignDsa,
    UploadDocuments,
    ManageUsers,
    OpenTicket,
    ManageTickets,
    ViewDsaActivity,
    ViewSystemLogs,
}

const ADMIN_CAPABILITIES: &[Capability] = &[
    Capability::ViewAllApplications,
    Capability::UpdateApplicationStatus,
    Capability::ReopenDecidedApplication,
    Capability::AssignDsa,
    Capability::UploadDocuments,
    Capability::ManageUsers,
    Capability::ManageTickets,
    Capability::ViewDsaActivity,
    Capability::ViewSystemLogs,
];

const DSA_CAPABILITIES: &[Capability] = &[
    Capability::ViewAssignedApplications,
    Capability::UpdateApplicationStatus,
    Capability::ViewDsaActivity,
];

const USER_CAPABILITIES: &[Capability] = &[
    Capability::SubmitApplication,
    Capability::ViewOwnApplications,
    Capability::UploadDocuments,
    Capability::OpenTicket,
];

/// Capability table lookup for a role.
pub trait RoleCapabilities {
    fn capabilities(self) -> &'static [Capability];

    fn grants(self, capability: Capability) -> bool;
}

impl RoleCapabilities for UserRole {
    fn capabilities(self) -> &'static [Capability] {
        match self {
            UserRole::Admin => ADMIN_CAPABILITIES,
            UserRole::Dsa => DSA_CAPABILITIES,
            UserRole::User => USER_CAPABILITIES,
        }
    }

    fn grants(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: i32,
    pub role: UserRole,
}

impl Actor {
    pub fn new(id: i32, role: UserRole) -> Self {
        Self { id, role }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.grants(capability)
    }

    /// Fails with [`LifecycleError::Forbidden`] unless the role grants `capability`.
    pub fn require(&self, capability: Capability) -> Result<()> {
        if self.can(capability) {
            Ok(())
        } else {
            warn!(
                actor_id = self.id,
                role = %self.role,
                ?capability,
                "Capability denied"
            );
            Err(LifecycleError::Forbidden(format!(
                "role '{}' may not perform {:?}",
                self.role, capability
            )))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applicants_cannot_update_status() {
        let actor = Actor::new(7, UserRole::User);
        assert!(!actor.can(Capability::UpdateApplicationStatus));
        assert!(matches!(
            actor.require(Capability::UpdateApplicationStatus),
            Err(LifecycleError::Forbidden(_))
        ));
    }

    #[test]
    fn only_admins_assign_and_reopen() {
        assert!(UserRole::Admin.grants(Capability::AssignDsa));
        assert!(UserRole::Admin.grants(Capability::ReopenDecidedApplication));
        assert!(!UserRole::Dsa.grants(Capability::AssignDsa));
        assert!(!UserRole::Dsa.grants(Capability::ReopenDecidedApplication));
        assert!(!UserRole::User.grants(Capability::AssignDsa));
    }

    #[test]
    fn only_applicants_submit() {
        assert!(UserRole::User.grants(Capability::SubmitApplication));
        assert!(!UserRole::Dsa.grants(Capability::SubmitApplication));
        assert!(!UserRole::Admin.grants(Capability::SubmitApplication));
    }

    #[test]
    fn only_applicants_open_tickets() {
        assert!(UserRole::User.grants(Capability::OpenTicket));
        assert!(!UserRole::Dsa.grants(Capability::OpenTicket));
        assert!(!UserRole::Admin.grants(Capability::OpenTicket));
    }
}
