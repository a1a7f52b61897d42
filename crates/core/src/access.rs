//! Role and self-service access policy.
//!
//! Every protected route declares an [`Access`]: the roles allowed to call it
//! and whether a caller may act on their own account regardless of role.

use crate::types::{AccountId, Role};

/// Access was denied.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Access denied")]
pub struct AccessDenied;

/// The access requirement of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Access {
    /// Roles granted access.
    pub roles: &'static [Role],
    /// Whether a caller whose id equals the target id is always allowed.
    pub allow_self: bool,
}

impl Access {
    /// Anyone holding a valid session.
    pub const ANY_ROLE: Self = Self::roles(&[
        Role::SuperAdmin,
        Role::Admin,
        Role::Salesman,
        Role::Client,
    ]);

    /// Only the listed roles.
    #[must_use]
    pub const fn roles(roles: &'static [Role]) -> Self {
        Self {
            roles,
            allow_self: false,
        }
    }

    /// The listed roles, plus the owner of the target account.
    #[must_use]
    pub const fn roles_or_self(roles: &'static [Role]) -> Self {
        Self {
            roles,
            allow_self: true,
        }
    }

    /// Decide whether `caller_id` holding `caller_role` may act on `target`.
    ///
    /// A self match allows unconditionally; otherwise the role must be listed.
    ///
    /// # Errors
    ///
    /// Returns [`AccessDenied`] when neither rule grants access.
    pub fn authorize(
        &self,
        caller_id: AccountId,
        caller_role: Role,
        target: Option<AccountId>,
    ) -> Result<(), AccessDenied> {
        if self.allow_self && target == Some(caller_id) {
            return Ok(());
        }
        if self.roles.contains(&caller_role) {
            return Ok(());
        }
        Err(AccessDenied)
    }
}

/// Route table.
pub mod routes {
    use super::Access;
    use crate::types::Role;

    const SUPERADMIN: &[Role] = &[Role::SuperAdmin];
    const ADMINS: &[Role] = &[Role::SuperAdmin, Role::Admin];
    const STAFF: &[Role] = &[Role::SuperAdmin, Role::Admin, Role::Salesman];
    const SALESMAN: &[Role] = &[Role::Salesman];

    pub const ADMIN_MANAGE: Access = Access::roles(SUPERADMIN);
    pub const ADMIN_SELF: Access = Access::roles_or_self(SUPERADMIN);

    pub const SALESMAN_MANAGE: Access = Access::roles(ADMINS);
    pub const SALESMAN_SELF: Access = Access::roles_or_self(ADMINS);

    pub const CLIENT_MANAGE: Access = Access::roles(ADMINS);
    pub const CLIENT_SELF: Access = Access::roles_or_self(ADMINS);

    pub const CATALOG_WRITE: Access = Access::roles(STAFF);

    pub const SALE_WRITE: Access = Access::roles(STAFF);
    pub const SALE_READ: Access = Access::roles(SALESMAN);
}
