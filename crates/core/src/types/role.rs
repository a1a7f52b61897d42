//! Account roles and the account kinds routes are scoped to.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Role carried by every account and by every session token.
///
/// Stored as the `storehouse.account_role` enum. Postgres reports the column
/// type unqualified, so the type is declared by its bare name and resolved
/// through the pool's `search_path`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "account_role", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The single top-level administrator, seeded from the environment.
    SuperAdmin,
    /// Manages salesmen, clients and the catalog.
    Admin,
    /// Lists products and records sales.
    Salesman,
    /// Purchases products.
    Client,
}

impl Role {
    /// The account kind this role belongs to.
    #[must_use]
    pub const fn kind(self) -> AccountKind {
        match self {
            Self::SuperAdmin | Self::Admin => AccountKind::Admin,
            Self::Salesman => AccountKind::Salesman,
            Self::Client => AccountKind::Client,
        }
    }

    /// How long a session token issued to this role stays valid.
    ///
    /// Administrators get 2 hours, salesmen and clients 4 hours.
    #[must_use]
    pub const fn session_lifetime(self) -> Duration {
        match self {
            Self::SuperAdmin | Self::Admin => Duration::from_secs(2 * 60 * 60),
            Self::Salesman | Self::Client => Duration::from_secs(4 * 60 * 60),
        }
    }

    /// Wire name of the role.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SuperAdmin => "superadmin",
            Self::Admin => "admin",
            Self::Salesman => "salesman",
            Self::Client => "client",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "superadmin" => Ok(Self::SuperAdmin),
            "admin" => Ok(Self::Admin),
            "salesman" => Ok(Self::Salesman),
            "client" => Ok(Self::Client),
            _ => Err(format!("invalid role: {s}")),
        }
    }
}

/// The audience a set of account routes serves.
///
/// `/api/admin/*` serves both super admins and admins; sign-in through one
/// kind's routes never finds an account of another kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Admin,
    Salesman,
    Client,
}

impl AccountKind {
    /// Roles that belong to this kind.
    #[must_use]
    pub const fn roles(self) -> &'static [Role] {
        match self {
            Self::Admin => &[Role::SuperAdmin, Role::Admin],
            Self::Salesman => &[Role::Salesman],
            Self::Client => &[Role::Client],
        }
    }

    /// Role assigned to newly created accounts of this kind.
    #[must_use]
    pub const fn default_role(self) -> Role {
        match self {
            Self::Admin => Role::Admin,
            Self::Salesman => Role::Salesman,
            Self::Client => Role::Client,
        }
    }

    /// Capitalized label used in user-facing messages ("Salesman not found").
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Admin => "Admin",
            Self::Salesman => "Salesman",
            Self::Client => "Client",
        }
    }

    /// Whether `role` belongs to this kind.
    #[must_use]
    pub fn includes(self, role: Role) -> bool {
        role.kind() == self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_roundtrip_str() {
        for role in [Role::SuperAdmin, Role::Admin, Role::Salesman, Role::Client] {
            assert_eq!(role.to_string().parse::<Role>().unwrap(), role);
        }
        assert!("viewer".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde_lowercase() {
        assert_eq!(
            serde_json::to_string(&Role::SuperAdmin).unwrap(),
            "\"superadmin\""
        );
        let role: Role = serde_json::from_str("\"salesman\"").unwrap();
        assert_eq!(role, Role::Salesman);
    }

    #[test]
    fn test_session_lifetime_by_role() {
        let two_hours = Duration::from_secs(7200);
        let four_hours = Duration::from_secs(14400);
        assert_eq!(Role::SuperAdmin.session_lifetime(), two_hours);
        assert_eq!(Role::Admin.session_lifetime(), two_hours);
        assert_eq!(Role::Salesman.session_lifetime(), four_hours);
        assert_eq!(Role::Client.session_lifetime(), four_hours);
    }

    #[cfg(feature = "postgres")]
    #[test]
    fn test_sql_type_name_is_unqualified() {
        use sqlx::TypeInfo;

        let info = <Role as sqlx::Type<sqlx::Postgres>>::type_info();
        assert_eq!(info.name(), "account_role");
    }

    #[test]
    fn test_kind_membership() {
        assert!(AccountKind::Admin.includes(Role::SuperAdmin));
        assert!(AccountKind::Admin.includes(Role::Admin));
        assert!(!AccountKind::Admin.includes(Role::Salesman));
        assert!(AccountKind::Client.includes(Role::Client));
        assert_eq!(AccountKind::Salesman.default_role(), Role::Salesman);
    }
}
