//! # Caller Context
//!
//! The resolved identity of whoever is calling the engine. Authentication
//! happens elsewhere; this crate only consumes its outcome.
//!
//! ```text
//! ┌──────────────────────────────┐    ┌──────────────────────────────────┐
//! │ CallerContext::Staff         │    │ CallerContext::Business          │
//! │  username                    │    │  username                        │
//! │  role: StaffRole             │    │  role: BusinessRole              │
//! │  (not scoped to a tenant)    │    │  business_id (owning tenant)     │
//! └──────────────────────────────┘    └──────────────────────────────────┘
//! ```
//!
//! The two role spaces are disjoint: a business `owner` is not a staff
//! `owner`, and the type system keeps them apart.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::permissions::Role;

// =============================================================================
// Staff Role
// =============================================================================

/// Roles held by shop staff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum StaffRole {
    Owner,
    Manager,
    Inventory,
    Orders,
    Hr,
    Viewer,
}

impl StaffRole {
    pub const ALL: [StaffRole; 6] = [
        StaffRole::Owner,
        StaffRole::Manager,
        StaffRole::Inventory,
        StaffRole::Orders,
        StaffRole::Hr,
        StaffRole::Viewer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StaffRole::Owner => "owner",
            StaffRole::Manager => "manager",
            StaffRole::Inventory => "inventory",
            StaffRole::Orders => "orders",
            StaffRole::Hr => "hr",
            StaffRole::Viewer => "viewer",
        }
    }
}

impl FromStr for StaffRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StaffRole::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "staff_role".to_string(),
                allowed: StaffRole::ALL.iter().map(|r| r.as_str().to_string()).collect(),
            })
    }
}

impl fmt::Display for StaffRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Business Role
// =============================================================================

/// Roles held by users of a tenant business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum BusinessRole {
    Owner,
    Manager,
    Employee,
}

impl BusinessRole {
    pub const ALL: [BusinessRole; 3] = [
        BusinessRole::Owner,
        BusinessRole::Manager,
        BusinessRole::Employee,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessRole::Owner => "owner",
            BusinessRole::Manager => "manager",
            BusinessRole::Employee => "employee",
        }
    }
}

impl FromStr for BusinessRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BusinessRole::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "biz_role".to_string(),
                allowed: BusinessRole::ALL
                    .iter()
                    .map(|r| r.as_str().to_string())
                    .collect(),
            })
    }
}

impl fmt::Display for BusinessRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Caller Context
// =============================================================================

/// Who is calling, as resolved by the session layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CallerContext {
    Staff {
        username: String,
        role: StaffRole,
    },
    Business {
        username: String,
        role: BusinessRole,
        business_id: String,
    },
}

impl CallerContext {
    pub fn staff(username: impl Into<String>, role: StaffRole) -> Self {
        CallerContext::Staff {
            username: username.into(),
            role,
        }
    }

    pub fn business(
        username: impl Into<String>,
        role: BusinessRole,
        business_id: impl Into<String>,
    ) -> Self {
        CallerContext::Business {
            username: username.into(),
            role,
            business_id: business_id.into(),
        }
    }

    pub fn username(&self) -> &str {
        match self {
            CallerContext::Staff { username, .. } | CallerContext::Business { username, .. } => {
                username
            }
        }
    }

    /// The role used for permission checks.
    pub fn role(&self) -> Role {
        match self {
            CallerContext::Staff { role, .. } => Role::Staff(*role),
            CallerContext::Business { role, .. } => Role::Business(*role),
        }
    }

    /// The tenant a business caller is scoped to; `None` for staff.
    pub fn business_scope(&self) -> Option<&str> {
        match self {
            CallerContext::Staff { .. } => None,
            CallerContext::Business { business_id, .. } => Some(business_id),
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, CallerContext::Staff { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parsing() {
        assert_eq!("inventory".parse::<StaffRole>().unwrap(), StaffRole::Inventory);
        assert_eq!("employee".parse::<BusinessRole>().unwrap(), BusinessRole::Employee);
        assert!("employee".parse::<StaffRole>().is_err());
        assert!("hr".parse::<BusinessRole>().is_err());
    }

    #[test]
    fn test_context_accessors() {
        let staff = CallerContext::staff("admin", StaffRole::Owner);
        assert_eq!(staff.username(), "admin");
        assert_eq!(staff.business_scope(), None);
        assert_eq!(staff.role(), Role::Staff(StaffRole::Owner));

        let biz = CallerContext::business("anna", BusinessRole::Owner, "b-1");
        assert_eq!(biz.business_scope(), Some("b-1"));
        assert_ne!(biz.role(), Role::Staff(StaffRole::Owner));
        assert!(!biz.is_staff());
    }
}
