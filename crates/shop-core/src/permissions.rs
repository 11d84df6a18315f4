//! # Permission Matrix
//!
//! Static mapping from (resource, action) to the roles allowed to perform it.
//!
//! ## How a Check Flows
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  PATCH /orders/{id}  (caller: staff viewer)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  authorize(Some(ctx), Orders, Write)                                   │
//! │       │                                                                 │
//! │       ├── no caller?             → Unauthorized                        │
//! │       ├── pair not in matrix?    → NotFound                            │
//! │       ├── role not in row?       → Forbidden  (no side effect)         │
//! │       └── OK → service touches data                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The table is a single exhaustive `match`, so adding a resource, action or
//! role is a compile-time visible change.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::session::{BusinessRole, CallerContext, StaffRole};

// =============================================================================
// Resource / Action / Role
// =============================================================================

/// Resources guarded by the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Resource {
    Products,
    Businesses,
    Users,
    Orders,
    Settings,
    Applications,
    Preorders,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::Products => "products",
            Resource::Businesses => "businesses",
            Resource::Users => "users",
            Resource::Orders => "orders",
            Resource::Settings => "settings",
            Resource::Applications => "applications",
            Resource::Preorders => "preorders",
        }
    }
}

impl FromStr for Resource {
    type Err = CoreError;

    /// Unknown resource names are `NotFound`, never a silent allow.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "products" => Ok(Resource::Products),
            "businesses" => Ok(Resource::Businesses),
            "users" => Ok(Resource::Users),
            "orders" => Ok(Resource::Orders),
            "settings" => Ok(Resource::Settings),
            "applications" => Ok(Resource::Applications),
            "preorders" => Ok(Resource::Preorders),
            other => Err(CoreError::not_found("Resource", other)),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller wants to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Action {
    Read,
    Write,
    Delete,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Write => "write",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role from either role space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Staff(StaffRole),
    Business(BusinessRole),
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Staff(r) => write!(f, "staff:{}", r),
            Role::Business(r) => write!(f, "business:{}", r),
        }
    }
}

// =============================================================================
// The Matrix
// =============================================================================

use BusinessRole as B;
use StaffRole as S;

const ALL_STAFF: &[Role] = &[
    Role::Staff(S::Owner),
    Role::Staff(S::Manager),
    Role::Staff(S::Inventory),
    Role::Staff(S::Orders),
    Role::Staff(S::Hr),
    Role::Staff(S::Viewer),
];

/// Returns the roles allowed for a pair, or `None` when the pair is not
/// part of the matrix at all.
pub fn allowed_roles(resource: Resource, action: Action) -> Option<&'static [Role]> {
    let roles: &'static [Role] = match (resource, action) {
        // Catalog is visible to everyone signed in; staff with stock rights edit it.
        (Resource::Products, Action::Read) => &[
            Role::Staff(S::Owner),
            Role::Staff(S::Manager),
            Role::Staff(S::Inventory),
            Role::Staff(S::Orders),
            Role::Staff(S::Hr),
            Role::Staff(S::Viewer),
            Role::Business(B::Owner),
            Role::Business(B::Manager),
            Role::Business(B::Employee),
        ],
        (Resource::Products, Action::Write) | (Resource::Products, Action::Delete) => {
            &[Role::Staff(S::Owner), Role::Staff(S::Inventory)]
        }

        (Resource::Businesses, Action::Read) => &[
            Role::Staff(S::Owner),
            Role::Staff(S::Manager),
            Role::Staff(S::Orders),
            Role::Staff(S::Viewer),
            Role::Business(B::Owner),
            Role::Business(B::Manager),
        ],
        (Resource::Businesses, Action::Write) | (Resource::Businesses, Action::Delete) => {
            &[Role::Staff(S::Owner), Role::Staff(S::Manager)]
        }

        (Resource::Users, _) => &[Role::Staff(S::Owner), Role::Staff(S::Hr)],

        (Resource::Orders, Action::Read) => &[
            Role::Staff(S::Owner),
            Role::Staff(S::Manager),
            Role::Staff(S::Inventory),
            Role::Staff(S::Orders),
            Role::Staff(S::Viewer),
            Role::Business(B::Owner),
            Role::Business(B::Manager),
            Role::Business(B::Employee),
        ],
        // Business roles write orders by placing them; status changes are staff-only
        // and additionally require a staff context.
        (Resource::Orders, Action::Write) => &[
            Role::Staff(S::Owner),
            Role::Staff(S::Orders),
            Role::Business(B::Owner),
            Role::Business(B::Manager),
            Role::Business(B::Employee),
        ],
        (Resource::Orders, Action::Delete) => return None,

        (Resource::Settings, Action::Read) | (Resource::Settings, Action::Write) => {
            &[Role::Staff(S::Owner)]
        }
        (Resource::Settings, Action::Delete) => return None,

        (Resource::Applications, _) => &[Role::Staff(S::Owner), Role::Staff(S::Hr)],

        (Resource::Preorders, Action::Read) => &[
            Role::Staff(S::Owner),
            Role::Staff(S::Inventory),
            Role::Staff(S::Orders),
            Role::Staff(S::Viewer),
            Role::Business(B::Owner),
            Role::Business(B::Manager),
            Role::Business(B::Employee),
        ],
        (Resource::Preorders, Action::Write) => &[
            Role::Staff(S::Owner),
            Role::Staff(S::Inventory),
            Role::Business(B::Owner),
            Role::Business(B::Manager),
            Role::Business(B::Employee),
        ],
        (Resource::Preorders, Action::Delete) => return None,
    };
    Some(roles)
}

/// `isAllowed(resource, action, role)`. No role means no access.
pub fn is_allowed(resource: Resource, action: Action, role: Option<Role>) -> bool {
    match (allowed_roles(resource, action), role) {
        (Some(roles), Some(role)) => roles.contains(&role),
        _ => false,
    }
}

/// Checks the caller against the matrix, producing the error the caller
/// should see.
pub fn authorize(
    caller: Option<&CallerContext>,
    resource: Resource,
    action: Action,
) -> CoreResult<()> {
    let caller = caller.ok_or(CoreError::Unauthorized)?;
    let roles = allowed_roles(resource, action).ok_or_else(|| {
        CoreError::not_found("Permission", format!("{}:{}", resource, action))
    })?;

    let role = caller.role();
    if roles.contains(&role) {
        Ok(())
    } else {
        Err(CoreError::Forbidden {
            resource: resource.to_string(),
            action: action.to_string(),
            role: role.to_string(),
        })
    }
}

/// Like [`authorize`], and additionally requires a staff caller.
///
/// Used for order status changes and preorder decisions, which business
/// users never perform even though they can write orders and preorders.
pub fn authorize_staff(
    caller: Option<&CallerContext>,
    resource: Resource,
    action: Action,
) -> CoreResult<StaffRole> {
    authorize(caller, resource, action)?;
    match caller {
        Some(CallerContext::Staff { role, .. }) => Ok(*role),
        Some(other) => Err(CoreError::Forbidden {
            resource: resource.to_string(),
            action: action.to_string(),
            role: other.role().to_string(),
        }),
        None => Err(CoreError::Unauthorized),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
