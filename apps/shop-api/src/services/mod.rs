//! Request services.
//!
//! Every service method authorizes the caller against the permission matrix
//! and validates its input before a repository is touched. Handlers in
//! [`crate::routes`] only extract and respond.

pub mod catalog_service;
pub mod order_service;
pub mod preorder_service;
pub mod resource_service;

use shop_core::{Action, CallerContext, CoreError, Resource};

use crate::error::{ApiError, ApiResult};

/// The caller, once `authorize` has established there is one.
pub(crate) fn require_caller(caller: Option<&CallerContext>) -> ApiResult<&CallerContext> {
    caller.ok_or_else(|| CoreError::Unauthorized.into())
}

/// Business callers act only for their own tenant and only as themselves.
///
/// Staff may act on behalf of any business.
pub(crate) fn ensure_own_tenant(
    caller: &CallerContext,
    resource: Resource,
    business_id: &str,
    acting_as: &str,
) -> ApiResult<()> {
    match caller {
        CallerContext::Staff { .. } => Ok(()),
        CallerContext::Business {
            username,
            business_id: own,
            ..
        } if own == business_id && username == acting_as => Ok(()),
        CallerContext::Business { .. } => Err(ApiError::from(CoreError::Forbidden {
            resource: resource.to_string(),
            action: Action::Write.to_string(),
            role: caller.role().to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use shop_core::{BusinessRole, StaffRole};

    #[test]
    fn test_business_caller_cannot_act_for_another_tenant() {
        let anna = CallerContext::business("anna", BusinessRole::Employee, "b-1");

        assert!(ensure_own_tenant(&anna, Resource::Orders, "b-1", "anna").is_ok());

        let other_tenant = ensure_own_tenant(&anna, Resource::Orders, "b-2", "anna").unwrap_err();
        assert_eq!(other_tenant.code, ErrorCode::Forbidden);

        let impersonation = ensure_own_tenant(&anna, Resource::Orders, "b-1", "emil").unwrap_err();
        assert_eq!(impersonation.code, ErrorCode::Forbidden);
    }

    #[test]
    fn test_staff_may_act_for_any_tenant() {
        let staff = CallerContext::staff("maria", StaffRole::Orders);
        assert!(ensure_own_tenant(&staff, Resource::Orders, "b-9", "anna").is_ok());
    }
}
