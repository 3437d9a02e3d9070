use crate::api::user::Role;
use crate::auth::Principal;

use super::{Decision, DenyReason};

/// Allows the principal iff its role is one of `required_any_of`.
pub fn check_role(principal: &Principal, required_any_of: &[Role]) -> Decision {
    if required_any_of.contains(&principal.role) {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::InsufficientRole)
    }
}

/// Denies the principal iff its role is `forbidden`.
pub fn check_not_role(principal: &Principal, forbidden: Role) -> Decision {
    if principal.role == forbidden {
        Decision::Deny(DenyReason::InsufficientRole)
    } else {
        Decision::Allow
    }
}
