use crate::api::user::{Role, UserId};
use crate::auth::Principal;

use super::{ActionKind, Decision, DenyReason, ResourceKind};

/// Decides whether `principal` may perform `action` on a `resource` owned by
/// `owner`.
///
/// For stored resources the owner has already been looked up (a user record
/// owns itself). For a post being created the owner is the one named by the
/// request, and `None` means the request named nobody.
pub fn check_ownership(
    principal: &Principal,
    resource: ResourceKind,
    owner: Option<UserId>,
    action: ActionKind,
) -> Decision {
    let owns = owner == Some(principal.id);

    match (resource, action) {
        (ResourceKind::Post, ActionKind::Update | ActionKind::Delete) => match principal.role {
            Role::Admin => Decision::Allow,
            Role::User if owns => Decision::Allow,
            Role::User => Decision::Deny(DenyReason::NotOwner),
        },

        (ResourceKind::User, ActionKind::Delete) => match principal.role {
            Role::User => Decision::Deny(DenyReason::InsufficientRole),
            Role::Admin if owns => Decision::Deny(DenyReason::SelfDeletionForbidden),
            Role::Admin => Decision::Allow,
        },

        (ResourceKind::User, ActionKind::Update) => match principal.role {
            Role::Admin => Decision::Allow,
            Role::User if owns => Decision::Allow,
            Role::User => Decision::Deny(DenyReason::NotOwner),
        },

        // Admins get no override here: nobody writes posts in someone else's name.
        (ResourceKind::Post, ActionKind::Create) => {
            if owns {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::NotOwner)
            }
        }

        (ResourceKind::Post, ActionKind::Read | ActionKind::List)
        | (ResourceKind::User, ActionKind::Create | ActionKind::Read | ActionKind::List) => {
            Decision::Allow
        }
    }
}
