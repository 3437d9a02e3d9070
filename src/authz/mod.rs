pub mod messages;
pub mod ownership;
pub mod pipeline;
pub mod role;

use std::fmt::{self, Display};

use thiserror::Error;

use crate::api::user::UserId;
use crate::api::{
    STATUS_FORBIDDEN, STATUS_INTERNAL_SERVER_ERROR, STATUS_NOT_FOUND, STATUS_UNAUTHORIZED,
};
use crate::auth::{AuthnError, Principal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    #[error("role is not allowed to perform this action")]
    InsufficientRole,

    #[error("principal does not own the resource")]
    NotOwner,

    #[error("admins cannot delete their own account")]
    SelfDeletionForbidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Create,
    Read,
    Update,
    Delete,
    List,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Post,
    User,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::Post => f.write_str("post"),
            ResourceKind::User => f.write_str("user"),
        }
    }
}

/// How a request names the record it acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// An existing record, whose owner must be looked up in the store.
    Stored(u64),

    /// A record being created, owned by whoever the request body claims.
    Claimed(Option<UserId>),
}

/// The facts one check is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionContext {
    pub principal: Principal,
    pub target: Option<Target>,
    pub action: ActionKind,
}

impl ActionContext {
    pub fn new(principal: Principal, target: Option<Target>, action: ActionKind) -> Self {
        Self {
            principal,
            target,
            action,
        }
    }
}

/// Why a request never reached its handler.
#[derive(Debug, Error)]
pub enum Rejection {
    #[error(transparent)]
    Authentication(#[from] AuthnError),

    #[error("{resource} {action:?} denied: {reason}")]
    Authorization {
        reason: DenyReason,
        resource: ResourceKind,
        action: ActionKind,
    },

    #[error("{kind} with id {id} not found")]
    ResourceNotFound { kind: ResourceKind, id: u64 },

    #[error("internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl Rejection {
    pub fn status(&self) -> u32 {
        match self {
            Rejection::Authentication(_) => STATUS_UNAUTHORIZED,
            Rejection::Authorization { .. } => STATUS_FORBIDDEN,
            Rejection::ResourceNotFound { .. } => STATUS_NOT_FOUND,
            Rejection::Internal(_) => STATUS_INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine readable code, stable across locales.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::Authentication(AuthnError::MissingToken) => "missing_token",
            Rejection::Authentication(AuthnError::InvalidToken) => "invalid_token",
            Rejection::Authorization { reason, .. } => match reason {
                DenyReason::InsufficientRole => "insufficient_role",
                DenyReason::NotOwner => "not_owner",
                DenyReason::SelfDeletionForbidden => "self_deletion_forbidden",
            },
            Rejection::ResourceNotFound { .. } => "resource_not_found",
            Rejection::Internal(_) => "internal",
        }
    }
}
