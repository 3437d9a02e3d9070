use anyhow::{anyhow, Result};
use log::debug;

use crate::api::user::{Role, UserId};
use crate::auth::{self, Principal, TokenVerifier};

use super::ownership::check_ownership;
use super::role::{check_not_role, check_role};
use super::{ActionContext, ActionKind, Decision, Rejection, ResourceKind, Target};

/// Runs the role checks of `$route`, returning the `Authorized` stage or the
/// rejection response. Needs nothing from the request body, so it runs before
/// parsing.
#[macro_export]
macro_rules! authorize_request {
    ($sc:expr, $stage:expr, $route:expr) => {{
        match $sc.pipeline().authorize($stage, $route) {
            $crate::authz::pipeline::Stage::Rejected(rejection) => {
                return $crate::handlers::reject($sc, rejection)
            }
            stage => stage,
        }
    }};
}

/// Runs the ownership checks of `$route` against the target named by the
/// parsed request, returning the admitted principal or the rejection response.
#[macro_export]
macro_rules! admit_request {
    ($sc:expr, $stage:expr, $route:expr, $parsed:expr) => {{
        let target = $crate::api::Request::target(&$parsed);
        match $sc.pipeline().admit($stage, $route, target).into_result() {
            Ok(principal) => principal,
            Err(rejection) => return $crate::handlers::reject($sc, rejection),
        }
    }};
}

/// One gate a route puts between an authenticated principal and its handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Check {
    AnyRole(&'static [Role]),
    NotRole(Role),
    Ownership,
}

impl Check {
    pub fn is_role(&self) -> bool {
        matches!(self, Check::AnyRole(_) | Check::NotRole(_))
    }
}

const MANAGE_USERS: Check = Check::AnyRole(&[Role::Admin, Role::User]);

/// Every protected route. Public routes (register, login, healthz) never enter
/// the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    ListUsers,
    CreateUser,
    GetUser,
    UpdateUser,
    DeleteUser,
    ListPosts,
    CreatePost,
    GetPost,
    UpdatePost,
    DeletePost,
    Logout,
}

impl Route {
    pub const ALL: [Route; 11] = [
        Route::ListUsers,
        Route::CreateUser,
        Route::GetUser,
        Route::UpdateUser,
        Route::DeleteUser,
        Route::ListPosts,
        Route::CreatePost,
        Route::GetPost,
        Route::UpdatePost,
        Route::DeletePost,
        Route::Logout,
    ];

    /// The checks run for this route, in order.
    pub fn checks(&self) -> &'static [Check] {
        match self {
            Route::ListUsers | Route::GetUser => &[MANAGE_USERS],
            Route::CreateUser => &[MANAGE_USERS, Check::NotRole(Role::User)],
            Route::UpdateUser => &[MANAGE_USERS, Check::Ownership],
            Route::DeleteUser => &[Check::NotRole(Role::User), Check::Ownership],
            Route::CreatePost | Route::UpdatePost | Route::DeletePost => &[Check::Ownership],
            Route::ListPosts | Route::GetPost | Route::Logout => &[],
        }
    }

    pub fn resource(&self) -> Option<ResourceKind> {
        match self {
            Route::ListUsers
            | Route::CreateUser
            | Route::GetUser
            | Route::UpdateUser
            | Route::DeleteUser => Some(ResourceKind::User),
            Route::ListPosts
            | Route::CreatePost
            | Route::GetPost
            | Route::UpdatePost
            | Route::DeletePost => Some(ResourceKind::Post),
            Route::Logout => None,
        }
    }

    pub fn action(&self) -> ActionKind {
        match self {
            Route::ListUsers | Route::ListPosts => ActionKind::List,
            Route::CreateUser | Route::CreatePost => ActionKind::Create,
            Route::GetUser | Route::GetPost => ActionKind::Read,
            Route::UpdateUser | Route::UpdatePost => ActionKind::Update,
            Route::DeleteUser | Route::DeletePost | Route::Logout => ActionKind::Delete,
        }
    }
}

/// Answers "who owns this record?" at check time.
pub trait OwnerStore {
    /// Returns `None` when the record does not exist. A user owns itself.
    fn find_owner(&self, kind: ResourceKind, id: u64) -> Result<Option<UserId>>;
}

/// Where a request stands on its way to the handler.
#[derive(Debug)]
pub enum Stage {
    Unauthenticated,
    Authenticated(Principal),
    Authorized(Principal),
    Admitted(Principal),
    Rejected(Rejection),
}

impl Stage {
    pub fn into_result(self) -> Result<Principal, Rejection> {
        match self {
            Stage::Admitted(principal) => Ok(principal),
            Stage::Rejected(rejection) => Err(rejection),
            stage => Err(Rejection::Internal(anyhow!(
                "request left the pipeline early at {stage:?}"
            ))),
        }
    }

    fn unexpected(self, step: &str) -> Stage {
        match self {
            Stage::Rejected(rejection) => Stage::Rejected(rejection),
            stage => Stage::Rejected(Rejection::Internal(anyhow!(
                "cannot {step} a request at {stage:?}"
            ))),
        }
    }
}

pub struct Pipeline<'a, V: ?Sized, S: ?Sized> {
    verifier: &'a V,
    store: &'a S,
}

impl<'a, V, S> Pipeline<'a, V, S>
where
    V: TokenVerifier + ?Sized,
    S: OwnerStore + ?Sized,
{
    pub fn new(verifier: &'a V, store: &'a S) -> Self {
        Self { verifier, store }
    }

    /// Drives a request through every stage and returns the admitted principal
    /// or the first rejection.
    pub fn run(
        &self,
        route: Route,
        token: Option<&str>,
        target: Option<Target>,
    ) -> Result<Principal, Rejection> {
        let stage = self.authenticate(token);
        let stage = self.authorize(stage, route);
        let stage = self.admit(stage, route, target);
        stage.into_result()
    }

    pub fn authenticate(&self, token: Option<&str>) -> Stage {
        match auth::resolve(self.verifier, token) {
            Ok(principal) => Stage::Authenticated(principal),
            Err(rejection) => Stage::Rejected(rejection),
        }
    }

    /// Runs the role checks of `route`.
    pub fn authorize(&self, stage: Stage, route: Route) -> Stage {
        let principal = match stage {
            Stage::Authenticated(principal) => principal,
            stage => return stage.unexpected("authorize"),
        };

        for check in route.checks().iter().filter(|c| c.is_role()) {
            let decision = match check {
                Check::AnyRole(roles) => check_role(&principal, roles),
                Check::NotRole(role) => check_not_role(&principal, *role),
                Check::Ownership => continue,
            };
            debug!("{route:?} {check:?} for {principal:?}: {decision:?}");

            if let Decision::Deny(reason) = decision {
                return Stage::Rejected(self.denied(route, reason));
            }
        }

        Stage::Authorized(principal)
    }

    /// Runs the ownership checks of `route` against `target`.
    pub fn admit(&self, stage: Stage, route: Route, target: Option<Target>) -> Stage {
        let principal = match stage {
            Stage::Authorized(principal) => principal,
            stage => return stage.unexpected("admit"),
        };

        for check in route.checks().iter().filter(|c| !c.is_role()) {
            let ctx = ActionContext::new(principal, target, route.action());
            let decision = match self.check_owner(&ctx, route, target) {
                Ok(decision) => decision,
                Err(rejection) => return Stage::Rejected(rejection),
            };
            debug!("{route:?} {check:?} for {ctx:?}: {decision:?}");

            if let Decision::Deny(reason) = decision {
                return Stage::Rejected(self.denied(route, reason));
            }
        }

        Stage::Admitted(principal)
    }

    fn check_owner(
        &self,
        ctx: &ActionContext,
        route: Route,
        target: Option<Target>,
    ) -> Result<Decision, Rejection> {
        let resource = match route.resource() {
            Some(resource) => resource,
            None => {
                return Err(Rejection::Internal(anyhow!(
                    "route {route:?} has an ownership check but no resource"
                )))
            }
        };

        let owner = match target {
            Some(Target::Stored(id)) => match self.store.find_owner(resource, id)? {
                Some(owner) => Some(owner),
                None => return Err(Rejection::ResourceNotFound { kind: resource, id }),
            },
            Some(Target::Claimed(owner)) => owner,
            None => {
                return Err(Rejection::Internal(anyhow!(
                    "route {route:?} has an ownership check but the request names no target"
                )))
            }
        };

        Ok(check_ownership(&ctx.principal, resource, owner, ctx.action))
    }

    fn denied(&self, route: Route, reason: super::DenyReason) -> Rejection {
        Rejection::Authorization {
            reason,
            // Every route with a denying check carries a resource.
            resource: route.resource().unwrap_or(ResourceKind::User),
            action: route.action(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashMap;

    use anyhow::bail;

    use crate::auth::{AuthnError, VerifyError};
    use crate::authz::DenyReason;

    use super::*;

    const ADMIN: Principal = Principal {
        id: 1,
        role: Role::Admin,
    };
    const ALICE: Principal = Principal {
        id: 2,
        role: Role::User,
    };
    const BOB: Principal = Principal {
        id: 3,
        role: Role::User,
    };

    struct Verifier;

    impl TokenVerifier for Verifier {
        fn verify(&self, token: &str) -> Result<Principal, VerifyError> {
            match token {
                "admin" => Ok(ADMIN),
                "alice" => Ok(ALICE),
                "bob" => Ok(BOB),
                _ => Err(VerifyError::Rejected(String::from("unknown"))),
            }
        }
    }

    #[derive(Default)]
    struct Store {
        posts: HashMap<u64, UserId>,
        users: Vec<UserId>,
        broken: bool,
        lookups: Cell<usize>,
    }

    impl Store {
        fn new() -> Self {
            Self {
                posts: HashMap::from([(10, ALICE.id), (11, BOB.id)]),
                users: vec![ADMIN.id, ALICE.id, BOB.id],
                ..Default::default()
            }
        }
    }

    impl OwnerStore for Store {
        fn find_owner(&self, kind: ResourceKind, id: u64) -> Result<Option<UserId>> {
            self.lookups.set(self.lookups.get() + 1);
            if self.broken {
                bail!("store unavailable");
            }
            Ok(match kind {
                ResourceKind::Post => self.posts.get(&id).copied(),
                ResourceKind::User => self.users.contains(&id).then_some(id),
            })
        }
    }

    fn run(route: Route, token: Option<&str>, target: Option<Target>) -> Result<Principal, Rejection> {
        let store = Store::new();
        Pipeline::new(&Verifier, &store).run(route, token, target)
    }

    fn assert_denied(result: Result<Principal, Rejection>, expect: DenyReason) {
        match result {
            Err(Rejection::Authorization { reason, .. }) => assert_eq!(reason, expect),
            other => panic!("expect {expect:?}, got {other:?}"),
        }
    }

    #[test]
    fn test_role_checks_precede_ownership() {
        for route in Route::ALL {
            let checks = route.checks();
            let first_ownership = checks.iter().position(|c| !c.is_role());
            if let Some(pos) = first_ownership {
                assert!(
                    checks[pos..].iter().all(|c| !c.is_role()),
                    "{route:?} has a role check after an ownership check"
                );
                assert!(route.resource().is_some(), "{route:?}");
            }
        }
    }

    #[test]
    fn test_route_table() {
        assert!(Route::ListPosts.checks().is_empty());
        assert!(Route::GetPost.checks().is_empty());
        assert!(Route::Logout.checks().is_empty());
        assert_eq!(
            Route::CreateUser.checks(),
            &[MANAGE_USERS, Check::NotRole(Role::User)]
        );
        assert_eq!(
            Route::DeleteUser.checks(),
            &[Check::NotRole(Role::User), Check::Ownership]
        );
        assert_eq!(Route::CreatePost.action(), ActionKind::Create);
        assert_eq!(Route::DeletePost.resource(), Some(ResourceKind::Post));
    }

    #[test]
    fn test_authentication_first() {
        for route in Route::ALL {
            let result = run(route, None, Some(Target::Stored(10)));
            assert!(matches!(
                result,
                Err(Rejection::Authentication(AuthnError::MissingToken))
            ));

            let result = run(route, Some("forged"), Some(Target::Stored(10)));
            assert!(matches!(
                result,
                Err(Rejection::Authentication(AuthnError::InvalidToken))
            ));
        }
    }

    #[test]
    fn test_unknown_target_without_token() {
        // The store is never consulted for unauthenticated requests.
        let store = Store::new();
        let pipeline = Pipeline::new(&Verifier, &store);
        let result = pipeline.run(Route::DeletePost, None, Some(Target::Stored(999)));
        assert!(matches!(result, Err(Rejection::Authentication(_))));
        assert_eq!(store.lookups.get(), 0);
    }

    #[test]
    fn test_posts() {
        let update = |token, id| run(Route::UpdatePost, Some(token), Some(Target::Stored(id)));

        assert_eq!(update("alice", 10).unwrap(), ALICE);
        assert_denied(update("alice", 11), DenyReason::NotOwner);
        assert_eq!(update("admin", 11).unwrap(), ADMIN);

        let result = update("alice", 404);
        assert!(matches!(
            result,
            Err(Rejection::ResourceNotFound {
                kind: ResourceKind::Post,
                id: 404
            })
        ));

        let create = |token, owner| run(Route::CreatePost, Some(token), Some(Target::Claimed(owner)));
        assert_eq!(create("alice", Some(ALICE.id)).unwrap(), ALICE);
        assert_denied(create("alice", Some(BOB.id)), DenyReason::NotOwner);
        assert_denied(create("admin", Some(ALICE.id)), DenyReason::NotOwner);
        assert_denied(create("alice", None), DenyReason::NotOwner);

        assert_eq!(run(Route::ListPosts, Some("bob"), None).unwrap(), BOB);
        assert_eq!(
            run(Route::GetPost, Some("bob"), Some(Target::Stored(404))).unwrap(),
            BOB
        );
    }

    #[test]
    fn test_users() {
        assert_denied(
            run(Route::CreateUser, Some("alice"), None),
            DenyReason::InsufficientRole,
        );
        assert_eq!(run(Route::CreateUser, Some("admin"), None).unwrap(), ADMIN);
        assert_eq!(run(Route::ListUsers, Some("alice"), None).unwrap(), ALICE);

        let delete = |token, id| run(Route::DeleteUser, Some(token), Some(Target::Stored(id)));
        assert_denied(delete("alice", ALICE.id), DenyReason::InsufficientRole);
        assert_denied(delete("admin", ADMIN.id), DenyReason::SelfDeletionForbidden);
        assert_eq!(delete("admin", BOB.id).unwrap(), ADMIN);
        assert!(matches!(
            delete("admin", 404),
            Err(Rejection::ResourceNotFound {
                kind: ResourceKind::User,
                id: 404
            })
        ));

        let update = |token, id| run(Route::UpdateUser, Some(token), Some(Target::Stored(id)));
        assert_eq!(update("alice", ALICE.id).unwrap(), ALICE);
        assert_denied(update("alice", BOB.id), DenyReason::NotOwner);
        assert_eq!(update("admin", BOB.id).unwrap(), ADMIN);
        assert_eq!(update("admin", ADMIN.id).unwrap(), ADMIN);
    }

    #[test]
    fn test_role_denial_skips_store() {
        // A user deleting a missing account is refused by role before any lookup.
        let store = Store::new();
        let pipeline = Pipeline::new(&Verifier, &store);
        let result = pipeline.run(Route::DeleteUser, Some("alice"), Some(Target::Stored(404)));
        assert_denied(result, DenyReason::InsufficientRole);
        assert_eq!(store.lookups.get(), 0);
    }

    #[test]
    fn test_store_failure() {
        let store = Store {
            broken: true,
            ..Store::new()
        };
        let pipeline = Pipeline::new(&Verifier, &store);
        let result = pipeline.run(Route::DeletePost, Some("alice"), Some(Target::Stored(10)));
        assert!(matches!(result, Err(Rejection::Internal(_))));
    }

    #[test]
    fn test_stage_order() {
        let store = Store::new();
        let pipeline = Pipeline::new(&Verifier, &store);

        let stage = pipeline.authorize(Stage::Unauthenticated, Route::ListUsers);
        assert!(matches!(stage, Stage::Rejected(Rejection::Internal(_))));

        let stage = pipeline.authenticate(Some("alice"));
        assert!(matches!(stage, Stage::Authenticated(p) if p == ALICE));
        let stage = pipeline.admit(stage, Route::UpdatePost, Some(Target::Stored(10)));
        assert!(matches!(stage, Stage::Rejected(Rejection::Internal(_))));

        let stage = pipeline.authenticate(Some("alice"));
        let stage = pipeline.authorize(stage, Route::UpdatePost);
        assert!(matches!(stage, Stage::Authorized(_)));
        let stage = pipeline.admit(stage, Route::UpdatePost, Some(Target::Stored(10)));
        assert_eq!(stage.into_result().unwrap(), ALICE);

        assert!(Stage::Authenticated(ALICE).into_result().is_err());
    }
}
