pub mod jwt;
pub mod password;

use actix_web::http::header::HeaderMap;
use actix_web::HttpRequest;
use log::debug;
use thiserror::Error;

use crate::api::user::{Role, UserId};
use crate::api::HEADER_AUTHORIZATION;
use crate::authz::Rejection;

/// Authenticates the request, returning the `Authenticated` stage or the
/// rejection response.
#[macro_export]
macro_rules! auth_request {
    ($sc:expr, $req:expr) => {{
        let token = $crate::auth::bearer_token(&$req);
        match $sc.pipeline().authenticate(token.as_deref()) {
            $crate::authz::pipeline::Stage::Rejected(rejection) => {
                return $crate::handlers::reject($sc, rejection)
            }
            stage => stage,
        }
    }};
}

/// The authenticated caller of one request. Built by [`resolve`] and handed
/// explicitly to every check; it never outlives the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    pub id: UserId,
    pub role: Role,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthnError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid or expired token")]
    InvalidToken,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    /// The token itself is bad: malformed, expired, badly signed or revoked.
    #[error("token rejected: {0}")]
    Rejected(String),

    /// Verification could not be carried out.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub trait TokenVerifier {
    fn verify(&self, token: &str) -> Result<Principal, VerifyError>;
}

/// Extracts the token of an `Authorization: Bearer <token>` header. Any other
/// header shape is treated as no token at all.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    bearer_token_from_headers(req.headers())
}

pub fn bearer_token_from_headers(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(HEADER_AUTHORIZATION)?.to_str().ok()?;

    let mut fields = header.split_whitespace();
    let scheme = fields.next()?;
    let token = fields.next()?;
    if fields.next().is_some() || !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    Some(token.to_string())
}

pub fn resolve<V>(verifier: &V, token: Option<&str>) -> Result<Principal, Rejection>
where
    V: TokenVerifier + ?Sized,
{
    let token = match token {
        Some(token) => token,
        None => return Err(AuthnError::MissingToken.into()),
    };

    match verifier.verify(token) {
        Ok(principal) => Ok(principal),
        Err(VerifyError::Rejected(msg)) => {
            debug!("Reject token: {msg}");
            Err(AuthnError::InvalidToken.into())
        }
        Err(VerifyError::Internal(e)) => Err(Rejection::Internal(e)),
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test::TestRequest;
    use anyhow::anyhow;

    use super::*;

    struct StaticVerifier;

    impl TokenVerifier for StaticVerifier {
        fn verify(&self, token: &str) -> Result<Principal, VerifyError> {
            match token {
                "admin-token" => Ok(Principal {
                    id: 1,
                    role: Role::Admin,
                }),
                "user-token" => Ok(Principal {
                    id: 2,
                    role: Role::User,
                }),
                "broken-store" => Err(VerifyError::Internal(anyhow!("store is down"))),
                _ => Err(VerifyError::Rejected(String::from("unknown token"))),
            }
        }
    }

    #[test]
    fn test_bearer_token() {
        let cases = [
            (Some("Bearer abc"), Some("abc")),
            (Some("bearer abc"), Some("abc")),
            (Some("Bearer"), None),
            (Some("Basic abc"), None),
            (Some("Bearer abc def"), None),
            (Some("abc"), None),
            (None, None),
        ];

        for (header, expect) in cases {
            let mut req = TestRequest::default();
            if let Some(header) = header {
                req = req.insert_header((HEADER_AUTHORIZATION, header));
            }
            let token = bearer_token(&req.to_http_request());
            assert_eq!(token.as_deref(), expect, "header {header:?}");
        }
    }

    #[test]
    fn test_resolve() {
        let principal = resolve(&StaticVerifier, Some("admin-token")).unwrap();
        assert_eq!(
            principal,
            Principal {
                id: 1,
                role: Role::Admin
            }
        );

        let principal = resolve(&StaticVerifier, Some("user-token")).unwrap();
        assert_eq!(principal.role, Role::User);

        let err = resolve(&StaticVerifier, None).unwrap_err();
        assert!(matches!(
            err,
            Rejection::Authentication(AuthnError::MissingToken)
        ));

        let err = resolve(&StaticVerifier, Some("garbage")).unwrap_err();
        assert!(matches!(
            err,
            Rejection::Authentication(AuthnError::InvalidToken)
        ));

        let err = resolve(&StaticVerifier, Some("broken-store")).unwrap_err();
        assert!(matches!(err, Rejection::Internal(_)));
    }
}
