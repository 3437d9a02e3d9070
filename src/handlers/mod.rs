use actix_web::HttpResponse;
use log::{debug, error};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::api::{self, Response};
use crate::authz::messages;
use crate::authz::Rejection;
use crate::context::ServerContext;

pub mod healthz;
pub mod post;
pub mod session;
pub mod user;

/// Wraps each `handler => route` pair into an actix handler named
/// `<handler>_handler`. Before `handler` sees the request it is authenticated,
/// checked against the role rules of `route`, parsed, checked against the
/// ownership rules of `route` and validated, in that order.
#[macro_export]
macro_rules! register_handlers {
    () => {};

    ($handler:ident => $route:expr) => {
        paste::paste! {
            pub async fn [< $handler _handler >](
                req: actix_web::HttpRequest,
                body: Option<actix_web::web::Bytes>,
                sc: actix_web::web::Data<std::sync::Arc<$crate::context::ServerContext>>,
            ) -> actix_web::HttpResponse {
                let f = || async move {
                    let sc: &$crate::context::ServerContext = sc.get_ref();
                    let stage = $crate::auth_request!(sc, req);
                    let stage = $crate::authorize_request!(sc, stage, $route);
                    let parsed = $crate::parse_request!(req, body);
                    let principal = $crate::admit_request!(sc, stage, $route, parsed);
                    $crate::validate_request!(parsed);
                    $handler(parsed, principal, sc).await
                };
                let resp = f().await;
                $crate::handlers::convert_response(resp)
            }
        }
    };

    ($handler:ident => $route:expr, $($rest:ident => $rest_route:expr),* $(,)?) => {
        $crate::register_handlers!($handler => $route);
        $crate::register_handlers!($($rest => $rest_route),*);
    };
}

/// Like [`register_handlers`], for routes open to anonymous callers. These
/// never enter the authorization pipeline.
#[macro_export]
macro_rules! register_public_handlers {
    () => {};

    ($handler:ident) => {
        paste::paste! {
            pub async fn [< $handler _handler >](
                req: actix_web::HttpRequest,
                body: Option<actix_web::web::Bytes>,
                sc: actix_web::web::Data<std::sync::Arc<$crate::context::ServerContext>>,
            ) -> actix_web::HttpResponse {
                let f = || async move {
                    let sc: &$crate::context::ServerContext = sc.get_ref();
                    let parsed = $crate::parse_request!(req, body);
                    $crate::validate_request!(parsed);
                    $handler(parsed, sc).await
                };
                let resp = f().await;
                $crate::handlers::convert_response(resp)
            }
        }
    };

    ($handler:ident, $($rest:ident),* $(,)?) => {
        $crate::register_public_handlers!($handler);
        $crate::register_public_handlers!($($rest),*);
    };
}

#[macro_export]
macro_rules! validate_request {
    ($parsed:expr) => {
        if let Err(e) = $crate::api::Request::validate(&$parsed) {
            return $crate::api::Response::bad_request(format!("{e:#}"));
        }
    };
}

/// Turns a pipeline rejection into the response sent back to the caller.
pub fn reject<T>(sc: &ServerContext, rejection: Rejection) -> Response<T>
where
    T: Serialize + DeserializeOwned,
{
    match rejection {
        Rejection::Internal(ref e) => error!("Authorization pipeline failed: {e:#}"),
        ref rejection => debug!("Reject request: {rejection}"),
    }

    let message = messages::rejection_message(sc.cfg.locale, &rejection);
    Response::deny(rejection.status(), rejection.reason(), message)
}

pub fn convert_response<T>(resp: Response<T>) -> HttpResponse
where
    T: Serialize + DeserializeOwned,
{
    let mut http_resp = match resp.code {
        api::STATUS_OK => HttpResponse::Ok(),
        api::STATUS_CREATED => HttpResponse::Created(),
        api::STATUS_BAD_REQUEST => HttpResponse::BadRequest(),
        api::STATUS_UNAUTHORIZED => HttpResponse::Unauthorized(),
        api::STATUS_FORBIDDEN => HttpResponse::Forbidden(),
        api::STATUS_NOT_FOUND => HttpResponse::NotFound(),
        _ => HttpResponse::InternalServerError(),
    };
    http_resp.json(resp)
}
