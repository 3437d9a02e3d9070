use std::collections::HashMap;

use actix_web::web::Bytes;
use actix_web::HttpRequest;
use anyhow::{Context, Result};
use log::debug;
use url::form_urlencoded;

use crate::api::Request;

#[macro_export]
macro_rules! parse_request {
    ($req:expr, $body:expr) => {
        match $crate::request::parse_request_raw(&$req, $body) {
            Ok(parsed) => parsed,
            Err(e) => return $crate::api::Response::bad_request(format!("bad request: {e:#}")),
        }
    };
}

/// Builds `T` from the query string, the matched path segments and the body.
/// Path segments win over query fields with the same name.
pub fn parse_request_raw<T>(req: &HttpRequest, body: Option<Bytes>) -> Result<T>
where
    T: Request,
{
    let query_string = req.query_string();

    let mut fields: HashMap<String, String> = form_urlencoded::parse(query_string.as_bytes())
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    for (key, value) in req.match_info().iter() {
        fields.insert(key.to_string(), value.to_string());
    }
    debug!(
        "- {} {}, fields: {:?}, peer: {:?}, with_body: {:?}",
        req.method(),
        req.path(),
        fields,
        req.peer_addr(),
        body.is_some()
    );

    let mut parsed = T::default();
    parsed.complete(fields).context("parse query")?;
    parsed
        .complete_headers(req.headers())
        .context("parse headers")?;

    if parsed.has_body() {
        let body = body.unwrap_or_default();
        parsed.set_body(&body).context("parse body")?;
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use actix_web::test::TestRequest;

    use crate::api::post::{CreatePostRequest, GetPostsRequest, PatchPostRequest, PostBody};
    use crate::api::{QueryRequest, Response};

    use super::*;

    fn test_handler<T>(req: HttpRequest, body: Option<Bytes>, expect: Option<T>) -> Response<()>
    where
        T: Request + PartialEq + Debug,
    {
        let parsed: T = parse_request!(req, body);
        assert_eq!(parsed, expect.unwrap());
        Response::ok()
    }

    fn test_request<T>(
        uri: &str,
        id: Option<&str>,
        body: Option<&str>,
        expect: Option<T>,
    ) where
        T: Request + PartialEq + Debug,
    {
        let body = body.map(|s| Bytes::from(s.as_bytes().to_vec()));
        let mut req = TestRequest::with_uri(uri);
        if let Some(id) = id {
            req = req.param("id", id.to_string());
        }

        let expect_err = expect.is_none();
        let resp = test_handler(req.to_http_request(), body, expect);
        if expect_err {
            assert_eq!(resp.code, 400, "{uri}");
            assert_eq!(resp.reason.as_deref(), Some("bad_request"));
            return;
        }
        assert_eq!(resp.code, 200, "{uri}");
    }

    #[test]
    fn test_parse_request() {
        test_request(
            "/posts?page=2&per_page=5",
            None,
            None,
            Some(GetPostsRequest {
                query: QueryRequest {
                    page: 2,
                    per_page: 5,
                },
            }),
        );
        test_request("/posts?page=0", None, None, None::<GetPostsRequest>);

        test_request(
            "/posts",
            None,
            Some(r#"{"topic": "Rust", "content": "Borrowing", "user_id": 4}"#),
            Some(CreatePostRequest {
                topic: Some(String::from("Rust")),
                content: Some(String::from("Borrowing")),
                user_id: Some(4),
            }),
        );
        test_request(
            "/posts",
            None,
            None,
            Some(CreatePostRequest::default()),
        );
        test_request("/posts", None, Some("{broken"), None::<CreatePostRequest>);

        test_request(
            "/posts/3",
            Some("3"),
            Some(r#"{"content": "new"}"#),
            Some(PatchPostRequest {
                id: 3,
                body: PostBody {
                    topic: None,
                    content: Some(String::from("new")),
                },
            }),
        );
        test_request("/posts/x", Some("x"), None, None::<PatchPostRequest>);
    }
}
