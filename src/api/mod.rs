pub mod post;
pub mod user;

use std::collections::HashMap;

use actix_web::http::header::HeaderMap;
use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::authz::Target;

pub const HEADER_AUTHORIZATION: &str = "Authorization";

#[macro_export]
macro_rules! parse_from_map {
    ($fields:expr,$field:expr) => {
        match $fields.get($field) {
            Some(value) => match value.parse() {
                Ok(value) => Some(value),
                Err(_) => anyhow::bail!(format!("{} is invalid", $field)),
            },
            None => None,
        }
    };
}

/// A request parsed from the query string, the path segments and (optionally)
/// a JSON body.
///
/// Parsing only rejects malformed input. Business rules such as required
/// fields and length limits live in [`Request::validate`], which runs after the
/// request has been authorized.
pub trait Request: Default {
    fn complete(&mut self, _fields: HashMap<String, String>) -> Result<()> {
        Ok(())
    }

    fn complete_headers(&mut self, _headers: &HeaderMap) -> Result<()> {
        Ok(())
    }

    fn has_body(&self) -> bool {
        false
    }
    fn set_body(&mut self, _body: &[u8]) -> Result<()> {
        Ok(())
    }

    /// The record this request operates on, as seen by the ownership policy.
    fn target(&self) -> Option<Target> {
        None
    }

    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyRequest;

impl Request for EmptyRequest {}

/// Decodes a JSON body, treating an empty body as an empty object.
pub fn parse_json_body<T>(body: &[u8]) -> Result<T>
where
    T: DeserializeOwned,
{
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return serde_json::from_slice(b"{}").context("decode empty json body");
    }
    serde_json::from_slice(body).context("decode json body")
}

/// Parses the `id` path segment shared by every `/{kind}/{id}` route.
pub fn parse_path_id(fields: &HashMap<String, String>) -> Result<u64> {
    match parse_from_map!(fields, "id") {
        Some(id) => Ok(id),
        None => bail!("id is required"),
    }
}

pub fn require_text<'a>(name: &str, value: &'a Option<String>, max: usize) -> Result<&'a str> {
    let value = match value.as_deref().map(str::trim) {
        Some(value) if !value.is_empty() => value,
        _ => bail!("{name} is required"),
    };
    check_text(name, value, max)?;
    Ok(value)
}

pub fn check_text(name: &str, value: &str, max: usize) -> Result<()> {
    if value.trim().is_empty() {
        bail!("{name} cannot be empty");
    }
    if value.chars().count() > max {
        bail!("{name} cannot be longer than {max} characters");
    }
    Ok(())
}

pub const DEFAULT_PER_PAGE: u64 = 10;
pub const MAX_PER_PAGE: u64 = 100;

#[derive(Debug, PartialEq, Clone, Copy)]
pub struct QueryRequest {
    pub page: u64,
    pub per_page: u64,
}

impl Default for QueryRequest {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl Request for QueryRequest {
    fn complete(&mut self, fields: HashMap<String, String>) -> Result<()> {
        self.page = parse_from_map!(fields, "page").unwrap_or(1);
        if self.page == 0 {
            bail!("page must be greater than 0");
        }

        self.per_page = parse_from_map!(fields, "per_page").unwrap_or(DEFAULT_PER_PAGE);
        if self.per_page == 0 {
            bail!("per_page must be greater than 0");
        }
        if self.per_page > MAX_PER_PAGE {
            bail!("per_page cannot be greater than {MAX_PER_PAGE}");
        }

        Ok(())
    }
}

impl QueryRequest {
    pub fn offset(&self) -> u64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> u64 {
        self.per_page
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + DeserializeOwned")]
pub struct Response<T: Serialize + DeserializeOwned> {
    pub code: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

pub const STATUS_OK: u32 = 200;
pub const STATUS_CREATED: u32 = 201;
pub const STATUS_BAD_REQUEST: u32 = 400;
pub const STATUS_UNAUTHORIZED: u32 = 401;
pub const STATUS_FORBIDDEN: u32 = 403;
pub const STATUS_NOT_FOUND: u32 = 404;
pub const STATUS_INTERNAL_SERVER_ERROR: u32 = 500;

impl<T: Serialize + DeserializeOwned> Response<T> {
    pub fn ok() -> Self {
        Self {
            code: STATUS_OK,
            reason: None,
            message: None,
            data: None,
        }
    }

    pub fn with_message(message: impl ToString) -> Self {
        Self {
            message: Some(message.to_string()),
            ..Self::ok()
        }
    }

    pub fn with_data(data: T) -> Self {
        Self {
            data: Some(data),
            ..Self::ok()
        }
    }

    pub fn created(data: T) -> Self {
        Self {
            code: STATUS_CREATED,
            data: Some(data),
            ..Self::ok()
        }
    }

    /// A failed response carrying a machine readable reason next to the
    /// human readable message.
    pub fn deny(code: u32, reason: &str, message: impl ToString) -> Self {
        Self {
            code,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            data: None,
        }
    }

    pub fn bad_request(message: impl ToString) -> Self {
        Self::deny(STATUS_BAD_REQUEST, "bad_request", message)
    }

    pub fn not_found(message: impl ToString) -> Self {
        Self::deny(STATUS_NOT_FOUND, "resource_not_found", message)
    }

    pub fn internal_server_error(message: impl ToString) -> Self {
        Self::deny(STATUS_INTERNAL_SERVER_ERROR, "internal", message)
    }

    pub fn database_error() -> Self {
        Self::internal_server_error("Database error")
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub struct Pagination {
    pub current_page: u64,
    pub per_page: u64,
    pub total: u64,
    pub last_page: u64,
}

impl Pagination {
    pub fn new(query: &QueryRequest, total: u64) -> Self {
        let last_page = total.div_ceil(query.per_page).max(1);
        Self {
            current_page: query.page,
            per_page: query.per_page,
            total,
            last_page,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(bound = "T: Serialize + DeserializeOwned")]
pub struct ListResponse<T: Serialize + DeserializeOwned> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub version: String,
    pub timestamp: u64,
}
