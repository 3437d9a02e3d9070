use std::collections::HashMap;
use std::fmt::{self, Display};
use std::str::FromStr;

use actix_web::http::header::HeaderMap;
use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::auth::bearer_token_from_headers;
use crate::authz::Target;

use super::{check_text, parse_json_body, parse_path_id, require_text, QueryRequest, Request};

pub type UserId = u64;

pub const NAME_MAX_LEN: usize = 50;
pub const EMAIL_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_MAX_LEN: usize = 20;

/// Every role the API knows about. Adding one forces every policy match to be
/// revisited.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            _ => bail!("unknown role '{s}'"),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$").unwrap()
});

fn check_email(email: &str) -> Result<()> {
    check_text("email", email, EMAIL_MAX_LEN)?;
    if !EMAIL_REGEX.is_match(email) {
        bail!("email is not a valid email address");
    }
    Ok(())
}

fn check_password(password: &str, confirmation: Option<&str>) -> Result<()> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        bail!("password must be between {PASSWORD_MIN_LEN} and {PASSWORD_MAX_LEN} characters");
    }
    if confirmation != Some(password) {
        bail!("password confirmation does not match");
    }
    Ok(())
}

#[derive(Debug, Default, Deserialize, PartialEq, Clone)]
#[serde(default)]
pub struct UserBody {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
}

/// Used by both the public registration and the admin user creation.
#[derive(Debug, Default, PartialEq)]
pub struct CreateUserRequest {
    pub body: UserBody,
}

impl Request for CreateUserRequest {
    fn has_body(&self) -> bool {
        true
    }

    fn set_body(&mut self, body: &[u8]) -> Result<()> {
        self.body = parse_json_body(body)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        require_text("name", &self.body.name, NAME_MAX_LEN)?;

        let email = require_text("email", &self.body.email, EMAIL_MAX_LEN)?;
        check_email(email)?;

        let password = match self.body.password.as_deref() {
            Some(password) => password,
            None => bail!("password is required"),
        };
        check_password(password, self.body.password_confirmation.as_deref())
    }
}

impl CreateUserRequest {
    /// Returns `(name, email, password)`, only meaningful after
    /// [`Request::validate`] succeeded.
    pub fn fields(&self) -> (String, String, String) {
        let get = |value: &Option<String>| value.as_deref().unwrap_or_default().trim().to_string();
        (
            get(&self.body.name),
            get(&self.body.email),
            self.body.password.clone().unwrap_or_default(),
        )
    }
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl Request for LoginRequest {
    fn has_body(&self) -> bool {
        true
    }

    fn set_body(&mut self, body: &[u8]) -> Result<()> {
        *self = parse_json_body(body)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        require_text("email", &self.email, EMAIL_MAX_LEN)?;
        if self.password.as_deref().unwrap_or_default().is_empty() {
            bail!("password is required");
        }
        Ok(())
    }
}

/// Carries the session token being given up.
#[derive(Debug, Default, PartialEq)]
pub struct LogoutRequest {
    pub token: String,
}

impl Request for LogoutRequest {
    fn complete_headers(&mut self, headers: &HeaderMap) -> Result<()> {
        match bearer_token_from_headers(headers) {
            Some(token) => self.token = token,
            None => bail!("bearer token is required"),
        }
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct GetUsersRequest {
    pub query: QueryRequest,
}

impl Request for GetUsersRequest {
    fn complete(&mut self, fields: HashMap<String, String>) -> Result<()> {
        self.query.complete(fields)
    }
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct GetUserRequest {
    pub id: UserId,
}

impl Request for GetUserRequest {
    fn complete(&mut self, fields: HashMap<String, String>) -> Result<()> {
        self.id = parse_path_id(&fields)?;
        Ok(())
    }

    fn target(&self) -> Option<Target> {
        Some(Target::Stored(self.id))
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct PatchUserRequest {
    pub id: UserId,
    pub body: UserBody,
}

impl Request for PatchUserRequest {
    fn complete(&mut self, fields: HashMap<String, String>) -> Result<()> {
        self.id = parse_path_id(&fields)?;
        Ok(())
    }

    fn has_body(&self) -> bool {
        true
    }

    fn set_body(&mut self, body: &[u8]) -> Result<()> {
        self.body = parse_json_body(body)?;
        Ok(())
    }

    fn target(&self) -> Option<Target> {
        Some(Target::Stored(self.id))
    }

    fn validate(&self) -> Result<()> {
        if let Some(ref name) = self.body.name {
            check_text("name", name, NAME_MAX_LEN)?;
        }
        if let Some(ref email) = self.body.email {
            check_email(email.trim())?;
        }
        if let Some(ref password) = self.body.password {
            check_password(password, self.body.password_confirmation.as_deref())?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, PartialEq, Clone, Copy)]
pub struct DeleteUserRequest {
    pub id: UserId,
}

impl Request for DeleteUserRequest {
    fn complete(&mut self, fields: HashMap<String, String>) -> Result<()> {
        self.id = parse_path_id(&fields)?;
        Ok(())
    }

    fn target(&self) -> Option<Target> {
        Some(Target::Stored(self.id))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub expire_after: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(name: &str, email: &str, password: &str, confirmation: &str) -> UserBody {
        UserBody {
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            password_confirmation: Some(confirmation.to_string()),
        }
    }

    #[test]
    fn test_role() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(Role::User.to_string(), "user");
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    }

    #[test]
    fn test_validate_create_user() {
        let ok = CreateUserRequest {
            body: body("Alice", "alice@email.com", "secret1", "secret1"),
        };
        ok.validate().unwrap();
        assert_eq!(
            ok.fields(),
            (
                String::from("Alice"),
                String::from("alice@email.com"),
                String::from("secret1")
            )
        );

        let cases = [
            body("", "alice@email.com", "secret1", "secret1"),
            body(&"a".repeat(51), "alice@email.com", "secret1", "secret1"),
            body("Alice", "not-an-email", "secret1", "secret1"),
            body("Alice", "alice@email.com", "short", "short"),
            body("Alice", "alice@email.com", &"p".repeat(21), &"p".repeat(21)),
            body("Alice", "alice@email.com", "secret1", "secret2"),
        ];
        for body in cases {
            let req = CreateUserRequest { body };
            assert!(req.validate().is_err(), "{req:?}");
        }

        let req = CreateUserRequest::default();
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_validate_patch_user() {
        let mut req = PatchUserRequest::default();
        req.validate().unwrap();

        req.body.name = Some(String::from("Bob"));
        req.validate().unwrap();

        req.body.password = Some(String::from("secret1"));
        assert!(req.validate().is_err());

        req.body.password_confirmation = Some(String::from("secret1"));
        req.validate().unwrap();

        req.body.email = Some(String::from("bob@"));
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_parse_path_id() {
        let mut req = GetUserRequest::default();
        let fields = HashMap::from([(String::from("id"), String::from("12"))]);
        req.complete(fields).unwrap();
        assert_eq!(req.id, 12);
        assert_eq!(req.target(), Some(Target::Stored(12)));

        let fields = HashMap::from([(String::from("id"), String::from("x"))]);
        assert!(req.complete(fields).is_err());
        assert!(req.complete(HashMap::new()).is_err());
    }
}
