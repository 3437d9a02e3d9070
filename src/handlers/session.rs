use chrono::Utc;
use log::{debug, error, info};

use crate::api::user::{CreateUserRequest, LoginRequest, LogoutRequest, Role, TokenResponse};
use crate::api::{Response, STATUS_CREATED, STATUS_FORBIDDEN};
use crate::auth::password::{check_password, generate_salt, hash_password};
use crate::auth::Principal;
use crate::authz::messages::{self, Text};
use crate::authz::pipeline::Route;
use crate::context::{token_digest, ServerContext};
use crate::db::types::CreateUserParams;
use crate::{register_handlers, register_public_handlers};

register_public_handlers!(register, login);
register_handlers!(logout => Route::Logout);

async fn register(req: CreateUserRequest, sc: &ServerContext) -> Response<TokenResponse> {
    let (name, email, password) = req.fields();
    debug!("Register user {email:?}");

    let result = sc.db.with_transaction(|tx| {
        if tx.has_email(&email, None)? {
            return Ok(None);
        }

        let salt = generate_salt(sc.cfg.salt_length);
        let id = tx.create_user(CreateUserParams {
            name,
            email,
            role: Role::User,
            password: hash_password(&password, &salt),
            salt,
            update_time: Utc::now().timestamp() as u64,
        })?;
        Ok(Some(id))
    });

    let principal = match result {
        Ok(Some(id)) => Principal {
            id,
            role: Role::User,
        },
        Ok(None) => return Response::bad_request(messages::text(sc.cfg.locale, Text::EmailTaken)),
        Err(e) => {
            error!("Failed to register user: {e:#}");
            return Response::database_error();
        }
    };
    info!("User {} registered", principal.id);

    let mut resp = issue_token(principal, sc);
    if resp.data.is_some() {
        resp.code = STATUS_CREATED;
        resp.message = Some(messages::text(sc.cfg.locale, Text::Registered).to_string());
    }
    resp
}

async fn login(req: LoginRequest, sc: &ServerContext) -> Response<TokenResponse> {
    let email = req.email.as_deref().unwrap_or_default().trim();
    let password = req.password.as_deref().unwrap_or_default();
    debug!("Login user {email:?}");

    let record = match sc.db.with_transaction(|tx| tx.get_user_password(email)) {
        Ok(record) => record,
        Err(e) => {
            error!("Failed to get user password for login: {e:#}");
            return Response::database_error();
        }
    };

    let principal = match record {
        Some(record) if check_password(password, &record.salt, &record.password) => Principal {
            id: record.id,
            role: record.role,
        },
        _ => {
            debug!("Login {email:?} rejected: bad credentials");
            return Response::deny(
                STATUS_FORBIDDEN,
                "invalid_credentials",
                messages::text(sc.cfg.locale, Text::InvalidCredentials),
            );
        }
    };

    let mut resp = issue_token(principal, sc);
    if resp.data.is_some() {
        resp.message = Some(messages::text(sc.cfg.locale, Text::LoggedIn).to_string());
    }
    resp
}

async fn logout(req: LogoutRequest, op: Principal, sc: &ServerContext) -> Response<()> {
    let now = Utc::now().timestamp() as u64;
    // The token already passed authentication; a failure here means it expired
    // in between, which leaves nothing to revoke.
    let expire_after = match sc.jwt_validator.validate_token(&req.token, now) {
        Ok(info) => info.expire_after,
        Err(_) => now,
    };

    let digest = token_digest(&req.token);
    if let Err(e) = sc
        .db
        .with_transaction(|tx| tx.revoke_token(&digest, expire_after))
    {
        error!("Failed to revoke token: {e:#}");
        return Response::database_error();
    }

    info!("User {} logged out", op.id);
    Response::with_message(messages::text(sc.cfg.locale, Text::LoggedOut))
}

fn issue_token(principal: Principal, sc: &ServerContext) -> Response<TokenResponse> {
    let now = Utc::now().timestamp() as u64;
    match sc.jwt_generator.generate_token(principal, now) {
        Ok(token) => Response::with_data(token),
        Err(e) => {
            error!("Failed to generate token: {e:#}");
            Response::internal_server_error(messages::text(sc.cfg.locale, Text::InternalError))
        }
    }
}
