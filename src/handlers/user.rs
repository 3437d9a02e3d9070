use chrono::Utc;
use log::{debug, error, info};

use crate::api::user::{
    CreateUserRequest, DeleteUserRequest, GetUserRequest, GetUsersRequest, PatchUserRequest,
    Role, User,
};
use crate::api::{ListResponse, Pagination, Response};
use crate::auth::password::{generate_salt, hash_password};
use crate::auth::Principal;
use crate::authz::messages::{self, Text};
use crate::authz::pipeline::Route;
use crate::authz::ResourceKind;
use crate::context::ServerContext;
use crate::db::types::{CreateUserParams, PatchUserParams};
use crate::register_handlers;

register_handlers!(
    list_users => Route::ListUsers,
    create_user => Route::CreateUser,
    get_user => Route::GetUser,
    patch_user => Route::UpdateUser,
    delete_user => Route::DeleteUser,
);

async fn list_users(
    req: GetUsersRequest,
    _op: Principal,
    sc: &ServerContext,
) -> Response<ListResponse<User>> {
    debug!("List users: {req:?}");

    let result = sc.db.with_transaction(|tx| {
        let total = tx.count_users()?;
        let items = tx.list_users(req.query)?;
        Ok(ListResponse {
            items,
            pagination: Pagination::new(&req.query, total),
        })
    });

    match result {
        Ok(list) => Response::with_data(list),
        Err(e) => {
            error!("Failed to list users: {e:#}");
            Response::database_error()
        }
    }
}

async fn create_user(req: CreateUserRequest, op: Principal, sc: &ServerContext) -> Response<User> {
    let (name, email, password) = req.fields();
    debug!("Create user {email:?} by {op:?}");

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
        tx.get_user(id)
    });

    match result {
        Ok(Some(user)) => {
            info!("User {} created by {op:?}", user.id);
            Response::created(user)
        }
        Ok(None) => Response::bad_request(messages::text(sc.cfg.locale, Text::EmailTaken)),
        Err(e) => {
            error!("Failed to create user: {e:#}");
            Response::database_error()
        }
    }
}

async fn get_user(req: GetUserRequest, _op: Principal, sc: &ServerContext) -> Response<User> {
    debug!("Get user: {req:?}");

    match sc.db.with_transaction(|tx| tx.get_user(req.id)) {
        Ok(Some(user)) => Response::with_data(user),
        Ok(None) => user_not_found(sc, req.id),
        Err(e) => {
            error!("Failed to get user: {e:#}");
            Response::database_error()
        }
    }
}

/// Outcome of a user write that may lose a race against a concurrent delete.
enum Patched {
    Ok(User),
    NotFound,
    EmailTaken,
}

async fn patch_user(req: PatchUserRequest, op: Principal, sc: &ServerContext) -> Response<User> {
    debug!("Patch user {} by {op:?}", req.id);

    let result = sc.db.with_transaction(|tx| {
        if !tx.has_user(req.id)? {
            return Ok(Patched::NotFound);
        }

        let email = req.body.email.as_deref().map(str::trim);
        if let Some(email) = email {
            if tx.has_email(email, Some(req.id))? {
                return Ok(Patched::EmailTaken);
            }
        }

        let password = req.body.password.as_deref().map(|password| {
            let salt = generate_salt(sc.cfg.salt_length);
            (hash_password(password, &salt), salt)
        });

        tx.update_user(PatchUserParams {
            id: req.id,
            name: req.body.name.as_deref().map(|name| name.trim().to_string()),
            email: email.map(String::from),
            password,
            update_time: Utc::now().timestamp() as u64,
        })?;

        match tx.get_user(req.id)? {
            Some(user) => Ok(Patched::Ok(user)),
            None => Ok(Patched::NotFound),
        }
    });

    match result {
        Ok(Patched::Ok(user)) => Response::with_data(user),
        Ok(Patched::NotFound) => user_not_found(sc, req.id),
        Ok(Patched::EmailTaken) => {
            Response::bad_request(messages::text(sc.cfg.locale, Text::EmailTaken))
        }
        Err(e) => {
            error!("Failed to patch user: {e:#}");
            Response::database_error()
        }
    }
}

async fn delete_user(req: DeleteUserRequest, op: Principal, sc: &ServerContext) -> Response<()> {
    debug!("Delete user {} by {op:?}", req.id);

    let result = sc.db.with_transaction(|tx| {
        if !tx.has_user(req.id)? {
            return Ok(false);
        }

        let count = tx.delete_user_posts(req.id)?;
        if count > 0 {
            debug!("Deleted {count} posts belong to user {}", req.id);
        }
        tx.delete_user(req.id)?;
        Ok(true)
    });

    match result {
        Ok(true) => {
            info!("User {} deleted by {op:?}", req.id);
            Response::with_message(messages::text(sc.cfg.locale, Text::Deleted))
        }
        Ok(false) => user_not_found(sc, req.id),
        Err(e) => {
            error!("Failed to delete user: {e:#}");
            Response::database_error()
        }
    }
}

fn user_not_found<T>(sc: &ServerContext, id: u64) -> Response<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    Response::not_found(messages::not_found_message(
        sc.cfg.locale,
        ResourceKind::User,
        id,
    ))
}
