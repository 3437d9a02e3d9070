use chrono::Utc;
use log::{debug, error, info};

use crate::api::post::{
    CreatePostRequest, DeletePostRequest, GetPostRequest, GetPostsRequest, PatchPostRequest,
    Post,
};
use crate::api::{ListResponse, Pagination, Response};
use crate::auth::Principal;
use crate::authz::messages::{self, Text};
use crate::authz::pipeline::Route;
use crate::authz::ResourceKind;
use crate::context::ServerContext;
use crate::db::types::{CreatePostParams, PatchPostParams};
use crate::register_handlers;

register_handlers!(
    list_posts => Route::ListPosts,
    create_post => Route::CreatePost,
    get_post => Route::GetPost,
    patch_post => Route::UpdatePost,
    delete_post => Route::DeletePost,
);

async fn list_posts(
    req: GetPostsRequest,
    _op: Principal,
    sc: &ServerContext,
) -> Response<ListResponse<Post>> {
    debug!("List posts: {req:?}");

    let result = sc.db.with_transaction(|tx| {
        let total = tx.count_posts()?;
        let items = tx.list_posts(req.query)?;
        Ok(ListResponse {
            items,
            pagination: Pagination::new(&req.query, total),
        })
    });

    match result {
        Ok(list) => Response::with_data(list),
        Err(e) => {
            error!("Failed to list posts: {e:#}");
            Response::database_error()
        }
    }
}

async fn create_post(req: CreatePostRequest, op: Principal, sc: &ServerContext) -> Response<Post> {
    // Ownership already pinned the claimed author to the caller.
    let user_id = req.user_id.unwrap_or(op.id);
    debug!("Create post for user {user_id}: {:?}", req.topic);

    let result = sc.db.with_transaction(|tx| {
        if !tx.has_user(user_id)? {
            return Ok(None);
        }

        let id = tx.create_post(CreatePostParams {
            topic: req.topic.as_deref().unwrap_or_default().trim().to_string(),
            content: req.content.as_deref().unwrap_or_default().trim().to_string(),
            user_id,
            update_time: Utc::now().timestamp() as u64,
        })?;
        tx.get_post(id)
    });

    match result {
        Ok(Some(post)) => {
            info!("Post {} created by {op:?}", post.id);
            Response::created(post)
        }
        Ok(None) => Response::bad_request(messages::text(sc.cfg.locale, Text::UnknownAuthor)),
        Err(e) => {
            error!("Failed to create post: {e:#}");
            Response::database_error()
        }
    }
}

async fn get_post(req: GetPostRequest, _op: Principal, sc: &ServerContext) -> Response<Post> {
    debug!("Get post: {req:?}");

    match sc.db.with_transaction(|tx| tx.get_post(req.id)) {
        Ok(Some(post)) => Response::with_data(post),
        Ok(None) => post_not_found(sc, req.id),
        Err(e) => {
            error!("Failed to get post: {e:#}");
            Response::database_error()
        }
    }
}

async fn patch_post(req: PatchPostRequest, op: Principal, sc: &ServerContext) -> Response<Post> {
    debug!("Patch post {} by {op:?}", req.id);

    let result = sc.db.with_transaction(|tx| {
        if tx.get_post_owner(req.id)?.is_none() {
            return Ok(None);
        }

        let trim = |value: &Option<String>| value.as_deref().map(|s| s.trim().to_string());
        tx.update_post(PatchPostParams {
            id: req.id,
            topic: trim(&req.body.topic),
            content: trim(&req.body.content),
            update_time: Utc::now().timestamp() as u64,
        })?;
        tx.get_post(req.id)
    });

    match result {
        Ok(Some(post)) => Response::with_data(post),
        Ok(None) => post_not_found(sc, req.id),
        Err(e) => {
            error!("Failed to patch post: {e:#}");
            Response::database_error()
        }
    }
}

async fn delete_post(req: DeletePostRequest, op: Principal, sc: &ServerContext) -> Response<()> {
    debug!("Delete post {} by {op:?}", req.id);

    let result = sc.db.with_transaction(|tx| {
        if tx.get_post_owner(req.id)?.is_none() {
            return Ok(false);
        }
        tx.delete_post(req.id)?;
        Ok(true)
    });

    match result {
        Ok(true) => Response::with_message(messages::text(sc.cfg.locale, Text::Deleted)),
        Ok(false) => post_not_found(sc, req.id),
        Err(e) => {
            error!("Failed to delete post: {e:#}");
            Response::database_error()
        }
    }
}

fn post_not_found<T>(sc: &ServerContext, id: u64) -> Response<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    Response::not_found(messages::not_found_message(
        sc.cfg.locale,
        ResourceKind::Post,
        id,
    ))
}
