use anyhow::Result;

use crate::api::post::{Post, PostId};
use crate::api::user::{Role, User, UserId};
use crate::api::QueryRequest;

pub trait Connection<'a, T>
where
    T: Transaction + 'a,
{
    fn transaction(&'a mut self) -> Result<T>;
}

pub trait Transaction {
    fn create_user(&self, params: CreateUserParams) -> Result<UserId>;
    fn get_user(&self, id: UserId) -> Result<Option<User>>;
    fn has_user(&self, id: UserId) -> Result<bool>;
    /// Whether `email` belongs to an account other than `exclude`.
    fn has_email(&self, email: &str, exclude: Option<UserId>) -> Result<bool>;
    fn get_user_password(&self, email: &str) -> Result<Option<UserPassword>>;
    fn update_user(&self, params: PatchUserParams) -> Result<()>;
    fn delete_user(&self, id: UserId) -> Result<()>;
    fn count_users(&self) -> Result<u64>;
    fn list_users(&self, query: QueryRequest) -> Result<Vec<User>>;

    fn create_post(&self, params: CreatePostParams) -> Result<PostId>;
    fn get_post(&self, id: PostId) -> Result<Option<Post>>;
    fn get_post_owner(&self, id: PostId) -> Result<Option<UserId>>;
    fn update_post(&self, params: PatchPostParams) -> Result<()>;
    fn delete_post(&self, id: PostId) -> Result<()>;
    fn delete_user_posts(&self, user_id: UserId) -> Result<u64>;
    fn count_posts(&self) -> Result<u64>;
    fn list_posts(&self, query: QueryRequest) -> Result<Vec<Post>>;

    fn revoke_token(&self, hash: &str, expire_after: u64) -> Result<()>;
    fn is_token_revoked(&self, hash: &str) -> Result<bool>;
    /// Removes revocations whose token has expired anyway.
    fn purge_revoked_tokens(&self, now: u64) -> Result<u64>;

    fn commit(self) -> Result<()>;
    fn rollback(self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub password: String,
    pub salt: String,
    pub update_time: u64,
}

#[derive(Debug, Default, Clone)]
pub struct PatchUserParams {
    pub id: UserId,
    pub name: Option<String>,
    pub email: Option<String>,
    /// `(hash, salt)`
    pub password: Option<(String, String)>,
    pub update_time: u64,
}

#[derive(Debug, PartialEq)]
pub struct UserPassword {
    pub id: UserId,
    pub role: Role,
    pub password: String,
    pub salt: String,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub topic: String,
    pub content: String,
    pub user_id: UserId,
    pub update_time: u64,
}

#[derive(Debug, Default, Clone)]
pub struct PatchPostParams {
    pub id: PostId,
    pub topic: Option<String>,
    pub content: Option<String>,
    pub update_time: u64,
}
